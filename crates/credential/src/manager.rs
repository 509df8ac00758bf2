//! The credential manager: fetch → decrypt → cache, with OAuth refresh.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Value, json};
use skein_core::{CredentialId, UserId};
use skein_storage::{
    AuditAction, AuditRecord, AuditStore, CredentialKind, CredentialRecord, CredentialStore,
};
use tracing::{info, warn};

use crate::crypto::EncryptionKey;
use crate::error::CredentialError;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Central service for credential operations.
///
/// Every fetch is isolated per user; the decryption cache is keyed by
/// `(user, credential)` and invalidated on update or delete.
pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    audit: Arc<dyn AuditStore>,
    key: EncryptionKey,
    cache: Mutex<HashMap<(UserId, CredentialId), (Value, Instant)>>,
    cache_ttl: Duration,
    http: reqwest::Client,
}

impl CredentialManager {
    /// Create a manager over a store, an audit log and the process key.
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        audit: Arc<dyn AuditStore>,
        key: EncryptionKey,
    ) -> Self {
        Self {
            store,
            audit,
            key,
            cache: Mutex::new(HashMap::new()),
            cache_ttl: DEFAULT_CACHE_TTL,
            http: reqwest::Client::new(),
        }
    }

    /// Override the decryption-cache TTL.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Create and seal a new credential.
    pub async fn create(
        &self,
        user: UserId,
        name: impl Into<String>,
        kind: CredentialKind,
        data: &Value,
        oauth_token_url: Option<String>,
    ) -> Result<CredentialRecord, CredentialError> {
        let now = Utc::now();
        let record = CredentialRecord {
            id: CredentialId::v4(),
            user_id: user,
            name: name.into(),
            kind,
            encrypted_data: self.key.seal_json(data)?.0,
            access_token: None,
            refresh_token: None,
            token_expires_at: None,
            oauth_token_url,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_used_at: None,
            last_error: String::new(),
        };
        self.store.create_credential(record.clone()).await?;
        self.log_audit(&record, user, AuditAction::Created, "credential created")
            .await;
        Ok(record)
    }

    /// Fetch and decrypt a credential for `user`.
    ///
    /// Hits the short-TTL cache first; on a miss, loads the record,
    /// refreshes an expired OAuth token when possible, decrypts, stamps
    /// `last_used_at` and fills the cache.
    pub async fn get(
        &self,
        credential_id: CredentialId,
        user: UserId,
    ) -> Result<Value, CredentialError> {
        let cache_key = (user, credential_id);
        if let Some((value, cached_at)) = self.cache.lock().get(&cache_key) {
            if cached_at.elapsed() < self.cache_ttl {
                return Ok(value.clone());
            }
        }

        let mut record = self
            .store
            .get_credential(credential_id, user)
            .await
            .map_err(|_| CredentialError::NotFound)?;

        let token_expired = record
            .token_expires_at
            .is_some_and(|expires| expires <= Utc::now());
        if record.kind == CredentialKind::Oauth2 && token_expired {
            if let Err(err) = self.refresh_oauth(&mut record).await {
                warn!(credential_id = %credential_id, "oauth refresh failed: {err}");
                self.log_audit(&record, user, AuditAction::RefreshFailed, err.to_string())
                    .await;
            }
        }

        let mut data = self.key.open_json(&record.encrypted_data)?;
        if let Some(sealed_token) = &record.access_token {
            let token_bytes = self.key.open(sealed_token)?;
            if let (Some(map), Ok(token)) = (data.as_object_mut(), String::from_utf8(token_bytes))
            {
                map.insert("access_token".to_owned(), Value::String(token));
            }
        }

        record.last_used_at = Some(Utc::now());
        self.store.update_credential(record.clone()).await?;
        self.cache
            .lock()
            .insert(cache_key, (data.clone(), Instant::now()));
        self.log_audit(&record, user, AuditAction::Accessed, "credential decrypted")
            .await;
        info!(credential_id = %credential_id, user_id = %user, "credential accessed");
        Ok(data)
    }

    /// Refresh an expired OAuth access token in place.
    pub async fn refresh_oauth(
        &self,
        record: &mut CredentialRecord,
    ) -> Result<(), CredentialError> {
        let Some(sealed_refresh) = record.refresh_token.clone() else {
            return Err(CredentialError::Refresh("no refresh token".into()));
        };
        let Some(token_url) = record.oauth_token_url.clone() else {
            return Err(CredentialError::Refresh("no token url configured".into()));
        };

        let refresh_token = String::from_utf8(self.key.open(&sealed_refresh)?)
            .map_err(|_| CredentialError::Decryption)?;
        let data = self.key.open_json(&record.encrypted_data)?;
        let client_id = data["client_id"].as_str().unwrap_or_default().to_owned();
        let client_secret = data["client_secret"].as_str().unwrap_or_default().to_owned();

        let response = self
            .http
            .post(&token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", &refresh_token),
                ("client_id", &client_id),
                ("client_secret", &client_secret),
            ])
            .send()
            .await
            .map_err(|err| CredentialError::Refresh(err.to_string()))?;

        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            record.last_error = format!("token refresh failed: {detail}");
            self.store.update_credential(record.clone()).await?;
            return Err(CredentialError::Refresh(detail));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| CredentialError::Refresh(err.to_string()))?;
        let Some(access_token) = payload["access_token"].as_str() else {
            return Err(CredentialError::Refresh("response missing access_token".into()));
        };
        let new_refresh = payload["refresh_token"].as_str().unwrap_or(&refresh_token);
        let expires_in = payload["expires_in"].as_u64().unwrap_or(3600);

        record.access_token = Some(self.key.seal(access_token.as_bytes())?.0);
        record.refresh_token = Some(self.key.seal(new_refresh.as_bytes())?.0);
        record.token_expires_at = Some(Utc::now() + chrono::Duration::seconds(expires_in as i64));
        record.last_error = String::new();
        record.updated_at = Utc::now();
        self.store.update_credential(record.clone()).await?;
        info!(credential_id = %record.id, "oauth token refreshed");
        Ok(())
    }

    /// Replace a credential's payload and invalidate its cache entry.
    pub async fn update(
        &self,
        credential_id: CredentialId,
        user: UserId,
        data: &Value,
    ) -> Result<(), CredentialError> {
        let mut record = self
            .store
            .get_credential(credential_id, user)
            .await
            .map_err(|_| CredentialError::NotFound)?;
        record.encrypted_data = self.key.seal_json(data)?.0;
        record.updated_at = Utc::now();
        self.store.update_credential(record.clone()).await?;
        self.invalidate(user, credential_id);
        self.log_audit(&record, user, AuditAction::Updated, "credential updated")
            .await;
        Ok(())
    }

    /// Deactivate a credential and invalidate its cache entry.
    pub async fn delete(
        &self,
        credential_id: CredentialId,
        user: UserId,
    ) -> Result<(), CredentialError> {
        let record = self
            .store
            .get_credential(credential_id, user)
            .await
            .map_err(|_| CredentialError::NotFound)?;
        self.store.delete_credential(credential_id, user).await?;
        self.invalidate(user, credential_id);
        self.log_audit(&record, user, AuditAction::Deleted, "credential deleted")
            .await;
        Ok(())
    }

    /// Verify a credential decrypts and carries its kind's required fields.
    pub async fn verify(
        &self,
        credential_id: CredentialId,
        user: UserId,
    ) -> Result<Vec<String>, CredentialError> {
        let record = self
            .store
            .get_credential(credential_id, user)
            .await
            .map_err(|_| CredentialError::NotFound)?;
        let data = self.key.open_json(&record.encrypted_data)?;

        let required: &[&str] = match record.kind {
            CredentialKind::ApiKey => &["api_key"],
            CredentialKind::Oauth2 => &["client_id", "client_secret"],
            CredentialKind::Basic => &["username", "password"],
            CredentialKind::Bearer => &["token"],
            CredentialKind::Custom => &[],
        };
        let problems: Vec<String> = required
            .iter()
            .filter(|field| data.get(**field).and_then(Value::as_str).is_none())
            .map(|field| format!("missing required field: {field}"))
            .collect();

        self.log_audit(&record, user, AuditAction::Verified, "credential verified")
            .await;
        Ok(problems)
    }

    /// Drop one cache entry.
    pub fn invalidate(&self, user: UserId, credential_id: CredentialId) {
        self.cache.lock().remove(&(user, credential_id));
    }

    /// All active credential records owned by `user` (sealed payloads; the
    /// API layer redacts further).
    pub async fn credential_records(
        &self,
        user: UserId,
    ) -> Result<Vec<CredentialRecord>, CredentialError> {
        Ok(self.store.list_credentials(user).await?)
    }

    /// The set of active credential ids owned by `user`, as strings, for
    /// compile-time validation.
    pub async fn credential_ids(&self, user: UserId) -> Result<HashSet<String>, CredentialError> {
        Ok(self
            .store
            .list_credentials(user)
            .await?
            .into_iter()
            .map(|record| record.id.to_string())
            .collect())
    }

    /// Decrypt a batch of credentials for an execution context. Failures
    /// are logged and skipped — compile-time validation already proved
    /// ownership, so a miss here is an infrastructure problem for the node
    /// that needs it, not for the whole run.
    pub async fn load_many(
        &self,
        user: UserId,
        credential_ids: &[String],
    ) -> HashMap<String, Value> {
        let mut loaded = HashMap::new();
        for raw_id in credential_ids {
            let Ok(id) = CredentialId::parse(raw_id) else {
                warn!(credential_id = %raw_id, "unparseable credential id");
                continue;
            };
            match self.get(id, user).await {
                Ok(data) => {
                    loaded.insert(raw_id.clone(), data);
                }
                Err(err) => warn!(credential_id = %raw_id, "credential load failed: {err}"),
            }
        }
        loaded
    }

    async fn log_audit(
        &self,
        record: &CredentialRecord,
        user: UserId,
        action: AuditAction,
        detail: impl Into<String>,
    ) {
        let entry = AuditRecord::new(record.id, user, action, detail);
        if let Err(err) = self.audit.append_audit(entry).await {
            warn!("audit append failed: {err}");
        }
    }
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}

/// The credential-type catalog served by `GET /credentials/types/`.
#[must_use]
pub fn credential_type_catalog() -> Value {
    json!([
        {"kind": "api_key", "label": "API Key", "fields": ["api_key"]},
        {"kind": "oauth2", "label": "OAuth 2.0", "fields": ["client_id", "client_secret"]},
        {"kind": "basic", "label": "Basic Auth", "fields": ["username", "password"]},
        {"kind": "bearer", "label": "Bearer Token", "fields": ["token"]},
        {"kind": "custom", "label": "Custom", "fields": []},
    ])
}
