//! JWT authentication.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use skein_core::{UserId, UserTier};

use crate::error::ApiError;
use crate::state::AppState;

/// Token claims. `sub` is the user id; `tier` defaults to free.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id (UUID string).
    pub sub: String,
    /// Subscription tier.
    #[serde(default)]
    pub tier: UserTier,
    /// Expiry (unix seconds).
    pub exp: u64,
}

/// The authenticated caller, extracted from `Authorization: Bearer …` or a
/// `?token=` query parameter (WebSocket clients cannot set headers).
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    /// The caller's user id.
    pub user_id: UserId,
    /// The caller's tier.
    pub tier: UserTier,
}

/// Verify a raw JWT against the configured secret.
pub fn verify_token(token: &str, secret: &str) -> Result<AuthUser, ApiError> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| ApiError::Unauthorized)?;

    let user_id = UserId::parse(&decoded.claims.sub).map_err(|_| ApiError::Unauthorized)?;
    Ok(AuthUser {
        user_id,
        tier: decoded.claims.tier,
    })
}

/// Pull the raw token out of a request: `Authorization: Bearer` first, then
/// the `token` query parameter.
#[must_use]
pub fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(header) = parts
        .headers
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        if let Some(token) = header.strip_prefix("Bearer ") {
            return Some(token.to_owned());
        }
    }
    parts.uri.query().and_then(|query| {
        query.split('&').find_map(|pair| {
            pair.strip_prefix("token=").map(str::to_owned)
        })
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts).ok_or(ApiError::Unauthorized)?;
        verify_token(&token, &state.config.jwt_secret)
    }
}
