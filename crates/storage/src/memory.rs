//! In-memory entity store.
//!
//! All maps are guarded by `parking_lot` locks; every collection is keyed
//! so no state is shared across users beyond the maps themselves.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use skein_core::{CredentialId, ExecutionId, NodeId, RequestId, UserId, WorkflowId};
use skein_eventbus::StreamEvent;
use skein_execution::{ExecutionStatus, HitlRequest, HitlStatus, NodeRunStatus};

use crate::error::StorageError;
use crate::records::{
    AuditRecord, CredentialRecord, ExecutionRecord, NodeExecutionRecord, WorkflowRecord,
    WorkflowVersionRecord,
};
use crate::store::{
    AuditStore, CredentialStore, EventStore, ExecutionStore, HitlStore, WorkflowStore,
};

/// One store implementing every contract, backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    workflows: RwLock<HashMap<WorkflowId, WorkflowRecord>>,
    versions: RwLock<HashMap<(WorkflowId, u32), WorkflowVersionRecord>>,
    executions: RwLock<HashMap<ExecutionId, ExecutionRecord>>,
    node_executions: RwLock<HashMap<ExecutionId, Vec<NodeExecutionRecord>>>,
    hitl: RwLock<HashMap<RequestId, HitlRequest>>,
    credentials: RwLock<HashMap<CredentialId, CredentialRecord>>,
    events: RwLock<HashMap<ExecutionId, Vec<StreamEvent>>>,
    audit: RwLock<Vec<AuditRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("workflows", &self.workflows.read().len())
            .field("executions", &self.executions.read().len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn create_workflow(&self, record: WorkflowRecord) -> Result<(), StorageError> {
        let mut workflows = self.workflows.write();
        let duplicate = workflows
            .values()
            .any(|w| w.owner == record.owner && w.name == record.name);
        if duplicate {
            return Err(StorageError::Conflict(format!(
                "workflow '{}' already exists for this user",
                record.name
            )));
        }
        workflows.insert(record.id, record);
        Ok(())
    }

    async fn get_workflow(
        &self,
        id: WorkflowId,
        user: UserId,
    ) -> Result<WorkflowRecord, StorageError> {
        self.workflows
            .read()
            .get(&id)
            .filter(|w| w.owner == user)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn update_workflow(&self, record: WorkflowRecord) -> Result<(), StorageError> {
        let mut workflows = self.workflows.write();
        match workflows.get(&record.id) {
            Some(existing) if existing.owner == record.owner => {
                workflows.insert(record.id, record);
                Ok(())
            }
            _ => Err(StorageError::NotFound),
        }
    }

    async fn list_workflows(&self, user: UserId) -> Result<Vec<WorkflowRecord>, StorageError> {
        let mut list: Vec<WorkflowRecord> = self
            .workflows
            .read()
            .values()
            .filter(|w| w.owner == user)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(list)
    }

    async fn create_version(&self, record: WorkflowVersionRecord) -> Result<(), StorageError> {
        let key = (record.workflow_id, record.version_number);
        let mut versions = self.versions.write();
        if versions.contains_key(&key) {
            return Err(StorageError::Conflict(format!(
                "version {} already exists",
                record.version_number
            )));
        }
        versions.insert(key, record);
        Ok(())
    }

    async fn get_version(
        &self,
        workflow_id: WorkflowId,
        version_number: u32,
    ) -> Result<WorkflowVersionRecord, StorageError> {
        self.versions
            .read()
            .get(&(workflow_id, version_number))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn record_run(
        &self,
        workflow_id: WorkflowId,
        success: bool,
        duration_ms: u64,
    ) -> Result<(), StorageError> {
        let mut workflows = self.workflows.write();
        let record = workflows
            .get_mut(&workflow_id)
            .ok_or(StorageError::NotFound)?;
        record.record_run(success, duration_ms);
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn create_execution(&self, record: ExecutionRecord) -> Result<(), StorageError> {
        let mut executions = self.executions.write();
        if executions.contains_key(&record.execution_id) {
            return Err(StorageError::Conflict("execution id already exists".into()));
        }
        executions.insert(record.execution_id, record);
        Ok(())
    }

    async fn get_execution(
        &self,
        id: ExecutionId,
        user: UserId,
    ) -> Result<ExecutionRecord, StorageError> {
        self.executions
            .read()
            .get(&id)
            .filter(|e| e.user_id == user)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn mark_started(&self, id: ExecutionId) -> Result<(), StorageError> {
        let mut executions = self.executions.write();
        let record = executions.get_mut(&id).ok_or(StorageError::NotFound)?;
        record.status = ExecutionStatus::Running;
        record.started_at = Some(Utc::now());
        Ok(())
    }

    async fn update_status(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        output: Option<Value>,
        error: Option<String>,
        error_node: Option<NodeId>,
        traceback: Option<String>,
    ) -> Result<(), StorageError> {
        let mut executions = self.executions.write();
        let record = executions.get_mut(&id).ok_or(StorageError::NotFound)?;
        record.status = status;
        if let Some(output) = output {
            record.output_data = output;
        }
        if error.is_some() {
            record.error_message = error;
        }
        if error_node.is_some() {
            record.error_node_id = error_node;
        }
        if traceback.is_some() {
            record.traceback = traceback;
        }
        if status.is_terminal() {
            let now = Utc::now();
            record.completed_at = Some(now);
            let reference = record.started_at.unwrap_or(record.created_at);
            record.duration_ms = Some((now - reference).num_milliseconds().max(0) as u64);
        }
        Ok(())
    }

    async fn list_executions(
        &self,
        user: UserId,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, StorageError> {
        let mut list: Vec<ExecutionRecord> = self
            .executions
            .read()
            .values()
            .filter(|e| e.user_id == user)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list.truncate(limit);
        Ok(list)
    }

    async fn upsert_node_execution(
        &self,
        record: NodeExecutionRecord,
    ) -> Result<(), StorageError> {
        let mut node_executions = self.node_executions.write();
        let rows = node_executions.entry(record.execution_id).or_default();
        match rows.iter_mut().find(|r| r.node_id == record.node_id) {
            Some(existing) => *existing = record,
            None => rows.push(record),
        }
        Ok(())
    }

    async fn complete_node_execution(
        &self,
        execution_id: ExecutionId,
        node_id: &NodeId,
        status: NodeRunStatus,
        output: Value,
        error: Option<String>,
        retry_count: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut node_executions = self.node_executions.write();
        let rows = node_executions
            .get_mut(&execution_id)
            .ok_or(StorageError::NotFound)?;
        let record = rows
            .iter_mut()
            .find(|r| &r.node_id == node_id)
            .ok_or(StorageError::NotFound)?;
        record.status = status;
        record.output = output;
        record.error = error;
        record.retry_count = retry_count;
        record.completed_at = Some(completed_at);
        if let Some(started) = record.started_at {
            record.duration_ms = Some((completed_at - started).num_milliseconds().max(0) as u64);
        }
        Ok(())
    }

    async fn list_node_executions(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Vec<NodeExecutionRecord>, StorageError> {
        let mut rows = self
            .node_executions
            .read()
            .get(&execution_id)
            .cloned()
            .unwrap_or_default();
        rows.sort_by_key(|r| r.execution_order);
        Ok(rows)
    }
}

#[async_trait]
impl HitlStore for MemoryStore {
    async fn create_request(&self, request: HitlRequest) -> Result<(), StorageError> {
        self.hitl.write().insert(request.id, request);
        Ok(())
    }

    async fn get_request(
        &self,
        id: RequestId,
        user: UserId,
    ) -> Result<HitlRequest, StorageError> {
        self.hitl
            .read()
            .get(&id)
            .filter(|r| r.user_id == user)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn resolve_request(
        &self,
        id: RequestId,
        status: HitlStatus,
        response: Option<Value>,
        responded_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut hitl = self.hitl.write();
        let request = hitl.get_mut(&id).ok_or(StorageError::NotFound)?;
        request.status = status;
        request.response = response;
        request.responded_at = Some(responded_at);
        Ok(())
    }

    async fn list_pending(&self, user: UserId) -> Result<Vec<HitlRequest>, StorageError> {
        let mut pending: Vec<HitlRequest> = self
            .hitl
            .read()
            .values()
            .filter(|r| r.user_id == user && r.status == HitlStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn create_credential(&self, record: CredentialRecord) -> Result<(), StorageError> {
        let mut credentials = self.credentials.write();
        let duplicate = credentials
            .values()
            .any(|c| c.user_id == record.user_id && c.name == record.name && c.is_active);
        if duplicate {
            return Err(StorageError::Conflict(format!(
                "credential '{}' already exists",
                record.name
            )));
        }
        credentials.insert(record.id, record);
        Ok(())
    }

    async fn get_credential(
        &self,
        id: CredentialId,
        user: UserId,
    ) -> Result<CredentialRecord, StorageError> {
        self.credentials
            .read()
            .get(&id)
            .filter(|c| c.user_id == user && c.is_active)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_credentials(
        &self,
        user: UserId,
    ) -> Result<Vec<CredentialRecord>, StorageError> {
        let mut list: Vec<CredentialRecord> = self
            .credentials
            .read()
            .values()
            .filter(|c| c.user_id == user && c.is_active)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }

    async fn update_credential(&self, record: CredentialRecord) -> Result<(), StorageError> {
        let mut credentials = self.credentials.write();
        match credentials.get(&record.id) {
            Some(existing) if existing.user_id == record.user_id => {
                credentials.insert(record.id, record);
                Ok(())
            }
            _ => Err(StorageError::NotFound),
        }
    }

    async fn delete_credential(
        &self,
        id: CredentialId,
        user: UserId,
    ) -> Result<(), StorageError> {
        let mut credentials = self.credentials.write();
        let record = credentials
            .get_mut(&id)
            .filter(|c| c.user_id == user)
            .ok_or(StorageError::NotFound)?;
        record.is_active = false;
        record.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn append_event(&self, event: StreamEvent) -> Result<(), StorageError> {
        self.events
            .write()
            .entry(event.execution_id)
            .or_default()
            .push(event);
        Ok(())
    }

    async fn events_after(
        &self,
        execution_id: ExecutionId,
        after_sequence: u64,
        limit: usize,
    ) -> Result<Vec<StreamEvent>, StorageError> {
        let events = self.events.read();
        let mut matching: Vec<StreamEvent> = events
            .get(&execution_id)
            .map(|list| {
                list.iter()
                    .filter(|e| e.sequence > after_sequence)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matching.sort_by_key(|e| e.sequence);
        matching.truncate(limit);
        Ok(matching)
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append_audit(&self, record: AuditRecord) -> Result<(), StorageError> {
        self.audit.write().push(record);
        Ok(())
    }

    async fn list_audit(
        &self,
        credential_id: CredentialId,
        user: UserId,
    ) -> Result<Vec<AuditRecord>, StorageError> {
        let mut list: Vec<AuditRecord> = self
            .audit
            .read()
            .iter()
            .filter(|r| r.credential_id == credential_id && r.user_id == user)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use skein_workflow::WorkflowGraph;

    use super::*;
    use crate::records::TriggerType;

    #[tokio::test]
    async fn workflow_name_unique_per_owner() {
        let store = MemoryStore::new();
        let owner = UserId::v4();
        store
            .create_workflow(WorkflowRecord::new(owner, "daily", WorkflowGraph::default()))
            .await
            .unwrap();

        let err = store
            .create_workflow(WorkflowRecord::new(owner, "daily", WorkflowGraph::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        // A different owner can reuse the name.
        store
            .create_workflow(WorkflowRecord::new(
                UserId::v4(),
                "daily",
                WorkflowGraph::default(),
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn workflow_reads_are_owner_filtered() {
        let store = MemoryStore::new();
        let owner = UserId::v4();
        let record = WorkflowRecord::new(owner, "w", WorkflowGraph::default());
        let id = record.id;
        store.create_workflow(record).await.unwrap();

        assert!(store.get_workflow(id, owner).await.is_ok());
        assert!(matches!(
            store.get_workflow(id, UserId::v4()).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn version_numbers_unique() {
        let store = MemoryStore::new();
        let workflow_id = WorkflowId::v4();
        let version = WorkflowVersionRecord {
            workflow_id,
            version_number: 1,
            graph: WorkflowGraph::default(),
            created_at: Utc::now(),
        };
        store.create_version(version.clone()).await.unwrap();
        assert!(matches!(
            store.create_version(version).await,
            Err(StorageError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn execution_terminal_update_stamps_duration() {
        let store = MemoryStore::new();
        let user = UserId::v4();
        let record = ExecutionRecord::new(
            ExecutionId::v4(),
            WorkflowId::v4(),
            user,
            TriggerType::Manual,
            json!({}),
        );
        let id = record.execution_id;
        store.create_execution(record).await.unwrap();
        store.mark_started(id).await.unwrap();
        store
            .update_status(
                id,
                ExecutionStatus::Completed,
                Some(json!({"ok": true})),
                None,
                None,
                None,
            )
            .await
            .unwrap();

        let fetched = store.get_execution(id, user).await.unwrap();
        assert_eq!(fetched.status, ExecutionStatus::Completed);
        assert!(fetched.completed_at.is_some());
        assert!(fetched.duration_ms.is_some());
        assert_eq!(fetched.output_data, json!({"ok": true}));
    }

    #[tokio::test]
    async fn node_execution_upsert_then_complete() {
        let store = MemoryStore::new();
        let execution_id = ExecutionId::v4();
        let node_id = NodeId::new("a");
        store
            .upsert_node_execution(NodeExecutionRecord {
                execution_id,
                node_id: node_id.clone(),
                node_type: "set".into(),
                execution_order: 0,
                status: NodeRunStatus::Running,
                input: json!([]),
                output: Value::Null,
                error: None,
                retry_count: 0,
                started_at: Some(Utc::now()),
                completed_at: None,
                duration_ms: None,
            })
            .await
            .unwrap();

        store
            .complete_node_execution(
                execution_id,
                &node_id,
                NodeRunStatus::Completed,
                json!([{"json": {}}]),
                None,
                0,
                Utc::now(),
            )
            .await
            .unwrap();

        let rows = store.list_node_executions(execution_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, NodeRunStatus::Completed);
        assert!(rows[0].duration_ms.is_some());
    }

    #[tokio::test]
    async fn event_replay_pages_by_sequence() {
        let store = MemoryStore::new();
        let bus = skein_eventbus::Broadcaster::new();
        let execution_id = ExecutionId::v4();
        for _ in 0..5 {
            let event =
                bus.send_event(execution_id, skein_eventbus::EventType::Progress, json!({}));
            store.append_event(event).await.unwrap();
        }

        let page = store.events_after(execution_id, 2, 2).await.unwrap();
        assert_eq!(
            page.iter().map(|e| e.sequence).collect::<Vec<_>>(),
            vec![3, 4]
        );
    }

    #[tokio::test]
    async fn deleted_credentials_disappear_from_reads() {
        let store = MemoryStore::new();
        let user = UserId::v4();
        let record = CredentialRecord {
            id: CredentialId::v4(),
            user_id: user,
            name: "slack".into(),
            kind: crate::records::CredentialKind::ApiKey,
            encrypted_data: "sealed".into(),
            access_token: None,
            refresh_token: None,
            token_expires_at: None,
            oauth_token_url: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_used_at: None,
            last_error: String::new(),
        };
        let id = record.id;
        store.create_credential(record).await.unwrap();
        assert_eq!(store.list_credentials(user).await.unwrap().len(), 1);

        store.delete_credential(id, user).await.unwrap();
        assert!(store.list_credentials(user).await.unwrap().is_empty());
        assert!(matches!(
            store.get_credential(id, user).await,
            Err(StorageError::NotFound)
        ));
    }
}
