//! The async entity-store contracts.
//!
//! Every read that returns user-owned data takes the acting `UserId` and
//! filters by it — access control is part of the contract, not a layer
//! above it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use skein_core::{CredentialId, ExecutionId, RequestId, UserId, WorkflowId};
use skein_eventbus::StreamEvent;
use skein_execution::{ExecutionStatus, HitlRequest, HitlStatus, NodeRunStatus};

use crate::error::StorageError;
use crate::records::{
    AuditRecord, CredentialRecord, ExecutionRecord, NodeExecutionRecord, WorkflowRecord,
    WorkflowVersionRecord,
};

/// Workflows and their versions.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Insert a workflow. Fails with [`StorageError::Conflict`] when the
    /// owner already has one with the same name.
    async fn create_workflow(&self, record: WorkflowRecord) -> Result<(), StorageError>;

    /// Fetch a workflow visible to `user`.
    async fn get_workflow(
        &self,
        id: WorkflowId,
        user: UserId,
    ) -> Result<WorkflowRecord, StorageError>;

    /// Replace a workflow owned by `user`.
    async fn update_workflow(&self, record: WorkflowRecord) -> Result<(), StorageError>;

    /// All workflows owned by `user`.
    async fn list_workflows(&self, user: UserId) -> Result<Vec<WorkflowRecord>, StorageError>;

    /// Store an immutable version snapshot. Fails with
    /// [`StorageError::Conflict`] on a duplicate version number.
    async fn create_version(&self, record: WorkflowVersionRecord) -> Result<(), StorageError>;

    /// Fetch one version snapshot.
    async fn get_version(
        &self,
        workflow_id: WorkflowId,
        version_number: u32,
    ) -> Result<WorkflowVersionRecord, StorageError>;

    /// Fold one finished run into a workflow's counters.
    async fn record_run(
        &self,
        workflow_id: WorkflowId,
        success: bool,
        duration_ms: u64,
    ) -> Result<(), StorageError>;
}

/// Execution logs and per-node logs.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Insert a fresh execution record.
    async fn create_execution(&self, record: ExecutionRecord) -> Result<(), StorageError>;

    /// Fetch an execution visible to `user`.
    async fn get_execution(
        &self,
        id: ExecutionId,
        user: UserId,
    ) -> Result<ExecutionRecord, StorageError>;

    /// Mark the execution as started.
    async fn mark_started(&self, id: ExecutionId) -> Result<(), StorageError>;

    /// Update mutable status fields; terminal statuses also stamp
    /// `completed_at` and `duration_ms`.
    async fn update_status(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        output: Option<Value>,
        error: Option<String>,
        error_node: Option<skein_core::NodeId>,
        traceback: Option<String>,
    ) -> Result<(), StorageError>;

    /// Recent executions for a user, newest first.
    async fn list_executions(
        &self,
        user: UserId,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, StorageError>;

    /// Insert or replace a node-run record (keyed by execution + node).
    async fn upsert_node_execution(
        &self,
        record: NodeExecutionRecord,
    ) -> Result<(), StorageError>;

    /// Update one node-run record's completion fields.
    async fn complete_node_execution(
        &self,
        execution_id: ExecutionId,
        node_id: &skein_core::NodeId,
        status: NodeRunStatus,
        output: Value,
        error: Option<String>,
        retry_count: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// All node-run records for an execution, in execution order.
    async fn list_node_executions(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Vec<NodeExecutionRecord>, StorageError>;
}

/// Persisted HITL requests.
#[async_trait]
pub trait HitlStore: Send + Sync {
    /// Insert a request.
    async fn create_request(&self, request: HitlRequest) -> Result<(), StorageError>;

    /// Fetch a request visible to `user`.
    async fn get_request(&self, id: RequestId, user: UserId)
    -> Result<HitlRequest, StorageError>;

    /// Update a request's resolution.
    async fn resolve_request(
        &self,
        id: RequestId,
        status: HitlStatus,
        response: Option<Value>,
        responded_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Pending requests for a user.
    async fn list_pending(&self, user: UserId) -> Result<Vec<HitlRequest>, StorageError>;
}

/// Credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a credential.
    async fn create_credential(&self, record: CredentialRecord) -> Result<(), StorageError>;

    /// Fetch an active credential owned by `user`.
    async fn get_credential(
        &self,
        id: CredentialId,
        user: UserId,
    ) -> Result<CredentialRecord, StorageError>;

    /// All active credentials owned by `user`.
    async fn list_credentials(&self, user: UserId)
    -> Result<Vec<CredentialRecord>, StorageError>;

    /// Replace a credential owned by `user`.
    async fn update_credential(&self, record: CredentialRecord) -> Result<(), StorageError>;

    /// Soft-delete (deactivate) a credential owned by `user`.
    async fn delete_credential(&self, id: CredentialId, user: UserId)
    -> Result<(), StorageError>;
}

/// Persisted stream events, for replay.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append one event.
    async fn append_event(&self, event: StreamEvent) -> Result<(), StorageError>;

    /// Events for an execution with `sequence > after_sequence`, ascending,
    /// at most `limit`.
    async fn events_after(
        &self,
        execution_id: ExecutionId,
        after_sequence: u64,
        limit: usize,
    ) -> Result<Vec<StreamEvent>, StorageError>;
}

/// Credential audit log.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append one entry.
    async fn append_audit(&self, record: AuditRecord) -> Result<(), StorageError>;

    /// Entries for one credential, newest first.
    async fn list_audit(
        &self,
        credential_id: CredentialId,
        user: UserId,
    ) -> Result<Vec<AuditRecord>, StorageError>;
}
