//! Persistent record shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skein_core::{CredentialId, ExecutionId, NodeId, UserId, WorkflowId};
use skein_execution::{ExecutionStatus, NodeRunStatus};
use skein_workflow::{WorkflowGraph, WorkflowStatus};
use uuid::Uuid;

/// How an execution was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Started by a user action or API call.
    #[default]
    Manual,
    /// Started by an inbound webhook.
    Webhook,
    /// Started by the scheduler.
    Schedule,
    /// Started programmatically through the public API.
    Api,
    /// Started by the orchestrator (sub-workflows).
    Orchestrator,
}

/// A stored workflow. `(owner, name)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRecord {
    /// Workflow identifier.
    pub id: WorkflowId,
    /// Owning user.
    pub owner: UserId,
    /// Unique-per-owner display name.
    pub name: String,
    /// URL slug derived from the name.
    pub slug: String,
    /// Optional description.
    #[serde(default)]
    pub description: String,
    /// The graph itself.
    pub graph: WorkflowGraph,
    /// Lifecycle status.
    pub status: WorkflowStatus,
    /// Total runs.
    pub total_executions: u64,
    /// Successful runs.
    pub successful_executions: u64,
    /// Rolling average run duration.
    pub avg_duration_ms: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl WorkflowRecord {
    /// Create a draft workflow owned by `owner`.
    #[must_use]
    pub fn new(owner: UserId, name: impl Into<String>, graph: WorkflowGraph) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: WorkflowId::v4(),
            owner,
            slug: slugify(&name),
            name,
            description: String::new(),
            graph,
            status: WorkflowStatus::Draft,
            total_executions: 0,
            successful_executions: 0,
            avg_duration_ms: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold one finished run into the counters.
    pub fn record_run(&mut self, success: bool, duration_ms: u64) {
        let previous_total = self.total_executions;
        self.total_executions += 1;
        if success {
            self.successful_executions += 1;
        }
        // Rolling average over all runs.
        self.avg_duration_ms =
            (self.avg_duration_ms * previous_total + duration_ms) / self.total_executions;
        self.updated_at = Utc::now();
    }
}

fn slugify(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// An immutable snapshot of a workflow's graph.
/// `(workflow_id, version_number)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowVersionRecord {
    /// The workflow this version belongs to.
    pub workflow_id: WorkflowId,
    /// Monotonically increasing version number.
    pub version_number: u32,
    /// The snapshotted graph.
    pub graph: WorkflowGraph,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
}

/// The persistent mirror of an execution handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Execution identifier (unique).
    pub execution_id: ExecutionId,
    /// Workflow executed.
    pub workflow_id: WorkflowId,
    /// User who ran it.
    pub user_id: UserId,
    /// Current status.
    pub status: ExecutionStatus,
    /// How the run was started.
    pub trigger_type: TriggerType,
    /// Initial input payload.
    pub input_data: Value,
    /// Final output payload.
    #[serde(default)]
    pub output_data: Value,
    /// Human-readable terminal error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Node the failure is attributed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_node_id: Option<NodeId>,
    /// Developer-facing failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
    /// Parent execution for sub-workflow runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_execution_id: Option<ExecutionId>,
    /// Sub-workflow nesting depth.
    pub nesting_depth: u32,
    /// Wall-clock budget for the run, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_budget_ms: Option<u64>,
    /// Creation time (immutable).
    pub created_at: DateTime<Utc>,
    /// When the driver started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Total run duration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ExecutionRecord {
    /// A fresh pending record.
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        user_id: UserId,
        trigger_type: TriggerType,
        input_data: Value,
    ) -> Self {
        Self {
            execution_id,
            workflow_id,
            user_id,
            status: ExecutionStatus::Pending,
            trigger_type,
            input_data,
            output_data: Value::Null,
            error_message: None,
            error_node_id: None,
            traceback: None,
            parent_execution_id: None,
            nesting_depth: 0,
            timeout_budget_ms: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            duration_ms: None,
        }
    }
}

/// One node's run within an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutionRecord {
    /// Owning execution.
    pub execution_id: ExecutionId,
    /// The node.
    pub node_id: NodeId,
    /// The node's type key.
    pub node_type: String,
    /// Position in the run (0-based).
    pub execution_order: usize,
    /// Status of this node run.
    pub status: NodeRunStatus,
    /// Input snapshot.
    #[serde(default)]
    pub input: Value,
    /// Output snapshot.
    #[serde(default)]
    pub output: Value,
    /// Error message, when failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Retries consumed.
    pub retry_count: u32,
    /// When the node started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the node finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Node run duration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Credential kinds supported by the credential manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Static API key.
    ApiKey,
    /// OAuth 2.0 with refresh.
    Oauth2,
    /// Username/password pair.
    Basic,
    /// Static bearer token.
    Bearer,
    /// Free-form fields.
    Custom,
}

/// A stored credential. The payload is an encrypted, base64-encoded blob —
/// plaintext never touches storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Credential identifier.
    pub id: CredentialId,
    /// Owning user; every read is filtered by this.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Credential kind.
    pub kind: CredentialKind,
    /// Sealed payload (base64 of nonce + ciphertext).
    pub encrypted_data: String,
    /// Sealed OAuth access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Sealed OAuth refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<DateTime<Utc>>,
    /// OAuth token endpoint used for refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_token_url: Option<String>,
    /// Soft-delete / disable flag.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Last successful use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    /// Last error observed (refresh failure, …).
    #[serde(default)]
    pub last_error: String,
}

/// Credential audit actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Credential created.
    Created,
    /// Credential decrypted for use.
    Accessed,
    /// Credential updated.
    Updated,
    /// Credential deleted/disabled.
    Deleted,
    /// Credential verified.
    Verified,
    /// An OAuth refresh attempt failed.
    RefreshFailed,
}

/// One credential audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Entry identifier.
    pub id: Uuid,
    /// The credential concerned.
    pub credential_id: CredentialId,
    /// The acting user.
    pub user_id: UserId,
    /// What happened.
    pub action: AuditAction,
    /// Free-text detail (never contains secret material).
    pub detail: String,
    /// When it happened.
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Build an entry stamped now.
    #[must_use]
    pub fn new(
        credential_id: CredentialId,
        user_id: UserId,
        action: AuditAction,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            credential_id,
            user_id,
            action,
            detail: detail.into(),
            created_at: Utc::now(),
        }
    }
}
