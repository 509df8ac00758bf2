//! Control-plane types: signals, hook decisions, supervision.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skein_core::{ExecutionId, NodeId};

use crate::context::ExecutionContext;
use crate::result::NodeExecutionResult;

/// Signals carried on a per-execution control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Hold the driver at the next node boundary.
    Pause,
    /// Release a paused driver.
    Resume,
    /// Abort the run.
    Cancel,
}

/// What a supervisor hook tells the engine to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Proceed normally.
    Continue,
    /// Suspend before the node runs.
    Pause,
    /// Abort the execution with a reason.
    Abort(String),
}

/// How many hooks the engine dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisionLevel {
    /// `before_node`, `after_node` and `on_error` all fire.
    #[default]
    Full,
    /// Only `on_error` fires.
    ErrorOnly,
    /// Pure execution; no hooks.
    None,
}

impl SupervisionLevel {
    /// Whether `before_node`/`after_node` fire at this level.
    #[must_use]
    pub fn lifecycle_hooks(&self) -> bool {
        matches!(self, Self::Full)
    }

    /// Whether `on_error` fires at this level.
    #[must_use]
    pub fn error_hook(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// The orchestrator-side hook seam consulted by the engine.
///
/// `before_node` is where pause gates and cancellation are honoured;
/// `after_node` is where loop caps are enforced; `on_error` decides between
/// retry, pause and abort.
#[async_trait]
pub trait Supervisor: Send + Sync {
    /// Called before each node executes (supervision `Full`).
    async fn before_node(
        &self,
        execution_id: ExecutionId,
        node_id: &NodeId,
        ctx: &ExecutionContext,
    ) -> Decision;

    /// Called after a node executes successfully (supervision `Full`).
    async fn after_node(
        &self,
        execution_id: ExecutionId,
        node_id: &NodeId,
        result: &NodeExecutionResult,
        ctx: &ExecutionContext,
    ) -> Decision;

    /// Called when a node fails (supervision `Full` and `ErrorOnly`).
    /// `Continue` means the engine may retry per the node's retry policy.
    async fn on_error(
        &self,
        execution_id: ExecutionId,
        node_id: &NodeId,
        error: &str,
        ctx: &ExecutionContext,
    ) -> Decision;
}
