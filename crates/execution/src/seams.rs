//! Capability seams handlers reach through the context.
//!
//! The subworkflow and approval handlers need orchestrator behaviour
//! (starting child runs, blocking on a human). They get it through these
//! trait objects installed on the [`ExecutionContext`] by the orchestrator —
//! never through a global.

use async_trait::async_trait;
use serde_json::Value;
use skein_core::NodeItem;

use crate::context::ExecutionContext;
use crate::hitl::{HitlGateSpec, HitlOutcome};
use crate::result::NodeExecutionResult;

/// Starts and (optionally) awaits a child workflow execution.
#[async_trait]
pub trait SubworkflowRunner: Send + Sync {
    /// Execute the sub-workflow described by `config` with the given input.
    ///
    /// Circularity, nesting-depth and budget violations are reported as a
    /// failed result on the `error` handle, not as a panic or `Err`.
    async fn run_subworkflow(
        &self,
        ctx: &ExecutionContext,
        config: &Value,
        input: Vec<NodeItem>,
    ) -> NodeExecutionResult;
}

/// Blocks the execution on a human decision.
#[async_trait]
pub trait HumanGate: Send + Sync {
    /// Create a HITL request, move the execution to `WaitingHuman`, wait for
    /// a response (or the timeout's auto action), and restore `Running`.
    async fn ask_human(&self, ctx: &ExecutionContext, spec: HitlGateSpec) -> HitlOutcome;
}
