#![warn(missing_docs)]

//! # Skein Execution
//!
//! Execution-time concepts shared by the engine, the orchestrator and the
//! node handlers:
//!
//! - [`ExecutionStatus`] / [`NodeRunStatus`] — state machines with validated
//!   transitions
//! - [`ExecutionHandle`] — the in-memory record controlling one live run
//! - [`ExecutionContext`] — per-run state owned by the driver task
//! - [`NodeExecutionResult`] — what a handler returns
//! - HITL request/response types
//! - [`Supervisor`] — the hook seam the orchestrator implements
//! - [`SubworkflowRunner`] / [`HumanGate`] — capability seams handlers reach
//!   through the context, so no handler touches a global

pub mod context;
pub mod control;
pub mod error;
pub mod handle;
pub mod hitl;
pub mod result;
pub mod seams;
pub mod status;
pub mod transition;

pub use context::{ContextConfig, ExecutionContext, ExecutionWarning};
pub use control::{ControlSignal, Decision, SupervisionLevel, Supervisor};
pub use error::ExecutionError;
pub use handle::ExecutionHandle;
pub use hitl::{
    AutoAction, HitlAction, HitlGateSpec, HitlOutcome, HitlRequest, HitlRequestType, HitlResponse,
    HitlStatus,
};
pub use result::NodeExecutionResult;
pub use seams::{HumanGate, SubworkflowRunner};
pub use status::{ExecutionStatus, NodeRunStatus};
pub use transition::execution_transition_allowed;
