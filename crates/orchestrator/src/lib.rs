#![warn(missing_docs)]

//! # Skein Orchestrator
//!
//! The supervisory layer above the engine. The [`Orchestrator`] owns an
//! [`ExecutionHandle`](skein_execution::ExecutionHandle) and a control
//! channel per live run, and exposes the lifecycle surface:
//! `start` / `pause` / `resume` / `stop` / `get_status` /
//! `respond_to_hitl`. It implements the engine's
//! [`Supervisor`](skein_execution::Supervisor) hooks (pause gate, cancel
//! check, progress, loop caps, error policy) and the handler seams for
//! sub-workflows and human gates.

pub mod control;
pub mod gate;
pub mod orchestrator;
pub mod start;
pub mod subworkflow;
pub mod supervisor;

pub use orchestrator::{Orchestrator, OrchestratorStores};
pub use start::StartRequest;
