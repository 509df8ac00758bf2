//! Per-execution control state.

use std::sync::Arc;

use skein_compiler::ExecutionPlan;
use skein_execution::ExecutionStatus;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// The control channel the orchestrator holds for one live run.
///
/// Pause travels on a `watch` (the engine's `before_node` gate awaits it),
/// cancellation on a `CancellationToken` shared with the execution context,
/// and completion on a second `watch` that sub-workflow parents await.
#[derive(Debug)]
pub struct ControlState {
    pause_tx: watch::Sender<bool>,
    pause_rx: watch::Receiver<bool>,
    /// Cancellation token shared with the context.
    pub cancel: CancellationToken,
    completion_tx: watch::Sender<ExecutionStatus>,
    completion_rx: watch::Receiver<ExecutionStatus>,
    /// The compiled plan, for hook-side config lookups (loop caps,
    /// error policy) and progress totals.
    pub plan: Arc<ExecutionPlan>,
}

impl ControlState {
    /// Fresh control state for a run.
    #[must_use]
    pub fn new(plan: Arc<ExecutionPlan>) -> Self {
        let (pause_tx, pause_rx) = watch::channel(false);
        let (completion_tx, completion_rx) = watch::channel(ExecutionStatus::Pending);
        Self {
            pause_tx,
            pause_rx,
            cancel: CancellationToken::new(),
            completion_tx,
            completion_rx,
            plan,
        }
    }

    /// Request or release the pause gate.
    pub fn set_paused(&self, paused: bool) {
        let _ = self.pause_tx.send(paused);
    }

    /// Whether the pause gate is currently requested.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.pause_rx.borrow()
    }

    /// A receiver for gate waits.
    #[must_use]
    pub fn pause_watch(&self) -> watch::Receiver<bool> {
        self.pause_rx.clone()
    }

    /// Publish the terminal status.
    pub fn complete(&self, status: ExecutionStatus) {
        let _ = self.completion_tx.send(status);
    }

    /// A receiver for completion waits.
    #[must_use]
    pub fn completion_watch(&self) -> watch::Receiver<ExecutionStatus> {
        self.completion_rx.clone()
    }
}
