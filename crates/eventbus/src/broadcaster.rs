//! The per-execution fan-out.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Value, json};
use skein_core::{ExecutionId, NodeId, WorkflowId};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::event::{EventType, StreamEvent};

/// Bounded queue size per subscriber.
pub const SUBSCRIBER_QUEUE_CAP: usize = 100;

struct ExecutionChannel {
    subscribers: Vec<mpsc::Sender<StreamEvent>>,
    next_sequence: u64,
}

impl ExecutionChannel {
    fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_sequence: 1,
        }
    }
}

/// One subscriber's receiving end. Dropping it unsubscribes: the sender
/// side fails on the next publish and is pruned from the list.
#[derive(Debug)]
pub struct Subscription {
    /// The execution being observed.
    pub execution_id: ExecutionId,
    receiver: mpsc::Receiver<StreamEvent>,
}

impl Subscription {
    /// Receive the next event; `None` once the channel closes.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }
}

/// In-memory fan-out of execution events.
///
/// The subscriber map is mutex-guarded; publishing never blocks — a full
/// subscriber queue drops the event for that subscriber (with a warning)
/// and a closed one is pruned.
#[derive(Default)]
pub struct Broadcaster {
    channels: Mutex<HashMap<ExecutionId, ExecutionChannel>>,
}

impl Broadcaster {
    /// Create an empty broadcaster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to an execution's events.
    #[must_use]
    pub fn subscribe(&self, execution_id: ExecutionId) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAP);
        self.channels
            .lock()
            .entry(execution_id)
            .or_insert_with(ExecutionChannel::new)
            .subscribers
            .push(tx);
        Subscription {
            execution_id,
            receiver: rx,
        }
    }

    /// Drop all subscribers and sequence state for a finished execution.
    pub fn remove_execution(&self, execution_id: ExecutionId) {
        self.channels.lock().remove(&execution_id);
    }

    /// Current subscriber count for an execution.
    #[must_use]
    pub fn subscriber_count(&self, execution_id: ExecutionId) -> usize {
        self.channels
            .lock()
            .get(&execution_id)
            .map_or(0, |c| c.subscribers.len())
    }

    /// Publish an event: assign the next sequence, fan out without
    /// blocking, and return the built event (for persistence).
    pub fn send_event(
        &self,
        execution_id: ExecutionId,
        event_type: EventType,
        data: Value,
    ) -> StreamEvent {
        let mut channels = self.channels.lock();
        let channel = channels
            .entry(execution_id)
            .or_insert_with(ExecutionChannel::new);

        let event = StreamEvent {
            event_id: Uuid::new_v4(),
            execution_id,
            event_type,
            data,
            sequence: channel.next_sequence,
            timestamp: Utc::now(),
        };
        channel.next_sequence += 1;

        channel.subscribers.retain(|subscriber| {
            match subscriber.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        execution_id = %execution_id,
                        event_type = %event.event_type,
                        "subscriber queue full, dropping event"
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });

        event
    }

    // ── typed publishers used by the engine and orchestrator ──────────────

    /// `workflow_start`.
    pub fn workflow_started(
        &self,
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        workflow_name: &str,
    ) -> StreamEvent {
        self.send_event(
            execution_id,
            EventType::WorkflowStart,
            json!({
                "workflow_id": workflow_id,
                "workflow_name": workflow_name,
                "status": "running",
            }),
        )
    }

    /// `workflow_complete` (terminal).
    pub fn workflow_completed(
        &self,
        execution_id: ExecutionId,
        output: Value,
        duration_ms: u64,
    ) -> StreamEvent {
        self.send_event(
            execution_id,
            EventType::WorkflowComplete,
            json!({
                "output": output,
                "duration_ms": duration_ms,
                "status": "completed",
            }),
        )
    }

    /// `workflow_error` (terminal).
    pub fn workflow_errored(
        &self,
        execution_id: ExecutionId,
        error: &str,
        node_id: Option<&NodeId>,
    ) -> StreamEvent {
        self.send_event(
            execution_id,
            EventType::WorkflowError,
            json!({
                "error": error,
                "node_id": node_id,
                "status": "failed",
            }),
        )
    }

    /// `node_started`.
    pub fn node_started(
        &self,
        execution_id: ExecutionId,
        node_id: &NodeId,
        node_type: &str,
        node_name: &str,
    ) -> StreamEvent {
        self.send_event(
            execution_id,
            EventType::NodeStarted,
            json!({
                "node_id": node_id,
                "node_type": node_type,
                "node_name": node_name,
                "status": "running",
            }),
        )
    }

    /// `node_complete`.
    #[allow(clippy::too_many_arguments)]
    pub fn node_completed(
        &self,
        execution_id: ExecutionId,
        node_id: &NodeId,
        status: &str,
        output: Value,
        error: Option<&str>,
        warnings: Value,
        duration_ms: u64,
    ) -> StreamEvent {
        self.send_event(
            execution_id,
            EventType::NodeComplete,
            json!({
                "node_id": node_id,
                "status": status,
                "output": output,
                "error": error,
                "warnings": warnings,
                "duration_ms": duration_ms,
            }),
        )
    }

    /// `node_skipped`.
    pub fn node_skipped(
        &self,
        execution_id: ExecutionId,
        node_id: &NodeId,
        reason: &str,
    ) -> StreamEvent {
        self.send_event(
            execution_id,
            EventType::NodeSkipped,
            json!({"node_id": node_id, "reason": reason}),
        )
    }

    /// `progress`.
    pub fn progress(
        &self,
        execution_id: ExecutionId,
        current: usize,
        total: usize,
        message: &str,
    ) -> StreamEvent {
        let percentage = if total > 0 {
            (current * 100 / total) as u64
        } else {
            0
        };
        self.send_event(
            execution_id,
            EventType::Progress,
            json!({
                "current": current,
                "total": total,
                "percentage": percentage,
                "message": message,
            }),
        )
    }

    /// `hitl_request`.
    pub fn hitl_requested(&self, execution_id: ExecutionId, request: Value) -> StreamEvent {
        self.send_event(execution_id, EventType::HitlRequest, request)
    }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("executions", &self.channels.lock().len())
            .finish()
    }
}
