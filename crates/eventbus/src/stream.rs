//! Heartbeat-aware consumption of one execution's events.

use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;

use crate::broadcaster::Subscription;
use crate::event::{EventType, StreamEvent};

/// Wraps a [`Subscription`] with the streaming-endpoint semantics: an
/// initial `connected` event, heartbeats on inactivity, a total-duration
/// cap, and termination on terminal events.
#[derive(Debug)]
pub struct EventStream {
    subscription: Subscription,
    deadline: Instant,
    heartbeat_interval: Duration,
    opened: bool,
    finished: bool,
}

impl EventStream {
    /// Build a stream bounded by `timeout` overall, emitting a heartbeat
    /// after every `heartbeat_interval` without traffic.
    #[must_use]
    pub fn new(subscription: Subscription, timeout: Duration, heartbeat_interval: Duration) -> Self {
        Self {
            subscription,
            deadline: Instant::now() + timeout,
            heartbeat_interval,
            opened: false,
            finished: false,
        }
    }

    /// The next event to deliver; `None` when the stream is over (terminal
    /// event delivered, publisher gone, or the total timeout elapsed).
    pub async fn next(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        if !self.opened {
            self.opened = true;
            return Some(StreamEvent::synthetic(
                self.subscription.execution_id,
                EventType::Connected,
                json!({"execution_id": self.subscription.execution_id}),
            ));
        }

        let now = Instant::now();
        if now >= self.deadline {
            self.finished = true;
            return None;
        }
        let wait = self.heartbeat_interval.min(self.deadline - now);

        match tokio::time::timeout(wait, self.subscription.recv()).await {
            Ok(Some(event)) => {
                if event.event_type.is_terminal() {
                    self.finished = true;
                }
                Some(event)
            }
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(_elapsed) => {
                if Instant::now() >= self.deadline {
                    self.finished = true;
                    return None;
                }
                Some(StreamEvent::synthetic(
                    self.subscription.execution_id,
                    EventType::Heartbeat,
                    json!({}),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use skein_core::ExecutionId;

    use super::*;
    use crate::broadcaster::Broadcaster;

    #[tokio::test]
    async fn opens_with_connected_event() {
        let bus = Broadcaster::new();
        let id = ExecutionId::v4();
        let mut stream = EventStream::new(
            bus.subscribe(id),
            Duration::from_secs(5),
            Duration::from_secs(1),
        );
        let first = stream.next().await.unwrap();
        assert_eq!(first.event_type, EventType::Connected);
        assert_eq!(first.sequence, 0);
    }

    #[tokio::test]
    async fn terminal_event_ends_stream() {
        let bus = Broadcaster::new();
        let id = ExecutionId::v4();
        let mut stream = EventStream::new(
            bus.subscribe(id),
            Duration::from_secs(5),
            Duration::from_secs(1),
        );
        bus.send_event(id, EventType::WorkflowComplete, json!({}));

        assert_eq!(stream.next().await.unwrap().event_type, EventType::Connected);
        assert_eq!(
            stream.next().await.unwrap().event_type,
            EventType::WorkflowComplete
        );
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_fills_inactivity() {
        let bus = Broadcaster::new();
        let id = ExecutionId::v4();
        let mut stream = EventStream::new(
            bus.subscribe(id),
            Duration::from_secs(60),
            Duration::from_secs(5),
        );
        let _connected = stream.next().await.unwrap();
        // No traffic: the paused clock auto-advances to the heartbeat.
        let beat = stream.next().await.unwrap();
        assert_eq!(beat.event_type, EventType::Heartbeat);
    }

    #[tokio::test(start_paused = true)]
    async fn total_timeout_ends_stream() {
        let bus = Broadcaster::new();
        let id = ExecutionId::v4();
        let mut stream = EventStream::new(
            bus.subscribe(id),
            Duration::from_secs(9),
            Duration::from_secs(4),
        );
        let _connected = stream.next().await.unwrap();
        assert_eq!(stream.next().await.unwrap().event_type, EventType::Heartbeat);
        assert_eq!(stream.next().await.unwrap().event_type, EventType::Heartbeat);
        // Third wait crosses the 9 s deadline.
        assert!(stream.next().await.is_none());
    }
}
