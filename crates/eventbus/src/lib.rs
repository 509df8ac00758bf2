#![warn(missing_docs)]

//! # Skein Eventbus
//!
//! In-process, per-execution event fan-out.
//!
//! The engine publishes [`StreamEvent`]s through the [`Broadcaster`];
//! SSE and WebSocket endpoints consume them through [`Subscription`]s and
//! the heartbeat-aware [`EventStream`]. Sequences are monotonic and
//! gap-free per execution. Backpressure policy is drop-newest per
//! subscriber: a full subscriber queue loses the event (with a warning)
//! rather than ever blocking the engine.
//!
//! Multi-instance deployments may layer a message bus on top; within one
//! process this fan-out is the contract.

pub mod broadcaster;
pub mod event;
pub mod stream;

pub use broadcaster::{Broadcaster, SUBSCRIBER_QUEUE_CAP, Subscription};
pub use event::{EventType, StreamEvent};
pub use stream::EventStream;
