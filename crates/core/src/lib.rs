#![warn(missing_docs)]

//! # Skein Core
//!
//! Shared identifiers and data shapes used across the Skein workspace:
//!
//! - Typed UUID identifiers ([`UserId`], [`WorkflowId`], [`ExecutionId`],
//!   [`CredentialId`], [`RequestId`])
//! - [`NodeId`] — the opaque, user-authored node identifier (a string,
//!   unique within one workflow, *not* a UUID)
//! - [`NodeItem`] — the canonical list-of-items shape that flows between
//!   nodes, and the wrapping rules that keep it canonical
//! - [`UserTier`] — subscription tier used by the rate limiter

pub mod id;
pub mod item;
pub mod tier;

pub use id::{CredentialId, ExecutionId, NodeId, RequestId, UserId, WorkflowId};
pub use item::{NodeItem, PairedItem, items_from_value, items_to_value};
pub use tier::UserTier;

/// Default per-node timeout when neither the node config nor the workflow
/// settings specify one.
pub const DEFAULT_NODE_TIMEOUT_SECS: u64 = 60;

/// Hard ceiling on loop iterations for any single node, regardless of the
/// node's own `max_loop_count`.
pub const SYSTEM_MAX_LOOPS: u64 = 1000;

/// Default maximum sub-workflow nesting depth.
pub const DEFAULT_MAX_NESTING_DEPTH: u32 = 3;
