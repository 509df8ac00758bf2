#![warn(missing_docs)]

//! # Skein Throttle
//!
//! Per-user, tier-based resource limits:
//!
//! - token buckets per `(user, endpoint class)` with tier-dependent
//!   capacity and refill (enterprise may be unlimited);
//! - a concurrent-streaming-connection counter per user, enforced through
//!   an RAII guard.
//!
//! Everything is keyed by user — no limiter state is shared across users.

pub mod buckets;
pub mod streams;

pub use buckets::{RateClass, RateLimiter, RateLimited, TierRate};
pub use streams::{StreamGuard, StreamLimiter, StreamLimitExceeded};
