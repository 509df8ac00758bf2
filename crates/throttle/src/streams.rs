//! Concurrent streaming-connection caps.

use std::sync::Arc;

use dashmap::DashMap;
use skein_core::{UserId, UserTier};
use thiserror::Error;

/// Returned when opening a stream would exceed the user's cap.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("stream connection limit reached ({current}/{limit})")]
pub struct StreamLimitExceeded {
    /// Connections currently open.
    pub current: u32,
    /// The tier's cap.
    pub limit: u32,
}

/// Concurrent connections allowed per tier.
#[must_use]
pub fn stream_limit(tier: UserTier) -> u32 {
    match tier {
        UserTier::Free => 5,
        UserTier::Pro => 20,
        UserTier::Enterprise => 100,
    }
}

#[derive(Default)]
struct Counters {
    connections: DashMap<UserId, u32>,
}

/// Tracks open streaming connections per user.
///
/// [`open`](StreamLimiter::open) checks the cap and increments; the
/// returned [`StreamGuard`] decrements on drop, so a connection can never
/// leak its slot.
#[derive(Clone, Default)]
pub struct StreamLimiter {
    counters: Arc<Counters>,
}

impl StreamLimiter {
    /// Create an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a connection slot for `user`.
    pub fn open(&self, user: UserId, tier: UserTier) -> Result<StreamGuard, StreamLimitExceeded> {
        let limit = stream_limit(tier);
        let mut entry = self.counters.connections.entry(user).or_insert(0);
        if *entry >= limit {
            return Err(StreamLimitExceeded {
                current: *entry,
                limit,
            });
        }
        *entry += 1;
        drop(entry);
        Ok(StreamGuard {
            counters: Arc::clone(&self.counters),
            user,
        })
    }

    /// Open connections for `user`.
    #[must_use]
    pub fn active(&self, user: UserId) -> u32 {
        self.counters
            .connections
            .get(&user)
            .map_or(0, |count| *count)
    }
}

impl std::fmt::Debug for StreamLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamLimiter")
            .field("users", &self.counters.connections.len())
            .finish()
    }
}

/// One reserved connection slot; released on drop.
pub struct StreamGuard {
    counters: Arc<Counters>,
    user: UserId,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if let Some(mut count) = self.counters.connections.get_mut(&self.user) {
            *count = count.saturating_sub(1);
        }
    }
}

impl std::fmt::Debug for StreamGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamGuard").field("user", &self.user).finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn free_tier_caps_at_five() {
        let limiter = StreamLimiter::new();
        let user = UserId::v4();
        let guards: Vec<StreamGuard> = (0..5)
            .map(|_| limiter.open(user, UserTier::Free).unwrap())
            .collect();

        let err = limiter.open(user, UserTier::Free).unwrap_err();
        assert_eq!(err, StreamLimitExceeded { current: 5, limit: 5 });

        drop(guards);
        assert_eq!(limiter.active(user), 0);
        limiter.open(user, UserTier::Free).unwrap();
    }

    #[test]
    fn guard_drop_releases_slot() {
        let limiter = StreamLimiter::new();
        let user = UserId::v4();
        {
            let _guard = limiter.open(user, UserTier::Free).unwrap();
            assert_eq!(limiter.active(user), 1);
        }
        assert_eq!(limiter.active(user), 0);
    }

    #[test]
    fn users_do_not_share_counters() {
        let limiter = StreamLimiter::new();
        let a = UserId::v4();
        let b = UserId::v4();
        let _guards: Vec<StreamGuard> = (0..5)
            .map(|_| limiter.open(a, UserTier::Free).unwrap())
            .collect();
        assert!(limiter.open(b, UserTier::Free).is_ok());
    }

    #[test]
    fn tier_caps() {
        assert_eq!(stream_limit(UserTier::Free), 5);
        assert_eq!(stream_limit(UserTier::Pro), 20);
        assert_eq!(stream_limit(UserTier::Enterprise), 100);
    }
}
