//! Keyed token buckets with tier-dependent rates.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use skein_core::UserTier;
use thiserror::Error;

/// Endpoint classes with independent budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateClass {
    /// Workflow compilation/validation.
    Compile,
    /// Workflow execution starts.
    Execute,
    /// AI chat messages.
    Chat,
    /// Login attempts (keyed by client address, tier-independent).
    Login,
    /// Registration attempts (keyed by client address, tier-independent).
    Register,
}

impl RateClass {
    fn as_str(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Execute => "execute",
            Self::Chat => "chat",
            Self::Login => "login",
            Self::Register => "register",
        }
    }
}

/// A capacity + refill-window pair. `None` at lookup time means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierRate {
    /// Requests allowed per window (also the burst capacity).
    pub requests: u32,
    /// Refill window.
    pub per: Duration,
}

impl TierRate {
    const fn per_minute(requests: u32) -> Self {
        Self {
            requests,
            per: Duration::from_secs(60),
        }
    }

    const fn per_hour(requests: u32) -> Self {
        Self {
            requests,
            per: Duration::from_secs(3600),
        }
    }

    fn refill_per_second(self) -> f64 {
        f64::from(self.requests) / self.per.as_secs_f64()
    }
}

/// The rate for a class/tier pair; `None` is unlimited.
#[must_use]
pub fn tier_rate(class: RateClass, tier: UserTier) -> Option<TierRate> {
    use UserTier::{Enterprise, Free, Pro};
    match (class, tier) {
        (RateClass::Compile, Free) => Some(TierRate::per_minute(10)),
        (RateClass::Compile, Pro) => Some(TierRate::per_minute(100)),
        (RateClass::Compile, Enterprise) => None,

        (RateClass::Execute, Free) => Some(TierRate::per_minute(5)),
        (RateClass::Execute, Pro) => Some(TierRate::per_minute(50)),
        (RateClass::Execute, Enterprise) => Some(TierRate::per_minute(200)),

        (RateClass::Chat, Free) => Some(TierRate::per_hour(20)),
        (RateClass::Chat, Pro) => Some(TierRate::per_hour(200)),
        (RateClass::Chat, Enterprise) => Some(TierRate::per_hour(1000)),

        // Abuse protection applies to every tier equally.
        (RateClass::Login, _) => Some(TierRate::per_minute(5)),
        (RateClass::Register, _) => Some(TierRate::per_minute(3)),
    }
}

/// Returned when a bucket has no tokens left.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("rate limit exceeded for {class}, retry after {retry_after:?}")]
pub struct RateLimited {
    /// The class that was exhausted.
    pub class: &'static str,
    /// Time until one token is available again.
    pub retry_after: Duration,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token buckets keyed by `(class, subject)`, where the subject is a user
/// id or (for login/registration) a client address.
#[derive(Default)]
pub struct RateLimiter {
    buckets: DashMap<String, Mutex<Bucket>>,
}

impl RateLimiter {
    /// Create an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to consume one token for `subject` under `class` at `tier`.
    pub fn check(
        &self,
        class: RateClass,
        subject: &str,
        tier: UserTier,
    ) -> Result<(), RateLimited> {
        let Some(rate) = tier_rate(class, tier) else {
            return Ok(()); // unlimited
        };
        let key = format!("{}:{subject}", class.as_str());
        let bucket = self.buckets.entry(key).or_insert_with(|| {
            Mutex::new(Bucket {
                tokens: f64::from(rate.requests),
                last_refill: Instant::now(),
            })
        });
        let mut bucket = bucket.lock();

        // Continuous refill based on elapsed time.
        let elapsed = bucket.last_refill.elapsed().as_secs_f64();
        bucket.tokens =
            (bucket.tokens + elapsed * rate.refill_per_second()).min(f64::from(rate.requests));
        bucket.last_refill = Instant::now();

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            Err(RateLimited {
                class: class.as_str(),
                retry_after: Duration::from_secs_f64(
                    (1.0 - bucket.tokens) / rate.refill_per_second(),
                ),
            })
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("buckets", &self.buckets.len())
            .finish()
    }
}
