//! User subscription tiers.

use serde::{Deserialize, Serialize};

/// Subscription tier of a user, driving rate and concurrency limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserTier {
    /// Free tier (lowest limits).
    #[default]
    Free,
    /// Paid individual tier.
    Pro,
    /// Organisation tier; several limits are unbounded.
    Enterprise,
}

impl std::fmt::Display for UserTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Pro => write!(f, "pro"),
            Self::Enterprise => write!(f, "enterprise"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_free() {
        assert_eq!(UserTier::default(), UserTier::Free);
    }

    #[test]
    fn serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&UserTier::Enterprise).unwrap(),
            "\"enterprise\""
        );
        let back: UserTier = serde_json::from_str("\"pro\"").unwrap();
        assert_eq!(back, UserTier::Pro);
    }

    #[test]
    fn display_matches_wire_form() {
        assert_eq!(UserTier::Free.to_string(), "free");
        assert_eq!(UserTier::Pro.to_string(), "pro");
        assert_eq!(UserTier::Enterprise.to_string(), "enterprise");
    }
}
