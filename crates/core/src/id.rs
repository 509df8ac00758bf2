//! Unique identifiers for Skein entities.
//!
//! Platform-owned entities (users, workflows, executions, credentials, HITL
//! requests) use strongly-typed UUID identifiers built on
//! [`domain-key`](https://crates.io/crates/domain-key) `Uuid<D>` wrappers:
//! `Copy`, 16 bytes, with `v4()`, `nil()`, `parse()`, full serde support and
//! `Display`/`FromStr`/`Eq`/`Ord`/`Hash`.
//!
//! Node identifiers are different: they are authored by the user inside the
//! workflow graph (`"n1"`, `"send-email"`, …) and are only unique within one
//! workflow, so [`NodeId`] wraps a plain string.

use std::borrow::Borrow;
use std::fmt;

use domain_key::define_uuid;
use serde::{Deserialize, Serialize};

// Re-export for downstream parse error handling
pub use domain_key::UuidParseError;

// Platform entity identifiers — UUID-based, Copy, 16 bytes each
define_uuid!(pub UserIdDomain => UserId);
define_uuid!(pub WorkflowIdDomain => WorkflowId);
define_uuid!(pub ExecutionIdDomain => ExecutionId);
define_uuid!(pub CredentialIdDomain => CredentialId);
define_uuid!(pub RequestIdDomain => RequestId);

/// Identifier of a node inside one workflow graph.
///
/// Opaque and user-authored; uniqueness is enforced per workflow by the
/// compiler, not by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap a raw node identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// View the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn user_id_v4_creates_non_nil_uuid() {
        let id = UserId::v4();
        assert!(!id.is_nil());
    }

    #[test]
    fn execution_id_v4_creates_non_nil_uuid() {
        let id = ExecutionId::v4();
        assert!(!id.is_nil());
    }

    #[test]
    fn workflow_id_parse_roundtrips() {
        let id = WorkflowId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
    }

    #[test]
    fn credential_id_parse_invalid_string_returns_error() {
        assert!(CredentialId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn request_id_copy_semantics() {
        let a = RequestId::v4();
        let b = a;
        assert_eq!(a, b);
    }

    #[test]
    fn node_id_display_and_as_str() {
        let id = NodeId::new("n1");
        assert_eq!(id.as_str(), "n1");
        assert_eq!(id.to_string(), "n1");
    }

    #[test]
    fn node_id_borrow_allows_str_lookup() {
        let mut map = HashMap::new();
        map.insert(NodeId::new("a"), 1);
        assert_eq!(map.get("a"), Some(&1));
    }

    #[test]
    fn node_id_serde_is_transparent() {
        let id = NodeId::new("send-email");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"send-email\"");
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
