//! Storage errors.

use thiserror::Error;

/// Errors raised by entity stores.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The requested record does not exist (or is not visible to the
    /// caller — reads are owner-filtered).
    #[error("not found")]
    NotFound,

    /// A stored payload failed to (de)serialize.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure.
    #[error("storage backend: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_display() {
        let err = StorageError::Conflict("workflow name taken".into());
        assert_eq!(err.to_string(), "conflict: workflow name taken");
    }
}
