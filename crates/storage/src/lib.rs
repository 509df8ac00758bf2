#![warn(missing_docs)]

//! # Skein Storage
//!
//! The entity store: persistent records and the async read/write contracts
//! the rest of the platform depends on. Per the platform's scope, the
//! *contracts* are the deliverable — the bundled implementation is
//! in-memory ([`MemoryStore`]), suitable for tests and single-process
//! deployments; a database-backed implementation slots in behind the same
//! traits.

pub mod error;
pub mod memory;
pub mod records;
pub mod store;

pub use error::StorageError;
pub use memory::MemoryStore;
pub use records::{
    AuditAction, AuditRecord, CredentialKind, CredentialRecord, ExecutionRecord,
    NodeExecutionRecord, TriggerType, WorkflowRecord, WorkflowVersionRecord,
};
pub use store::{
    AuditStore, CredentialStore, EventStore, ExecutionStore, HitlStore, WorkflowStore,
};
