#![warn(missing_docs)]

//! # Skein Compiler
//!
//! Turns a workflow graph into an [`ExecutionPlan`], or a structured list of
//! [`CompileIssue`]s explaining why it cannot run.
//!
//! The pipeline is phased and halts at the first phase that produces
//! errors: DAG shape → credentials → node configs → type compatibility →
//! plan build. Compilation never raises — invalid graphs are data, not
//! exceptions — and it is deterministic: the same graph compiles to a
//! byte-identical plan, with topological ties broken by the input node
//! order.

pub mod compiler;
pub mod issue;
pub mod plan;
pub mod toposort;
pub mod validate;

pub use compiler::Compiler;
pub use issue::{CompileIssue, CompileResult, IssueCode, Severity};
pub use plan::{ExecutionPlan, NodePlan};
pub use toposort::topological_sort;
