#![warn(missing_docs)]

//! # Skein Workflow
//!
//! The workflow graph model: nodes, edges, settings, and the workflow
//! status machine. This crate only describes graphs — validation lives in
//! `skein-compiler` and execution in `skein-engine`.

pub mod error;
pub mod graph;
pub mod status;

pub use error::WorkflowError;
pub use graph::{
    Adjacency, EdgeDefinition, NodeData, NodeDefinition, WorkflowGraph, WorkflowSettings,
};
pub use status::WorkflowStatus;
