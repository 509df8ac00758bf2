#![warn(missing_docs)]

//! # Skein Handlers
//!
//! The node handler contract and the builtin node types.
//!
//! A handler is stateless across invocations and exposes three things:
//! [`NodeMetadata`] (for validation and the client palette),
//! `validate_config` (pure, deterministic error list) and `execute`
//! (async, cancellation-aware through the context). Handlers are collected
//! into a [`HandlerRegistry`] once at process start and frozen behind an
//! `Arc` — the engine never sees a mutable registry.

pub mod builtin;
pub mod handler;
pub mod metadata;
pub mod registry;

pub use handler::NodeHandler;
pub use metadata::{DataType, FieldSpec, FieldType, HandleSpec, NodeCategory, NodeMetadata};
pub use registry::{HandlerRegistry, RegistryBuilder};
