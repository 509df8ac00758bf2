//! The process-wide handler registry.
//!
//! Built once via [`RegistryBuilder`], then frozen. The engine and compiler
//! share it behind an `Arc`; nothing mutates it after init.

use std::collections::HashMap;
use std::sync::Arc;

use crate::builtin::{
    ApprovalNode, HttpRequestNode, IfNode, LlmNode, LoopNode, ManualTriggerNode,
    ScheduleTriggerNode, SetNode, SplitInBatchesNode, SubworkflowNode, SwitchNode,
    WebhookTriggerNode,
};
use crate::handler::NodeHandler;
use crate::metadata::NodeMetadata;

/// Immutable mapping from node-type strings to handlers.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn NodeHandler>>,
}

impl HandlerRegistry {
    /// Registry containing every builtin node type.
    #[must_use]
    pub fn builtin() -> Arc<Self> {
        RegistryBuilder::new()
            .register(ManualTriggerNode)
            .register(WebhookTriggerNode)
            .register(ScheduleTriggerNode)
            .register(SetNode)
            .register(HttpRequestNode)
            .register(IfNode)
            .register(SwitchNode)
            .register(LoopNode)
            .register(SplitInBatchesNode)
            .register(SubworkflowNode)
            .register(ApprovalNode)
            .register(LlmNode)
            .build()
    }

    /// Look up a handler.
    #[must_use]
    pub fn get(&self, node_type: &str) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.get(node_type).cloned()
    }

    /// Whether a handler exists for the node type.
    #[must_use]
    pub fn has(&self, node_type: &str) -> bool {
        self.handlers.contains_key(node_type)
    }

    /// Metadata for one node type.
    #[must_use]
    pub fn metadata_of(&self, node_type: &str) -> Option<NodeMetadata> {
        self.handlers.get(node_type).map(|h| h.metadata())
    }

    /// Metadata for every registered node type, sorted by type key for a
    /// stable palette.
    #[must_use]
    pub fn all_metadata(&self) -> Vec<NodeMetadata> {
        let mut all: Vec<NodeMetadata> = self.handlers.values().map(|h| h.metadata()).collect();
        all.sort_by(|a, b| a.node_type.cmp(&b.node_type));
        all
    }

    /// Registered node type keys, sorted.
    #[must_use]
    pub fn node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("node_types", &self.node_types())
            .finish()
    }
}

/// Accumulates handlers, then freezes them into a [`HandlerRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: HashMap<String, Arc<dyn NodeHandler>>,
}

impl RegistryBuilder {
    /// Start an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its metadata's node type. Registering the
    /// same type twice keeps the later handler.
    #[must_use]
    pub fn register(mut self, handler: impl NodeHandler + 'static) -> Self {
        let node_type = handler.metadata().node_type;
        self.handlers.insert(node_type, Arc::new(handler));
        self
    }

    /// Freeze into an immutable registry.
    #[must_use]
    pub fn build(self) -> Arc<HandlerRegistry> {
        Arc::new(HandlerRegistry {
            handlers: self.handlers,
        })
    }
}
