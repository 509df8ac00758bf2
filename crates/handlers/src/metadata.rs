//! Handler metadata: palette information and the static typing surface the
//! compiler checks edges against.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The data type flowing out of an output handle (or accepted by an input).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Anything; universally compatible.
    Any,
    /// Untouched pass-through of the incoming shape; universally compatible.
    Passthrough,
    /// Structured JSON.
    Json,
    /// Plain text.
    Text,
    /// Date/time payloads (schedule triggers).
    Datetime,
    /// Error payloads; only accepted where `error` (or `any`) is declared.
    Error,
}

impl DataType {
    /// Whether an output of type `self` may flow into a node accepting
    /// `accepts`.
    #[must_use]
    pub fn flows_into(self, accepts: &[Self]) -> bool {
        match self {
            Self::Any | Self::Passthrough => true,
            Self::Error => accepts.contains(&Self::Error) || accepts.contains(&Self::Any),
            concrete => accepts.contains(&concrete) || accepts.contains(&Self::Any),
        }
    }
}

/// A named input or output handle on a node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleSpec {
    /// Handle identifier, referenced by edges (`"output"`, `"true"`, …).
    pub id: String,
    /// Display label.
    pub label: String,
    /// The type flowing through this handle.
    pub data_type: DataType,
}

impl HandleSpec {
    /// Construct a handle spec.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            data_type,
        }
    }
}

/// Configuration field type for the client form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Free-form string (may contain `{{ … }}` templates).
    String,
    /// Numeric value.
    Number,
    /// Boolean toggle.
    Boolean,
    /// Arbitrary JSON object.
    Json,
    /// One of a fixed set of options.
    Select {
        /// The allowed options.
        options: Vec<String>,
    },
}

/// One configuration field of a node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Config key.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Field type for the form.
    pub field_type: FieldType,
    /// Whether the field must be present.
    pub required: bool,
    /// Default value, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldSpec {
    /// A required field.
    #[must_use]
    pub fn required(name: impl Into<String>, label: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            field_type: ty,
            required: true,
            default: None,
        }
    }

    /// An optional field with a default.
    #[must_use]
    pub fn optional(
        name: impl Into<String>,
        label: impl Into<String>,
        ty: FieldType,
        default: Value,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            field_type: ty,
            required: false,
            default: Some(default),
        }
    }
}

/// Palette category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Entry points.
    Trigger,
    /// Outbound actions (HTTP, LLM, …).
    Action,
    /// Data shaping.
    Transform,
    /// Branching and loops.
    Conditional,
    /// Composition (sub-workflows, approval gates).
    Flow,
}

/// Everything the platform knows about a node type without executing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Registry key.
    pub node_type: String,
    /// Display name.
    pub display_name: String,
    /// Palette category.
    pub category: NodeCategory,
    /// Configuration form fields.
    pub fields: Vec<FieldSpec>,
    /// Input handles for the palette. Empty for triggers.
    pub input_handles: Vec<HandleSpec>,
    /// Output handles; their types are what each exit produces.
    pub output_handles: Vec<HandleSpec>,
    /// Data types this node accepts on input; the compiler checks every
    /// incoming edge's output type against this list.
    pub accepts: Vec<DataType>,
}

impl NodeMetadata {
    /// The data type produced on a given output handle. Unknown handles
    /// produce `Any` (edges may reference custom labels).
    #[must_use]
    pub fn output_type(&self, handle: &str) -> DataType {
        self.output_handles
            .iter()
            .find(|h| h.id == handle)
            .map_or(DataType::Any, |h| h.data_type)
    }

    /// Whether this node type is a trigger (no input handles).
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        self.input_handles.is_empty()
    }
}

/// The single JSON input handle most nodes expose.
#[must_use]
pub fn standard_input() -> Vec<HandleSpec> {
    vec![HandleSpec::new("input", "Input", DataType::Json)]
}

/// The accept list shared by most non-trigger nodes.
#[must_use]
pub fn standard_accepts() -> Vec<DataType> {
    vec![
        DataType::Json,
        DataType::Any,
        DataType::Text,
        DataType::Passthrough,
    ]
}
