//! Builtin node types.

pub mod approval;
pub mod condition;
pub mod http;
pub mod llm;
pub mod loops;
pub mod set;
pub mod subworkflow;
pub mod triggers;

pub use approval::ApprovalNode;
pub use condition::{IfNode, SwitchNode};
pub use http::HttpRequestNode;
pub use llm::LlmNode;
pub use loops::{LoopNode, SplitInBatchesNode};
pub use set::SetNode;
pub use subworkflow::SubworkflowNode;
pub use triggers::{ManualTriggerNode, ScheduleTriggerNode, WebhookTriggerNode};
