//! The `llm` node: one chat-completion call against an OpenAI-compatible
//! endpoint. Provider-specific behaviour beyond that contract is out of
//! scope for the engine core.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use skein_core::NodeItem;
use skein_execution::{ExecutionContext, NodeExecutionResult};

use crate::handler::{NodeHandler, config};
use crate::metadata::{
    DataType, FieldSpec, FieldType, HandleSpec, NodeCategory, NodeMetadata, standard_input,
};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

/// Invokes a chat completion and emits the assistant's reply as text.
#[derive(Debug, Default)]
pub struct LlmNode;

#[async_trait]
impl NodeHandler for LlmNode {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            node_type: "llm".to_owned(),
            display_name: "LLM".to_owned(),
            category: NodeCategory::Action,
            fields: vec![
                FieldSpec::required("model", "Model", FieldType::String),
                FieldSpec::required("prompt", "Prompt", FieldType::String),
                FieldSpec::optional("system", "System Prompt", FieldType::String, json!("")),
                FieldSpec::optional("endpoint", "Endpoint", FieldType::String, json!(DEFAULT_ENDPOINT)),
                FieldSpec::optional("credential", "Credential", FieldType::String, json!("")),
                FieldSpec::optional("temperature", "Temperature", FieldType::Number, json!(1.0)),
            ],
            input_handles: standard_input(),
            output_handles: vec![
                HandleSpec::new("success", "Success", DataType::Text),
                HandleSpec::new("error", "Error", DataType::Error),
            ],
            // Deliberately no `Any`: error outputs must not feed a prompt
            // unless routed through a transform first.
            accepts: vec![DataType::Json, DataType::Text, DataType::Passthrough],
        }
    }

    fn validate_config(&self, cfg: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        config::require_str(cfg, "model", &mut errors);
        config::require_str(cfg, "prompt", &mut errors);
        errors
    }

    async fn execute(
        &self,
        _input: Vec<NodeItem>,
        cfg: &Value,
        ctx: &ExecutionContext,
    ) -> NodeExecutionResult {
        let Some(model) = config::str_field(cfg, "model") else {
            return NodeExecutionResult::failure("model is required");
        };
        let Some(prompt) = config::str_field(cfg, "prompt") else {
            return NodeExecutionResult::failure("prompt is required");
        };
        let endpoint = config::str_field(cfg, "endpoint").unwrap_or(DEFAULT_ENDPOINT);

        // API key comes from the referenced credential, falling back to an
        // inline `api_key` for development setups.
        let api_key = config::str_field(cfg, "credential")
            .filter(|id| !id.is_empty())
            .and_then(|id| ctx.credential(id))
            .and_then(|cred| {
                cred.get("api_key")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            })
            .or_else(|| config::str_field(cfg, "api_key").map(str::to_owned));

        let mut messages = Vec::new();
        if let Some(system) = config::str_field(cfg, "system").filter(|s| !s.is_empty()) {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));

        let body = json!({
            "model": model,
            "messages": messages,
            "temperature": cfg.get("temperature").cloned().unwrap_or(json!(1.0)),
        });

        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS))
            .build()
        {
            Ok(client) => client,
            Err(err) => return NodeExecutionResult::failure(format!("http client: {err}")),
        };
        let mut request = client.post(endpoint).json(&body);
        if let Some(key) = api_key {
            request = request.bearer_auth(key);
        }

        let send = tokio::select! {
            response = request.send() => response,
            () = ctx.cancellation.cancelled() => {
                return NodeExecutionResult::failure("request cancelled");
            }
        };

        let response = match send {
            Ok(response) => response,
            Err(err) => return NodeExecutionResult::failure(err.to_string()),
        };
        let status = response.status();
        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(err) => return NodeExecutionResult::failure(format!("malformed response: {err}")),
        };
        if !status.is_success() {
            let detail = payload["error"]["message"]
                .as_str()
                .unwrap_or("request failed")
                .to_owned();
            return NodeExecutionResult::failure(format!("llm error ({status}): {detail}"));
        }

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_owned();

        NodeExecutionResult::success(json!({
            "response": content,
            "model": model,
        }))
        .on_handle("success")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use skein_core::{ExecutionId, UserId, WorkflowId};
    use skein_execution::ContextConfig;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(ContextConfig::root(
            ExecutionId::v4(),
            UserId::v4(),
            WorkflowId::v4(),
        ))
    }

    #[test]
    fn model_and_prompt_required() {
        let errors = LlmNode.validate_config(&json!({}));
        assert_eq!(
            errors,
            vec!["'model' is required".to_owned(), "'prompt' is required".to_owned()]
        );
    }

    #[tokio::test]
    async fn extracts_completion_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "hello"}}]
            })))
            .mount(&server)
            .await;

        let result = LlmNode
            .execute(
                Vec::new(),
                &json!({"model": "gpt-test", "prompt": "hi", "endpoint": server.uri()}),
                &ctx(),
            )
            .await;

        assert!(result.success);
        assert_eq!(result.items[0].json["response"], json!("hello"));
    }

    #[tokio::test]
    async fn credential_supplies_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = ctx();
        ctx.set_credentials(std::collections::HashMap::from([(
            "cred1".to_owned(),
            json!({"api_key": "sk-test"}),
        )]));

        let result = LlmNode
            .execute(
                Vec::new(),
                &json!({
                    "model": "m",
                    "prompt": "p",
                    "endpoint": server.uri(),
                    "credential": "cred1"
                }),
                &ctx,
            )
            .await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn api_error_fails_node() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"message": "rate limited"}
            })))
            .mount(&server)
            .await;

        let result = LlmNode
            .execute(
                Vec::new(),
                &json!({"model": "m", "prompt": "p", "endpoint": server.uri()}),
                &ctx(),
            )
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("rate limited"));
    }
}
