//! The `http_request` node.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use skein_core::NodeItem;
use skein_execution::{ExecutionContext, NodeExecutionResult};
use tracing::debug;

use crate::handler::{NodeHandler, config};
use crate::metadata::{
    DataType, FieldSpec, FieldType, HandleSpec, NodeCategory, NodeMetadata, standard_accepts,
    standard_input,
};

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

/// Makes an HTTP request to an external API.
///
/// Transport failures fail the node; HTTP error statuses (≥ 400) succeed but
/// leave through the `error` handle so workflows can route on them.
#[derive(Debug, Default)]
pub struct HttpRequestNode;

#[async_trait]
impl NodeHandler for HttpRequestNode {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            node_type: "http_request".to_owned(),
            display_name: "HTTP Request".to_owned(),
            category: NodeCategory::Action,
            fields: vec![
                FieldSpec::optional(
                    "method",
                    "Method",
                    FieldType::Select {
                        options: METHODS.iter().map(|m| (*m).to_owned()).collect(),
                    },
                    json!("GET"),
                ),
                FieldSpec::required("url", "URL", FieldType::String),
                FieldSpec::optional("headers", "Headers", FieldType::Json, json!({})),
                FieldSpec::optional("body", "Body", FieldType::Json, json!({})),
                FieldSpec::optional(
                    "timeout",
                    "Timeout (seconds)",
                    FieldType::Number,
                    json!(DEFAULT_HTTP_TIMEOUT_SECS),
                ),
            ],
            input_handles: standard_input(),
            output_handles: vec![
                HandleSpec::new("success", "Success", DataType::Json),
                HandleSpec::new("error", "Error", DataType::Error),
            ],
            accepts: standard_accepts(),
        }
    }

    fn validate_config(&self, cfg: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        config::require_str(cfg, "url", &mut errors);
        if let Some(method) = config::str_field(cfg, "method") {
            if !METHODS.contains(&method.to_ascii_uppercase().as_str()) {
                errors.push(format!("unsupported HTTP method '{method}'"));
            }
        }
        if let Some(headers) = cfg.get("headers") {
            if !headers.is_object() {
                errors.push("'headers' must be an object".to_owned());
            }
        }
        errors
    }

    async fn execute(
        &self,
        _input: Vec<NodeItem>,
        cfg: &Value,
        ctx: &ExecutionContext,
    ) -> NodeExecutionResult {
        let method = config::str_field(cfg, "method")
            .unwrap_or("GET")
            .to_ascii_uppercase();
        let Some(url) = config::str_field(cfg, "url") else {
            return NodeExecutionResult::failure("URL is required");
        };
        let timeout = Duration::from_secs(
            config::u64_field(cfg, "timeout").unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        );

        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(err) => return NodeExecutionResult::failure(format!("http client: {err}")),
        };
        let Ok(method) = reqwest::Method::from_bytes(method.as_bytes()) else {
            return NodeExecutionResult::failure(format!("unsupported HTTP method '{method}'"));
        };

        let mut request = client.request(method.clone(), url);
        if let Some(headers) = cfg.get("headers").and_then(Value::as_object) {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name, value);
                }
            }
        }
        if matches!(method.as_str(), "POST" | "PUT" | "PATCH") {
            if let Some(body) = cfg.get("body") {
                request = request.json(body);
            }
        }

        debug!(execution_id = %ctx.execution_id, %url, "dispatching http request");

        let send = tokio::select! {
            response = request.send() => response,
            () = ctx.cancellation.cancelled() => {
                return NodeExecutionResult::failure("request cancelled");
            }
        };

        match send {
            Ok(response) => {
                let status = response.status().as_u16();
                let final_url = response.url().to_string();
                let headers: Map<String, Value> = response
                    .headers()
                    .iter()
                    .filter_map(|(name, value)| {
                        value
                            .to_str()
                            .ok()
                            .map(|v| (name.to_string(), Value::String(v.to_owned())))
                    })
                    .collect();
                let text = response.text().await.unwrap_or_default();
                let body = serde_json::from_str::<Value>(&text)
                    .unwrap_or(Value::String(text));

                let handle = if status < 400 { "success" } else { "error" };
                NodeExecutionResult::success(json!({
                    "status_code": status,
                    "headers": headers,
                    "body": body,
                    "url": final_url,
                }))
                .on_handle(handle)
            }
            Err(err) if err.is_timeout() => NodeExecutionResult::failure(format!(
                "request timed out after {}s",
                timeout.as_secs()
            )),
            Err(err) => NodeExecutionResult::failure(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use skein_core::{ExecutionId, UserId, WorkflowId};
    use skein_execution::ContextConfig;
    use wiremock::matchers::{method, path};
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
    fn url_is_required() {
        let errors = HttpRequestNode.validate_config(&json!({}));
        assert_eq!(errors, vec!["'url' is required".to_owned()]);
    }

    #[test]
    fn unknown_method_rejected() {
        let errors =
            HttpRequestNode.validate_config(&json!({"url": "https://x.test", "method": "YEET"}));
        assert_eq!(errors, vec!["unsupported HTTP method 'YEET'".to_owned()]);
    }

    #[tokio::test]
    async fn get_parses_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let result = HttpRequestNode
            .execute(
                Vec::new(),
                &json!({"url": format!("{}/ok", server.uri())}),
                &ctx(),
            )
            .await;

        assert!(result.success);
        assert_eq!(result.output_handle, "success");
        let out = &result.items[0].json;
        assert_eq!(out["status_code"], json!(200));
        assert_eq!(out["body"], json!({"ok": true}));
    }

    #[tokio::test]
    async fn http_error_status_routes_to_error_handle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let result = HttpRequestNode
            .execute(Vec::new(), &json!({"url": server.uri()}), &ctx())
            .await;

        assert!(result.success);
        assert_eq!(result.output_handle, "error");
        assert_eq!(result.items[0].json["status_code"], json!(500));
    }

    #[tokio::test]
    async fn transport_failure_fails_node() {
        // Nothing listens on this port.
        let result = HttpRequestNode
            .execute(
                Vec::new(),
                &json!({"url": "http://127.0.0.1:1/nope"}),
                &ctx(),
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.output_handle, "error");
    }
}
