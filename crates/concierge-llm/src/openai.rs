//! # OpenAI-Compatible Backend
//!
//! Non-streaming chat completions over HTTP. Works against the OpenAI API
//! and anything speaking the same wire format (local inference servers,
//! gateway proxies) by pointing `base_url` elsewhere.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use async_trait::async_trait;
use concierge_core::ids::ToolCallId;
use concierge_core::messages::{Message, ToolCall};
use concierge_core::tools::ToolDefinition;

use crate::provider::{ChatRequest, ChatResponse, Provider, ProviderError, ProviderResult};

/// Default chat completions endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat completions provider.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    /// Create a provider against the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Model this provider completes with.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_body(&self, request: &ChatRequest) -> WireRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(WireMessage {
            role: "system".into(),
            content: Some(request.instructions.clone()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        });
        messages.extend(request.messages.iter().map(to_wire_message));

        WireRequest {
            model: self.model.clone(),
            messages,
            tools: request.tools.iter().map(to_wire_tool).collect(),
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn provider_type(&self) -> &str {
        "openai"
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, request: &ChatRequest) -> ProviderResult<ChatResponse> {
        let body = self.build_body(request);
        debug!(
            messages = body.messages.len(),
            tools = body.tools.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::Auth {
                message: format!("request rejected with status {status}"),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
                retryable: status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
            });
        }

        let wire: WireResponse = response.json().await?;
        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse {
                message: "response contained no choices".into(),
            })?;
        from_wire_message(choice.message)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

#[derive(Serialize, Deserialize)]
struct WireFunction {
    name: String,
    /// Arguments object encoded as a JSON string, per the wire format.
    arguments: String,
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireToolDef,
}

#[derive(Serialize)]
struct WireToolDef {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

// ─────────────────────────────────────────────────────────────────────────────
// Mapping
// ─────────────────────────────────────────────────────────────────────────────

fn to_wire_message(message: &Message) -> WireMessage {
    match message {
        Message::User { content } => WireMessage {
            role: "user".into(),
            content: Some(content.clone()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        },
        Message::Assistant { content, tool_calls } => WireMessage {
            role: "assistant".into(),
            content: if content.is_empty() {
                None
            } else {
                Some(content.clone())
            },
            tool_calls: tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.to_string(),
                    kind: "function".into(),
                    function: WireFunction {
                        name: call.name.clone(),
                        arguments: Value::Object(call.arguments.clone()).to_string(),
                    },
                })
                .collect(),
            tool_call_id: None,
        },
        Message::Tool {
            reply_to, content, ..
        } => WireMessage {
            role: "tool".into(),
            content: Some(content.clone()),
            tool_calls: Vec::new(),
            tool_call_id: Some(reply_to.to_string()),
        },
    }
}

fn to_wire_tool(schema: &ToolDefinition) -> WireTool {
    WireTool {
        kind: "function",
        function: WireToolDef {
            name: schema.name.clone(),
            description: schema.description.clone(),
            parameters: schema.parameters.clone(),
        },
    }
}

fn from_wire_message(message: WireMessage) -> ProviderResult<ChatResponse> {
    let mut tool_calls = Vec::with_capacity(message.tool_calls.len());
    for call in message.tool_calls {
        let arguments = parse_arguments(&call.function.arguments)?;
        tool_calls.push(ToolCall::new(
            ToolCallId::from(call.id),
            call.function.name,
            arguments,
        ));
    }
    Ok(ChatResponse {
        content: message.content.unwrap_or_default(),
        tool_calls,
    })
}

/// Arguments arrive as a JSON string; an empty string means no arguments.
fn parse_arguments(raw: &str) -> ProviderResult<Map<String, Value>> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ProviderError::MalformedResponse {
            message: format!("tool arguments are not an object: {other}"),
        }),
        Err(e) => Err(ProviderError::MalformedResponse {
            message: format!("tool arguments are not valid JSON: {e}"),
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatRequest {
        ChatRequest {
            instructions: "You are a shop assistant.".into(),
            messages: vec![Message::user("show my cart")],
            tools: vec![ToolDefinition::new(
                "ViewCart",
                "List cart contents",
                json!({"type": "object", "properties": {}}),
            )],
        }
    }

    // -- mapping --

    #[test]
    fn assistant_call_arguments_encoded_as_string() {
        let mut args = Map::new();
        let _ = args.insert("product_id".into(), json!(3));
        let wire = to_wire_message(&Message::assistant_with_calls(
            "",
            vec![ToolCall::new(ToolCallId::from("tc-1"), "AddToCart", args)],
        ));
        assert_eq!(wire.role, "assistant");
        assert!(wire.content.is_none());
        assert_eq!(wire.tool_calls[0].function.arguments, "{\"product_id\":3}");
    }

    #[test]
    fn tool_reply_carries_call_id() {
        let wire = to_wire_message(&Message::tool_reply(ToolCallId::from("tc-1"), "2 items"));
        assert_eq!(wire.role, "tool");
        assert_eq!(wire.tool_call_id.as_deref(), Some("tc-1"));
    }

    #[test]
    fn parse_arguments_rejects_non_objects() {
        assert!(parse_arguments("").unwrap().is_empty());
        assert!(parse_arguments("{\"a\": 1}").is_ok());
        assert_matches!(
            parse_arguments("[1,2]"),
            Err(ProviderError::MalformedResponse { .. })
        );
        assert_matches!(
            parse_arguments("not json"),
            Err(ProviderError::MalformedResponse { .. })
        );
    }

    // -- HTTP --

    #[tokio::test]
    async fn complete_parses_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_abc",
                            "type": "function",
                            "function": {
                                "name": "ViewCart",
                                "arguments": "{}"
                            }
                        }]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(server.uri(), "test-key", "gpt-4o-mini");
        let response = provider.complete(&request()).await.unwrap();
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "ViewCart");
        assert_eq!(response.tool_calls[0].id.as_str(), "call_abc");
    }

    #[tokio::test]
    async fn complete_maps_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(server.uri(), "bad-key", "gpt-4o-mini");
        let err = provider.complete(&request()).await.unwrap_err();
        assert_matches!(err, ProviderError::Auth { .. });
    }

    #[tokio::test]
    async fn complete_marks_server_errors_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(server.uri(), "key", "gpt-4o-mini");
        let err = provider.complete(&request()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn complete_rejects_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(server.uri(), "key", "gpt-4o-mini");
        let err = provider.complete(&request()).await.unwrap_err();
        assert_matches!(err, ProviderError::MalformedResponse { .. });
    }
}
