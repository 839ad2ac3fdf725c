//! Anthropic Messages API adapter over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;

use crate::error::LlmError;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role, ToolCall,
    ToolCompletionRequest, ToolCompletionResponse, ToolDefinition,
};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const PROVIDER: &str = "anthropic";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Generation service backed by the Anthropic Messages API.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
        }
    }

    /// Send one request body and return the parsed JSON response.
    async fn send(&self, body: Value) -> Result<Value, LlmError> {
        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(LlmError::AuthFailed {
                provider: PROVIDER.to_string(),
            });
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(LlmError::RateLimited {
                provider: PROVIDER.to_string(),
                retry_after,
            });
        }

        let body: Value = response.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("HTTP {status}: {body}"),
            });
        }
        Ok(body)
    }

    fn base_body(&self, messages: &[ChatMessage], max_tokens: Option<u32>, temperature: Option<f32>) -> Value {
        let (system, turns) = split_messages(messages);
        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": turns,
        });
        if !system.is_empty() {
            body["system"] = Value::String(system);
        }
        if let Some(t) = temperature {
            body["temperature"] = serde_json::json!(t);
        }
        body
    }
}

/// Pull system messages into the top-level `system` string and map the rest
/// to Messages API turns.
fn split_messages(messages: &[ChatMessage]) -> (String, Vec<Value>) {
    let mut system = Vec::new();
    let mut turns = Vec::new();
    for m in messages {
        match m.role {
            Role::System => system.push(m.content.as_str()),
            Role::User => turns.push(serde_json::json!({"role": "user", "content": m.content})),
            Role::Assistant => {
                turns.push(serde_json::json!({"role": "assistant", "content": m.content}))
            }
        }
    }
    (system.join("\n\n"), turns)
}

fn tool_to_json(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.parameters,
    })
}

/// Parse a Messages API response body into text and tool calls.
fn parse_content(body: &Value) -> Result<(String, Vec<ToolCall>), LlmError> {
    let blocks = body["content"]
        .as_array()
        .ok_or_else(|| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: "missing content array".to_string(),
        })?;

    let mut text = String::new();
    let mut calls = Vec::new();
    for block in blocks {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(t) = block["text"].as_str() {
                    text.push_str(t);
                }
            }
            Some("tool_use") => calls.push(ToolCall {
                id: block["id"].as_str().unwrap_or_default().to_string(),
                name: block["name"].as_str().unwrap_or_default().to_string(),
                arguments: block["input"].clone(),
            }),
            _ => {}
        }
    }
    Ok((text, calls))
}

fn usage(body: &Value) -> (u32, u32) {
    let input = body["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32;
    let output = body["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32;
    (input, output)
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        // $3 / $15 per million tokens
        (Decimal::new(3, 6), Decimal::new(15, 6))
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.base_body(&request.messages, request.max_tokens, request.temperature);
        let response = self.send(body).await?;
        let (content, _) = parse_content(&response)?;
        let (input_tokens, output_tokens) = usage(&response);
        debug!(model = %self.model, input_tokens, output_tokens, "Completion finished");
        Ok(CompletionResponse {
            content,
            input_tokens,
            output_tokens,
            finish_reason: FinishReason::from_provider(
                response["stop_reason"].as_str().unwrap_or_default(),
            ),
            response_id: response["id"].as_str().map(String::from),
        })
    }

    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse, LlmError> {
        let mut body = self.base_body(&request.messages, request.max_tokens, request.temperature);
        body["tools"] = Value::Array(request.tools.iter().map(tool_to_json).collect());

        let response = self.send(body).await?;
        let (text, tool_calls) = parse_content(&response)?;
        let (input_tokens, output_tokens) = usage(&response);
        debug!(
            model = %self.model,
            calls = tool_calls.len(),
            purpose = request.metadata.get("purpose").map(String::as_str).unwrap_or(""),
            "Tool completion finished"
        );
        Ok(ToolCompletionResponse {
            content: if text.trim().is_empty() { None } else { Some(text) },
            tool_calls,
            input_tokens,
            output_tokens,
            finish_reason: FinishReason::from_provider(
                response["stop_reason"].as_str().unwrap_or_default(),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_are_hoisted() {
        let (system, turns) = split_messages(&[
            ChatMessage::system("rules"),
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi"),
        ]);
        assert_eq!(system, "rules");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0]["role"], "user");
        assert_eq!(turns[1]["content"], "hi");
    }

    #[test]
    fn parse_mixed_content_blocks() {
        let body = serde_json::json!({
            "content": [
                {"type": "text", "text": "Sure."},
                {"type": "tool_use", "id": "tu_1", "name": "set_field",
                 "input": {"key": "age", "value": 23}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        });
        let (text, calls) = parse_content(&body).unwrap();
        assert_eq!(text, "Sure.");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "set_field");
        assert_eq!(calls[0].arguments["value"], 23);
        assert_eq!(usage(&body), (10, 5));
    }

    #[test]
    fn parse_rejects_missing_content() {
        let body = serde_json::json!({"error": {"type": "overloaded_error"}});
        assert!(matches!(
            parse_content(&body),
            Err(LlmError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn tool_json_uses_input_schema() {
        let tool = ToolDefinition {
            name: "finalize".into(),
            description: "done".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        };
        let json = tool_to_json(&tool);
        assert_eq!(json["input_schema"]["type"], "object");
    }
}
