//! Hosted client for the Anthropic messages API with native tool calling.

use serde_json::{json, Value};

use super::{
    check_http_response, ChatRequest, ChatResponse, ChatRole, LlmClient, LlmError, LlmToolCall,
};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages API client.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    /// Create a new client for the given model.
    pub fn new(model: String, api_key: String) -> Self {
        Self {
            model,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|message| {
                json!({
                    "role": anthropic_role(message.role),
                    "content": message.content,
                })
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "system": request.system,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.parameters,
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }

        let response = self
            .client
            .post(ANTHROPIC_API_BASE)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await?;

        let payload = check_http_response(response).await?;

        let parsed: Value =
            serde_json::from_str(&payload).map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(ChatResponse {
            text: parse_content_text(&parsed)?,
            tool_calls: parse_tool_calls(&parsed)?,
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

fn anthropic_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        // Tool results travel as user-role messages carrying the envelope.
        ChatRole::Tool => "user",
    }
}

fn parse_content_text(value: &Value) -> Result<String, LlmError> {
    let Some(content_items) = value.get("content").and_then(Value::as_array) else {
        return Err(LlmError::Parse("missing content array".to_owned()));
    };

    let mut text = String::new();
    for item in content_items {
        let item_type = item.get("type").and_then(Value::as_str).unwrap_or_default();
        if item_type == "text" {
            let part = item.get("text").and_then(Value::as_str).unwrap_or_default();
            text.push_str(part);
        }
    }

    Ok(text)
}

fn parse_tool_calls(value: &Value) -> Result<Vec<LlmToolCall>, LlmError> {
    let Some(content_items) = value.get("content").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let mut calls = Vec::new();
    for item in content_items {
        let item_type = item.get("type").and_then(Value::as_str).unwrap_or_default();
        if item_type == "tool_use" {
            let name = item
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| LlmError::Parse("tool_use missing name".to_owned()))?
                .to_owned();
            let arguments = item.get("input").cloned().unwrap_or(Value::Null);
            let id = item
                .get("id")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned);
            calls.push(LlmToolCall {
                id,
                name,
                arguments,
            });
        }
    }

    Ok(calls)
}
