//! Local client for the Ollama chat API with native tool calling.

use serde_json::{json, Value};

use super::{
    check_http_response, ChatRequest, ChatResponse, ChatRole, LlmClient, LlmError, LlmToolCall,
};

/// Ollama chat API client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    model: String,
    endpoint: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a client for a model served at `base_url` (e.g.
    /// `http://127.0.0.1:11434`).
    pub fn new(model: String, base_url: &str) -> Self {
        Self {
            model,
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let mut messages: Vec<Value> = vec![json!({
            "role": "system",
            "content": request.system,
        })];
        messages.extend(request.messages.iter().map(|message| {
            json!({
                "role": ollama_role(message.role),
                "content": message.content,
            })
        }));

        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect();

        let body = json!({
            "model": self.model,
            "messages": messages,
            "tools": tools,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            },
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await?;

        let payload = check_http_response(response).await?;

        let parsed: Value =
            serde_json::from_str(&payload).map_err(|e| LlmError::Parse(e.to_string()))?;

        let text = parsed
            .get("message")
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        Ok(ChatResponse {
            text,
            tool_calls: parse_tool_calls(&parsed)?,
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

fn ollama_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::Tool => "tool",
    }
}

fn parse_tool_calls(value: &Value) -> Result<Vec<LlmToolCall>, LlmError> {
    let tool_calls = value
        .get("message")
        .and_then(|message| message.get("tool_calls"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut calls = Vec::new();
    for tool_call in tool_calls {
        let function = tool_call.get("function").cloned().unwrap_or(Value::Null);
        let name = function
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| LlmError::Parse("tool call missing function.name".to_owned()))?
            .to_owned();
        let arguments = function.get("arguments").cloned().unwrap_or(Value::Null);
        calls.push(LlmToolCall {
            id: None,
            name,
            arguments,
        });
    }

    Ok(calls)
}
