//! LLM client abstraction.
//!
//! Defines the [`LlmClient`] trait and the shared request/response types.
//! Two adapters are implemented:
//! - [`anthropic::AnthropicClient`] -- hosted, Anthropic `/v1/messages` API
//! - [`ollama::OllamaClient`] -- local, Ollama `/api/chat` API
//!
//! No streaming; every call is a single chat completion with an optional
//! tool catalog. Request timeouts are set per call from the remaining
//! per-update deadline.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::registry::ToolDefinition;

pub mod anthropic;
pub mod ollama;

/// Conversation participant role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Human user message.
    User,
    /// Assistant (LLM) message.
    Assistant,
    /// Tool result fed back after a tool call.
    Tool,
}

/// A message in the conversation sent to the LLM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Author role.
    pub role: ChatRole,
    /// Plain-text content (tool results carry the envelope JSON).
    pub content: String,
}

impl ChatMessage {
    /// Convenience constructor for a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Convenience constructor for an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }

    /// Convenience constructor for a tool-result message.
    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
        }
    }
}

/// A request for one chat completion.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// System prompt.
    pub system: String,
    /// Conversation including the latest user message.
    pub messages: Vec<ChatMessage>,
    /// Tools the model may call.
    pub tools: Vec<ToolDefinition>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens in the response.
    pub max_tokens: u32,
    /// Wall-clock budget for the HTTP call.
    pub timeout: Duration,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmToolCall {
    /// Provider call identifier, when given.
    pub id: Option<String>,
    /// Tool name.
    pub name: String,
    /// Arguments as JSON.
    pub arguments: serde_json::Value,
}

/// The response to one chat completion.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// Concatenated text output.
    pub text: String,
    /// Tool calls requested by the model, in order.
    pub tool_calls: Vec<LlmToolCall>,
}

/// Errors returned by LLM clients.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// HTTP transport failure (includes client-side timeout).
    #[error("llm request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Response did not match the expected schema.
    #[error("llm response parse error: {0}")]
    Parse(String),
    /// Upstream responded with an error status.
    #[error("llm returned non-success status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        body: String,
    },
    /// The client cannot satisfy the request with current configuration.
    #[error("llm unavailable: {0}")]
    Unavailable(String),
}

/// Provider-neutral chat-completion interface.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Request a completion.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] on API, network, or parse failure.
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;

    /// The model identifier this client is instantiated for.
    fn model_id(&self) -> &str;
}

/// Check HTTP response status and return body text or a structured error.
///
/// # Errors
///
/// `LlmError::Request` on transport failure, `LlmError::HttpStatus` on non-2xx.
pub(crate) async fn check_http_response(response: reqwest::Response) -> Result<String, LlmError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(LlmError::HttpStatus {
            status: status.as_u16(),
            body: sanitize_http_error_body(&body),
        });
    }
    Ok(body)
}

/// Collapse, redact, and truncate an upstream error body before it reaches
/// logs or user-adjacent error values.
fn sanitize_http_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sanitized = collapsed;
    for pattern in [
        r"sk-ant-[A-Za-z0-9_\-]{10,}",
        r"sk-[A-Za-z0-9]{32,}",
        r"Bearer [A-Za-z0-9_\-.]{10,}",
    ] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    const MAX_ERROR_BODY_CHARS: usize = 256;
    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}
