//! Bot transport abstraction and the Telegram long-poll implementation.
//!
//! The fleet talks to an abstract [`BotTransport`]; production wires in
//! [`TelegramTransport`], tests wire in a scripted fake. The wire types are
//! the minimal subset of the Bot API we consume. Outbound messages are sent
//! with no parse mode -- the plain-text policy is absolute.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Base URL for the Telegram Bot API.
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Extra seconds added to the HTTP timeout beyond the long-poll timeout,
/// so the TCP socket stays open while Telegram holds the request.
const POLL_TIMEOUT_MARGIN_SECS: u64 = 10;

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The Bot API returned `ok: false`.
    #[error("telegram api error: {0}")]
    Api(String),
    /// HTTP transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// JSON deserialization failed.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A normalized inbound update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportUpdate {
    /// Monotonic update identifier (poll offset cursor).
    pub update_id: i64,
    /// Chat the message was posted in.
    pub chat_id: String,
    /// Sender's Telegram identity.
    pub telegram_id: i64,
    /// Sender's username, when present.
    pub username: Option<String>,
    /// Message text; `None` for media-only messages, which are ignored.
    pub text: Option<String>,
}

/// One bot connection: long-poll for updates, send plain-text replies.
#[async_trait]
pub trait BotTransport: Send + Sync {
    /// Long-poll for updates after `offset`.
    async fn poll(
        &self,
        offset: Option<i64>,
        timeout_secs: u32,
    ) -> Result<Vec<TransportUpdate>, TransportError>;

    /// Send plain text to a chat. Never sets a parse mode.
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), TransportError>;
}

// ---------------------------------------------------------------------------
// Telegram wire types (minimal subset)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    from: Option<TelegramUser>,
    chat: TelegramChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

// ---------------------------------------------------------------------------
// Telegram implementation
// ---------------------------------------------------------------------------

/// Long-polling Telegram Bot API transport for one bot token.
pub struct TelegramTransport {
    bot_token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for TelegramTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramTransport").finish_non_exhaustive()
    }
}

impl TelegramTransport {
    /// Create a transport for one bot token.
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn normalize(update: TelegramUpdate) -> Option<TransportUpdate> {
        let message = update.message?;
        let from = message.from?;
        Some(TransportUpdate {
            update_id: update.update_id,
            chat_id: message.chat.id.to_string(),
            telegram_id: from.id,
            username: from.username,
            text: message.text,
        })
    }
}

#[async_trait]
impl BotTransport for TelegramTransport {
    async fn poll(
        &self,
        offset: Option<i64>,
        timeout_secs: u32,
    ) -> Result<Vec<TransportUpdate>, TransportError> {
        let url = format!("{}/bot{}/getUpdates", TELEGRAM_API_BASE, self.bot_token);

        let mut params = serde_json::json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(off) = offset {
            params["offset"] = serde_json::Value::from(off);
        }

        let http_timeout =
            Duration::from_secs(u64::from(timeout_secs).saturating_add(POLL_TIMEOUT_MARGIN_SECS));

        let resp = self
            .client
            .post(&url)
            .json(&params)
            .timeout(http_timeout)
            .send()
            .await?;

        let response: TelegramResponse<Vec<TelegramUpdate>> = resp.json().await?;
        if !response.ok {
            return Err(TransportError::Api(
                response
                    .description
                    .unwrap_or_else(|| "getUpdates failed".to_owned()),
            ));
        }

        let updates = response
            .result
            .unwrap_or_default()
            .into_iter()
            .filter_map(Self::normalize)
            .collect();
        Ok(updates)
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), TransportError> {
        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API_BASE, self.bot_token);

        // No parse_mode, ever: the formatter guarantees plain text and the
        // transport must not reintroduce markup interpretation.
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let resp = self.client.post(&url).json(&body).send().await?;
        let response: TelegramResponse<serde_json::Value> = resp.json().await?;
        if !response.ok {
            return Err(TransportError::Api(
                response
                    .description
                    .unwrap_or_else(|| "sendMessage failed".to_owned()),
            ));
        }

        debug!(chat_id, "sent telegram message");
        Ok(())
    }
}
