//! Per-update sender classification.
//!
//! The same person can be a player in the main chat and an admin in the
//! leadership chat; classification is derived from the roster rows *and* the
//! chat of origin, built fresh for every update and never persisted.

use serde::{Deserialize, Serialize};

use super::ChatKind;

/// Who the sender is, relative to the chat the update came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// No player and no member row for this team.
    Unregistered,
    /// Active player (primary identity in the main chat).
    Player,
    /// Active member seen in the main chat.
    Member,
    /// Active non-admin member in the leadership chat.
    Leader,
    /// Active admin member in the leadership chat.
    Admin,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unregistered => f.write_str("unregistered"),
            Self::Player => f.write_str("player"),
            Self::Member => f.write_str("member"),
            Self::Leader => f.write_str("leader"),
            Self::Admin => f.write_str("admin"),
        }
    }
}

impl Classification {
    /// Whether the sender is registered with the team at all.
    pub fn is_registered(self) -> bool {
        !matches!(self, Self::Unregistered)
    }

    /// Whether the sender holds leadership rights (leader or admin).
    pub fn is_leader(self) -> bool {
        matches!(self, Self::Leader | Self::Admin)
    }
}

/// Transient view of the sender for a single update. Constructed per-update,
/// never cached across chats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    /// Telegram identity of the sender.
    pub telegram_id: i64,
    /// Telegram username, when present.
    pub username: Option<String>,
    /// Resolved team.
    pub team_id: String,
    /// Chat the update came from.
    pub chat_kind: ChatKind,
    /// Derived classification.
    pub classification: Classification,
    /// Resolved player code, if the sender has a player row.
    pub player_id: Option<String>,
    /// Resolved member code, if the sender has a member row.
    pub member_id: Option<String>,
    /// Display name from the roster, falling back to the Telegram username.
    pub display_name: String,
}

/// A normalized inbound chat message, already mapped off the transport wire
/// types by the fleet worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Telegram identity of the sender.
    pub telegram_id: i64,
    /// Telegram username, when present.
    pub username: Option<String>,
    /// Chat the message was posted in.
    pub chat_id: String,
    /// Message text.
    pub text: String,
}
