//! Team entity -- the tenant unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ChatKind;

/// A tenant. Owns exactly two chats and two bot identities; players, members,
/// invites, and matches hang off the `team_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Stable opaque identifier (short string, e.g. `KAI`).
    pub team_id: String,
    /// Display name.
    pub name: String,
    /// Chat ID of the players' chat.
    pub main_chat_id: String,
    /// Chat ID of the staff chat.
    pub leadership_chat_id: String,
    /// Disabled teams keep their data but stop receiving updates.
    pub disabled: bool,
    /// When the team was provisioned.
    pub created_at: DateTime<Utc>,
}

impl Team {
    /// Map one of this team's chat IDs back to its kind.
    pub fn chat_kind_of(&self, chat_id: &str) -> Option<ChatKind> {
        if chat_id == self.main_chat_id {
            Some(ChatKind::Main)
        } else if chat_id == self.leadership_chat_id {
            Some(ChatKind::Leadership)
        } else {
            None
        }
    }

    /// The chat ID for a given kind.
    pub fn chat_id_for(&self, kind: ChatKind) -> &str {
        match kind {
            ChatKind::Main => &self.main_chat_id,
            ChatKind::Leadership => &self.leadership_chat_id,
        }
    }
}
