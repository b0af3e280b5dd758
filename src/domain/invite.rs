//! Invite entity -- single-use bridge from pending roster row to chat member.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ChatKind, SubjectKind};

/// A single-use invite binding a pending player/member to the Telegram
/// identity that first presents it in the target chat.
///
/// Redeemed invites keep their row (`used_at` set) for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    /// Random UUIDv4 identifier; doubles as the redemption token.
    pub invite_id: Uuid,
    /// Owning team.
    pub team_id: String,
    /// Chat the subject is being invited into.
    pub chat_kind: ChatKind,
    /// Whether the subject is a player or a member.
    pub subject_kind: SubjectKind,
    /// `player_id` or `member_id` of the pending subject.
    pub subject_id: String,
    /// `member_id` of the admin who issued the invite.
    pub issued_by: String,
    /// Issue timestamp.
    pub issued_at: DateTime<Utc>,
    /// Expiry timestamp (issue + TTL).
    pub expires_at: DateTime<Utc>,
    /// Redemption timestamp; `None` while outstanding.
    pub used_at: Option<DateTime<Utc>>,
}

impl Invite {
    /// Whether the invite has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the invite has already been redeemed.
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}
