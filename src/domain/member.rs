//! Member entity -- team staff.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SubjectStatus;

/// A staff member of a team (manager, coach, treasurer, ...).
///
/// Follows the same pending → active lifecycle as players. Every team must
/// keep at least one `is_admin` member after bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Team-scoped short code, e.g. `M01JK`.
    pub member_id: String,
    /// Owning team.
    pub team_id: String,
    /// Bound Telegram identity; `None` until activation.
    pub telegram_id: Option<i64>,
    /// Full name.
    pub name: String,
    /// E.164 phone number.
    pub phone: String,
    /// Free-form role, e.g. "coach".
    pub role: String,
    /// Administrative rights.
    pub is_admin: bool,
    /// Lifecycle status.
    pub status: SubjectStatus,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

impl Member {
    /// Whether the member may act in the chats.
    pub fn is_active(&self) -> bool {
        self.status == SubjectStatus::Active
    }

    /// One-line roster summary used by listing tools.
    pub fn summary(&self) -> String {
        let admin = if self.is_admin { ", admin" } else { "" };
        format!(
            "{} ({}) - {}{} - {}",
            self.name, self.member_id, self.role, admin, self.status
        )
    }
}
