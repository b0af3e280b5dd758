//! Player entity and field positions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SubjectStatus;

/// Field position of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// Keeps goal.
    Goalkeeper,
    /// Back line.
    Defender,
    /// Middle of the park.
    Midfielder,
    /// Attacking line.
    Forward,
    /// Covers wherever needed.
    Utility,
    /// Wide attacker.
    Winger,
    /// Out-and-out goalscorer.
    Striker,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Goalkeeper => f.write_str("goalkeeper"),
            Self::Defender => f.write_str("defender"),
            Self::Midfielder => f.write_str("midfielder"),
            Self::Forward => f.write_str("forward"),
            Self::Utility => f.write_str("utility"),
            Self::Winger => f.write_str("winger"),
            Self::Striker => f.write_str("striker"),
        }
    }
}

impl std::str::FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "goalkeeper" => Ok(Self::Goalkeeper),
            "defender" => Ok(Self::Defender),
            "midfielder" => Ok(Self::Midfielder),
            "forward" => Ok(Self::Forward),
            "utility" => Ok(Self::Utility),
            "winger" => Ok(Self::Winger),
            "striker" => Ok(Self::Striker),
            other => Err(format!("unknown position: {other}")),
        }
    }
}

/// A player on a team's roster.
///
/// Created `pending` by `/addplayer`; bound to a Telegram identity and set
/// `active` when the paired invite is redeemed. `telegram_id` stays unique
/// across active players and members of the same team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Team-scoped short code, e.g. `01JS`.
    pub player_id: String,
    /// Owning team.
    pub team_id: String,
    /// Bound Telegram identity; `None` until activation.
    pub telegram_id: Option<i64>,
    /// Full name.
    pub name: String,
    /// E.164 phone number, unique per team.
    pub phone: String,
    /// Optional contact email.
    pub email: Option<String>,
    /// Optional emergency contact.
    pub emergency_contact: Option<String>,
    /// Field position.
    pub position: Position,
    /// Lifecycle status.
    pub status: SubjectStatus,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

impl Player {
    /// Whether the player may act in the chats.
    pub fn is_active(&self) -> bool {
        self.status == SubjectStatus::Active
    }

    /// One-line roster summary used by listing tools.
    pub fn summary(&self) -> String {
        format!(
            "{} ({}) - {} - {}",
            self.name, self.player_id, self.position, self.status
        )
    }
}
