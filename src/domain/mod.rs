//! Domain entities and value types.
//!
//! Everything here is storage-agnostic; repositories in [`crate::storage`]
//! persist these types, domain services in [`crate::services`] enforce the
//! invariants that span entities.

use serde::{Deserialize, Serialize};

pub mod context;
pub mod ids;
pub mod invite;
pub mod matches;
pub mod member;
pub mod phone;
pub mod player;
pub mod team;

pub use context::{Classification, InboundMessage, UserContext};
pub use invite::Invite;
pub use matches::Match;
pub use member::Member;
pub use player::{Player, Position};
pub use team::Team;

/// Which of a team's two chats an update came from (or an invite targets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// The players' chat.
    Main,
    /// The staff chat.
    Leadership,
}

impl ChatKind {
    /// The other chat of the pair.
    pub fn other(self) -> Self {
        match self {
            Self::Main => Self::Leadership,
            Self::Leadership => Self::Main,
        }
    }

    /// Human-readable chat name for user replies.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Main => "main chat",
            Self::Leadership => "leadership chat",
        }
    }
}

impl std::fmt::Display for ChatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Main => f.write_str("main"),
            Self::Leadership => f.write_str("leadership"),
        }
    }
}

impl std::str::FromStr for ChatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "main" => Ok(Self::Main),
            "leadership" => Ok(Self::Leadership),
            other => Err(format!("unknown chat kind: {other}")),
        }
    }
}

/// Subject kind an invite or roster row refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    /// A playing member of the squad.
    Player,
    /// A staff member.
    Member,
}

impl std::fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Player => f.write_str("player"),
            Self::Member => f.write_str("member"),
        }
    }
}

impl std::str::FromStr for SubjectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "player" => Ok(Self::Player),
            "member" => Ok(Self::Member),
            other => Err(format!("unknown subject kind: {other}")),
        }
    }
}

/// Lifecycle status shared by players and members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectStatus {
    /// Created by a leader, invite outstanding.
    Pending,
    /// Invite redeemed; telegram identity bound.
    Active,
    /// Disabled by admin action. Never deleted.
    Inactive,
}

impl std::fmt::Display for SubjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Active => f.write_str("active"),
            Self::Inactive => f.write_str("inactive"),
        }
    }
}

impl std::str::FromStr for SubjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("unknown status: {other}")),
        }
    }
}
