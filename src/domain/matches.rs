//! Match entity -- fixtures and squad selection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled fixture for a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Team-scoped short code, e.g. `MAT042`.
    pub match_id: String,
    /// Owning team.
    pub team_id: String,
    /// Opponent name.
    pub opponent: String,
    /// Kickoff time (UTC).
    pub kickoff: DateTime<Utc>,
    /// Venue description.
    pub location: String,
    /// Selected squad as player IDs; empty until selection.
    pub squad: Vec<String>,
    /// `member_id` of the creator.
    pub created_by: String,
}

impl Match {
    /// One-line fixture summary used by listing tools.
    pub fn summary(&self) -> String {
        let squad = if self.squad.is_empty() {
            "squad not selected".to_owned()
        } else {
            format!("{} selected", self.squad.len())
        };
        format!(
            "{}: vs {} at {} on {} ({squad})",
            self.match_id,
            self.opponent,
            self.location,
            self.kickoff.format("%Y-%m-%d %H:%M UTC"),
        )
    }
}
