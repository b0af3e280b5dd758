//! Repository interfaces decoupling the domain from storage.
//!
//! Two implementations exist: [`sqlite::SqliteStorage`] for production and
//! [`memory::InMemoryStorage`] for tests. Business logic only ever sees the
//! traits (bundled as [`Storage`]), never a concrete backend.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Invite, Match, Member, Player, SubjectKind, Team};

pub mod memory;
pub mod sqlite;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend failure (connection, SQL, serialization).
    #[error("database error: {0}")]
    Database(String),
    /// Unique constraint violation.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Referenced row missing.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

/// Subject activated by a successful invite redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemedSubject {
    /// Player or member.
    pub subject_kind: SubjectKind,
    /// `player_id` or `member_id`.
    pub subject_id: String,
    /// Display name for the welcome reply.
    pub name: String,
}

/// One executed-command audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandAuditEntry {
    /// Team the command ran against.
    pub team_id: String,
    /// Sender's Telegram identity.
    pub telegram_id: i64,
    /// The slash command.
    pub command: String,
    /// Terminal outcome (completed, denied, timed_out, failed).
    pub outcome: String,
    /// When the update finished processing.
    pub at: DateTime<Utc>,
}

/// Team lookups and provisioning.
#[async_trait]
pub trait TeamRepository: Send + Sync {
    /// A team by id.
    async fn team(&self, team_id: &str) -> Result<Option<Team>, StorageError>;
    /// All teams, ordered by id.
    async fn teams(&self) -> Result<Vec<Team>, StorageError>;
    /// Insert or refresh a team row.
    async fn upsert_team(&self, team: &Team) -> Result<(), StorageError>;
}

/// Player roster access.
#[async_trait]
pub trait PlayerRepository: Send + Sync {
    /// A player by code.
    async fn player(&self, team_id: &str, player_id: &str)
        -> Result<Option<Player>, StorageError>;
    /// The player bound to a Telegram identity, if any.
    async fn player_by_telegram(
        &self,
        team_id: &str,
        telegram_id: i64,
    ) -> Result<Option<Player>, StorageError>;
    /// The player registered under a phone number, if any.
    async fn player_by_phone(
        &self,
        team_id: &str,
        phone: &str,
    ) -> Result<Option<Player>, StorageError>;
    /// All players of a team, ordered by name.
    async fn players(&self, team_id: &str) -> Result<Vec<Player>, StorageError>;
    /// Insert; `Conflict` on duplicate id, phone, or telegram binding.
    async fn insert_player(&self, player: &Player) -> Result<(), StorageError>;
    /// Full-row update keyed by (`team_id`, `player_id`); `NotFound` if missing.
    async fn update_player(&self, player: &Player) -> Result<(), StorageError>;
}

/// Member roster access.
#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// A member by code.
    async fn member(&self, team_id: &str, member_id: &str)
        -> Result<Option<Member>, StorageError>;
    /// The member bound to a Telegram identity, if any.
    async fn member_by_telegram(
        &self,
        team_id: &str,
        telegram_id: i64,
    ) -> Result<Option<Member>, StorageError>;
    /// The member registered under a phone number, if any.
    async fn member_by_phone(
        &self,
        team_id: &str,
        phone: &str,
    ) -> Result<Option<Member>, StorageError>;
    /// All members of a team, ordered by name.
    async fn members(&self, team_id: &str) -> Result<Vec<Member>, StorageError>;
    /// Number of member rows for the team (any status).
    async fn member_count(&self, team_id: &str) -> Result<u64, StorageError>;
    /// Insert; `Conflict` on duplicate id, phone, or telegram binding.
    async fn insert_member(&self, member: &Member) -> Result<(), StorageError>;
    /// Full-row update keyed by (`team_id`, `member_id`); `NotFound` if missing.
    async fn update_member(&self, member: &Member) -> Result<(), StorageError>;
    /// First-user bootstrap: insert the founding admin, but only while the
    /// team has zero members. The zero-member check and the insert happen in
    /// one transaction; a lost race returns `Conflict`.
    async fn register_first_admin(&self, member: &Member) -> Result<(), StorageError>;
}

/// Invite persistence and the single-winner redemption transaction.
#[async_trait]
pub trait InviteRepository: Send + Sync {
    /// Persist a freshly issued invite.
    async fn insert_invite(&self, invite: &Invite) -> Result<(), StorageError>;
    /// Create a pending player and its invite in one transaction.
    async fn insert_player_with_invite(
        &self,
        player: &Player,
        invite: &Invite,
    ) -> Result<(), StorageError>;
    /// Create a pending member and its invite in one transaction.
    async fn insert_member_with_invite(
        &self,
        member: &Member,
        invite: &Invite,
    ) -> Result<(), StorageError>;
    /// An invite by id, redeemed or not.
    async fn invite(&self, invite_id: Uuid) -> Result<Option<Invite>, StorageError>;
    /// Outstanding (unredeemed, unexpired) invites for a team.
    async fn pending_invites(&self, team_id: &str, now: DateTime<Utc>)
        -> Result<Vec<Invite>, StorageError>;
    /// Atomically claim the invite and activate its subject.
    ///
    /// Exactly one concurrent caller wins; losers get `Conflict`. A missing
    /// invite or subject is `NotFound`. Expiry is the caller's check -- this
    /// method only guards single-use and activation.
    async fn redeem_invite(
        &self,
        invite_id: Uuid,
        telegram_id: i64,
        now: DateTime<Utc>,
    ) -> Result<RedeemedSubject, StorageError>;
}

/// Fixture persistence.
#[async_trait]
pub trait MatchRepository: Send + Sync {
    /// Insert a fixture; `Conflict` on a duplicate match code.
    async fn insert_match(&self, fixture: &Match) -> Result<(), StorageError>;
    /// A fixture by code.
    async fn match_by_id(&self, team_id: &str, match_id: &str)
        -> Result<Option<Match>, StorageError>;
    /// All fixtures of a team, ordered by kickoff.
    async fn matches(&self, team_id: &str) -> Result<Vec<Match>, StorageError>;
    /// Full-row update keyed by (`team_id`, `match_id`); `NotFound` if missing.
    async fn update_match(&self, fixture: &Match) -> Result<(), StorageError>;
}

/// Append-only executed-command audit log.
#[async_trait]
pub trait CommandAuditRepository: Send + Sync {
    /// Append one executed-command record.
    async fn append_audit(&self, entry: &CommandAuditEntry) -> Result<(), StorageError>;
    /// A team's audit records in append order.
    async fn audits(&self, team_id: &str) -> Result<Vec<CommandAuditEntry>, StorageError>;
}

/// The full storage surface the application wires once at startup.
pub trait Storage:
    TeamRepository
    + PlayerRepository
    + MemberRepository
    + InviteRepository
    + MatchRepository
    + CommandAuditRepository
{
}

impl<T> Storage for T where
    T: TeamRepository
        + PlayerRepository
        + MemberRepository
        + InviteRepository
        + MatchRepository
        + CommandAuditRepository
{
}

/// Shared handle passed through construction.
pub type SharedStorage = Arc<dyn Storage>;
