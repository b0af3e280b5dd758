//! SQLite storage backed by `sqlx`.
//!
//! The schema is applied inline on open (WAL mode, foreign keys on). Invite
//! redemption and first-admin registration are real transactions; everything
//! else is single-statement.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    ChatKind, Invite, Match, Member, Player, Position, SubjectKind, SubjectStatus, Team,
};

use super::{
    CommandAuditEntry, CommandAuditRepository, InviteRepository, MatchRepository,
    MemberRepository, PlayerRepository, RedeemedSubject, StorageError, TeamRepository,
};

const MIGRATION: &str = r"
CREATE TABLE IF NOT EXISTS teams (
    team_id            TEXT PRIMARY KEY,
    name               TEXT NOT NULL,
    main_chat_id       TEXT NOT NULL UNIQUE,
    leadership_chat_id TEXT NOT NULL UNIQUE,
    disabled           INTEGER NOT NULL DEFAULT 0,
    created_at         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS players (
    team_id           TEXT NOT NULL,
    player_id         TEXT NOT NULL,
    telegram_id       INTEGER,
    name              TEXT NOT NULL,
    phone             TEXT NOT NULL,
    email             TEXT,
    emergency_contact TEXT,
    position          TEXT NOT NULL,
    status            TEXT NOT NULL,
    created_at        TEXT NOT NULL,
    PRIMARY KEY (team_id, player_id),
    UNIQUE (team_id, phone)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_players_telegram
    ON players (team_id, telegram_id) WHERE telegram_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS members (
    team_id     TEXT NOT NULL,
    member_id   TEXT NOT NULL,
    telegram_id INTEGER,
    name        TEXT NOT NULL,
    phone       TEXT NOT NULL,
    role        TEXT NOT NULL,
    is_admin    INTEGER NOT NULL DEFAULT 0,
    status      TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    PRIMARY KEY (team_id, member_id),
    UNIQUE (team_id, phone)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_members_telegram
    ON members (team_id, telegram_id) WHERE telegram_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS invites (
    invite_id    TEXT PRIMARY KEY,
    team_id      TEXT NOT NULL,
    chat_kind    TEXT NOT NULL,
    subject_kind TEXT NOT NULL,
    subject_id   TEXT NOT NULL,
    issued_by    TEXT NOT NULL,
    issued_at    TEXT NOT NULL,
    expires_at   TEXT NOT NULL,
    used_at      TEXT
);

CREATE TABLE IF NOT EXISTS matches (
    team_id    TEXT NOT NULL,
    match_id   TEXT NOT NULL,
    opponent   TEXT NOT NULL,
    kickoff    TEXT NOT NULL,
    location   TEXT NOT NULL,
    squad      TEXT NOT NULL,
    created_by TEXT NOT NULL,
    PRIMARY KEY (team_id, match_id)
);

CREATE TABLE IF NOT EXISTS command_audit (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    team_id     TEXT NOT NULL,
    telegram_id INTEGER NOT NULL,
    command     TEXT NOT NULL,
    outcome     TEXT NOT NULL,
    at          TEXT NOT NULL
);
";

/// SQLite implementation of the full [`super::Storage`] surface.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) the database at `path` and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated -- a
    /// fail-fast condition at startup.
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Database(format!(
                        "failed to create db directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(MIGRATION).execute(&pool).await?;

        info!(path = %path.display(), "sqlite storage opened");
        Ok(Self { pool })
    }
}

type PlayerRow = (
    String,
    String,
    Option<i64>,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
    String,
);

type MemberRow = (
    String,
    String,
    Option<i64>,
    String,
    String,
    String,
    i64,
    String,
    String,
);

type InviteRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
);

const PLAYER_COLUMNS: &str = "player_id, team_id, telegram_id, name, phone, email, \
                              emergency_contact, position, status, created_at";
const MEMBER_COLUMNS: &str = "member_id, team_id, telegram_id, name, phone, role, \
                              is_admin, status, created_at";
const INVITE_COLUMNS: &str = "invite_id, team_id, chat_kind, subject_kind, subject_id, \
                              issued_by, issued_at, expires_at, used_at";

#[async_trait]
impl TeamRepository for SqliteStorage {
    async fn team(&self, team_id: &str) -> Result<Option<Team>, StorageError> {
        let row: Option<(String, String, String, String, i64, String)> = sqlx::query_as(
            "SELECT team_id, name, main_chat_id, leadership_chat_id, disabled, created_at
             FROM teams WHERE team_id = ?1",
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(team_from_row).transpose()
    }

    async fn teams(&self) -> Result<Vec<Team>, StorageError> {
        let rows: Vec<(String, String, String, String, i64, String)> = sqlx::query_as(
            "SELECT team_id, name, main_chat_id, leadership_chat_id, disabled, created_at
             FROM teams ORDER BY team_id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(team_from_row).collect()
    }

    async fn upsert_team(&self, team: &Team) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO teams (team_id, name, main_chat_id, leadership_chat_id, disabled, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(team_id) DO UPDATE SET
                 name = ?2, main_chat_id = ?3, leadership_chat_id = ?4, disabled = ?5",
        )
        .bind(&team.team_id)
        .bind(&team.name)
        .bind(&team.main_chat_id)
        .bind(&team.leadership_chat_id)
        .bind(i64::from(team.disabled))
        .bind(team.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PlayerRepository for SqliteStorage {
    async fn player(
        &self,
        team_id: &str,
        player_id: &str,
    ) -> Result<Option<Player>, StorageError> {
        let row: Option<PlayerRow> = sqlx::query_as(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players WHERE team_id = ?1 AND player_id = ?2"
        ))
        .bind(team_id)
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(player_from_row).transpose()
    }

    async fn player_by_telegram(
        &self,
        team_id: &str,
        telegram_id: i64,
    ) -> Result<Option<Player>, StorageError> {
        let row: Option<PlayerRow> = sqlx::query_as(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players WHERE team_id = ?1 AND telegram_id = ?2"
        ))
        .bind(team_id)
        .bind(telegram_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(player_from_row).transpose()
    }

    async fn player_by_phone(
        &self,
        team_id: &str,
        phone: &str,
    ) -> Result<Option<Player>, StorageError> {
        let row: Option<PlayerRow> = sqlx::query_as(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players WHERE team_id = ?1 AND phone = ?2"
        ))
        .bind(team_id)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        row.map(player_from_row).transpose()
    }

    async fn players(&self, team_id: &str) -> Result<Vec<Player>, StorageError> {
        let rows: Vec<PlayerRow> = sqlx::query_as(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players WHERE team_id = ?1 ORDER BY name"
        ))
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(player_from_row).collect()
    }

    async fn insert_player(&self, player: &Player) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO players (player_id, team_id, telegram_id, name, phone, email,
                                  emergency_contact, position, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&player.player_id)
        .bind(&player.team_id)
        .bind(player.telegram_id)
        .bind(&player.name)
        .bind(&player.phone)
        .bind(&player.email)
        .bind(&player.emergency_contact)
        .bind(player.position.to_string())
        .bind(player.status.to_string())
        .bind(player.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "player"))?;
        Ok(())
    }

    async fn update_player(&self, player: &Player) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE players SET telegram_id = ?3, name = ?4, phone = ?5, email = ?6,
                                emergency_contact = ?7, position = ?8, status = ?9
             WHERE team_id = ?1 AND player_id = ?2",
        )
        .bind(&player.team_id)
        .bind(&player.player_id)
        .bind(player.telegram_id)
        .bind(&player.name)
        .bind(&player.phone)
        .bind(&player.email)
        .bind(&player.emergency_contact)
        .bind(player.position.to_string())
        .bind(player.status.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "player"))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "player {}",
                player.player_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MemberRepository for SqliteStorage {
    async fn member(
        &self,
        team_id: &str,
        member_id: &str,
    ) -> Result<Option<Member>, StorageError> {
        let row: Option<MemberRow> = sqlx::query_as(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE team_id = ?1 AND member_id = ?2"
        ))
        .bind(team_id)
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(member_from_row).transpose()
    }

    async fn member_by_telegram(
        &self,
        team_id: &str,
        telegram_id: i64,
    ) -> Result<Option<Member>, StorageError> {
        let row: Option<MemberRow> = sqlx::query_as(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE team_id = ?1 AND telegram_id = ?2"
        ))
        .bind(team_id)
        .bind(telegram_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(member_from_row).transpose()
    }

    async fn member_by_phone(
        &self,
        team_id: &str,
        phone: &str,
    ) -> Result<Option<Member>, StorageError> {
        let row: Option<MemberRow> = sqlx::query_as(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE team_id = ?1 AND phone = ?2"
        ))
        .bind(team_id)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        row.map(member_from_row).transpose()
    }

    async fn members(&self, team_id: &str) -> Result<Vec<Member>, StorageError> {
        let rows: Vec<MemberRow> = sqlx::query_as(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE team_id = ?1 ORDER BY name"
        ))
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(member_from_row).collect()
    }

    async fn member_count(&self, team_id: &str) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM members WHERE team_id = ?1")
            .bind(team_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn insert_member(&self, member: &Member) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO members (member_id, team_id, telegram_id, name, phone, role,
                                  is_admin, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&member.member_id)
        .bind(&member.team_id)
        .bind(member.telegram_id)
        .bind(&member.name)
        .bind(&member.phone)
        .bind(&member.role)
        .bind(i64::from(member.is_admin))
        .bind(member.status.to_string())
        .bind(member.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "member"))?;
        Ok(())
    }

    async fn update_member(&self, member: &Member) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE members SET telegram_id = ?3, name = ?4, phone = ?5, role = ?6,
                                is_admin = ?7, status = ?8
             WHERE team_id = ?1 AND member_id = ?2",
        )
        .bind(&member.team_id)
        .bind(&member.member_id)
        .bind(member.telegram_id)
        .bind(&member.name)
        .bind(&member.phone)
        .bind(&member.role)
        .bind(i64::from(member.is_admin))
        .bind(member.status.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "member"))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "member {}",
                member.member_id
            )));
        }
        Ok(())
    }

    async fn register_first_admin(&self, member: &Member) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM members WHERE team_id = ?1")
            .bind(&member.team_id)
            .fetch_one(&mut *tx)
            .await?;
        if count > 0 {
            return Err(StorageError::Conflict(
                "team already has registered members".to_owned(),
            ));
        }

        sqlx::query(
            "INSERT INTO members (member_id, team_id, telegram_id, name, phone, role,
                                  is_admin, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&member.member_id)
        .bind(&member.team_id)
        .bind(member.telegram_id)
        .bind(&member.name)
        .bind(&member.phone)
        .bind(&member.role)
        .bind(i64::from(member.is_admin))
        .bind(member.status.to_string())
        .bind(member.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, "member"))?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl InviteRepository for SqliteStorage {
    async fn insert_invite(&self, invite: &Invite) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO invites (invite_id, team_id, chat_kind, subject_kind, subject_id,
                                  issued_by, issued_at, expires_at, used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(invite.invite_id.to_string())
        .bind(&invite.team_id)
        .bind(invite.chat_kind.to_string())
        .bind(invite.subject_kind.to_string())
        .bind(&invite.subject_id)
        .bind(&invite.issued_by)
        .bind(invite.issued_at.to_rfc3339())
        .bind(invite.expires_at.to_rfc3339())
        .bind(invite.used_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "invite"))?;
        Ok(())
    }

    async fn insert_player_with_invite(
        &self,
        player: &Player,
        invite: &Invite,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO players (player_id, team_id, telegram_id, name, phone, email,
                                  emergency_contact, position, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&player.player_id)
        .bind(&player.team_id)
        .bind(player.telegram_id)
        .bind(&player.name)
        .bind(&player.phone)
        .bind(&player.email)
        .bind(&player.emergency_contact)
        .bind(player.position.to_string())
        .bind(player.status.to_string())
        .bind(player.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, "player"))?;

        insert_invite_tx(&mut tx, invite).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_member_with_invite(
        &self,
        member: &Member,
        invite: &Invite,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO members (member_id, team_id, telegram_id, name, phone, role,
                                  is_admin, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&member.member_id)
        .bind(&member.team_id)
        .bind(member.telegram_id)
        .bind(&member.name)
        .bind(&member.phone)
        .bind(&member.role)
        .bind(i64::from(member.is_admin))
        .bind(member.status.to_string())
        .bind(member.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, "member"))?;

        insert_invite_tx(&mut tx, invite).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn invite(&self, invite_id: Uuid) -> Result<Option<Invite>, StorageError> {
        let row: Option<InviteRow> = sqlx::query_as(&format!(
            "SELECT {INVITE_COLUMNS} FROM invites WHERE invite_id = ?1"
        ))
        .bind(invite_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(invite_from_row).transpose()
    }

    async fn pending_invites(
        &self,
        team_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invite>, StorageError> {
        let rows: Vec<InviteRow> = sqlx::query_as(&format!(
            "SELECT {INVITE_COLUMNS} FROM invites
             WHERE team_id = ?1 AND used_at IS NULL AND expires_at > ?2
             ORDER BY issued_at"
        ))
        .bind(team_id)
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(invite_from_row).collect()
    }

    async fn redeem_invite(
        &self,
        invite_id: Uuid,
        telegram_id: i64,
        now: DateTime<Utc>,
    ) -> Result<RedeemedSubject, StorageError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<InviteRow> = sqlx::query_as(&format!(
            "SELECT {INVITE_COLUMNS} FROM invites WHERE invite_id = ?1"
        ))
        .bind(invite_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
        let invite = row
            .map(invite_from_row)
            .transpose()?
            .ok_or_else(|| StorageError::NotFound(format!("invite {invite_id}")))?;

        // Single-winner claim: the conditional update decides the race.
        let claimed = sqlx::query(
            "UPDATE invites SET used_at = ?1 WHERE invite_id = ?2 AND used_at IS NULL",
        )
        .bind(now.to_rfc3339())
        .bind(invite_id.to_string())
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() == 0 {
            return Err(StorageError::Conflict("invite already used".to_owned()));
        }

        let (table, id_column) = match invite.subject_kind {
            SubjectKind::Player => ("players", "player_id"),
            SubjectKind::Member => ("members", "member_id"),
        };

        let activated = sqlx::query(&format!(
            "UPDATE {table} SET telegram_id = ?1, status = 'active'
             WHERE team_id = ?2 AND {id_column} = ?3"
        ))
        .bind(telegram_id)
        .bind(&invite.team_id)
        .bind(&invite.subject_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, "activation"))?;
        if activated.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "{} {}",
                invite.subject_kind, invite.subject_id
            )));
        }

        let name: String = sqlx::query_scalar(&format!(
            "SELECT name FROM {table} WHERE team_id = ?1 AND {id_column} = ?2"
        ))
        .bind(&invite.team_id)
        .bind(&invite.subject_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(RedeemedSubject {
            subject_kind: invite.subject_kind,
            subject_id: invite.subject_id,
            name,
        })
    }
}

#[async_trait]
impl MatchRepository for SqliteStorage {
    async fn insert_match(&self, fixture: &Match) -> Result<(), StorageError> {
        let squad = serde_json::to_string(&fixture.squad)
            .map_err(|e| StorageError::Database(format!("squad serialization: {e}")))?;
        sqlx::query(
            "INSERT INTO matches (team_id, match_id, opponent, kickoff, location, squad, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&fixture.team_id)
        .bind(&fixture.match_id)
        .bind(&fixture.opponent)
        .bind(fixture.kickoff.to_rfc3339())
        .bind(&fixture.location)
        .bind(squad)
        .bind(&fixture.created_by)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "match"))?;
        Ok(())
    }

    async fn match_by_id(
        &self,
        team_id: &str,
        match_id: &str,
    ) -> Result<Option<Match>, StorageError> {
        let row: Option<(String, String, String, String, String, String, String)> =
            sqlx::query_as(
                "SELECT team_id, match_id, opponent, kickoff, location, squad, created_by
                 FROM matches WHERE team_id = ?1 AND match_id = ?2",
            )
            .bind(team_id)
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(match_from_row).transpose()
    }

    async fn matches(&self, team_id: &str) -> Result<Vec<Match>, StorageError> {
        let rows: Vec<(String, String, String, String, String, String, String)> =
            sqlx::query_as(
                "SELECT team_id, match_id, opponent, kickoff, location, squad, created_by
                 FROM matches WHERE team_id = ?1 ORDER BY kickoff",
            )
            .bind(team_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(match_from_row).collect()
    }

    async fn update_match(&self, fixture: &Match) -> Result<(), StorageError> {
        let squad = serde_json::to_string(&fixture.squad)
            .map_err(|e| StorageError::Database(format!("squad serialization: {e}")))?;
        let result = sqlx::query(
            "UPDATE matches SET opponent = ?3, kickoff = ?4, location = ?5, squad = ?6
             WHERE team_id = ?1 AND match_id = ?2",
        )
        .bind(&fixture.team_id)
        .bind(&fixture.match_id)
        .bind(&fixture.opponent)
        .bind(fixture.kickoff.to_rfc3339())
        .bind(&fixture.location)
        .bind(squad)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "match {}",
                fixture.match_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CommandAuditRepository for SqliteStorage {
    async fn append_audit(&self, entry: &CommandAuditEntry) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO command_audit (team_id, telegram_id, command, outcome, at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&entry.team_id)
        .bind(entry.telegram_id)
        .bind(&entry.command)
        .bind(&entry.outcome)
        .bind(entry.at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn audits(&self, team_id: &str) -> Result<Vec<CommandAuditEntry>, StorageError> {
        let rows: Vec<(String, i64, String, String, String)> = sqlx::query_as(
            "SELECT team_id, telegram_id, command, outcome, at
             FROM command_audit WHERE team_id = ?1 ORDER BY id",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(team_id, telegram_id, command, outcome, at)| {
                Ok(CommandAuditEntry {
                    team_id,
                    telegram_id,
                    command,
                    outcome,
                    at: parse_timestamp(&at)?,
                })
            })
            .collect()
    }
}

async fn insert_invite_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    invite: &Invite,
) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO invites (invite_id, team_id, chat_kind, subject_kind, subject_id,
                              issued_by, issued_at, expires_at, used_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(invite.invite_id.to_string())
    .bind(&invite.team_id)
    .bind(invite.chat_kind.to_string())
    .bind(invite.subject_kind.to_string())
    .bind(&invite.subject_id)
    .bind(&invite.issued_by)
    .bind(invite.issued_at.to_rfc3339())
    .bind(invite.expires_at.to_rfc3339())
    .bind(invite.used_at.map(|t| t.to_rfc3339()))
    .execute(&mut **tx)
    .await
    .map_err(|e| map_insert_error(e, "invite"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn team_from_row(
    (team_id, name, main_chat_id, leadership_chat_id, disabled, created_at): (
        String,
        String,
        String,
        String,
        i64,
        String,
    ),
) -> Result<Team, StorageError> {
    Ok(Team {
        team_id,
        name,
        main_chat_id,
        leadership_chat_id,
        disabled: disabled != 0,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn player_from_row(
    (player_id, team_id, telegram_id, name, phone, email, emergency_contact, position, status, created_at): PlayerRow,
) -> Result<Player, StorageError> {
    Ok(Player {
        player_id,
        team_id,
        telegram_id,
        name,
        phone,
        email,
        emergency_contact,
        position: parse_enum::<Position>(&position)?,
        status: parse_enum::<SubjectStatus>(&status)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn member_from_row(
    (member_id, team_id, telegram_id, name, phone, role, is_admin, status, created_at): MemberRow,
) -> Result<Member, StorageError> {
    Ok(Member {
        member_id,
        team_id,
        telegram_id,
        name,
        phone,
        role,
        is_admin: is_admin != 0,
        status: parse_enum::<SubjectStatus>(&status)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn invite_from_row(
    (invite_id, team_id, chat_kind, subject_kind, subject_id, issued_by, issued_at, expires_at, used_at): InviteRow,
) -> Result<Invite, StorageError> {
    Ok(Invite {
        invite_id: Uuid::parse_str(&invite_id)
            .map_err(|e| StorageError::Database(format!("bad invite id: {e}")))?,
        team_id,
        chat_kind: parse_enum::<ChatKind>(&chat_kind)?,
        subject_kind: parse_enum::<SubjectKind>(&subject_kind)?,
        subject_id,
        issued_by,
        issued_at: parse_timestamp(&issued_at)?,
        expires_at: parse_timestamp(&expires_at)?,
        used_at: used_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn match_from_row(
    (team_id, match_id, opponent, kickoff, location, squad, created_by): (
        String,
        String,
        String,
        String,
        String,
        String,
        String,
    ),
) -> Result<Match, StorageError> {
    Ok(Match {
        team_id,
        match_id,
        opponent,
        kickoff: parse_timestamp(&kickoff)?,
        location,
        squad: serde_json::from_str(&squad)
            .map_err(|e| StorageError::Database(format!("bad squad payload: {e}")))?,
        created_by,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Database(format!("bad timestamp {raw:?}: {e}")))
}

fn parse_enum<T>(raw: &str) -> Result<T, StorageError>
where
    T: FromStr<Err = String>,
{
    raw.parse()
        .map_err(|e: String| StorageError::Database(e))
}

fn map_insert_error(e: sqlx::Error, what: &str) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.kind() == sqlx::error::ErrorKind::UniqueViolation {
            return StorageError::Conflict(format!("{what} conflicts with an existing row"));
        }
    }
    StorageError::Database(e.to_string())
}
