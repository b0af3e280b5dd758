//! In-memory storage used by tests and local experiments.
//!
//! A single mutex over plain collections; transactional semantics come for
//! free because every operation holds the lock for its whole duration.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Invite, Match, Member, Player, SubjectKind, SubjectStatus, Team};

use super::{
    CommandAuditEntry, CommandAuditRepository, InviteRepository, MatchRepository,
    MemberRepository, PlayerRepository, RedeemedSubject, StorageError, TeamRepository,
};

#[derive(Debug, Default)]
struct State {
    teams: HashMap<String, Team>,
    players: Vec<Player>,
    members: Vec<Member>,
    invites: HashMap<Uuid, Invite>,
    matches: Vec<Match>,
    audits: Vec<CommandAuditEntry>,
}

/// In-memory implementation of the full [`super::Storage`] surface.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    state: Mutex<State>,
}

impl InMemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Database("state lock poisoned".to_owned()))
    }
}

#[async_trait]
impl TeamRepository for InMemoryStorage {
    async fn team(&self, team_id: &str) -> Result<Option<Team>, StorageError> {
        Ok(self.lock()?.teams.get(team_id).cloned())
    }

    async fn teams(&self) -> Result<Vec<Team>, StorageError> {
        let mut teams: Vec<Team> = self.lock()?.teams.values().cloned().collect();
        teams.sort_by(|a, b| a.team_id.cmp(&b.team_id));
        Ok(teams)
    }

    async fn upsert_team(&self, team: &Team) -> Result<(), StorageError> {
        self.lock()?
            .teams
            .insert(team.team_id.clone(), team.clone());
        Ok(())
    }
}

#[async_trait]
impl PlayerRepository for InMemoryStorage {
    async fn player(
        &self,
        team_id: &str,
        player_id: &str,
    ) -> Result<Option<Player>, StorageError> {
        Ok(self
            .lock()?
            .players
            .iter()
            .find(|p| p.team_id == team_id && p.player_id == player_id)
            .cloned())
    }

    async fn player_by_telegram(
        &self,
        team_id: &str,
        telegram_id: i64,
    ) -> Result<Option<Player>, StorageError> {
        Ok(self
            .lock()?
            .players
            .iter()
            .find(|p| p.team_id == team_id && p.telegram_id == Some(telegram_id))
            .cloned())
    }

    async fn player_by_phone(
        &self,
        team_id: &str,
        phone: &str,
    ) -> Result<Option<Player>, StorageError> {
        Ok(self
            .lock()?
            .players
            .iter()
            .find(|p| p.team_id == team_id && p.phone == phone)
            .cloned())
    }

    async fn players(&self, team_id: &str) -> Result<Vec<Player>, StorageError> {
        let mut players: Vec<Player> = self
            .lock()?
            .players
            .iter()
            .filter(|p| p.team_id == team_id)
            .cloned()
            .collect();
        players.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(players)
    }

    async fn insert_player(&self, player: &Player) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        check_roster_uniqueness(
            &state,
            &player.team_id,
            &player.player_id,
            &player.phone,
            player.telegram_id,
            SubjectKind::Player,
        )?;
        state.players.push(player.clone());
        Ok(())
    }

    async fn update_player(&self, player: &Player) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let slot = state
            .players
            .iter_mut()
            .find(|p| p.team_id == player.team_id && p.player_id == player.player_id)
            .ok_or_else(|| StorageError::NotFound(format!("player {}", player.player_id)))?;
        *slot = player.clone();
        Ok(())
    }
}

#[async_trait]
impl MemberRepository for InMemoryStorage {
    async fn member(
        &self,
        team_id: &str,
        member_id: &str,
    ) -> Result<Option<Member>, StorageError> {
        Ok(self
            .lock()?
            .members
            .iter()
            .find(|m| m.team_id == team_id && m.member_id == member_id)
            .cloned())
    }

    async fn member_by_telegram(
        &self,
        team_id: &str,
        telegram_id: i64,
    ) -> Result<Option<Member>, StorageError> {
        Ok(self
            .lock()?
            .members
            .iter()
            .find(|m| m.team_id == team_id && m.telegram_id == Some(telegram_id))
            .cloned())
    }

    async fn member_by_phone(
        &self,
        team_id: &str,
        phone: &str,
    ) -> Result<Option<Member>, StorageError> {
        Ok(self
            .lock()?
            .members
            .iter()
            .find(|m| m.team_id == team_id && m.phone == phone)
            .cloned())
    }

    async fn members(&self, team_id: &str) -> Result<Vec<Member>, StorageError> {
        let mut members: Vec<Member> = self
            .lock()?
            .members
            .iter()
            .filter(|m| m.team_id == team_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(members)
    }

    async fn member_count(&self, team_id: &str) -> Result<u64, StorageError> {
        let count = self
            .lock()?
            .members
            .iter()
            .filter(|m| m.team_id == team_id)
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn insert_member(&self, member: &Member) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        check_roster_uniqueness(
            &state,
            &member.team_id,
            &member.member_id,
            &member.phone,
            member.telegram_id,
            SubjectKind::Member,
        )?;
        state.members.push(member.clone());
        Ok(())
    }

    async fn update_member(&self, member: &Member) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let slot = state
            .members
            .iter_mut()
            .find(|m| m.team_id == member.team_id && m.member_id == member.member_id)
            .ok_or_else(|| StorageError::NotFound(format!("member {}", member.member_id)))?;
        *slot = member.clone();
        Ok(())
    }

    async fn register_first_admin(&self, member: &Member) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let existing = state
            .members
            .iter()
            .filter(|m| m.team_id == member.team_id)
            .count();
        if existing > 0 {
            return Err(StorageError::Conflict(
                "team already has registered members".to_owned(),
            ));
        }
        state.members.push(member.clone());
        Ok(())
    }
}

#[async_trait]
impl InviteRepository for InMemoryStorage {
    async fn insert_invite(&self, invite: &Invite) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if state.invites.contains_key(&invite.invite_id) {
            return Err(StorageError::Conflict(format!(
                "invite {} already exists",
                invite.invite_id
            )));
        }
        state.invites.insert(invite.invite_id, invite.clone());
        Ok(())
    }

    async fn insert_player_with_invite(
        &self,
        player: &Player,
        invite: &Invite,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        check_roster_uniqueness(
            &state,
            &player.team_id,
            &player.player_id,
            &player.phone,
            player.telegram_id,
            SubjectKind::Player,
        )?;
        if state.invites.contains_key(&invite.invite_id) {
            return Err(StorageError::Conflict(format!(
                "invite {} already exists",
                invite.invite_id
            )));
        }
        state.players.push(player.clone());
        state.invites.insert(invite.invite_id, invite.clone());
        Ok(())
    }

    async fn insert_member_with_invite(
        &self,
        member: &Member,
        invite: &Invite,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        check_roster_uniqueness(
            &state,
            &member.team_id,
            &member.member_id,
            &member.phone,
            member.telegram_id,
            SubjectKind::Member,
        )?;
        if state.invites.contains_key(&invite.invite_id) {
            return Err(StorageError::Conflict(format!(
                "invite {} already exists",
                invite.invite_id
            )));
        }
        state.members.push(member.clone());
        state.invites.insert(invite.invite_id, invite.clone());
        Ok(())
    }

    async fn invite(&self, invite_id: Uuid) -> Result<Option<Invite>, StorageError> {
        Ok(self.lock()?.invites.get(&invite_id).cloned())
    }

    async fn pending_invites(
        &self,
        team_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invite>, StorageError> {
        Ok(self
            .lock()?
            .invites
            .values()
            .filter(|i| i.team_id == team_id && !i.is_used() && !i.is_expired(now))
            .cloned()
            .collect())
    }

    async fn redeem_invite(
        &self,
        invite_id: Uuid,
        telegram_id: i64,
        now: DateTime<Utc>,
    ) -> Result<RedeemedSubject, StorageError> {
        let mut state = self.lock()?;

        let invite = state
            .invites
            .get(&invite_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("invite {invite_id}")))?;

        if invite.is_used() {
            return Err(StorageError::Conflict("invite already used".to_owned()));
        }

        // Activate the subject first so a missing row leaves the invite
        // untouched.
        let redeemed = match invite.subject_kind {
            SubjectKind::Player => {
                let player = state
                    .players
                    .iter_mut()
                    .find(|p| p.team_id == invite.team_id && p.player_id == invite.subject_id)
                    .ok_or_else(|| {
                        StorageError::NotFound(format!("player {}", invite.subject_id))
                    })?;
                player.telegram_id = Some(telegram_id);
                player.status = SubjectStatus::Active;
                RedeemedSubject {
                    subject_kind: SubjectKind::Player,
                    subject_id: player.player_id.clone(),
                    name: player.name.clone(),
                }
            }
            SubjectKind::Member => {
                let member = state
                    .members
                    .iter_mut()
                    .find(|m| m.team_id == invite.team_id && m.member_id == invite.subject_id)
                    .ok_or_else(|| {
                        StorageError::NotFound(format!("member {}", invite.subject_id))
                    })?;
                member.telegram_id = Some(telegram_id);
                member.status = SubjectStatus::Active;
                RedeemedSubject {
                    subject_kind: SubjectKind::Member,
                    subject_id: member.member_id.clone(),
                    name: member.name.clone(),
                }
            }
        };

        if let Some(slot) = state.invites.get_mut(&invite_id) {
            slot.used_at = Some(now);
        }

        Ok(redeemed)
    }
}

#[async_trait]
impl MatchRepository for InMemoryStorage {
    async fn insert_match(&self, fixture: &Match) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if state
            .matches
            .iter()
            .any(|m| m.team_id == fixture.team_id && m.match_id == fixture.match_id)
        {
            return Err(StorageError::Conflict(format!(
                "match {} already exists",
                fixture.match_id
            )));
        }
        state.matches.push(fixture.clone());
        Ok(())
    }

    async fn match_by_id(
        &self,
        team_id: &str,
        match_id: &str,
    ) -> Result<Option<Match>, StorageError> {
        Ok(self
            .lock()?
            .matches
            .iter()
            .find(|m| m.team_id == team_id && m.match_id == match_id)
            .cloned())
    }

    async fn matches(&self, team_id: &str) -> Result<Vec<Match>, StorageError> {
        let mut matches: Vec<Match> = self
            .lock()?
            .matches
            .iter()
            .filter(|m| m.team_id == team_id)
            .cloned()
            .collect();
        matches.sort_by_key(|m| m.kickoff);
        Ok(matches)
    }

    async fn update_match(&self, fixture: &Match) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let slot = state
            .matches
            .iter_mut()
            .find(|m| m.team_id == fixture.team_id && m.match_id == fixture.match_id)
            .ok_or_else(|| StorageError::NotFound(format!("match {}", fixture.match_id)))?;
        *slot = fixture.clone();
        Ok(())
    }
}

#[async_trait]
impl CommandAuditRepository for InMemoryStorage {
    async fn append_audit(&self, entry: &CommandAuditEntry) -> Result<(), StorageError> {
        self.lock()?.audits.push(entry.clone());
        Ok(())
    }

    async fn audits(&self, team_id: &str) -> Result<Vec<CommandAuditEntry>, StorageError> {
        Ok(self
            .lock()?
            .audits
            .iter()
            .filter(|a| a.team_id == team_id)
            .cloned()
            .collect())
    }
}

/// Duplicate checks mirroring the SQLite unique indexes: subject id, phone,
/// and the team-wide telegram binding shared between players and members.
fn check_roster_uniqueness(
    state: &State,
    team_id: &str,
    subject_id: &str,
    phone: &str,
    telegram_id: Option<i64>,
    kind: SubjectKind,
) -> Result<(), StorageError> {
    let player_clash = state.players.iter().any(|p| {
        p.team_id == team_id
            && (matches!(kind, SubjectKind::Player) && p.player_id == subject_id
                || p.phone == phone
                || (telegram_id.is_some() && p.telegram_id == telegram_id))
    });
    let member_clash = state.members.iter().any(|m| {
        m.team_id == team_id
            && (matches!(kind, SubjectKind::Member) && m.member_id == subject_id
                || (matches!(kind, SubjectKind::Member) && m.phone == phone)
                || (telegram_id.is_some() && m.telegram_id == telegram_id))
    });
    if player_clash || member_clash {
        return Err(StorageError::Conflict(format!(
            "{kind} conflicts with an existing roster row"
        )));
    }
    Ok(())
}
