//! Roster operations: players, members, provisioning, and field updates.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::domain::{
    ids, phone, ChatKind, Invite, Member, Player, Position, SubjectKind, SubjectStatus, Team,
};
use crate::errors::ErrorKind;
use crate::storage::{
    InviteRepository, MemberRepository, PlayerRepository, SharedStorage, TeamRepository,
};

use super::invite::InviteService;
use super::ServiceError;

/// Attempts at generating a collision-free short code before giving up.
const CODE_ATTEMPTS: usize = 16;

/// Default position for players added without one.
const DEFAULT_POSITION: Position = Position::Utility;

/// A freshly provisioned player with its invite.
#[derive(Debug, Clone)]
pub struct ProvisionedPlayer {
    /// The pending player row.
    pub player: Player,
    /// The invite issued alongside it.
    pub invite: Invite,
    /// Signed redemption URL for the main chat.
    pub invite_url: String,
}

/// A freshly provisioned member with its invite.
#[derive(Debug, Clone)]
pub struct ProvisionedMember {
    /// The pending member row.
    pub member: Member,
    /// The invite issued alongside it.
    pub invite: Invite,
    /// Signed redemption URL for the leadership chat.
    pub invite_url: String,
}

/// Outcome of a field update; `changed` is false when the value was already
/// set, making repeated updates a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUpdate {
    /// The updated player or member code.
    pub subject_id: String,
    /// Field name that was targeted.
    pub field: String,
    /// The stored (normalized) value.
    pub value: String,
    /// Whether anything was actually written.
    pub changed: bool,
}

/// A player field updatable through `/update` and `/updateplayer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerField {
    /// E.164 phone number.
    Phone,
    /// Contact email.
    Email,
    /// Field position.
    Position,
    /// Emergency contact line.
    EmergencyContact,
}

impl std::str::FromStr for PlayerField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "phone" => Ok(Self::Phone),
            "email" => Ok(Self::Email),
            "position" => Ok(Self::Position),
            "emergency_contact" => Ok(Self::EmergencyContact),
            other => Err(format!(
                "unknown field: {other} (expected phone, email, position, or emergency_contact)"
            )),
        }
    }
}

/// A member field updatable through `/updatemember`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberField {
    /// E.164 phone number.
    Phone,
    /// Free-form role label.
    Role,
}

impl std::str::FromStr for MemberField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "phone" => Ok(Self::Phone),
            "role" => Ok(Self::Role),
            other => Err(format!("unknown field: {other} (expected phone or role)")),
        }
    }
}

/// Roster service wrapping player/member repositories and invite issuance.
pub struct RosterService {
    storage: SharedStorage,
    invites: Arc<InviteService>,
}

impl RosterService {
    /// Create the service.
    pub fn new(storage: SharedStorage, invites: Arc<InviteService>) -> Self {
        Self { storage, invites }
    }

    async fn team(&self, team_id: &str) -> Result<Team, ServiceError> {
        self.storage
            .team(team_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("team {team_id} is not provisioned")))
    }

    /// Create a pending player and issue their main-chat invite, both in one
    /// storage transaction.
    pub async fn add_player(
        &self,
        team_id: &str,
        name: &str,
        phone_raw: &str,
        issued_by: &str,
    ) -> Result<ProvisionedPlayer, ServiceError> {
        let name = clean_name(name)?;
        let phone = phone::normalize(phone_raw).map_err(ServiceError::invalid_input)?;
        let team = self.team(team_id).await?;

        if self.storage.player_by_phone(team_id, &phone).await?.is_some() {
            return Err(ServiceError::conflict(format!(
                "A player with phone {phone} already exists."
            )));
        }

        let player_id = self.free_player_code(team_id).await?;
        let now = Utc::now();
        let player = Player {
            player_id: player_id.clone(),
            team_id: team_id.to_owned(),
            telegram_id: None,
            name,
            phone,
            email: None,
            emergency_contact: None,
            position: DEFAULT_POSITION,
            status: SubjectStatus::Pending,
            created_at: now,
        };
        let invite = self.invites.build_invite(
            team_id,
            ChatKind::Main,
            SubjectKind::Player,
            &player_id,
            issued_by,
            now,
        );

        self.storage
            .insert_player_with_invite(&player, &invite)
            .await?;
        let invite_url = self.invites.redemption_url(&invite, &team.main_chat_id);

        info!(team_id, player_id = %player.player_id, "player created (pending)");
        Ok(ProvisionedPlayer {
            player,
            invite,
            invite_url,
        })
    }

    /// Create a pending member and issue their leadership-chat invite.
    pub async fn add_member(
        &self,
        team_id: &str,
        name: &str,
        phone_raw: &str,
        role: &str,
        issued_by: &str,
    ) -> Result<ProvisionedMember, ServiceError> {
        let name = clean_name(name)?;
        let phone = phone::normalize(phone_raw).map_err(ServiceError::invalid_input)?;
        let role = role.trim();
        if role.is_empty() {
            return Err(ServiceError::invalid_input("A member needs a role."));
        }
        let team = self.team(team_id).await?;

        if self.storage.member_by_phone(team_id, &phone).await?.is_some() {
            return Err(ServiceError::conflict(format!(
                "A member with phone {phone} already exists."
            )));
        }

        let member_id = self.free_member_code(team_id).await?;
        let now = Utc::now();
        let member = Member {
            member_id: member_id.clone(),
            team_id: team_id.to_owned(),
            telegram_id: None,
            name,
            phone,
            role: role.to_owned(),
            is_admin: false,
            status: SubjectStatus::Pending,
            created_at: now,
        };
        let invite = self.invites.build_invite(
            team_id,
            ChatKind::Leadership,
            SubjectKind::Member,
            &member_id,
            issued_by,
            now,
        );

        self.storage
            .insert_member_with_invite(&member, &invite)
            .await?;
        let invite_url = self
            .invites
            .redemption_url(&invite, &team.leadership_chat_id);

        info!(team_id, member_id = %member.member_id, "member created (pending)");
        Ok(ProvisionedMember {
            member,
            invite,
            invite_url,
        })
    }

    /// First-user bootstrap: register the founding admin of a team. The
    /// sender's Telegram identity is bound immediately -- no invite involved.
    pub async fn register_first_admin(
        &self,
        team_id: &str,
        telegram_id: i64,
        name: &str,
        phone_raw: &str,
        role: &str,
    ) -> Result<Member, ServiceError> {
        let name = clean_name(name)?;
        let phone = phone::normalize(phone_raw).map_err(ServiceError::invalid_input)?;
        self.team(team_id).await?;

        let member = Member {
            member_id: self.free_member_code(team_id).await?,
            team_id: team_id.to_owned(),
            telegram_id: Some(telegram_id),
            name,
            phone,
            role: if role.trim().is_empty() {
                "Team Manager".to_owned()
            } else {
                role.trim().to_owned()
            },
            is_admin: true,
            status: SubjectStatus::Active,
            created_at: Utc::now(),
        };

        self.storage.register_first_admin(&member).await?;
        info!(team_id, member_id = %member.member_id, "first admin registered");
        Ok(member)
    }

    /// Approve a player.
    ///
    /// Activation normally happens through invite redemption; `/approve`
    /// reactivates an inactive player or reports why approval cannot apply.
    /// Approving an already-active player is a no-op.
    pub async fn approve_player(&self, team_id: &str, player_id: &str) -> Result<Player, ServiceError> {
        let mut player = self
            .storage
            .player(team_id, player_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Player {player_id} not found.")))?;

        match player.status {
            SubjectStatus::Active => Ok(player),
            SubjectStatus::Pending => Err(ServiceError::invalid_input(format!(
                "Player {player_id} has not redeemed their invite yet; approval applies once \
                 they have joined the main chat."
            ))),
            SubjectStatus::Inactive => {
                if player.telegram_id.is_none() {
                    return Err(ServiceError::invalid_input(format!(
                        "Player {player_id} has no linked Telegram account to re-activate."
                    )));
                }
                player.status = SubjectStatus::Active;
                self.storage.update_player(&player).await?;
                info!(team_id, player_id, "player re-activated");
                Ok(player)
            }
        }
    }

    /// Update one field of a player record. Idempotent: setting the current
    /// value reports `changed == false` and writes nothing.
    pub async fn update_player_field(
        &self,
        team_id: &str,
        player_id: &str,
        field: PlayerField,
        value: &str,
    ) -> Result<FieldUpdate, ServiceError> {
        let mut player = self
            .storage
            .player(team_id, player_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Player {player_id} not found.")))?;

        let (field_name, stored_value, changed) = match field {
            PlayerField::Phone => {
                let normalized = phone::normalize(value).map_err(ServiceError::invalid_input)?;
                let changed = player.phone != normalized;
                if changed {
                    if let Some(other) =
                        self.storage.player_by_phone(team_id, &normalized).await?
                    {
                        if other.player_id != player.player_id {
                            return Err(ServiceError::conflict(format!(
                                "Phone {normalized} already belongs to another player."
                            )));
                        }
                    }
                    player.phone = normalized.clone();
                }
                ("phone", normalized, changed)
            }
            PlayerField::Email => {
                let email = value.trim().to_owned();
                if !email.contains('@') {
                    return Err(ServiceError::invalid_input(format!(
                        "{email} does not look like an email address."
                    )));
                }
                let changed = player.email.as_deref() != Some(email.as_str());
                if changed {
                    player.email = Some(email.clone());
                }
                ("email", email, changed)
            }
            PlayerField::Position => {
                let position: Position =
                    value.parse().map_err(ServiceError::invalid_input)?;
                let changed = player.position != position;
                if changed {
                    player.position = position;
                }
                ("position", position.to_string(), changed)
            }
            PlayerField::EmergencyContact => {
                let contact = value.trim().to_owned();
                if contact.is_empty() {
                    return Err(ServiceError::invalid_input(
                        "An emergency contact cannot be empty.",
                    ));
                }
                let changed = player.emergency_contact.as_deref() != Some(contact.as_str());
                if changed {
                    player.emergency_contact = Some(contact.clone());
                }
                ("emergency_contact", contact, changed)
            }
        };

        if changed {
            self.storage.update_player(&player).await?;
            info!(team_id, player_id, field = field_name, "player field updated");
        }

        Ok(FieldUpdate {
            subject_id: player.player_id,
            field: field_name.to_owned(),
            value: stored_value,
            changed,
        })
    }

    /// Update one field of the sender's own player record.
    pub async fn update_own_field(
        &self,
        team_id: &str,
        telegram_id: i64,
        field: PlayerField,
        value: &str,
    ) -> Result<FieldUpdate, ServiceError> {
        let player = self
            .storage
            .player_by_telegram(team_id, telegram_id)
            .await?
            .ok_or_else(|| {
                ServiceError::not_found("You do not have a player record on this team.")
            })?;
        self.update_player_field(team_id, &player.player_id, field, value)
            .await
    }

    /// Update one field of a member record.
    pub async fn update_member_field(
        &self,
        team_id: &str,
        member_id: &str,
        field: MemberField,
        value: &str,
    ) -> Result<FieldUpdate, ServiceError> {
        let mut member = self
            .storage
            .member(team_id, member_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Member {member_id} not found.")))?;

        let (field_name, stored_value, changed) = match field {
            MemberField::Phone => {
                let normalized = phone::normalize(value).map_err(ServiceError::invalid_input)?;
                let changed = member.phone != normalized;
                if changed {
                    member.phone = normalized.clone();
                }
                ("phone", normalized, changed)
            }
            MemberField::Role => {
                let role = value.trim().to_owned();
                if role.is_empty() {
                    return Err(ServiceError::invalid_input("A role cannot be empty."));
                }
                let changed = member.role != role;
                if changed {
                    member.role = role.clone();
                }
                ("role", role, changed)
            }
        };

        if changed {
            self.storage.update_member(&member).await?;
            info!(team_id, member_id, field = field_name, "member field updated");
        }

        Ok(FieldUpdate {
            subject_id: member.member_id,
            field: field_name.to_owned(),
            value: stored_value,
            changed,
        })
    }

    /// All active players, ordered by name.
    pub async fn active_players(&self, team_id: &str) -> Result<Vec<Player>, ServiceError> {
        Ok(self
            .storage
            .players(team_id)
            .await?
            .into_iter()
            .filter(Player::is_active)
            .collect())
    }

    /// The full roster: players and members.
    pub async fn roster(&self, team_id: &str) -> Result<(Vec<Player>, Vec<Member>), ServiceError> {
        let players = self.storage.players(team_id).await?;
        let members = self.storage.members(team_id).await?;
        Ok((players, members))
    }

    /// A single player by code.
    pub async fn player(&self, team_id: &str, player_id: &str) -> Result<Player, ServiceError> {
        self.storage
            .player(team_id, player_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Player {player_id} not found.")))
    }

    /// The sender's own roster rows, either side.
    pub async fn own_records(
        &self,
        team_id: &str,
        telegram_id: i64,
    ) -> Result<(Option<Player>, Option<Member>), ServiceError> {
        let player = self.storage.player_by_telegram(team_id, telegram_id).await?;
        let member = self.storage.member_by_telegram(team_id, telegram_id).await?;
        Ok((player, member))
    }

    /// Number of member rows for the team.
    pub async fn member_count(&self, team_id: &str) -> Result<u64, ServiceError> {
        Ok(self.storage.member_count(team_id).await?)
    }

    async fn free_player_code(&self, team_id: &str) -> Result<String, ServiceError> {
        for _ in 0..CODE_ATTEMPTS {
            let code = ids::player_code(&mut rand::thread_rng());
            if self.storage.player(team_id, &code).await?.is_none() {
                return Ok(code);
            }
        }
        Err(ServiceError::new(
            ErrorKind::SystemCritical,
            "Could not allocate a free player code.",
        ))
    }

    async fn free_member_code(&self, team_id: &str) -> Result<String, ServiceError> {
        for _ in 0..CODE_ATTEMPTS {
            let code = ids::member_code(&mut rand::thread_rng());
            if self.storage.member(team_id, &code).await?.is_none() {
                return Ok(code);
            }
        }
        Err(ServiceError::new(
            ErrorKind::SystemCritical,
            "Could not allocate a free member code.",
        ))
    }
}

fn clean_name(raw: &str) -> Result<String, ServiceError> {
    let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        return Err(ServiceError::invalid_input("A name is required."));
    }
    Ok(name)
}
