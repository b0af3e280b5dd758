//! Fixture management: creation, listing, availability, squad selection.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::info;

use crate::domain::{ids, Match, Player};
use crate::errors::ErrorKind;
use crate::storage::{MatchRepository, PlayerRepository, SharedStorage};

use super::ServiceError;

const CODE_ATTEMPTS: usize = 16;

/// Fixture service wrapping the match repository.
pub struct MatchService {
    storage: SharedStorage,
}

impl MatchService {
    /// Create the service.
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Create a fixture. `date` is `YYYY-MM-DD`, `time` is `HH:MM` (UTC).
    pub async fn create_match(
        &self,
        team_id: &str,
        opponent: &str,
        date: &str,
        time: &str,
        location: &str,
        created_by: &str,
    ) -> Result<Match, ServiceError> {
        let opponent = opponent.trim();
        if opponent.is_empty() {
            return Err(ServiceError::invalid_input("An opponent name is required."));
        }
        let kickoff = parse_kickoff(date, time)?;

        let match_id = self.free_match_code(team_id).await?;
        let fixture = Match {
            match_id: match_id.clone(),
            team_id: team_id.to_owned(),
            opponent: opponent.to_owned(),
            kickoff,
            location: location.trim().to_owned(),
            squad: Vec::new(),
            created_by: created_by.to_owned(),
        };

        self.storage.insert_match(&fixture).await?;
        info!(team_id, match_id = %fixture.match_id, "match created");
        Ok(fixture)
    }

    /// All fixtures of a team, ordered by kickoff.
    pub async fn list(&self, team_id: &str) -> Result<Vec<Match>, ServiceError> {
        Ok(self.storage.matches(team_id).await?)
    }

    /// A single fixture by code.
    pub async fn fixture(&self, team_id: &str, match_id: &str) -> Result<Match, ServiceError> {
        self.storage
            .match_by_id(team_id, match_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Match {match_id} not found.")))
    }

    /// Players available for a fixture. Until availability polling exists,
    /// every active player is considered available.
    pub async fn available_players(
        &self,
        team_id: &str,
        match_id: &str,
    ) -> Result<(Match, Vec<Player>), ServiceError> {
        let fixture = self.fixture(team_id, match_id).await?;
        let players = self
            .storage
            .players(team_id)
            .await?
            .into_iter()
            .filter(Player::is_active)
            .collect();
        Ok((fixture, players))
    }

    /// Record the selected squad for a fixture. Every selected id must be an
    /// active player of the team; selection replaces any previous squad.
    pub async fn select_squad(
        &self,
        team_id: &str,
        match_id: &str,
        player_ids: &[String],
    ) -> Result<Match, ServiceError> {
        if player_ids.is_empty() {
            return Err(ServiceError::invalid_input(
                "Select at least one player for the squad.",
            ));
        }

        let mut fixture = self.fixture(team_id, match_id).await?;

        let mut squad = Vec::with_capacity(player_ids.len());
        for player_id in player_ids {
            let player = self
                .storage
                .player(team_id, player_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::not_found(format!("Player {player_id} not found."))
                })?;
            if !player.is_active() {
                return Err(ServiceError::new(
                    ErrorKind::InvalidInput,
                    format!("Player {player_id} is not active and cannot be selected."),
                ));
            }
            if !squad.contains(player_id) {
                squad.push(player_id.clone());
            }
        }

        fixture.squad = squad;
        self.storage.update_match(&fixture).await?;
        info!(team_id, match_id, squad_size = fixture.squad.len(), "squad selected");
        Ok(fixture)
    }

    async fn free_match_code(&self, team_id: &str) -> Result<String, ServiceError> {
        for _ in 0..CODE_ATTEMPTS {
            let code = ids::match_code(&mut rand::thread_rng());
            if self.storage.match_by_id(team_id, &code).await?.is_none() {
                return Ok(code);
            }
        }
        Err(ServiceError::new(
            ErrorKind::SystemCritical,
            "Could not allocate a free match code.",
        ))
    }
}

fn parse_kickoff(date: &str, time: &str) -> Result<DateTime<Utc>, ServiceError> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| {
        ServiceError::invalid_input(format!("{date} is not a date (expected YYYY-MM-DD)."))
    })?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M").map_err(|_| {
        ServiceError::invalid_input(format!("{time} is not a time (expected HH:MM)."))
    })?;
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}
