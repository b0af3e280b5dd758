//! Fixture tools: match creation, listing, availability, squad selection.

use serde_json::json;

use crate::envelope::ToolEnvelope;
use crate::registry::ToolContext;
use crate::services::{MatchService, ServiceError};

use super::{require_str, require_str_list};

/// List the team's fixtures.
pub async fn list_matches(
    matches: &MatchService,
    ctx: &ToolContext,
) -> Result<ToolEnvelope, ServiceError> {
    let fixtures = matches.list(&ctx.team_id).await?;

    if fixtures.is_empty() {
        return Ok(ToolEnvelope::success(
            "No fixtures scheduled.",
            json!({"matches": [], "count": 0}),
        ));
    }

    let mut lines = vec![format!("Fixtures ({}):", fixtures.len())];
    lines.extend(fixtures.iter().map(|m| format!("  {}", m.summary())));

    let data: Vec<_> = fixtures
        .iter()
        .map(|m| {
            json!({
                "match_id": m.match_id,
                "opponent": m.opponent,
                "kickoff": m.kickoff,
                "squad_size": m.squad.len(),
            })
        })
        .collect();
    Ok(ToolEnvelope::success(
        lines.join("\n"),
        json!({"matches": data, "count": fixtures.len()}),
    ))
}

/// Create a fixture.
pub async fn create_match(
    matches: &MatchService,
    ctx: &ToolContext,
    args: &serde_json::Value,
) -> Result<ToolEnvelope, ServiceError> {
    let opponent = require_str(args, "opponent")?;
    let date = require_str(args, "date")?;
    let time = require_str(args, "time")?;
    let location = require_str(args, "location")?;

    let fixture = matches
        .create_match(&ctx.team_id, opponent, date, time, location, &ctx.username)
        .await?;

    Ok(ToolEnvelope::success(
        format!("Match created: {}", fixture.summary()),
        json!({
            "match_id": fixture.match_id,
            "opponent": fixture.opponent,
            "kickoff": fixture.kickoff,
            "location": fixture.location,
        }),
    ))
}

/// List active players available for a fixture.
pub async fn get_available_players_for_match(
    matches: &MatchService,
    ctx: &ToolContext,
    args: &serde_json::Value,
) -> Result<ToolEnvelope, ServiceError> {
    let match_id = require_str(args, "match_id")?;
    let (fixture, players) = matches.available_players(&ctx.team_id, match_id).await?;

    if players.is_empty() {
        return Ok(ToolEnvelope::success(
            format!("No active players available for {}.", fixture.match_id),
            json!({"match_id": fixture.match_id, "players": [], "count": 0}),
        ));
    }

    let mut lines = vec![format!(
        "Available for {} vs {} ({}):",
        fixture.match_id,
        fixture.opponent,
        players.len()
    )];
    lines.extend(players.iter().map(|p| format!("  {}", p.summary())));

    let data: Vec<_> = players
        .iter()
        .map(|p| json!({"player_id": p.player_id, "name": p.name, "position": p.position}))
        .collect();
    Ok(ToolEnvelope::success(
        lines.join("\n"),
        json!({"match_id": fixture.match_id, "players": data, "count": players.len()}),
    ))
}

/// Record the selected squad for a fixture.
pub async fn select_squad(
    matches: &MatchService,
    ctx: &ToolContext,
    args: &serde_json::Value,
) -> Result<ToolEnvelope, ServiceError> {
    let match_id = require_str(args, "match_id")?;
    let player_ids = require_str_list(args, "player_ids")?;

    let fixture = matches
        .select_squad(&ctx.team_id, match_id, &player_ids)
        .await?;

    Ok(ToolEnvelope::success(
        format!(
            "Squad of {} recorded for {} vs {}: {}",
            fixture.squad.len(),
            fixture.match_id,
            fixture.opponent,
            fixture.squad.join(", ")
        ),
        json!({"match_id": fixture.match_id, "squad": fixture.squad}),
    ))
}
