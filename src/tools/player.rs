//! Player-side tools: lookups and field updates.

use serde_json::json;

use crate::domain::ChatKind;
use crate::envelope::ToolEnvelope;
use crate::errors::ErrorKind;
use crate::registry::ToolContext;
use crate::services::roster::PlayerField;
use crate::services::{RosterService, ServiceError};

use super::{optional_str, require_str};

/// List the team's active players.
pub async fn get_active_players(
    roster: &RosterService,
    ctx: &ToolContext,
) -> Result<ToolEnvelope, ServiceError> {
    let players = roster.active_players(&ctx.team_id).await?;

    if players.is_empty() {
        return Ok(ToolEnvelope::success(
            "No active players yet.",
            json!({"players": [], "count": 0}),
        ));
    }

    let mut lines = vec![format!("Active players ({}):", players.len())];
    lines.extend(players.iter().map(|p| format!("  {}", p.summary())));

    let data: Vec<_> = players
        .iter()
        .map(|p| json!({"player_id": p.player_id, "name": p.name, "position": p.position}))
        .collect();
    Ok(ToolEnvelope::success(
        lines.join("\n"),
        json!({"players": data, "count": players.len()}),
    ))
}

/// One player's record by code.
pub async fn get_player_status(
    roster: &RosterService,
    ctx: &ToolContext,
    args: &serde_json::Value,
) -> Result<ToolEnvelope, ServiceError> {
    let player_id = require_str(args, "player_id")?;
    let player = roster.player(&ctx.team_id, player_id).await?;

    Ok(ToolEnvelope::success(
        player.summary(),
        json!({
            "player_id": player.player_id,
            "name": player.name,
            "position": player.position,
            "status": player.status,
        }),
    ))
}

/// The caller's own roster records, shaped by the chat of origin: the main
/// chat leads with the player view, the leadership chat with the member view.
pub async fn get_my_status(
    roster: &RosterService,
    ctx: &ToolContext,
) -> Result<ToolEnvelope, ServiceError> {
    let (player, member) = roster.own_records(&ctx.team_id, ctx.telegram_id).await?;

    if player.is_none() && member.is_none() {
        return Err(ServiceError::not_found(
            "You are not registered with this team. Ask an admin for an invite.",
        ));
    }

    let mut lines = Vec::new();
    match ctx.chat_kind {
        ChatKind::Main => {
            if let Some(p) = &player {
                lines.push(format!("Player record: {}", p.summary()));
                lines.push(format!("  phone: {}", p.phone));
                if let Some(email) = &p.email {
                    lines.push(format!("  email: {email}"));
                }
                if let Some(contact) = &p.emergency_contact {
                    lines.push(format!("  emergency contact: {contact}"));
                }
            }
            if let Some(m) = &member {
                lines.push(format!("Also on the staff roster: {}", m.summary()));
            }
        }
        ChatKind::Leadership => {
            if let Some(m) = &member {
                lines.push(format!("Member record: {}", m.summary()));
                lines.push(format!("  phone: {}", m.phone));
            }
            if let Some(p) = &player {
                lines.push(format!("Also on the player roster: {}", p.summary()));
            }
        }
    }

    Ok(ToolEnvelope::success(
        lines.join("\n"),
        json!({
            "player": player.map(|p| json!({"player_id": p.player_id, "status": p.status})),
            "member": member.map(|m| json!({"member_id": m.member_id, "is_admin": m.is_admin})),
        }),
    ))
}

/// Update a player field. With `player_id` this is an admin correction and is
/// only honored from the leadership chat; without it the caller updates
/// their own record.
pub async fn update_player_field(
    roster: &RosterService,
    ctx: &ToolContext,
    args: &serde_json::Value,
) -> Result<ToolEnvelope, ServiceError> {
    let field: PlayerField = require_str(args, "field")?
        .parse()
        .map_err(ServiceError::invalid_input)?;
    let value = require_str(args, "value")?;

    let update = match optional_str(args, "player_id") {
        Some(player_id) => {
            if ctx.chat_kind != ChatKind::Leadership {
                return Err(ServiceError::new(
                    ErrorKind::Denied,
                    "Updating another player's record is a leadership chat action.",
                ));
            }
            roster
                .update_player_field(&ctx.team_id, player_id, field, value)
                .await?
        }
        None => {
            roster
                .update_own_field(&ctx.team_id, ctx.telegram_id, field, value)
                .await?
        }
    };

    let message = if update.changed {
        format!(
            "Updated {} for {}: {}",
            update.field, update.subject_id, update.value
        )
    } else {
        format!(
            "No change: {} for {} is already {}",
            update.field, update.subject_id, update.value
        )
    };

    Ok(ToolEnvelope::success(
        message,
        json!({
            "player_id": update.subject_id,
            "field": update.field,
            "value": update.value,
            "changed": update.changed,
        }),
    ))
}
