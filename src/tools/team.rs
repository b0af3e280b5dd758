//! Leadership tools: roster administration and communications.

use serde_json::json;

use crate::envelope::ToolEnvelope;
use crate::registry::ToolContext;
use crate::services::roster::MemberField;
use crate::services::{RosterService, ServiceError};

use super::{require_str, require_str_list};

/// Full roster listing: players and staff members.
pub async fn list_team_members_and_players(
    roster: &RosterService,
    ctx: &ToolContext,
) -> Result<ToolEnvelope, ServiceError> {
    let (players, members) = roster.roster(&ctx.team_id).await?;

    let mut lines = Vec::new();
    lines.push(format!("Players ({}):", players.len()));
    if players.is_empty() {
        lines.push("  none".to_owned());
    }
    lines.extend(players.iter().map(|p| format!("  {}", p.summary())));
    lines.push(String::new());
    lines.push(format!("Members ({}):", members.len()));
    if members.is_empty() {
        lines.push("  none".to_owned());
    }
    lines.extend(members.iter().map(|m| format!("  {}", m.summary())));

    Ok(ToolEnvelope::success(
        lines.join("\n"),
        json!({
            "player_count": players.len(),
            "member_count": members.len(),
            "players": players.iter().map(|p| json!({
                "player_id": p.player_id, "name": p.name, "status": p.status,
            })).collect::<Vec<_>>(),
            "members": members.iter().map(|m| json!({
                "member_id": m.member_id, "name": m.name, "is_admin": m.is_admin,
            })).collect::<Vec<_>>(),
        }),
    ))
}

/// Create a pending player and return their invite link.
pub async fn create_player(
    roster: &RosterService,
    ctx: &ToolContext,
    args: &serde_json::Value,
) -> Result<ToolEnvelope, ServiceError> {
    let name = require_str(args, "name")?;
    let phone = require_str(args, "phone")?;

    let issued_by = roster
        .own_records(&ctx.team_id, ctx.telegram_id)
        .await?
        .1
        .map(|m| m.member_id)
        .unwrap_or_else(|| ctx.username.clone());

    let provisioned = roster
        .add_player(&ctx.team_id, name, phone, &issued_by)
        .await?;

    Ok(ToolEnvelope::success(
        format!(
            "Player {} created as {} (pending).\nInvite link for the main chat:\n{}",
            provisioned.player.name, provisioned.player.player_id, provisioned.invite_url
        ),
        json!({
            "player_id": provisioned.player.player_id,
            "status": provisioned.player.status,
            "invite_url": provisioned.invite_url,
            "expires_at": provisioned.invite.expires_at,
        }),
    ))
}

/// Create a pending member and return their invite link.
pub async fn create_member(
    roster: &RosterService,
    ctx: &ToolContext,
    args: &serde_json::Value,
) -> Result<ToolEnvelope, ServiceError> {
    let name = require_str(args, "name")?;
    let phone = require_str(args, "phone")?;
    let role = require_str(args, "role")?;

    let issued_by = roster
        .own_records(&ctx.team_id, ctx.telegram_id)
        .await?
        .1
        .map(|m| m.member_id)
        .unwrap_or_else(|| ctx.username.clone());

    let provisioned = roster
        .add_member(&ctx.team_id, name, phone, role, &issued_by)
        .await?;

    Ok(ToolEnvelope::success(
        format!(
            "Member {} created as {} (pending).\nInvite link for the leadership chat:\n{}",
            provisioned.member.name, provisioned.member.member_id, provisioned.invite_url
        ),
        json!({
            "member_id": provisioned.member.member_id,
            "status": provisioned.member.status,
            "invite_url": provisioned.invite_url,
            "expires_at": provisioned.invite.expires_at,
        }),
    ))
}

/// Approve (re-activate) a player.
pub async fn approve_player(
    roster: &RosterService,
    ctx: &ToolContext,
    args: &serde_json::Value,
) -> Result<ToolEnvelope, ServiceError> {
    let player_id = require_str(args, "player_id")?;
    let player = roster.approve_player(&ctx.team_id, player_id).await?;

    Ok(ToolEnvelope::success(
        format!("Player {} ({}) is active.", player.name, player.player_id),
        json!({"player_id": player.player_id, "status": player.status}),
    ))
}

/// Update a member field.
pub async fn update_member_field(
    roster: &RosterService,
    ctx: &ToolContext,
    args: &serde_json::Value,
) -> Result<ToolEnvelope, ServiceError> {
    let member_id = require_str(args, "member_id")?;
    let field: MemberField = require_str(args, "field")?
        .parse()
        .map_err(ServiceError::invalid_input)?;
    let value = require_str(args, "value")?;

    let update = roster
        .update_member_field(&ctx.team_id, member_id, field, value)
        .await?;

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
            "member_id": update.subject_id,
            "field": update.field,
            "value": update.value,
            "changed": update.changed,
        }),
    ))
}

/// Format an announcement for posting. Replies go to the originating chat
/// only; the bot never posts unprompted into the main chat.
pub async fn send_announcement(
    ctx: &ToolContext,
    args: &serde_json::Value,
) -> Result<ToolEnvelope, ServiceError> {
    let message = require_str(args, "message")?;
    Ok(ToolEnvelope::success(
        format!("ANNOUNCEMENT\n\n{}\n\n- {}", message.trim(), ctx.username),
        json!({"announcement": message.trim()}),
    ))
}

/// Format a poll with numbered options.
pub async fn create_poll(
    ctx: &ToolContext,
    args: &serde_json::Value,
) -> Result<ToolEnvelope, ServiceError> {
    let question = require_str(args, "question")?;
    let options = require_str_list(args, "options")?;
    if options.len() < 2 {
        return Err(ServiceError::invalid_input(
            "A poll needs at least two options.",
        ));
    }

    let mut lines = vec![format!("POLL: {}", question.trim()), String::new()];
    for (idx, option) in options.iter().enumerate() {
        lines.push(format!("{}. {option}", idx.saturating_add(1)));
    }
    lines.push(String::new());
    lines.push(format!("Reply with a number. - {}", ctx.username));

    Ok(ToolEnvelope::success(
        lines.join("\n"),
        json!({"question": question.trim(), "options": options}),
    ))
}

/// Format a reminder.
pub async fn send_reminder(
    ctx: &ToolContext,
    args: &serde_json::Value,
) -> Result<ToolEnvelope, ServiceError> {
    let message = require_str(args, "message")?;
    Ok(ToolEnvelope::success(
        format!("REMINDER: {}\n\n- {}", message.trim(), ctx.username),
        json!({"reminder": message.trim()}),
    ))
}
