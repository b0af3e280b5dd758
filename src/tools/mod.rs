//! Tool implementations and the startup inventory.
//!
//! Each tool is an async function taking the caller's [`ToolContext`] and
//! JSON arguments, returning the uniform envelope. Tools reach storage only
//! through the domain services handed to [`register_all`] -- no tool talks to
//! a repository directly, and no tool is discovered dynamically.

use std::sync::Arc;

use serde_json::Value;

use crate::envelope::ToolEnvelope;
use crate::registry::{CommandRegistry, RegistryError, ToolContext, ToolDescriptor, ToolRegistry};
use crate::services::{InviteService, MatchService, RosterService, ServiceError};

pub mod fixtures;
pub mod help;
pub mod player;
pub mod team;

/// The services tools delegate to.
#[derive(Clone)]
pub struct ToolDeps {
    /// Player/member operations.
    pub roster: Arc<RosterService>,
    /// Fixture operations.
    pub matches: Arc<MatchService>,
    /// Invite operations.
    pub invites: Arc<InviteService>,
    /// Command catalog consulted by the help tools.
    pub commands: Arc<CommandRegistry>,
}

/// Extract a required string argument.
pub(crate) fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ServiceError> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ServiceError::invalid_input(format!("missing required field: {key}")))
}

/// Extract an optional string argument.
pub(crate) fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Extract a required array-of-strings argument.
pub(crate) fn require_str_list(args: &Value, key: &str) -> Result<Vec<String>, ServiceError> {
    let list = args
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| ServiceError::invalid_input(format!("missing required field: {key}")))?;
    Ok(list
        .iter()
        .filter_map(Value::as_str)
        .map(ToOwned::to_owned)
        .collect())
}

/// Wrap a fallible tool body into the envelope contract.
fn settle(result: Result<ToolEnvelope, ServiceError>) -> ToolEnvelope {
    result.unwrap_or_else(|e| e.envelope())
}

macro_rules! descriptor {
    ($deps:ident, $name:literal, $description:literal, $params:expr, $produces_data:literal,
     |$ctx:ident, $args:ident, $d:ident| $body:expr) => {{
        let $d = $deps.clone();
        ToolDescriptor::new(
            $name,
            $description,
            $params,
            $produces_data,
            Arc::new(move |$ctx: ToolContext, $args: Value| {
                let $d = $d.clone();
                Box::pin(async move { settle($body.await) })
            }),
        )
    }};
}

/// Build the full tool inventory and seal the registry.
///
/// # Errors
///
/// Propagates [`RegistryError`] if the registry was already populated or the
/// inventory repeats a name.
pub fn register_all(registry: &ToolRegistry, deps: &ToolDeps) -> Result<(), RegistryError> {
    use serde_json::json;

    let no_params = json!({"type": "object", "properties": {}});
    let inventory = vec![
        // -- system / help ------------------------------------------------
        descriptor!(
            deps,
            "ping",
            "Check that the bot is alive.",
            no_params.clone(),
            false,
            |ctx, _args, _d| help::ping(&ctx)
        ),
        descriptor!(
            deps,
            "version",
            "Show the bot version.",
            no_params.clone(),
            false,
            |_ctx, _args, _d| help::version()
        ),
        descriptor!(
            deps,
            "get_available_commands",
            "List the commands available in the current chat, grouped by feature.",
            no_params.clone(),
            true,
            |ctx, _args, d| help::get_available_commands(&d.commands, &ctx)
        ),
        descriptor!(
            deps,
            "get_command_help",
            "Show the help text for one command.",
            json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string", "description": "Command name, e.g. /addplayer."}
                },
                "required": ["command"]
            }),
            true,
            |ctx, args, d| help::get_command_help(&d.commands, &ctx, &args)
        ),
        descriptor!(
            deps,
            "get_welcome_message",
            "Produce the welcome text for the current chat.",
            no_params.clone(),
            false,
            |ctx, _args, _d| help::get_welcome_message(&ctx)
        ),
        // -- roster lookups ----------------------------------------------
        descriptor!(
            deps,
            "list_team_members_and_players",
            "List the full roster: players and staff members.",
            no_params.clone(),
            true,
            |ctx, _args, d| team::list_team_members_and_players(&d.roster, &ctx)
        ),
        descriptor!(
            deps,
            "get_active_players",
            "List the team's active players.",
            no_params.clone(),
            true,
            |ctx, _args, d| player::get_active_players(&d.roster, &ctx)
        ),
        descriptor!(
            deps,
            "get_my_status",
            "Show the requesting user's own roster records.",
            no_params.clone(),
            true,
            |ctx, _args, d| player::get_my_status(&d.roster, &ctx)
        ),
        descriptor!(
            deps,
            "get_player_status",
            "Show one player's record by player id.",
            json!({
                "type": "object",
                "properties": {
                    "player_id": {"type": "string", "description": "Player code, e.g. 01JS."}
                },
                "required": ["player_id"]
            }),
            true,
            |ctx, args, d| player::get_player_status(&d.roster, &ctx, &args)
        ),
        // -- roster mutations --------------------------------------------
        descriptor!(
            deps,
            "create_player",
            "Create a pending player and issue their invite to the main chat.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Player's full name."},
                    "phone": {"type": "string", "description": "E.164 phone number."}
                },
                "required": ["name", "phone"]
            }),
            false,
            |ctx, args, d| team::create_player(&d.roster, &ctx, &args)
        ),
        descriptor!(
            deps,
            "create_member",
            "Create a pending staff member and issue their invite to the leadership chat.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Member's full name."},
                    "phone": {"type": "string", "description": "E.164 phone number."},
                    "role": {"type": "string", "description": "Role, e.g. coach."}
                },
                "required": ["name", "phone", "role"]
            }),
            false,
            |ctx, args, d| team::create_member(&d.roster, &ctx, &args)
        ),
        descriptor!(
            deps,
            "approve_player",
            "Approve (re-activate) a player by player id.",
            json!({
                "type": "object",
                "properties": {
                    "player_id": {"type": "string", "description": "Player code, e.g. 01JS."}
                },
                "required": ["player_id"]
            }),
            false,
            |ctx, args, d| team::approve_player(&d.roster, &ctx, &args)
        ),
        descriptor!(
            deps,
            "update_player_field",
            "Update one player field. Without player_id the requester's own record is updated.",
            json!({
                "type": "object",
                "properties": {
                    "player_id": {"type": "string", "description": "Target player code; omit for self."},
                    "field": {"type": "string", "enum": ["phone", "email", "position", "emergency_contact"]},
                    "value": {"type": "string"}
                },
                "required": ["field", "value"]
            }),
            false,
            |ctx, args, d| player::update_player_field(&d.roster, &ctx, &args)
        ),
        descriptor!(
            deps,
            "update_member_field",
            "Update one member field by member id.",
            json!({
                "type": "object",
                "properties": {
                    "member_id": {"type": "string", "description": "Member code, e.g. M01JK."},
                    "field": {"type": "string", "enum": ["phone", "role"]},
                    "value": {"type": "string"}
                },
                "required": ["member_id", "field", "value"]
            }),
            false,
            |ctx, args, d| team::update_member_field(&d.roster, &ctx, &args)
        ),
        // -- fixtures ------------------------------------------------------
        descriptor!(
            deps,
            "list_matches",
            "List the team's fixtures.",
            no_params.clone(),
            true,
            |ctx, _args, d| fixtures::list_matches(&d.matches, &ctx)
        ),
        descriptor!(
            deps,
            "create_match",
            "Create a fixture.",
            json!({
                "type": "object",
                "properties": {
                    "opponent": {"type": "string"},
                    "date": {"type": "string", "description": "YYYY-MM-DD"},
                    "time": {"type": "string", "description": "HH:MM, UTC"},
                    "location": {"type": "string"}
                },
                "required": ["opponent", "date", "time", "location"]
            }),
            false,
            |ctx, args, d| fixtures::create_match(&d.matches, &ctx, &args)
        ),
        descriptor!(
            deps,
            "get_available_players_for_match",
            "List active players available for a fixture.",
            json!({
                "type": "object",
                "properties": {
                    "match_id": {"type": "string", "description": "Match code, e.g. MAT042."}
                },
                "required": ["match_id"]
            }),
            true,
            |ctx, args, d| fixtures::get_available_players_for_match(&d.matches, &ctx, &args)
        ),
        descriptor!(
            deps,
            "select_squad",
            "Record the selected squad for a fixture.",
            json!({
                "type": "object",
                "properties": {
                    "match_id": {"type": "string"},
                    "player_ids": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["match_id", "player_ids"]
            }),
            false,
            |ctx, args, d| fixtures::select_squad(&d.matches, &ctx, &args)
        ),
        // -- communications -----------------------------------------------
        descriptor!(
            deps,
            "send_announcement",
            "Format a team announcement for the leadership to post.",
            json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string", "description": "Announcement body."}
                },
                "required": ["message"]
            }),
            false,
            |ctx, args, _d| team::send_announcement(&ctx, &args)
        ),
        descriptor!(
            deps,
            "create_poll",
            "Format a team poll with options.",
            json!({
                "type": "object",
                "properties": {
                    "question": {"type": "string"},
                    "options": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["question", "options"]
            }),
            false,
            |ctx, args, _d| team::create_poll(&ctx, &args)
        ),
        descriptor!(
            deps,
            "send_reminder",
            "Format a reminder for the leadership to post.",
            json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string", "description": "Reminder body."}
                },
                "required": ["message"]
            }),
            false,
            |ctx, args, _d| team::send_reminder(&ctx, &args)
        ),
    ];

    registry.populate(inventory)
}
