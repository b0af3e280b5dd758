//! Specialist agent definitions.
//!
//! Six fixed agents, each a system prompt (role + goal + backstory) plus a
//! permitted tool subset. The inventory is static; the orchestrator selects
//! one per update via [`agent_for_command`] or the NLP classifier.

use serde::{Deserialize, Serialize};

use crate::domain::{ChatKind, UserContext};

/// The fixed agent inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Primary triage: simple lookups and implicit intents.
    MessageProcessor,
    /// Context-aware help.
    HelpAssistant,
    /// Player-side lookups and self-updates.
    PlayerCoordinator,
    /// Admin actions on players and members.
    TeamAdministrator,
    /// Match and availability flows.
    SquadSelector,
    /// Intent disambiguation for natural language; never mutates state.
    NlpProcessor,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MessageProcessor => f.write_str("message_processor"),
            Self::HelpAssistant => f.write_str("help_assistant"),
            Self::PlayerCoordinator => f.write_str("player_coordinator"),
            Self::TeamAdministrator => f.write_str("team_administrator"),
            Self::SquadSelector => f.write_str("squad_selector"),
            Self::NlpProcessor => f.write_str("nlp_processor"),
        }
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "message_processor" => Ok(Self::MessageProcessor),
            "help_assistant" => Ok(Self::HelpAssistant),
            "player_coordinator" => Ok(Self::PlayerCoordinator),
            "team_administrator" => Ok(Self::TeamAdministrator),
            "squad_selector" => Ok(Self::SquadSelector),
            "nlp_processor" => Ok(Self::NlpProcessor),
            other => Err(format!("unknown agent: {other}")),
        }
    }
}

/// An agent's fixed configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDefinition {
    /// Which agent this is.
    pub kind: AgentKind,
    /// Short role line.
    pub role: &'static str,
    /// What the agent optimizes for.
    pub goal: &'static str,
    /// Backstory used as part of the system prompt.
    pub backstory: &'static str,
    /// Tool names the agent may call.
    pub tools: &'static [&'static str],
}

/// Ground rules appended to every agent's system prompt.
const ANTI_HALLUCINATION_RULES: &str = "\
Ground rules:\n\
- Use only tool outputs as facts. If a tool returns an empty list, say so.\n\
- Never invent player identifiers, phone numbers, match codes, or counts.\n\
- If a tool returns an error, relay its message; do not guess a workaround.\n\
- Reply in plain text only: no markdown, no HTML.";

const DEFINITIONS: &[AgentDefinition] = &[
    AgentDefinition {
        kind: AgentKind::MessageProcessor,
        role: "Team chat assistant",
        goal: "Answer roster and status questions quickly and accurately",
        backstory: "You are the first responder in a football team's chat. You \
                    handle simple lookups (who is on the team, what is my status) \
                    and keep answers short. You have been burned before by made-up \
                    data, so you always check a tool before stating a fact.",
        tools: &[
            "list_team_members_and_players",
            "get_my_status",
            "ping",
            "version",
        ],
    },
    AgentDefinition {
        kind: AgentKind::HelpAssistant,
        role: "Help guide",
        goal: "Show each user exactly the commands available to them in this chat",
        backstory: "You explain how the bot works. Help is chat-aware: players in \
                    the main chat see a different command set than admins in the \
                    leadership chat, and you never advertise a command the current \
                    chat cannot run.",
        tools: &[
            "get_available_commands",
            "get_command_help",
            "get_welcome_message",
            "ping",
            "version",
        ],
    },
    AgentDefinition {
        kind: AgentKind::PlayerCoordinator,
        role: "Player coordinator",
        goal: "Serve player-side lookups and self-service updates",
        backstory: "You look after the players: active-roster listings, individual \
                    status checks, and updates players make to their own record. \
                    You confirm every change by reading the tool result back to \
                    the player.",
        tools: &[
            "get_active_players",
            "get_player_status",
            "get_my_status",
            "update_player_field",
        ],
    },
    AgentDefinition {
        kind: AgentKind::TeamAdministrator,
        role: "Team administrator",
        goal: "Execute leadership actions on the roster precisely and report outcomes",
        backstory: "You are the leadership chat's operator. You add players and \
                    members, approve registrations, correct records, and draft \
                    announcements. Every action goes through a tool and you report \
                    the tool's outcome verbatim, including invite links.",
        tools: &[
            "create_player",
            "create_member",
            "approve_player",
            "update_player_field",
            "update_member_field",
            "list_team_members_and_players",
            "get_my_status",
            "send_announcement",
            "create_poll",
            "send_reminder",
        ],
    },
    AgentDefinition {
        kind: AgentKind::SquadSelector,
        role: "Squad selector",
        goal: "Manage fixtures, availability, and squad selection",
        backstory: "You run matchday logistics: creating fixtures, listing them, \
                    checking who is available, and recording the selected squad. \
                    Selection is a leadership decision; you only record what the \
                    leaders chose.",
        tools: &[
            "list_matches",
            "create_match",
            "get_available_players_for_match",
            "select_squad",
        ],
    },
    AgentDefinition {
        kind: AgentKind::NlpProcessor,
        role: "Intent classifier",
        goal: "Map free-form messages to a command semantic and a specialist agent",
        backstory: "You read a message and decide what the user wants. You never \
                    act on the request yourself and you hold no tools; your only \
                    output is a classification.",
        tools: &[],
    },
];

/// Look up an agent's definition.
pub fn definition(kind: AgentKind) -> &'static AgentDefinition {
    // The inventory is total over AgentKind; the linear scan is six entries.
    DEFINITIONS
        .iter()
        .find(|d| d.kind == kind)
        .unwrap_or(&DEFINITIONS[0])
}

/// All agent definitions.
pub fn definitions() -> &'static [AgentDefinition] {
    DEFINITIONS
}

/// The authoritative command → agent map. Chat-aware entries (`/myinfo`,
/// `/status`, `/list`) route differently per chat. Returns `None` for
/// commands the orchestrator handles without an agent (`/register`).
pub fn agent_for_command(name: &str, chat_kind: ChatKind) -> Option<AgentKind> {
    match name {
        "/help" | "/version" | "/ping" | "/background" => Some(AgentKind::HelpAssistant),
        "/myinfo" | "/status" => Some(match chat_kind {
            ChatKind::Main => AgentKind::MessageProcessor,
            ChatKind::Leadership => AgentKind::TeamAdministrator,
        }),
        "/list" => Some(match chat_kind {
            ChatKind::Main => AgentKind::PlayerCoordinator,
            ChatKind::Leadership => AgentKind::MessageProcessor,
        }),
        "/addplayer" | "/addmember" | "/approve" | "/updateplayer" | "/updatemember" => {
            Some(AgentKind::TeamAdministrator)
        }
        "/update" => Some(AgentKind::PlayerCoordinator),
        "/creatematch" | "/listmatches" | "/selectsquad" => Some(AgentKind::SquadSelector),
        "/announce" | "/poll" | "/remind" => Some(AgentKind::TeamAdministrator),
        _ => None,
    }
}

/// Assemble the system prompt for an agent run.
///
/// The user's identity travels as typed fields here, never interpolated into
/// the task text itself.
pub fn system_prompt(def: &AgentDefinition, ctx: &UserContext) -> String {
    format!(
        "Role: {role}\n\
         Goal: {goal}\n\
         \n\
         {backstory}\n\
         \n\
         {rules}\n\
         \n\
         Requester context:\n\
         - telegram_id: {telegram_id}\n\
         - team_id: {team_id}\n\
         - chat: {chat}\n\
         - classification: {classification}\n\
         - player_id: {player_id}\n\
         - member_id: {member_id}\n\
         \n\
         Permitted tools: {tools}",
        role = def.role,
        goal = def.goal,
        backstory = def.backstory,
        rules = ANTI_HALLUCINATION_RULES,
        telegram_id = ctx.telegram_id,
        team_id = ctx.team_id,
        chat = ctx.chat_kind,
        classification = ctx.classification,
        player_id = ctx.player_id.as_deref().unwrap_or("none"),
        member_id = ctx.member_id.as_deref().unwrap_or("none"),
        tools = if def.tools.is_empty() {
            "none".to_owned()
        } else {
            def.tools.join(", ")
        },
    )
}
