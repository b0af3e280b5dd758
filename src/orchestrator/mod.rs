//! The routing and execution pipeline.
//!
//! One inbound update goes through: registry guards, identity resolution,
//! first-user bootstrap, unregistered-user handling (including invite
//! redemption), command detection with permission and chat-scope checks or
//! the natural-language path, agent invocation under a wall-clock deadline,
//! tool-output capture, and plain-text formatting.
//!
//! State machine per update:
//! `received → authorized → routed → executing* → completed | denied |
//! timed_out | failed`, with one structured log record per terminal state.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::agents::{self, AgentKind};
use crate::auth::{permission_allows, AuthService};
use crate::domain::{ChatKind, Classification, InboundMessage, UserContext};
use crate::envelope::ToolEnvelope;
use crate::errors::ErrorKind;
use crate::format;
use crate::llm::{ChatMessage, ChatRequest, LlmClient};
use crate::registry::commands::CommandPermission;
use crate::registry::{CommandDescriptor, CommandRegistry, ToolContext, ToolRegistry};
use crate::services::{InviteService, RosterService};
use crate::storage::{CommandAuditEntry, CommandAuditRepository, SharedStorage};

pub mod nlp;

/// Canned reply when a structural prerequisite is missing.
pub const SYSTEM_UNAVAILABLE_REPLY: &str =
    "Sorry, the bot is temporarily unavailable. Please try again shortly.";

/// Canned reply when the per-update deadline expires.
pub const TIMED_OUT_REPLY: &str =
    "Sorry, that took too long to process. Please try again.";

/// Canned reply when the LLM or storage is unreachable.
pub const DEPENDENCY_REPLY: &str =
    "Sorry, a backing service is unreachable right now. Please retry in a moment.";

/// Canned reply when a data-backed answer could not be verified.
pub const UNVERIFIED_REPLY: &str =
    "I couldn't verify that against the team data just now. Please try again.";

/// Canned prompt for the first user of an empty leadership chat.
pub const FIRST_USER_PROMPT: &str = "\
This team has no registered admins yet. Register yourself as the first admin:\n\
/register NAME PHONE ROLE\n\
Example: /register John Smith +447000000000 \"Team Manager\"";

/// Terminal state of one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A reply was produced normally.
    Completed,
    /// An authorization or chat-scope check rejected the request.
    Denied,
    /// The per-update deadline expired.
    TimedOut,
    /// The LLM, a tool, or the data-backing guard failed.
    Failed,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Denied => f.write_str("denied"),
            Self::TimedOut => f.write_str("timed_out"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// The result of processing one update, before formatting.
#[derive(Debug)]
struct Turn {
    reply: String,
    outcome: Outcome,
    agent: Option<AgentKind>,
    tools_invoked: usize,
}

impl Turn {
    fn completed(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            outcome: Outcome::Completed,
            agent: None,
            tools_invoked: 0,
        }
    }

    fn denied(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            outcome: Outcome::Denied,
            agent: None,
            tools_invoked: 0,
        }
    }

    fn failed(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            outcome: Outcome::Failed,
            agent: None,
            tools_invoked: 0,
        }
    }
}

/// Tunables for agent execution.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Wall-clock budget per update.
    pub deadline: Duration,
    /// Maximum LLM tool-use rounds per agent run.
    pub max_tool_rounds: usize,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens per LLM reply.
    pub max_tokens: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(30),
            max_tool_rounds: 4,
            temperature: 0.3,
            max_tokens: 2048,
        }
    }
}

/// Everything the orchestrator is wired with at startup.
pub struct OrchestratorDeps {
    /// Sealed command catalog.
    pub commands: Arc<CommandRegistry>,
    /// Sealed tool catalog.
    pub tools: Arc<ToolRegistry>,
    /// Chat-completion backend.
    pub llm: Arc<dyn LlmClient>,
    /// Roster-backed identity resolution.
    pub auth: AuthService,
    /// Player/member operations.
    pub roster: Arc<RosterService>,
    /// Invite issue/redeem operations.
    pub invites: Arc<InviteService>,
    /// Storage handle for the command audit log.
    pub storage: SharedStorage,
    /// Execution tunables.
    pub config: OrchestratorConfig,
}

/// The routing and execution component (one per process, shared by all
/// fleet workers).
pub struct Orchestrator {
    commands: Arc<CommandRegistry>,
    tools: Arc<ToolRegistry>,
    llm: Arc<dyn LlmClient>,
    auth: AuthService,
    roster: Arc<RosterService>,
    invites: Arc<InviteService>,
    storage: SharedStorage,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Wire the orchestrator.
    pub fn new(deps: OrchestratorDeps) -> Self {
        Self {
            commands: deps.commands,
            tools: deps.tools,
            llm: deps.llm,
            auth: deps.auth,
            roster: deps.roster,
            invites: deps.invites,
            storage: deps.storage,
            config: deps.config,
        }
    }

    /// Process one inbound update and produce the reply text.
    ///
    /// Always returns something sendable; failures map to canned replies.
    pub async fn handle(
        &self,
        msg: &InboundMessage,
        team_id: &str,
        chat_kind: ChatKind,
    ) -> String {
        // Fail-fast guard: no update is processed without sealed registries.
        if !self.commands.is_initialized() || !self.tools.is_initialized() {
            error!(
                critical = true,
                team_id,
                "registries uninitialized while updates are flowing"
            );
            return SYSTEM_UNAVAILABLE_REPLY.to_owned();
        }

        let command_name = parse_command_name(&msg.text);

        // The per-update deadline starts here and propagates: every LLM
        // request below gets the *remaining* budget as its client timeout.
        let started = Instant::now();

        let ctx = match self
            .auth
            .resolve(msg.telegram_id, msg.username.as_deref(), team_id, chat_kind)
            .await
        {
            Ok(ctx) => ctx,
            Err(e) => {
                error!(team_id, error = %e, "identity resolution failed");
                return DEPENDENCY_REPLY.to_owned();
            }
        };

        let turn = match tokio::time::timeout(
            self.config.deadline.saturating_sub(started.elapsed()),
            self.route(msg, &ctx, started),
        )
        .await
        {
            Ok(turn) => turn,
            Err(_) => {
                warn!(
                    kind = %ErrorKind::TimedOut,
                    team_id,
                    deadline_secs = self.config.deadline.as_secs(),
                    "update deadline expired, in-flight work cancelled"
                );
                Turn {
                    reply: TIMED_OUT_REPLY.to_owned(),
                    outcome: Outcome::TimedOut,
                    agent: None,
                    tools_invoked: 0,
                }
            }
        };

        self.finish(&ctx, command_name.as_deref(), turn)
    }

    /// Terminal bookkeeping: one structured log record, best-effort audit,
    /// sanitized reply.
    fn finish(&self, ctx: &UserContext, command: Option<&str>, turn: Turn) -> String {
        info!(
            team_id = %ctx.team_id,
            telegram_id = ctx.telegram_id,
            chat = %ctx.chat_kind,
            classification = %ctx.classification,
            command = command.unwrap_or("-"),
            agent = %turn.agent.map(|a| a.to_string()).unwrap_or_else(|| "-".to_owned()),
            outcome = %turn.outcome,
            tools_invoked = turn.tools_invoked,
            "update processed"
        );

        if let Some(command) = command {
            let entry = CommandAuditEntry {
                team_id: ctx.team_id.clone(),
                telegram_id: ctx.telegram_id,
                command: command.to_owned(),
                outcome: turn.outcome.to_string(),
                at: Utc::now(),
            };
            let storage = Arc::clone(&self.storage);
            tokio::spawn(async move {
                if let Err(e) = storage.append_audit(&entry).await {
                    warn!(error = %e, "command audit append failed (best-effort)");
                }
            });
        }

        format::sanitize_plain_text(&turn.reply)
    }

    /// Time left of the per-update budget started at `started`.
    fn remaining(&self, started: Instant) -> Duration {
        self.config.deadline.saturating_sub(started.elapsed())
    }

    async fn route(&self, msg: &InboundMessage, ctx: &UserContext, started: Instant) -> Turn {
        // First-user bootstrap: an empty leadership chat only accepts
        // /register until the founding admin exists.
        if ctx.chat_kind == ChatKind::Leadership {
            match self.roster.member_count(&ctx.team_id).await {
                Ok(0) => return self.bootstrap_first_admin(msg, ctx).await,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "member count unavailable");
                    return Turn::failed(DEPENDENCY_REPLY);
                }
            }
        }

        // Unregistered senders never reach an agent; the only tool-adjacent
        // path open to them is invite redemption in the main chat.
        if ctx.classification == Classification::Unregistered {
            return self.handle_unregistered(msg, ctx).await;
        }

        match parse_command_name(&msg.text) {
            Some(command) => self.handle_command(msg, ctx, &command, started).await,
            None => self.handle_natural_language(msg, ctx, started).await,
        }
    }

    // ------------------------------------------------------------------
    // Bootstrap & unregistered paths
    // ------------------------------------------------------------------

    async fn bootstrap_first_admin(&self, msg: &InboundMessage, ctx: &UserContext) -> Turn {
        if parse_command_name(&msg.text).as_deref() != Some("/register") {
            return Turn::completed(FIRST_USER_PROMPT);
        }

        let rest = msg
            .text
            .trim()
            .split_once(char::is_whitespace)
            .map(|(_, rest)| rest)
            .unwrap_or("");
        let (name, phone, role) = match parse_register_args(rest) {
            Ok(parts) => parts,
            Err(usage) => return Turn::completed(usage),
        };

        match self
            .roster
            .register_first_admin(&ctx.team_id, ctx.telegram_id, &name, &phone, &role)
            .await
        {
            Ok(member) => Turn::completed(format!(
                "Welcome, {}! You are registered as {} and are this team's first admin. \
                 Use /help to see what you can do from here.",
                member.name, member.member_id
            )),
            Err(e) => Turn::failed(e.message),
        }
    }

    async fn handle_unregistered(&self, msg: &InboundMessage, ctx: &UserContext) -> Turn {
        // A token is honored in whichever chat the invite targets; the
        // invite service rejects presentation in the wrong chat.
        if let Some(token) = InviteService::extract_token(&msg.text) {
            return match self
                .invites
                .redeem(&token, ctx.telegram_id, &ctx.team_id, ctx.chat_kind, Utc::now())
                .await
            {
                Ok(redeemed) => Turn::completed(format!(
                    "Welcome to the team, {}! You are registered as {} and ready to go. \
                     Try /myinfo to see your record.",
                    redeemed.name, redeemed.subject_id
                )),
                Err(e) => {
                    debug!(kind = %e.kind, "invite redemption rejected");
                    Turn::failed(e.envelope().message)
                }
            };
        }

        let guidance = match ctx.chat_kind {
            ChatKind::Main => {
                "You are not registered with this team yet. Ask a team admin to add you \
                 with /addplayer; they will send you an invite link to post here."
            }
            ChatKind::Leadership => {
                "You are not registered with this team's leadership. Ask an existing admin \
                 to add you with /addmember."
            }
        };
        Turn::completed(guidance)
    }

    // ------------------------------------------------------------------
    // Command path
    // ------------------------------------------------------------------

    async fn handle_command(
        &self,
        msg: &InboundMessage,
        ctx: &UserContext,
        name: &str,
        started: Instant,
    ) -> Turn {
        // /register outside bootstrap is handled without an agent.
        if name == "/register" {
            return Turn::completed(
                "This team is already set up. Ask an existing admin to add you with \
                 /addmember if you need access.",
            );
        }

        let descriptor = match self.commands.get(name) {
            Ok(Some(descriptor)) => descriptor.clone(),
            Ok(None) => return self.unknown_command(name, ctx),
            Err(e) => {
                error!(critical = true, error = %e, "command registry unreadable");
                return Turn::failed(SYSTEM_UNAVAILABLE_REPLY);
            }
        };

        if !descriptor.scope.admits(ctx.chat_kind) {
            let home = descriptor
                .scope
                .home_chat()
                .map(ChatKind::display_name)
                .unwrap_or("other chat");
            return Turn::denied(format!(
                "Denied: {} can only be used in the {home}.",
                descriptor.name
            ));
        }

        if !permission_allows(descriptor.permission, ctx.classification, ctx.chat_kind) {
            return Turn::denied(permission_denial(&descriptor));
        }

        let Some(agent) = agents::agent_for_command(name, ctx.chat_kind) else {
            debug!(command = name, "command has no agent mapping");
            return self.unknown_command(name, ctx);
        };

        self.run_agent(agent, ctx, &msg.text, Some(&descriptor), None, started)
            .await
    }

    fn unknown_command(&self, name: &str, ctx: &UserContext) -> Turn {
        debug!(kind = %ErrorKind::UnknownCommand, command = name, "unrecognized command");
        let groups = match self.commands.grouped_for_chat(ctx.chat_kind) {
            Ok(groups) => groups,
            Err(e) => {
                error!(critical = true, error = %e, "command registry unreadable");
                return Turn::failed(SYSTEM_UNAVAILABLE_REPLY);
            }
        };

        let mut lines = vec![
            format!("Unrecognized Command: {name}"),
            String::new(),
            format!(
                "Commands available in the {}:",
                ctx.chat_kind.display_name()
            ),
        ];
        for (feature, descriptors) in groups {
            lines.push(String::new());
            lines.push(format!("{feature}:"));
            for descriptor in descriptors {
                lines.push(format!("  {} - {}", descriptor.name, descriptor.description));
            }
        }
        Turn::completed(lines.join("\n"))
    }

    // ------------------------------------------------------------------
    // Natural-language path
    // ------------------------------------------------------------------

    async fn handle_natural_language(
        &self,
        msg: &InboundMessage,
        ctx: &UserContext,
        started: Instant,
    ) -> Turn {
        let intent = match nlp::classify(
            self.llm.as_ref(),
            ctx,
            &msg.text,
            self.config.temperature,
            self.remaining(started),
        )
        .await
        {
            Ok(intent) => intent,
            Err(e) => {
                warn!(error = %e, "nlp classification failed");
                return Turn::failed(DEPENDENCY_REPLY);
            }
        };

        // A recognized command semantic goes through the same permission
        // checks as if the command had been typed.
        if let Some(command) = intent.command.as_deref() {
            if let Ok(Some(descriptor)) = self.commands.get(command) {
                let descriptor = descriptor.clone();
                if !descriptor.scope.admits(ctx.chat_kind) {
                    let home = descriptor
                        .scope
                        .home_chat()
                        .map(ChatKind::display_name)
                        .unwrap_or("other chat");
                    return Turn::denied(format!(
                        "Denied: that request maps to {}, which can only be used in the {home}.",
                        descriptor.name
                    ));
                }
                if !permission_allows(descriptor.permission, ctx.classification, ctx.chat_kind) {
                    return Turn::denied(permission_denial(&descriptor));
                }
                if let Some(agent) = agents::agent_for_command(command, ctx.chat_kind) {
                    return self
                        .run_agent(
                            agent,
                            ctx,
                            &msg.text,
                            Some(&descriptor),
                            Some(&intent.parameters),
                            started,
                        )
                        .await;
                }
            }
        }

        self.run_agent(
            intent.agent,
            ctx,
            &msg.text,
            None,
            Some(&intent.parameters),
            started,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Agent invocation
    // ------------------------------------------------------------------

    async fn run_agent(
        &self,
        kind: AgentKind,
        ctx: &UserContext,
        user_text: &str,
        command: Option<&CommandDescriptor>,
        parameters: Option<&Value>,
        started: Instant,
    ) -> Turn {
        let definition = agents::definition(kind);
        let system = agents::system_prompt(definition, ctx);

        let catalog = match self.tools.definitions_for(definition.tools) {
            Ok(catalog) => catalog,
            Err(e) => {
                error!(critical = true, error = %e, "tool registry unreadable");
                return Turn::failed(SYSTEM_UNAVAILABLE_REPLY);
            }
        };

        let tool_ctx = ToolContext {
            telegram_id: ctx.telegram_id,
            team_id: ctx.team_id.clone(),
            username: ctx.display_name.clone(),
            chat_kind: ctx.chat_kind,
        };

        let mut task = format!("User message: {user_text}");
        if let Some(descriptor) = command {
            task.push_str(&format!("\nCommand: {}", descriptor.name));
        }
        if let Some(params) = parameters {
            if params.as_object().is_some_and(|o| !o.is_empty()) {
                task.push_str(&format!("\nExtracted parameters: {params}"));
            }
        }
        task.push_str("\nRespond to the user now. Every factual claim must come from a tool result.");

        debug!(agent = %kind, "agent run starting");

        let mut messages = vec![ChatMessage::user(task)];
        let mut invoked: Vec<String> = Vec::new();
        let mut last_envelope: Option<ToolEnvelope> = None;
        let mut final_text = String::new();

        for round in 0..=self.config.max_tool_rounds {
            let request = ChatRequest {
                system: system.clone(),
                messages: messages.clone(),
                tools: catalog.clone(),
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
                timeout: self.remaining(started),
            };

            let response = match self.llm.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(agent = %kind, error = %e, "llm completion failed");
                    return Turn {
                        reply: DEPENDENCY_REPLY.to_owned(),
                        outcome: Outcome::Failed,
                        agent: Some(kind),
                        tools_invoked: invoked.len(),
                    };
                }
            };

            if response.tool_calls.is_empty() || round == self.config.max_tool_rounds {
                final_text = response.text;
                break;
            }

            messages.push(ChatMessage::assistant(if response.text.trim().is_empty() {
                "Using tools.".to_owned()
            } else {
                response.text.clone()
            }));

            for call in &response.tool_calls {
                let envelope = if definition.tools.contains(&call.name.as_str()) {
                    match self
                        .tools
                        .invoke(&call.name, tool_ctx.clone(), call.arguments.clone())
                        .await
                    {
                        Ok(envelope) => envelope,
                        Err(e) => {
                            error!(critical = true, error = %e, "tool registry unreadable");
                            return Turn::failed(SYSTEM_UNAVAILABLE_REPLY);
                        }
                    }
                } else {
                    // The agent asked for a tool outside its set; surfaced as
                    // an envelope so it can recover in the next round.
                    ToolEnvelope::error(
                        ErrorKind::Denied,
                        format!("Tool {} is not available to this agent.", call.name),
                    )
                };

                debug!(agent = %kind, tool = %call.name, success = envelope.is_success(), "tool invoked");
                invoked.push(call.name.clone());
                messages.push(ChatMessage::tool(format!(
                    "Result of {}: {}",
                    call.name,
                    envelope.to_json()
                )));
                last_envelope = Some(envelope);
            }
        }

        if final_text.trim().is_empty() {
            final_text = last_envelope
                .as_ref()
                .map(|envelope| envelope.message.clone())
                .unwrap_or_else(|| "Done.".to_owned());
        }

        // Hallucination guard: a data-requiring command must be backed by at
        // least one data-producing tool invocation. The allow-list is the
        // registry's own flag, so legitimate tools never trip this.
        if command.is_some_and(|d| d.requires_data)
            && !invoked.iter().any(|name| self.tools.is_data_tool(name))
        {
            warn!(agent = %kind, "reply for data command had no data tool backing");
            return Turn {
                reply: UNVERIFIED_REPLY.to_owned(),
                outcome: Outcome::Failed,
                agent: Some(kind),
                tools_invoked: invoked.len(),
            };
        }

        Turn {
            reply: final_text,
            outcome: Outcome::Completed,
            agent: Some(kind),
            tools_invoked: invoked.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Extract the slash command from the first token, if any. Handles the
/// `@botname` suffix Telegram appends in group chats.
fn parse_command_name(text: &str) -> Option<String> {
    let first = text.trim().split_whitespace().next()?;
    if !first.starts_with('/') {
        return None;
    }
    let name = first.split('@').next().unwrap_or(first);
    Some(name.to_lowercase())
}

/// Parse `/register NAME PHONE ROLE` arguments. The phone token is the
/// anchor: words before it are the name, words after it the role (quotes
/// optional).
fn parse_register_args(rest: &str) -> Result<(String, String, String), String> {
    const USAGE: &str = "Usage: /register NAME PHONE ROLE\n\
                         Example: /register John Smith +447000000000 \"Team Manager\"";

    let tokens = split_quoted(rest);
    let phone_idx = tokens.iter().position(|t| t.starts_with('+'));

    let Some(phone_idx) = phone_idx else {
        return Err(USAGE.to_owned());
    };
    let name = tokens.get(..phone_idx).unwrap_or_default().join(" ");
    if name.is_empty() {
        return Err(USAGE.to_owned());
    }
    let phone = tokens
        .get(phone_idx)
        .cloned()
        .unwrap_or_default();
    let role = tokens
        .get(phone_idx.saturating_add(1)..)
        .unwrap_or_default()
        .join(" ");

    Ok((name, phone, role))
}

/// Split a string on whitespace, honoring double-quoted segments.
fn split_quoted(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in text.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn permission_denial(descriptor: &CommandDescriptor) -> String {
    match descriptor.permission {
        CommandPermission::Admin => format!(
            "Denied: {} requires admin access in the leadership chat.",
            descriptor.name
        ),
        CommandPermission::Leader => format!(
            "Denied: {} requires leadership access in the leadership chat.",
            descriptor.name
        ),
        CommandPermission::Player => format!(
            "Denied: {} is only available to registered players and members.",
            descriptor.name
        ),
        CommandPermission::Public => format!("Denied: {} is not available.", descriptor.name),
    }
}
