//! Shared test fixtures: scripted LLM, scripted transport, and a fully wired
//! orchestrator over in-memory storage.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use kickai::auth::AuthService;
use kickai::domain::{ChatKind, InboundMessage, Member, Player, Position, SubjectStatus, Team};
use kickai::fleet::{BotTransport, TransportError, TransportUpdate};
use kickai::llm::{ChatRequest, ChatResponse, LlmClient, LlmError, LlmToolCall};
use kickai::orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorDeps};
use kickai::registry::{commands, CommandRegistry, ToolRegistry};
use kickai::services::{InviteService, MatchService, RosterService};
use kickai::storage::memory::InMemoryStorage;
use kickai::storage::{MemberRepository, PlayerRepository, SharedStorage, TeamRepository};
use kickai::tools::{register_all, ToolDeps};

pub const TEAM_ID: &str = "KAI";
pub const MAIN_CHAT: &str = "-100111";
pub const LEAD_CHAT: &str = "-100222";
pub const ADMIN_TG: i64 = 42;
pub const PLAYER_TG: i64 = 700;
pub const INVITE_SECRET: &[u8] = b"integration-test-secret";

// ---------------------------------------------------------------------------
// Scripted LLM
// ---------------------------------------------------------------------------

/// An [`LlmClient`] that replays scripted responses in order. Once the script
/// is exhausted it returns a plain text reply, so agent loops always finish.
pub struct FakeLlm {
    script: Mutex<VecDeque<ChatResponse>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<ChatRequest>>,
}

impl FakeLlm {
    pub fn scripted(responses: Vec<ChatResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A single plain-text reply.
    pub fn text(reply: &str) -> Self {
        Self::scripted(vec![text_response(reply)])
    }

    /// Delay every completion; combined with a paused clock this drives the
    /// deadline tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of completions requested so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        Ok(next.unwrap_or_else(|| text_response("All done.")))
    }

    fn model_id(&self) -> &str {
        "fake/scripted"
    }
}

pub fn text_response(text: &str) -> ChatResponse {
    ChatResponse {
        text: text.to_owned(),
        tool_calls: Vec::new(),
    }
}

pub fn tool_response(name: &str, arguments: Value) -> ChatResponse {
    ChatResponse {
        text: String::new(),
        tool_calls: vec![LlmToolCall {
            id: Some(format!("call_{name}")),
            name: name.to_owned(),
            arguments,
        }],
    }
}

// ---------------------------------------------------------------------------
// Scripted transport
// ---------------------------------------------------------------------------

/// A [`BotTransport`] that serves queued update batches and records every
/// outbound message.
pub struct FakeTransport {
    batches: Mutex<VecDeque<Vec<TransportUpdate>>>,
    sent: Mutex<Vec<(String, String)>>,
}

impl FakeTransport {
    pub fn new(batches: Vec<Vec<TransportUpdate>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Replies sent so far, as `(chat_id, text)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BotTransport for FakeTransport {
    async fn poll(
        &self,
        _offset: Option<i64>,
        _timeout_secs: u32,
    ) -> Result<Vec<TransportUpdate>, TransportError> {
        let next = self.batches.lock().ok().and_then(|mut b| b.pop_front());
        match next {
            Some(batch) => Ok(batch),
            None => {
                // Idle long-poll: keep the worker from spinning.
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), TransportError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((chat_id.to_owned(), text.to_owned()));
        }
        Ok(())
    }
}

pub fn update(update_id: i64, chat_id: &str, telegram_id: i64, text: &str) -> TransportUpdate {
    TransportUpdate {
        update_id,
        chat_id: chat_id.to_owned(),
        telegram_id,
        username: Some(format!("user{telegram_id}")),
        text: Some(text.to_owned()),
    }
}

// ---------------------------------------------------------------------------
// Wired orchestrator harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub storage: Arc<InMemoryStorage>,
    pub orchestrator: Arc<Orchestrator>,
    pub commands: Arc<CommandRegistry>,
    pub tools: Arc<ToolRegistry>,
    pub roster: Arc<RosterService>,
    pub matches: Arc<MatchService>,
    pub invites: Arc<InviteService>,
}

impl Harness {
    /// Process one message as if it arrived in the given chat.
    pub async fn handle(&self, telegram_id: i64, chat_kind: ChatKind, text: &str) -> String {
        let chat_id = match chat_kind {
            ChatKind::Main => MAIN_CHAT,
            ChatKind::Leadership => LEAD_CHAT,
        };
        let msg = InboundMessage {
            telegram_id,
            username: Some(format!("user{telegram_id}")),
            chat_id: chat_id.to_owned(),
            text: text.to_owned(),
        };
        self.orchestrator.handle(&msg, TEAM_ID, chat_kind).await
    }

    /// Insert an active admin member (telegram id [`ADMIN_TG`]).
    pub async fn seed_admin(&self) {
        self.storage
            .insert_member(&Member {
                member_id: "M01JK".to_owned(),
                team_id: TEAM_ID.to_owned(),
                telegram_id: Some(ADMIN_TG),
                name: "Coach".to_owned(),
                phone: "+447000000001".to_owned(),
                role: "coach".to_owned(),
                is_admin: true,
                status: SubjectStatus::Active,
                created_at: Utc::now(),
            })
            .await
            .expect("seed admin");
    }

    /// Insert an active player (telegram id [`PLAYER_TG`], code `01JS`).
    pub async fn seed_player(&self) {
        self.storage
            .insert_player(&Player {
                player_id: "01JS".to_owned(),
                team_id: TEAM_ID.to_owned(),
                telegram_id: Some(PLAYER_TG),
                name: "John Smith".to_owned(),
                phone: "+447111222333".to_owned(),
                email: None,
                emergency_contact: None,
                position: Position::Striker,
                status: SubjectStatus::Active,
                created_at: Utc::now(),
            })
            .await
            .expect("seed player");
    }
}

/// Build a fully wired orchestrator over in-memory storage and the given LLM.
pub async fn harness_with(llm: Arc<dyn LlmClient>, deadline: Duration) -> Harness {
    harness_inner(llm, deadline, true).await
}

/// Like [`harness_with`], but with the registries left unpopulated to
/// exercise the fail-fast guard.
pub async fn harness_without_registries(llm: Arc<dyn LlmClient>) -> Harness {
    harness_inner(llm, Duration::from_secs(30), false).await
}

async fn harness_inner(
    llm: Arc<dyn LlmClient>,
    deadline: Duration,
    populate: bool,
) -> Harness {
    let storage = Arc::new(InMemoryStorage::new());
    storage
        .upsert_team(&Team {
            team_id: TEAM_ID.to_owned(),
            name: "Kick AI FC".to_owned(),
            main_chat_id: MAIN_CHAT.to_owned(),
            leadership_chat_id: LEAD_CHAT.to_owned(),
            disabled: false,
            created_at: Utc::now(),
        })
        .await
        .expect("seed team");

    let shared: SharedStorage = storage.clone();
    let invites = Arc::new(InviteService::new(
        shared.clone(),
        INVITE_SECRET,
        72,
        "https://kickai.app/join".to_owned(),
    ));
    let roster = Arc::new(RosterService::new(shared.clone(), Arc::clone(&invites)));
    let matches = Arc::new(MatchService::new(shared.clone()));

    let command_registry = Arc::new(CommandRegistry::new());
    let tool_registry = Arc::new(ToolRegistry::new());
    if populate {
        command_registry
            .populate(commands::default_inventory())
            .expect("populate commands");
        register_all(
            &tool_registry,
            &ToolDeps {
                roster: Arc::clone(&roster),
                matches: Arc::clone(&matches),
                invites: Arc::clone(&invites),
                commands: Arc::clone(&command_registry),
            },
        )
        .expect("populate tools");
    }

    let orchestrator = Arc::new(Orchestrator::new(OrchestratorDeps {
        commands: Arc::clone(&command_registry),
        tools: Arc::clone(&tool_registry),
        llm,
        auth: AuthService::new(shared.clone()),
        roster: Arc::clone(&roster),
        invites: Arc::clone(&invites),
        storage: shared,
        config: OrchestratorConfig {
            deadline,
            ..OrchestratorConfig::default()
        },
    }));

    Harness {
        storage,
        orchestrator,
        commands: command_registry,
        tools: tool_registry,
        roster,
        matches,
        invites,
    }
}

/// Harness with a default 30 s deadline.
pub async fn harness(llm: Arc<dyn LlmClient>) -> Harness {
    harness_with(llm, Duration::from_secs(30)).await
}
