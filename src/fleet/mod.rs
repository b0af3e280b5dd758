//! Fleet manager: one supervisor per team, two bot workers per supervisor.
//!
//! Each worker long-polls its bot connection and processes updates strictly
//! in order, so per-chat FIFO falls out of the loop structure. Crashing
//! workers are restarted with exponential backoff and jitter; repeated
//! failures escalate to a team-level alert log. Shutdown drains in-flight
//! updates before the workers exit.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use rand::Rng;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::domain::{ChatKind, InboundMessage, Team};
use crate::orchestrator::Orchestrator;
use crate::registry::{CommandRegistry, ToolRegistry};

pub mod transport;

pub use transport::{BotTransport, TelegramTransport, TransportError, TransportUpdate};

/// Initial restart backoff.
const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Restart backoff cap.
const MAX_BACKOFF_MS: u64 = 60_000;

/// Failure window for the escalation alert.
const FAILURE_WINDOW: Duration = Duration::from_secs(300);

/// Consecutive failures within the window that trigger a team alert.
const FAILURE_ALERT_THRESHOLD: usize = 5;

/// Fleet startup errors.
#[derive(Debug, Error)]
pub enum FleetError {
    /// The registries were not sealed before the fleet was started.
    #[error("registries must be populated before the fleet accepts updates")]
    RegistriesUninitialized,
    /// No teams configured.
    #[error("no teams configured")]
    NoTeams,
}

/// In-memory `chat_id → (team_id, chat_kind)` routing table. Read-mostly;
/// writes happen only during team provisioning.
#[derive(Debug, Default)]
pub struct RoutingTable {
    inner: RwLock<HashMap<String, (String, ChatKind)>>,
}

impl RoutingTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or refresh) a team's two chats.
    pub fn insert_team(&self, team: &Team) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(
                team.main_chat_id.clone(),
                (team.team_id.clone(), ChatKind::Main),
            );
            map.insert(
                team.leadership_chat_id.clone(),
                (team.team_id.clone(), ChatKind::Leadership),
            );
        }
    }

    /// Drop a team's chats (team disabled or deprovisioned).
    pub fn remove_team(&self, team_id: &str) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|_, (tid, _)| tid != team_id);
        }
    }

    /// Resolve a chat to its team and kind.
    pub fn resolve(&self, chat_id: &str) -> Option<(String, ChatKind)> {
        self.inner
            .read()
            .ok()
            .and_then(|map| map.get(chat_id).cloned())
    }

    /// Number of routed chats.
    pub fn len(&self) -> usize {
        self.inner.read().map(|map| map.len()).unwrap_or(0)
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The two bot connections of one team.
pub struct TeamBots {
    /// Owning team.
    pub team_id: String,
    /// Transport for the players' chat bot.
    pub main: Arc<dyn BotTransport>,
    /// Transport for the staff chat bot.
    pub leadership: Arc<dyn BotTransport>,
}

impl std::fmt::Debug for TeamBots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeamBots")
            .field("team_id", &self.team_id)
            .finish_non_exhaustive()
    }
}

/// Owns every team's bot workers and their lifecycle.
pub struct FleetManager {
    orchestrator: Arc<Orchestrator>,
    routing: Arc<RoutingTable>,
    commands: Arc<CommandRegistry>,
    tools: Arc<ToolRegistry>,
    teams: Vec<TeamBots>,
    poll_timeout_secs: u32,
}

impl FleetManager {
    /// Wire the fleet.
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        routing: Arc<RoutingTable>,
        commands: Arc<CommandRegistry>,
        tools: Arc<ToolRegistry>,
        teams: Vec<TeamBots>,
        poll_timeout_secs: u32,
    ) -> Self {
        Self {
            orchestrator,
            routing,
            commands,
            tools,
            teams,
            poll_timeout_secs,
        }
    }

    /// Run every team's workers until `shutdown` flips to `true`, then drain
    /// and return.
    ///
    /// # Errors
    ///
    /// Refuses to start if the registries are not sealed -- accepting updates
    /// without them would violate the fail-fast policy.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), FleetError> {
        if !self.commands.is_initialized() || !self.tools.is_initialized() {
            return Err(FleetError::RegistriesUninitialized);
        }
        if self.teams.is_empty() {
            return Err(FleetError::NoTeams);
        }

        info!(
            teams = self.teams.len(),
            chats = self.routing.len(),
            "fleet starting"
        );

        let mut workers = JoinSet::new();
        for team in self.teams {
            for (chat_kind, transport) in [
                (ChatKind::Main, Arc::clone(&team.main)),
                (ChatKind::Leadership, Arc::clone(&team.leadership)),
            ] {
                workers.spawn(supervise_worker(WorkerHandle {
                    team_id: team.team_id.clone(),
                    chat_kind,
                    transport,
                    orchestrator: Arc::clone(&self.orchestrator),
                    routing: Arc::clone(&self.routing),
                    poll_timeout_secs: self.poll_timeout_secs,
                    shutdown: shutdown.clone(),
                }));
            }
        }

        while workers.join_next().await.is_some() {}
        info!("fleet stopped");
        Ok(())
    }
}

/// Everything one bot worker needs.
struct WorkerHandle {
    team_id: String,
    chat_kind: ChatKind,
    transport: Arc<dyn BotTransport>,
    orchestrator: Arc<Orchestrator>,
    routing: Arc<RoutingTable>,
    poll_timeout_secs: u32,
    shutdown: watch::Receiver<bool>,
}

/// Restart-with-backoff supervisor around one bot worker.
async fn supervise_worker(mut handle: WorkerHandle) {
    let mut backoff_ms = INITIAL_BACKOFF_MS;
    let mut failures: VecDeque<Instant> = VecDeque::new();

    loop {
        match run_worker(&mut handle).await {
            Ok(()) => {
                info!(
                    team_id = %handle.team_id,
                    chat = %handle.chat_kind,
                    "bot worker drained and stopped"
                );
                return;
            }
            Err(e) => {
                let now = Instant::now();
                failures.push_back(now);
                while failures
                    .front()
                    .is_some_and(|t| now.duration_since(*t) > FAILURE_WINDOW)
                {
                    failures.pop_front();
                }
                if failures.len() >= FAILURE_ALERT_THRESHOLD {
                    error!(
                        alert = true,
                        team_id = %handle.team_id,
                        chat = %handle.chat_kind,
                        failures = failures.len(),
                        "bot worker failing repeatedly, team needs attention"
                    );
                    failures.clear();
                }

                let sleep_ms = with_jitter(backoff_ms);
                warn!(
                    team_id = %handle.team_id,
                    chat = %handle.chat_kind,
                    error = %e,
                    backoff_ms = sleep_ms,
                    "bot worker crashed, restarting"
                );

                // Back off, but leave immediately on shutdown.
                let sleep = tokio::time::sleep(Duration::from_millis(sleep_ms));
                tokio::select! {
                    _ = sleep => {}
                    _ = handle.shutdown.changed() => {}
                }
                if *handle.shutdown.borrow() {
                    return;
                }
                backoff_ms = backoff_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
            }
        }
    }
}

/// ±20% jitter on a backoff, integer arithmetic only.
fn with_jitter(backoff_ms: u64) -> u64 {
    let base = backoff_ms.saturating_mul(4).checked_div(5).unwrap_or(0);
    let span = backoff_ms.saturating_mul(2).checked_div(5).unwrap_or(0);
    if span == 0 {
        return backoff_ms;
    }
    base.saturating_add(rand::thread_rng().gen_range(0..=span))
}

/// One bot worker: poll, process sequentially, reply. Returns `Ok(())` on
/// graceful shutdown, `Err` on transport failure (the supervisor restarts).
async fn run_worker(handle: &mut WorkerHandle) -> Result<(), TransportError> {
    let mut offset: Option<i64> = None;

    info!(
        team_id = %handle.team_id,
        chat = %handle.chat_kind,
        "bot worker started"
    );

    loop {
        if *handle.shutdown.borrow() {
            return Ok(());
        }

        let transport = Arc::clone(&handle.transport);
        let poll = transport.poll(offset, handle.poll_timeout_secs);
        let updates = tokio::select! {
            result = poll => result?,
            _ = handle.shutdown.changed() => return Ok(()),
        };

        // The batch in hand is drained even if shutdown flips mid-way; no
        // new poll is issued afterwards.
        for update in updates {
            offset = Some(update.update_id.saturating_add(1));

            let Some(text) = update.text else {
                debug!(chat_id = %update.chat_id, "ignoring textless update");
                continue;
            };
            if text.trim().is_empty() {
                debug!(chat_id = %update.chat_id, "ignoring empty message");
                continue;
            }

            let Some((team_id, chat_kind)) = handle.routing.resolve(&update.chat_id) else {
                debug!(chat_id = %update.chat_id, "update from unrouted chat, ignoring");
                continue;
            };

            let msg = InboundMessage {
                telegram_id: update.telegram_id,
                username: update.username,
                chat_id: update.chat_id.clone(),
                text,
            };

            // Strict per-chat FIFO: the reply for update N is sent before
            // update N+1 is read.
            let reply = handle.orchestrator.handle(&msg, &team_id, chat_kind).await;
            if !reply.is_empty() {
                if let Err(e) = handle.transport.send_text(&update.chat_id, &reply).await {
                    error!(
                        chat_id = %update.chat_id,
                        error = %e,
                        "failed to send reply"
                    );
                }
            }
        }
    }
}
