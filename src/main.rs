//! KICKAI binary: configuration, wiring, and the fleet lifecycle.
//!
//! Startup is fail-fast: bad configuration, unreachable storage, or a
//! registry that cannot be populated exits non-zero before any update is
//! accepted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};

use kickai::auth::AuthService;
use kickai::config::{KickaiConfig, LlmProvider};
use kickai::domain::Team;
use kickai::fleet::{FleetManager, RoutingTable, TeamBots, TelegramTransport};
use kickai::llm::anthropic::AnthropicClient;
use kickai::llm::ollama::OllamaClient;
use kickai::llm::LlmClient;
use kickai::orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorDeps};
use kickai::registry::{commands, CommandRegistry, ToolRegistry};
use kickai::services::{InviteService, MatchService, RosterService};
use kickai::storage::sqlite::SqliteStorage;
use kickai::storage::{SharedStorage, TeamRepository};
use kickai::tools::{register_all, ToolDeps};

/// Long-poll timeout handed to `getUpdates`.
const POLL_TIMEOUT_SECS: u32 = 30;

#[derive(Parser)]
#[command(name = "kickai", about = "Multi-tenant Telegram bot for football team management")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot fleet.
    Start {
        /// Config file path (default: ./kickai.toml or $KICKAI_CONFIG_PATH).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate the configuration and exit.
    CheckConfig {
        /// Config file path (default: ./kickai.toml or $KICKAI_CONFIG_PATH).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config } => start(load_config(config)?).await,
        Commands::CheckConfig { config } => {
            kickai::logging::init_cli();
            let config = load_config(config)?;
            config.validate()?;
            println!(
                "configuration ok: {} team(s), llm {:?}/{}",
                config.teams.len(),
                config.llm.provider,
                config.llm.model
            );
            Ok(())
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<KickaiConfig> {
    match path {
        Some(path) => {
            let mut config = KickaiConfig::load_from(&path)?;
            config.apply_overrides(|key| std::env::var(key).ok());
            Ok(config)
        }
        None => KickaiConfig::load(),
    }
}

async fn start(config: KickaiConfig) -> Result<()> {
    config.validate().context("configuration invalid")?;

    let log_level = if config.log_level.is_empty() {
        "info"
    } else {
        &config.log_level
    };
    let _logging = kickai::logging::init_production(
        &PathBuf::from(&config.storage.logs_dir),
        log_level,
    )?;

    info!(version = env!("CARGO_PKG_VERSION"), "kickai starting");

    // Storage must be reachable before anything else is wired.
    let storage: SharedStorage = Arc::new(
        SqliteStorage::open(&PathBuf::from(&config.storage.db_path))
            .await
            .context("storage unreachable at startup")?,
    );

    // Seed team rows and the routing table from configuration.
    let routing = Arc::new(RoutingTable::new());
    for team_config in &config.teams {
        let team = match storage.team(&team_config.team_id).await? {
            Some(mut existing) => {
                existing.name = team_config.name.clone();
                existing.main_chat_id = team_config.main_chat_id.clone();
                existing.leadership_chat_id = team_config.leadership_chat_id.clone();
                existing
            }
            None => Team {
                team_id: team_config.team_id.clone(),
                name: team_config.name.clone(),
                main_chat_id: team_config.main_chat_id.clone(),
                leadership_chat_id: team_config.leadership_chat_id.clone(),
                disabled: false,
                created_at: chrono::Utc::now(),
            },
        };
        storage.upsert_team(&team).await?;
        if !team.disabled {
            routing.insert_team(&team);
        }
    }

    // Registries: populated exactly once, before the fleet starts.
    let command_registry = Arc::new(CommandRegistry::new());
    command_registry
        .populate(commands::default_inventory())
        .context("command registry population failed")?;

    let invite_secret = config.invite_secret()?;
    let invites = Arc::new(InviteService::new(
        Arc::clone(&storage),
        &invite_secret,
        config.invite.ttl_hours,
        config.invite.link_base.clone(),
    ));
    let roster = Arc::new(RosterService::new(
        Arc::clone(&storage),
        Arc::clone(&invites),
    ));
    let matches = Arc::new(MatchService::new(Arc::clone(&storage)));

    let tool_registry = Arc::new(ToolRegistry::new());
    register_all(
        &tool_registry,
        &ToolDeps {
            roster: Arc::clone(&roster),
            matches: Arc::clone(&matches),
            invites: Arc::clone(&invites),
            commands: Arc::clone(&command_registry),
        },
    )
    .context("tool registry population failed")?;
    info!(tools = tool_registry.count(), "registries populated");

    let llm = build_llm(&config);
    info!(model = llm.model_id(), "llm client ready");

    let orchestrator = Arc::new(Orchestrator::new(OrchestratorDeps {
        commands: Arc::clone(&command_registry),
        tools: Arc::clone(&tool_registry),
        llm,
        auth: AuthService::new(Arc::clone(&storage)),
        roster,
        invites,
        storage: Arc::clone(&storage),
        config: OrchestratorConfig {
            deadline: config.agent_deadline(),
            max_tool_rounds: config.agent.max_tool_rounds,
            temperature: config.llm.temperature,
            ..OrchestratorConfig::default()
        },
    }));

    let teams = config
        .teams
        .iter()
        .map(|team| TeamBots {
            team_id: team.team_id.clone(),
            main: Arc::new(TelegramTransport::new(team.bot_main_token.clone())),
            leadership: Arc::new(TelegramTransport::new(team.bot_leadership_token.clone())),
        })
        .collect();

    let fleet = FleetManager::new(
        orchestrator,
        routing,
        command_registry,
        tool_registry,
        teams,
        POLL_TIMEOUT_SECS,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
            return;
        }
        info!("shutdown signal received, draining");
        let _ = shutdown_tx.send(true);
    });

    fleet.run(shutdown_rx).await?;
    info!("kickai stopped cleanly");
    Ok(())
}

fn build_llm(config: &KickaiConfig) -> Arc<dyn LlmClient> {
    match config.llm.provider {
        LlmProvider::Hosted => Arc::new(AnthropicClient::new(
            config.llm.model.clone(),
            config.llm.api_key.clone(),
        )),
        LlmProvider::Local => Arc::new(OllamaClient::new(
            config.llm.model.clone(),
            &config.llm.base_url,
        )),
    }
}
