//! Configuration loading and validation.
//!
//! Loads TOML from `./kickai.toml` (or `$KICKAI_CONFIG_PATH`), then applies
//! environment overrides. Precedence: env vars > config file > defaults.
//! Mandatory options missing at startup are a fail-fast error, not a
//! degraded mode.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::Deserialize;

/// Default agent deadline in seconds.
const DEFAULT_AGENT_DEADLINE_SECS: u64 = 30;

/// Default invite TTL in hours.
const DEFAULT_INVITE_TTL_HOURS: i64 = 72;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KickaiConfig {
    /// Team used by admin tooling when none is named.
    pub default_team_id: String,
    /// Log filter default (`info`, `debug`, ...).
    pub log_level: String,
    /// Per-team chat and bot credentials.
    pub teams: Vec<TeamConfig>,
    /// LLM provider settings.
    pub llm: LlmConfig,
    /// Invite signing and TTL settings.
    pub invite: InviteConfig,
    /// Agent execution settings.
    pub agent: AgentConfig,
    /// Storage settings.
    pub storage: StorageConfig,
}

/// One team's provisioning: two chats, two bot tokens.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TeamConfig {
    /// Stable opaque team identifier.
    pub team_id: String,
    /// Display name.
    pub name: String,
    /// Bot token serving the players' chat.
    pub bot_main_token: String,
    /// Bot token serving the staff chat.
    pub bot_leadership_token: String,
    /// Chat ID of the players' chat.
    pub main_chat_id: String,
    /// Chat ID of the staff chat.
    pub leadership_chat_id: String,
}

/// Which LLM backend serves the agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Anthropic messages API.
    Hosted,
    /// Ollama on a local machine.
    Local,
}

/// LLM settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Which backend serves completions.
    pub provider: LlmProvider,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// API key for the hosted provider.
    pub api_key: String,
    /// Base URL for the local provider.
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Local,
            model: "llama3".to_owned(),
            temperature: 0.3,
            api_key: String::new(),
            base_url: "http://127.0.0.1:11434".to_owned(),
        }
    }
}

/// Invite settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InviteConfig {
    /// Base64-encoded HMAC secret.
    pub secret_key: String,
    /// Invite lifetime in hours.
    pub ttl_hours: i64,
    /// Base URL of redemption links.
    pub link_base: String,
}

impl Default for InviteConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            ttl_hours: DEFAULT_INVITE_TTL_HOURS,
            link_base: "https://kickai.app/join".to_owned(),
        }
    }
}

/// Agent execution settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Wall-clock budget per update, in seconds.
    pub deadline_secs: u64,
    /// Maximum LLM tool-use rounds per agent run.
    pub max_tool_rounds: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            deadline_secs: DEFAULT_AGENT_DEADLINE_SECS,
            max_tool_rounds: 4,
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file path.
    pub db_path: String,
    /// Directory receiving rotated JSON log files.
    pub logs_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "kickai.db".to_owned(),
            logs_dir: "logs".to_owned(),
        }
    }
}

impl KickaiConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific TOML file; missing file yields defaults.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                toml::from_str(&contents).context("failed to parse config TOML")
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => bail!("failed to read config file: {e}"),
        }
    }

    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env("KICKAI_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("kickai.toml"))
    }

    /// Apply environment variable overrides.
    ///
    /// Takes a resolver function for testability.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("KICKAI_DEFAULT_TEAM_ID") {
            self.default_team_id = v;
        }
        if let Some(v) = env("KICKAI_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = env("KICKAI_DB_PATH") {
            self.storage.db_path = v;
        }
        if let Some(v) = env("KICKAI_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = env("KICKAI_LLM_API_KEY") {
            self.llm.provider = LlmProvider::Hosted;
            self.llm.api_key = v;
        }
        if let Some(v) = env("KICKAI_OLLAMA_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = env("KICKAI_INVITE_SECRET") {
            self.invite.secret_key = v;
        }
        if let Some(v) = env("KICKAI_AGENT_DEADLINE_SECS") {
            match v.parse() {
                Ok(n) => self.agent.deadline_secs = n,
                Err(_) => tracing::warn!(
                    var = "KICKAI_AGENT_DEADLINE_SECS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
    }

    /// Validate mandatory options; called once at startup.
    ///
    /// # Errors
    ///
    /// Describes the first missing or malformed option -- a fail-fast
    /// condition with a non-zero exit.
    pub fn validate(&self) -> Result<()> {
        if self.teams.is_empty() {
            bail!("at least one [[teams]] entry is required");
        }
        for team in &self.teams {
            if team.team_id.is_empty() {
                bail!("a [[teams]] entry is missing team_id");
            }
            for (field, value) in [
                ("bot_main_token", &team.bot_main_token),
                ("bot_leadership_token", &team.bot_leadership_token),
                ("main_chat_id", &team.main_chat_id),
                ("leadership_chat_id", &team.leadership_chat_id),
            ] {
                if value.is_empty() {
                    bail!("team {}: {field} is required", team.team_id);
                }
            }
            if team.main_chat_id == team.leadership_chat_id {
                bail!(
                    "team {}: main and leadership chats must differ",
                    team.team_id
                );
            }
        }
        if !self.default_team_id.is_empty()
            && !self.teams.iter().any(|t| t.team_id == self.default_team_id)
        {
            bail!(
                "default_team_id {} does not match any [[teams]] entry",
                self.default_team_id
            );
        }
        if self.llm.provider == LlmProvider::Hosted && self.llm.api_key.is_empty() {
            bail!("llm.api_key is required for the hosted provider");
        }
        if self.invite.secret_key.is_empty() {
            bail!("invite.secret_key is required");
        }
        self.invite_secret()?;
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!("llm.temperature must be between 0.0 and 2.0");
        }
        if self.agent.deadline_secs == 0 {
            bail!("agent.deadline_secs must be positive");
        }
        if self.invite.ttl_hours <= 0 {
            bail!("invite.ttl_hours must be positive");
        }
        Ok(())
    }

    /// Decode the invite signing secret.
    ///
    /// # Errors
    ///
    /// Returns an error when the key is not valid base64.
    pub fn invite_secret(&self) -> Result<Vec<u8>> {
        BASE64_STANDARD
            .decode(&self.invite.secret_key)
            .context("invite.secret_key must be base64")
    }

    /// The agent deadline as a [`Duration`].
    pub fn agent_deadline(&self) -> Duration {
        Duration::from_secs(self.agent.deadline_secs)
    }
}
