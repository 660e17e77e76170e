// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Built once at startup, validated, then shared read-only behind an Arc
use crate::aggregator::{hide_tool_tokens, Batcher, DEFAULT_BATCH_SIZE};
use crate::blocks::Renderer;
use crate::chunk::{ChunkBounds, SLACK_MAX_BLOCKS, SLACK_MAX_BLOCK_CHARS, SLACK_MAX_TEXT_CHARS};
use crate::error::DeliveryError;
use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

// ─── SlackConfig ────────────────────────────────────────────────

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SlackConfig {
    #[serde(default)]
    pub app_token: String,
    #[serde(default)]
    pub bot_token: String,
    /// Users allowed to start a turn; empty allows everyone
    #[serde(default)]
    pub allowed_users: Vec<String>,
    /// Channels the bot answers mentions in; empty allows every channel
    #[serde(default)]
    pub allowed_channels: Vec<String>,
    /// Emoji name added to inbound messages once a turn starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_reaction: Option<String>,
}

// Custom Debug impl to redact app_token, bot_token
impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("app_token", &redact(&self.app_token))
            .field("bot_token", &redact(&self.bot_token))
            .field("allowed_users", &self.allowed_users)
            .field("allowed_channels", &self.allowed_channels)
            .field("ack_reaction", &self.ack_reaction)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "[REDACTED]"
    }
}

impl SlackConfig {
    pub fn is_user_allowed(&self, user_id: &str) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.iter().any(|u| u == user_id)
    }

    pub fn is_channel_allowed(&self, channel_id: &str) -> bool {
        self.allowed_channels.is_empty() || self.allowed_channels.iter().any(|c| c == channel_id)
    }
}

// ─── BackendConfig ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend type: "command", "mock"
    #[serde(rename = "type", default = "default_backend_type")]
    pub backend_type: String,
    /// Orchestration program (for the command backend)
    pub binary: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backend_type() -> String {
    "command".to_string()
}

fn default_timeout_secs() -> u64 {
    300 // 5 minutes default timeout
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend_type: default_backend_type(),
            binary: None,
            args: Vec::new(),
            working_dir: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BackendConfig {
    /// Settings handed to the backend factory
    pub fn factory_config(&self) -> serde_json::Value {
        serde_json::json!({
            "binary": self.binary.clone().unwrap_or_default(),
            "args": self.args,
            "working_dir": self.working_dir,
            "timeout_secs": self.timeout_secs,
        })
    }
}

// ─── DeliveryConfig ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Streamed fragments buffered per update
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Flush a partial batch once its oldest fragment is this old
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flush_interval_ms: Option<u64>,
    #[serde(default = "default_block_chunk")]
    pub block_chunk: ChunkBounds,
    #[serde(default = "default_text_chunk")]
    pub text_chunk: ChunkBounds,
    #[serde(default = "default_max_blocks")]
    pub max_blocks: usize,
    /// Keep tool-invocation tokens out of streamed messages
    #[serde(default = "default_true")]
    pub hide_tool_tokens: bool,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_block_chunk() -> ChunkBounds {
    ChunkBounds::BLOCK
}

fn default_text_chunk() -> ChunkBounds {
    ChunkBounds::TEXT
}

fn default_max_blocks() -> usize {
    SLACK_MAX_BLOCKS
}

fn default_true() -> bool {
    true
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_interval_ms: None,
            block_chunk: default_block_chunk(),
            text_chunk: default_text_chunk(),
            max_blocks: default_max_blocks(),
            hide_tool_tokens: true,
        }
    }
}

impl DeliveryConfig {
    pub fn validate(&self) -> Result<(), DeliveryError> {
        self.block_chunk.validate()?;
        self.text_chunk.validate()?;
        if self.block_chunk.max > SLACK_MAX_BLOCK_CHARS {
            return Err(DeliveryError::InvalidConfiguration(format!(
                "delivery.block_chunk.max must not exceed {}",
                SLACK_MAX_BLOCK_CHARS
            )));
        }
        if self.text_chunk.max > SLACK_MAX_TEXT_CHARS {
            return Err(DeliveryError::InvalidConfiguration(format!(
                "delivery.text_chunk.max must not exceed {}",
                SLACK_MAX_TEXT_CHARS
            )));
        }
        if self.max_blocks == 0 || self.max_blocks > SLACK_MAX_BLOCKS {
            return Err(DeliveryError::InvalidConfiguration(format!(
                "delivery.max_blocks must be between 1 and {}",
                SLACK_MAX_BLOCKS
            )));
        }
        if self.batch_size == 0 {
            return Err(DeliveryError::InvalidConfiguration(
                "delivery.batch_size must be at least 1".to_string(),
            ));
        }
        if self.flush_interval_ms == Some(0) {
            return Err(DeliveryError::InvalidConfiguration(
                "delivery.flush_interval_ms must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn renderer(&self) -> Result<Renderer, DeliveryError> {
        Renderer::new(self.block_chunk, self.text_chunk, self.max_blocks)
    }

    /// A fresh batcher for one streamed turn
    pub fn batcher(&self) -> Result<Batcher, DeliveryError> {
        let mut batcher = Batcher::new(self.batch_size)?;
        if let Some(ms) = self.flush_interval_ms {
            batcher = batcher.with_flush_interval(Duration::from_millis(ms));
        }
        if self.hide_tool_tokens {
            batcher = batcher.with_filter(hide_tool_tokens());
        }
        Ok(batcher)
    }
}

// ─── Features / Metrics ─────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturesConfig {
    /// Stream tokens into one growing message instead of status blocks
    #[serde(default)]
    pub stream_output: bool,
    /// Show progress in the assistant typing status instead of the thread
    #[serde(default)]
    pub assistant_typing_status: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Address for the Prometheus scrape endpoint, e.g. "127.0.0.1:9000"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
}

/// `FEATURE_X=true` style flag; anything else is false
fn feature_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|val| val.trim().eq_ignore_ascii_case("true"))
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. RELAY_CONFIG_PATH env var (if set)
    /// 2. ./config.toml (current directory - for development)
    /// 3. ~/.config/relay/config.toml (XDG config dir)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("RELAY_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration from config.toml with environment variable overrides
    pub fn load() -> Result<Self> {
        let mut config = if let Some(config_path) = Self::find_config_file() {
            tracing::info!(
                path = %config_path.display(),
                "Loading configuration from file"
            );
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            Self::parse(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::info!("No config file found, using environment variables and defaults");
            Config::default()
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str::<Config>(content)?)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("SLACK_BOT_TOKEN") {
            self.slack.bot_token = val;
        }
        if let Ok(val) = std::env::var("SLACK_APP_TOKEN") {
            self.slack.app_token = val;
        }
        if let Ok(val) = std::env::var("BACKEND_TYPE") {
            self.backend.backend_type = val;
        }
        if let Ok(val) = std::env::var("BACKEND_BINARY") {
            self.backend.binary = Some(val);
        }
        if let Ok(val) = std::env::var("BACKEND_TIMEOUT_SECS") {
            self.backend.timeout_secs = val.parse().with_context(|| {
                format!("BACKEND_TIMEOUT_SECS must be a valid number, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("RELAY_BATCH_SIZE") {
            self.delivery.batch_size = val.parse().with_context(|| {
                format!("RELAY_BATCH_SIZE must be a valid number, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("METRICS_ADDR") {
            self.metrics.listen = Some(val);
        }
        if let Some(on) = feature_flag("FEATURE_STREAM_OUTPUT") {
            self.features.stream_output = on;
        }
        if let Some(on) = feature_flag("FEATURE_ASSISTANT_TYPING_MESSAGE") {
            self.features.assistant_typing_status = on;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DeliveryError> {
        self.delivery.validate()?;
        if self.backend.timeout_secs == 0 {
            return Err(DeliveryError::InvalidConfiguration(
                "backend.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Tokens needed to connect to Slack
    pub fn require_slack_tokens(&self) -> Result<()> {
        if self.slack.bot_token.trim().is_empty() {
            anyhow::bail!("slack.bot_token is required (set in config.toml or SLACK_BOT_TOKEN env var)");
        }
        if self.slack.app_token.trim().is_empty() {
            anyhow::bail!("slack.app_token is required (set in config.toml or SLACK_APP_TOKEN env var)");
        }
        Ok(())
    }
}
