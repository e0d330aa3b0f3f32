//! Configuration management for Rentaldesk
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{Result, RentaldeskError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for Rentaldesk
///
/// Holds everything needed to run the backend: the HTTP listener, the
/// model provider, the tool server, agent limits, the request handler's
/// pacing and retry policy, session eviction and logging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Provider configuration (Gemini, Ollama)
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Tool server (toolbox) settings
    #[serde(default)]
    pub toolbox: ToolboxConfig,
    /// Agent behavior configuration
    #[serde(default)]
    pub agent: AgentConfig,
    /// Request handler pacing, retry and deadline settings
    #[serde(default)]
    pub handler: HandlerConfig,
    /// Session registry settings
    #[serde(default)]
    pub sessions: SessionConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Provider configuration
///
/// Specifies which model provider to use and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// Google Gemini configuration
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,
}

fn default_provider_type() -> String {
    "gemini".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            gemini: GeminiConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

/// Google Gemini provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Model to use
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// API base URL (overridable for tests and proxies)
    #[serde(default = "default_gemini_api_base")]
    pub api_base: String,

    /// API key; usually supplied through `GOOGLE_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
}

fn default_gemini_model() -> String {
    "gemini-1.5-pro".to_string()
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_provider_timeout() -> u64 {
    120
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: default_gemini_model(),
            api_base: default_gemini_api_base(),
            api_key: None,
            timeout_seconds: default_provider_timeout(),
        }
    }
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama server host
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Model to use for Ollama
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:latest".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_ollama_model(),
        }
    }
}

/// Tool server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolboxConfig {
    /// Base URL of the tool server
    #[serde(default = "default_toolbox_url")]
    pub url: String,

    /// Named toolset to load; `None` loads the default toolset
    #[serde(default)]
    pub toolset: Option<String>,

    /// Local manifest to read tool descriptors from instead of the server
    #[serde(default)]
    pub manifest_path: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_toolbox_timeout")]
    pub timeout_seconds: u64,
}

fn default_toolbox_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_toolbox_timeout() -> u64 {
    30
}

impl Default for ToolboxConfig {
    fn default() -> Self {
        Self {
            url: default_toolbox_url(),
            toolset: None,
            manifest_path: None,
            timeout_seconds: default_toolbox_timeout(),
        }
    }
}

/// Agent behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum provider round-trips within a single turn
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Maximum bytes of tool output fed back to the model
    #[serde(default = "default_max_output")]
    pub max_output_size: usize,

    /// System prompt flavour
    #[serde(default)]
    pub prompt_style: PromptStyle,

    /// Conversation management settings
    #[serde(default)]
    pub conversation: ConversationConfig,
}

fn default_max_turns() -> usize {
    10
}

fn default_max_output() -> usize {
    65_536
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_output_size: default_max_output(),
            prompt_style: PromptStyle::default(),
            conversation: ConversationConfig::default(),
        }
    }
}

/// Which system prompt the assistant is configured with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStyle {
    /// Short task list with emoji formatting rules
    #[default]
    Concise,
    /// Schema overview, business rules and per-tool guidance
    Detailed,
}

/// Conversation history limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Maximum tokens to keep in conversation
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Minimum turns to retain when pruning
    #[serde(default = "default_min_retain")]
    pub min_retain_turns: usize,

    /// Fraction of max_tokens that triggers pruning
    #[serde(default = "default_prune_threshold")]
    pub prune_threshold: f32,
}

fn default_max_tokens() -> usize {
    100_000
}

fn default_min_retain() -> usize {
    5
}

fn default_prune_threshold() -> f32 {
    0.8
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            min_retain_turns: default_min_retain(),
            prune_threshold: default_prune_threshold(),
        }
    }
}

/// Request handler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Delay strategy applied before every dispatch
    #[serde(default)]
    pub pacing: PacingConfig,

    /// Retry policy for rate-limited turns
    #[serde(default)]
    pub retry: RetryConfig,

    /// Upper bound on a whole `/chat` request, in seconds
    #[serde(default = "default_request_deadline")]
    pub request_deadline_seconds: u64,
}

fn default_request_deadline() -> u64 {
    180
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            pacing: PacingConfig::default(),
            retry: RetryConfig::default(),
            request_deadline_seconds: default_request_deadline(),
        }
    }
}

impl HandlerConfig {
    /// Overall request deadline as a `Duration`
    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_seconds)
    }
}

/// Pacing strategy selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingStrategy {
    /// No delay
    None,
    /// Constant sleep before every dispatch
    #[default]
    Fixed,
    /// Enforce a minimum gap between consecutive dispatches process-wide
    MinInterval,
}

/// Pacing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Strategy to use
    #[serde(default)]
    pub strategy: PacingStrategy,

    /// Delay (fixed) or minimum gap (min_interval) in milliseconds
    #[serde(default = "default_pacing_delay")]
    pub delay_ms: u64,
}

fn default_pacing_delay() -> u64 {
    2_000
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            strategy: PacingStrategy::default(),
            delay_ms: default_pacing_delay(),
        }
    }
}

/// Retry configuration for rate-limited turns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds; doubled per retry
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Cap on a single backoff delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Upper bound of the random jitter added to each backoff, in milliseconds
    #[serde(default = "default_jitter")]
    pub jitter_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    5_000
}

fn default_max_delay() -> u64 {
    60_000
}

fn default_jitter() -> u64 {
    1_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            jitter_ms: default_jitter(),
        }
    }
}

/// Session eviction policy selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionKind {
    /// Sessions live until reset
    #[default]
    None,
    /// Drop idle sessions after a TTL and cap the total by recency
    IdleLru,
}

/// Session registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Eviction policy
    #[serde(default)]
    pub eviction: EvictionKind,

    /// Idle time after which a session may be dropped (idle_lru)
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_seconds: u64,

    /// Maximum number of live sessions (idle_lru); 0 means no cap
    #[serde(default)]
    pub max_sessions: usize,

    /// How often the background sweeper runs
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_idle_ttl() -> u64 {
    3_600
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            eviction: EvictionKind::default(),
            idle_ttl_seconds: default_idle_ttl(),
            max_sessions: 0,
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json_format: bool,
}

fn default_log_level() -> String {
    "rentaldesk=info,tower_http=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    /// * `cli` - Parsed command line, applied last
    ///
    /// # Errors
    ///
    /// Returns `RentaldeskError::Config` if the file exists but cannot be
    /// read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RentaldeskError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| RentaldeskError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(host) = std::env::var("RENTALDESK_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("RENTALDESK_PORT") {
            if let Ok(value) = port.parse() {
                self.server.port = value;
            } else {
                tracing::warn!("Invalid RENTALDESK_PORT: {}", port);
            }
        }

        // Provider overrides
        if let Ok(provider_type) = std::env::var("RENTALDESK_PROVIDER") {
            self.provider.provider_type = provider_type;
        }

        if let Ok(model) = std::env::var("RENTALDESK_GEMINI_MODEL") {
            self.provider.gemini.model = model;
        }

        let api_key = std::env::var("RENTALDESK_GEMINI_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .or_else(|_| std::env::var("GOOGLE_API_KEY"));
        if let Ok(key) = api_key {
            self.provider.gemini.api_key = Some(key);
        }

        if let Ok(ollama_host) = std::env::var("RENTALDESK_OLLAMA_HOST") {
            self.provider.ollama.host = ollama_host;
        }

        if let Ok(ollama_model) = std::env::var("RENTALDESK_OLLAMA_MODEL") {
            self.provider.ollama.model = ollama_model;
        }

        // Tool server
        let toolbox_url =
            std::env::var("RENTALDESK_TOOLBOX_URL").or_else(|_| std::env::var("TOOLBOX_URL"));
        if let Ok(url) = toolbox_url {
            self.toolbox.url = url;
        }

        if let Ok(toolset) = std::env::var("RENTALDESK_TOOLSET") {
            self.toolbox.toolset = Some(toolset);
        }

        if let Ok(manifest) = std::env::var("RENTALDESK_TOOLS_MANIFEST") {
            self.toolbox.manifest_path = Some(manifest);
        }

        // Handler overrides
        if let Ok(attempts) = std::env::var("RENTALDESK_RETRY_MAX_ATTEMPTS") {
            if let Ok(value) = attempts.parse() {
                self.handler.retry.max_attempts = value;
            } else {
                tracing::warn!("Invalid RENTALDESK_RETRY_MAX_ATTEMPTS: {}", attempts);
            }
        }

        if let Ok(delay) = std::env::var("RENTALDESK_RETRY_BASE_DELAY_MS") {
            if let Ok(value) = delay.parse() {
                self.handler.retry.base_delay_ms = value;
            } else {
                tracing::warn!("Invalid RENTALDESK_RETRY_BASE_DELAY_MS: {}", delay);
            }
        }

        if let Ok(delay) = std::env::var("RENTALDESK_PACING_DELAY_MS") {
            if let Ok(value) = delay.parse() {
                self.handler.pacing.delay_ms = value;
            } else {
                tracing::warn!("Invalid RENTALDESK_PACING_DELAY_MS: {}", delay);
            }
        }

        if let Ok(level) = std::env::var("RENTALDESK_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(json) = std::env::var("RENTALDESK_LOG_JSON") {
            match json.parse::<bool>() {
                Ok(value) => self.logging.json_format = value,
                Err(_) => tracing::warn!("Invalid RENTALDESK_LOG_JSON: {}", json),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            self.logging.level = "rentaldesk=debug,tower_http=debug".to_string();
        }

        if let crate::cli::Commands::Serve { host, port } = &cli.command {
            if let Some(host) = host {
                self.server.host = host.clone();
            }
            if let Some(port) = port {
                self.server.port = *port;
            }
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `RentaldeskError::Config` describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        let valid_providers = ["gemini", "ollama"];
        if !valid_providers.contains(&self.provider.provider_type.as_str()) {
            return Err(RentaldeskError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                valid_providers.join(", ")
            ))
            .into());
        }

        if url::Url::parse(&self.toolbox.url).is_err() {
            return Err(RentaldeskError::Config(format!(
                "toolbox.url is not a valid URL: {}",
                self.toolbox.url
            ))
            .into());
        }

        if self.agent.max_turns == 0 {
            return Err(
                RentaldeskError::Config("agent.max_turns must be greater than 0".to_string())
                    .into(),
            );
        }

        if self.agent.max_output_size == 0 {
            return Err(RentaldeskError::Config(
                "agent.max_output_size must be greater than 0".to_string(),
            )
            .into());
        }

        if self.agent.conversation.prune_threshold <= 0.0
            || self.agent.conversation.prune_threshold > 1.0
        {
            return Err(RentaldeskError::Config(
                "agent.conversation.prune_threshold must be between 0.0 and 1.0".to_string(),
            )
            .into());
        }

        if self.handler.retry.max_attempts == 0 {
            return Err(RentaldeskError::Config(
                "handler.retry.max_attempts must be at least 1".to_string(),
            )
            .into());
        }

        if self.handler.retry.max_attempts > 10 {
            return Err(RentaldeskError::Config(
                "handler.retry.max_attempts must be less than or equal to 10".to_string(),
            )
            .into());
        }

        if self.handler.request_deadline_seconds == 0 {
            return Err(RentaldeskError::Config(
                "handler.request_deadline_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.sessions.eviction == EvictionKind::IdleLru && self.sessions.idle_ttl_seconds == 0 {
            return Err(RentaldeskError::Config(
                "sessions.idle_ttl_seconds must be greater than 0 for idle_lru eviction"
                    .to_string(),
            )
            .into());
        }

        Ok(())
    }
}
