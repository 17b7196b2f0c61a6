//! Configuration loading, validation, and management for RecallChat.
//!
//! Loads configuration from `~/.recallchat/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.recallchat/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which backend serves generation and embeddings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Text-generation settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Embedding settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Conversation memory and recall gate settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Passage retrieval settings and the seed knowledge base
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Prompt composition settings
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name: "ollama", "openai", "openrouter", or a custom label
    #[serde(default = "default_provider")]
    pub name: String,

    /// Base URL of the OpenAI-compatible API (defaults per provider name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_provider() -> String {
    "ollama".into()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider(),
            api_url: None,
            api_key: None,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "qwen2:0.5b".into()
}
fn default_max_tokens() -> u32 {
    128
}
fn default_temperature() -> f32 {
    0.2
}
fn default_top_p() -> f32 {
    0.9
}
fn default_timeout_secs() -> u64 {
    5
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "all-minilm:33m".into()
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Inclusive range accepted for `memory.similarity_threshold`.
pub const SIMILARITY_THRESHOLD_RANGE: std::ops::RangeInclusive<f32> = 0.65..=0.8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Minimum cosine similarity between the new message and the last
    /// user message for recent history to be recalled
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// How many user/assistant pairs the recall window spans
    #[serde(default = "default_max_turn_pairs")]
    pub max_turn_pairs: usize,

    /// Per-session cap on stored turns; oldest pairs are evicted beyond it
    #[serde(default = "default_max_log_turns")]
    pub max_log_turns: usize,

    /// Maximum number of live sessions; least recently used is evicted
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_similarity_threshold() -> f32 {
    0.7
}
fn default_max_turn_pairs() -> usize {
    2
}
fn default_max_log_turns() -> usize {
    200
}
fn default_max_sessions() -> usize {
    1_000
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_turn_pairs: default_max_turn_pairs(),
            max_log_turns: default_max_log_turns(),
            max_sessions: default_max_sessions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// The fixed knowledge base, embedded once at startup
    #[serde(default = "default_documents")]
    pub documents: Vec<String>,
}

fn default_top_k() -> usize {
    2
}
fn default_documents() -> Vec<String> {
    vec![
        "FastAPI is a high-performance Python web framework for APIs.".into(),
        "Ollama allows running LLMs locally on your machine.".into(),
        "FAISS is a vector similarity search library by Facebook.".into(),
    ]
}

impl RetrievalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            timeout_secs: default_timeout_secs(),
            documents: default_documents(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Estimated token budget for the composed prompt (0 = unbounded)
    #[serde(default = "default_max_prompt_tokens")]
    pub max_prompt_tokens: usize,
}

fn default_max_prompt_tokens() -> usize {
    2048
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_prompt_tokens: default_max_prompt_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// The single browser origin allowed by CORS
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_allowed_origin() -> String {
    "http://localhost:5173".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origin: default_allowed_origin(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.recallchat/config.toml),
    /// then apply environment overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::read_file(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply `RECALLCHAT_*` overrides read through `lookup`.
    ///
    /// `lookup` is `std::env::var` in production and a map in tests.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("RECALLCHAT_PROVIDER") {
            self.provider.name = name;
        }
        if let Some(url) = lookup("RECALLCHAT_API_URL") {
            self.provider.api_url = Some(url);
        }
        if let Some(key) = lookup("RECALLCHAT_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(model) = lookup("RECALLCHAT_MODEL") {
            self.generation.model = model;
        }
        if let Some(model) = lookup("RECALLCHAT_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(raw) = lookup("RECALLCHAT_SIMILARITY_THRESHOLD") {
            self.memory.similarity_threshold =
                raw.parse().map_err(|_| ConfigError::InvalidEnv {
                    key: "RECALLCHAT_SIMILARITY_THRESHOLD",
                    value: raw,
                })?;
        }
        if let Some(host) = lookup("RECALLCHAT_HOST") {
            self.gateway.host = host;
        }
        if let Some(raw) = lookup("RECALLCHAT_PORT") {
            self.gateway.port = raw.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "RECALLCHAT_PORT",
                value: raw,
            })?;
        }
        if let Some(origin) = lookup("RECALLCHAT_ALLOWED_ORIGIN") {
            self.gateway.allowed_origin = origin;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".recallchat")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.memory.similarity_threshold;
        if !SIMILARITY_THRESHOLD_RANGE.contains(&threshold) {
            return Err(ConfigError::ValidationError(format!(
                "memory.similarity_threshold must be between {} and {} (got {threshold})",
                SIMILARITY_THRESHOLD_RANGE.start(),
                SIMILARITY_THRESHOLD_RANGE.end(),
            )));
        }

        if self.memory.max_turn_pairs == 0 {
            return Err(ConfigError::ValidationError(
                "memory.max_turn_pairs must be at least 1".into(),
            ));
        }

        if self.memory.max_log_turns < self.memory.max_turn_pairs.saturating_mul(2) {
            return Err(ConfigError::ValidationError(
                "memory.max_log_turns must hold at least max_turn_pairs * 2 turns".into(),
            ));
        }

        if self.memory.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "memory.max_sessions must be at least 1".into(),
            ));
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(self.generation.top_p > 0.0 && self.generation.top_p <= 1.0) {
            return Err(ConfigError::ValidationError(
                "generation.top_p must be in (0.0, 1.0]".into(),
            ));
        }

        if self.generation.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "generation.max_tokens must be at least 1".into(),
            ));
        }

        if self.generation.timeout_secs == 0
            || self.embedding.timeout_secs == 0
            || self.retrieval.timeout_secs == 0
        {
            return Err(ConfigError::ValidationError(
                "timeouts must be at least 1 second".into(),
            ));
        }

        if !self.gateway.allowed_origin.starts_with("http://")
            && !self.gateway.allowed_origin.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(format!(
                "gateway.allowed_origin must be an http(s) origin (got {})",
                self.gateway.allowed_origin
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
