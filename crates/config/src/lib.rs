//! Configuration loading, validation, and management for RepairKit.
//!
//! Loads configuration from `~/.repairkit/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.repairkit/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment ("development" or "production")
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Default tracing filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// API key for the default provider (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default text-generation provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Per-call timeout for text generation
    #[serde(default = "default_model_timeout")]
    pub model_timeout_secs: u64,

    /// Providers tried in order after the default one fails
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_providers: Vec<String>,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Device catalog configuration
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Fallback web search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Conversation context budgeting
    #[serde(default)]
    pub context: ContextConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Session store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Bearer-token verification
    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_environment() -> String {
    "development".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_model_timeout() -> u64 {
    30
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("environment", &self.environment)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("model_timeout_secs", &self.model_timeout_secs)
            .field("fallback_providers", &self.fallback_providers)
            .field("providers", &self.providers)
            .field("catalog", &self.catalog)
            .field("search", &self.search)
            .field("context", &self.context)
            .field("gateway", &self.gateway)
            .field("store", &self.store)
            .field("auth", &self.auth)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_url")]
    pub base_url: String,

    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,

    /// How many device hits to keep from a search
    #[serde(default = "default_max_devices")]
    pub max_devices: usize,
}

fn default_catalog_url() -> String {
    "https://www.ifixit.com/api/2.0".into()
}
fn default_catalog_timeout() -> u64 {
    30
}
fn default_max_devices() -> usize {
    5
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_url(),
            timeout_secs: default_catalog_timeout(),
            max_devices: default_max_devices(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Enables the paid Tavily search ahead of DuckDuckGo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tavily_api_key: Option<String>,

    #[serde(default = "default_tavily_url")]
    pub tavily_url: String,

    #[serde(default = "default_true")]
    pub duckduckgo_enabled: bool,

    #[serde(default = "default_duckduckgo_url")]
    pub duckduckgo_url: String,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_tavily_url() -> String {
    "https://api.tavily.com".into()
}
fn default_duckduckgo_url() -> String {
    "https://api.duckduckgo.com".into()
}
fn default_search_timeout() -> u64 {
    15
}
fn default_max_results() -> usize {
    3
}
fn default_true() -> bool {
    true
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("tavily_api_key", &redact(&self.tavily_api_key))
            .field("tavily_url", &self.tavily_url)
            .field("duckduckgo_enabled", &self.duckduckgo_enabled)
            .field("duckduckgo_url", &self.duckduckgo_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_results", &self.max_results)
            .finish()
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: None,
            tavily_url: default_tavily_url(),
            duckduckgo_enabled: true,
            duckduckgo_url: default_duckduckgo_url(),
            timeout_secs: default_search_timeout(),
            max_results: default_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_context_tokens")]
    pub max_tokens: usize,

    /// Non-system messages kept from history
    #[serde(default = "default_context_messages")]
    pub max_messages: usize,

    /// History length from which dropped turns get summarized
    #[serde(default = "default_summarize_threshold")]
    pub summarize_threshold: usize,

    /// Path to a HuggingFace `tokenizer.json`; word heuristic when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer_path: Option<String>,
}

fn default_context_tokens() -> usize {
    100_000
}
fn default_context_messages() -> usize {
    50
}
fn default_summarize_threshold() -> usize {
    30
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_context_tokens(),
            max_messages: default_context_messages(),
            summarize_threshold: default_summarize_threshold(),
            tokenizer_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_origins: default_cors_origins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite URL; defaults to `sqlite://~/.repairkit/repairkit.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

fn default_store_backend() -> String {
    "sqlite".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            database_url: None,
        }
    }
}

impl StoreConfig {
    pub fn resolved_database_url(&self) -> String {
        self.database_url.clone().unwrap_or_else(|| {
            format!(
                "sqlite://{}",
                AppConfig::config_dir().join("repairkit.db").display()
            )
        })
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret used to verify bearer JWTs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,

    /// Check JWT signatures. Only development may turn this off.
    #[serde(default = "default_true")]
    pub verify_signature: bool,

    /// Static bearer tokens mapped to user ids
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub static_tokens: HashMap<String, String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &redact(&self.jwt_secret))
            .field("verify_signature", &self.verify_signature)
            .field("static_tokens", &self.static_tokens.len())
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            verify_signature: true,
            static_tokens: HashMap::new(),
        }
    }
}

impl AuthConfig {
    pub fn is_configured(&self) -> bool {
        self.jwt_secret.is_some() || !self.static_tokens.is_empty()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.repairkit/config.toml).
    ///
    /// Environment variables override file values:
    /// - `REPAIRKIT_API_KEY`, then `GEMINI_API_KEY`, then `OPENAI_API_KEY`
    /// - `REPAIRKIT_PROVIDER`, `REPAIRKIT_MODEL`
    /// - `TAVILY_API_KEY`, `REPAIRKIT_JWT_SECRET`, `REPAIRKIT_DATABASE_URL`
    /// - `REPAIRKIT_LOG_LEVEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from a specific path, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = lookup("REPAIRKIT_API_KEY")
                .or_else(|| lookup("GEMINI_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(provider) = lookup("REPAIRKIT_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = lookup("REPAIRKIT_MODEL") {
            self.default_model = model;
        }
        if let Some(key) = lookup("TAVILY_API_KEY") {
            self.search.tavily_api_key = Some(key);
        }
        if let Some(secret) = lookup("REPAIRKIT_JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(url) = lookup("REPAIRKIT_DATABASE_URL") {
            self.store.database_url = Some(url);
        }
        if let Some(level) = lookup("REPAIRKIT_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".repairkit")
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.context.max_tokens == 0 || self.context.max_messages == 0 {
            return Err(ConfigError::ValidationError(
                "context.max_tokens and context.max_messages must be > 0".into(),
            ));
        }

        if !(1..=10).contains(&self.search.max_results) {
            return Err(ConfigError::ValidationError(
                "search.max_results must be between 1 and 10".into(),
            ));
        }

        if self.model_timeout_secs == 0 || self.catalog.timeout_secs == 0 || self.search.timeout_secs == 0 {
            return Err(ConfigError::ValidationError("timeouts must be > 0".into()));
        }

        if !matches!(self.store.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "unknown store backend '{}'",
                self.store.backend
            )));
        }

        if self.is_production() && !self.auth.is_configured() {
            return Err(ConfigError::ValidationError(
                "production requires auth.jwt_secret or auth.static_tokens".into(),
            ));
        }

        if self.is_production() && !self.auth.verify_signature {
            return Err(ConfigError::ValidationError(
                "auth.verify_signature cannot be disabled in production".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            model_timeout_secs: default_model_timeout(),
            fallback_providers: vec![],
            providers: HashMap::new(),
            catalog: CatalogConfig::default(),
            search: SearchConfig::default(),
            context: ContextConfig::default(),
            gateway: GatewayConfig::default(),
            store: StoreConfig::default(),
            auth: AuthConfig::default(),
        }
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

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
