//! GARAGE: Configuration management for motorcrew
//!
//! Builds the single configuration object handed to every component at
//! startup. Nothing downstream reads the process environment on its own.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir, safe_filename};

/// Errors in configuration systems
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("◆ CONFIG IO ERROR: {0}")]
    Io(#[from] std::io::Error),

    #[error("◆ CONFIG PARSE ERROR: {0}")]
    Json(#[from] serde_json::Error),

    #[error("◆ CONFIG NOT FOUND: {}", .0.display())]
    NotFound(PathBuf),

    #[error("◆ MISSING CREDENTIAL: set {0} in the environment or config file")]
    MissingApiKey(&'static str),

    #[error("◆ INVALID CONFIG: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Environment variable holding the model credential
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable overriding the model endpoint
pub const API_BASE_ENV: &str = "OPENAI_API_BASE";
/// Environment variable overriding the model name
pub const MODEL_ENV: &str = "OPENAI_MODEL_NAME";
/// Environment variable overriding the report output directory
pub const OUTPUT_DIR_ENV: &str = "MOTORCREW_OUTPUT_DIR";
/// Upper bound on `model.max_retries`
pub const MAX_MODEL_RETRIES: u32 = 10;

/// Model service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default = "default_model")]
    pub name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_model_retries")]
    pub max_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            name: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_model_timeout(),
            max_retries: default_model_retries(),
        }
    }
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_model_timeout() -> u64 {
    60
}

fn default_model_retries() -> u32 {
    2
}

/// Web search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            max_results: default_max_results(),
            timeout_secs: default_tool_timeout(),
        }
    }
}

fn default_search_endpoint() -> String {
    "https://html.duckduckgo.com/html/".to_string()
}

fn default_max_results() -> u32 {
    5
}

fn default_tool_timeout() -> u64 {
    5
}

/// Web scrape settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout(),
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    20000
}

/// Tool settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
}

/// Retry settings applied around each work unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8000
}

/// Crew settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewConfig {
    #[serde(default = "default_process")]
    pub process: String,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_subject")]
    pub default_subject: String,
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            process: default_process(),
            max_iterations: default_max_iterations(),
            retry: RetryConfig::default(),
            output_dir: default_output_dir(),
            default_subject: default_subject(),
        }
    }
}

fn default_process() -> String {
    "sequential".to_string()
}

fn default_max_iterations() -> u32 {
    15
}

fn default_output_dir() -> String {
    ".".to_string()
}

fn default_subject() -> String {
    "Toyota Camry".to_string()
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub crew: CrewConfig,
}

impl Config {
    /// Load from the default location, then layer `.env` and process environment
    pub async fn load() -> Result<Self> {
        Self::load_with(None).await
    }

    /// Load from `path` (or the default location), then apply the environment
    pub async fn load_with(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                Self::load_from(path).await?
            }
            None => Self::load_from(&config_path()).await?,
        };

        match dotenvy::dotenv() {
            Ok(path) => debug!("◆ LOADED ENV FILE {:?}", path),
            Err(e) if e.not_found() => {}
            Err(e) => warn!("◆ IGNORING MALFORMED .env: {}", e),
        }

        config.apply_env_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from specific location, falling back to defaults if absent
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("◆ NO CONFIG AT {:?}, USING DEFAULTS", path);
            return Ok(Config::default());
        }

        debug!("◆ READING CONFIG FROM {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("◆ WRITING CONFIG TO {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Overlay environment values; `lookup` is the environment reader
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(API_KEY_ENV) {
            self.model.api_key = key;
        }
        if let Some(base) = non_empty(API_BASE_ENV) {
            self.model.api_base = Some(base);
        }
        if let Some(model) = non_empty(MODEL_ENV) {
            self.model.name = model;
        }
        if let Some(dir) = non_empty(OUTPUT_DIR_ENV) {
            self.crew.output_dir = dir;
        }
    }

    /// Fail fast on missing credentials or out-of-range values
    pub fn validate(&self) -> Result<()> {
        if self.model.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey(API_KEY_ENV));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::Invalid(format!(
                "model.temperature must be within 0..=2, got {}",
                self.model.temperature
            )));
        }
        if self.model.timeout_secs == 0
            || self.tools.search.timeout_secs == 0
            || self.tools.scrape.timeout_secs == 0
        {
            return Err(ConfigError::Invalid(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.model.max_retries > MAX_MODEL_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "model.max_retries must be at most {}, got {}",
                MAX_MODEL_RETRIES, self.model.max_retries
            )));
        }
        if self.crew.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "crew.max_iterations must be greater than zero".to_string(),
            ));
        }
        if self.crew.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "crew.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.crew.process.eq_ignore_ascii_case("sequential") {
            return Err(ConfigError::Invalid(format!(
                "unknown crew.process '{}'",
                self.crew.process
            )));
        }
        Ok(())
    }

    /// Credential, if configured
    pub fn api_key(&self) -> Option<String> {
        let key = self.model.api_key.trim();
        if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Report output directory, with `~` expanded
    pub fn output_dir(&self) -> PathBuf {
        let path = &self.crew.output_dir;
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        } else if path == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
        PathBuf::from(path)
    }
}

/// Write a default config file if none exists and return the loaded config
pub async fn init() -> Result<Config> {
    let path = config_path();

    if path.exists() {
        warn!("◆ CONFIG ALREADY PRESENT AT {:?}", path);
    } else {
        Config::default().save_to(&path).await?;
        info!("◆ CONFIG WRITTEN TO {:?}", path);
    }

    Config::load_from(&path).await
}
