//! Layered configuration: defaults, an optional file, then `RECON__*` env vars.

use std::path::Path;

use action_locator::CorrectorConfig;
use agent_core::AgentLoopConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use perceiver_visual::OcrOptions;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Prefix for environment overrides, e.g. `RECON__AGENT__MAX_STEPS=30`.
pub const ENV_PREFIX: &str = "RECON";
pub const ENV_SEPARATOR: &str = "__";

pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Everything needed to wire a recon session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub agent: AgentLoopConfig,
    pub corrector: CorrectorConfig,
    pub ocr: OcrOptions,
    pub gemini: GeminiSettings,
    pub logging: LoggingSettings,
}

/// Gemini endpoint settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    /// Keys tried in order; a rate-limited key hands over to the next one.
    pub api_keys: Vec<String>,
    /// Environment variable read when `api_keys` is empty
    pub api_key_env: String,
    /// Model choosing actions and locating correction targets
    pub model: String,
    /// Cheaper model for screenshot comparison and summaries
    pub flash_model: String,
    pub endpoint: String,
    pub request_timeout_ms: u64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_output_tokens: u32,
    /// Temperature for comparison, summary and correction calls
    pub analysis_temperature: f64,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            model: "gemini-2.5-pro".to_string(),
            flash_model: "gemini-2.5-flash".to_string(),
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            request_timeout_ms: 60_000,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 10_150,
            analysis_temperature: 0.1,
        }
    }
}

// Keys stay out of logs.
impl std::fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("api_keys", &format!("<{} configured>", self.api_keys.len()))
            .field("api_key_env", &self.api_key_env)
            .field("model", &self.model)
            .field("flash_model", &self.flash_model)
            .field("endpoint", &self.endpoint)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl GeminiSettings {
    /// Configured keys, or the single key from `api_key_env`.
    pub fn resolve_api_keys(&self) -> Vec<String> {
        let configured: Vec<String> = self
            .api_keys
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if !configured.is_empty() {
            return configured;
        }
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// Emit JSON lines instead of the human format
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ReconConfig {
    /// Load from `path` (YAML, TOML or JSON by extension) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, env_source())
    }

    /// Load with an explicit environment source.
    pub fn load_with(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config: ReconConfig = builder
            .add_source(env)
            .build()
            .context("Failed to assemble configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        info!(
            path = ?path.map(|p| p.display().to_string()),
            max_steps = config.agent.max_steps,
            model = %config.gemini.model,
            "Loaded configuration"
        );
        Ok(config)
    }
}

/// `RECON__SECTION__FIELD` overrides; `RECON__GEMINI__API_KEYS` takes a comma list.
pub fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("gemini.api_keys")
}
