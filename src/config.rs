//! Layered application settings.
//!
//! Values come from built-in defaults, an optional `mergebench.toml`, and
//! `MERGEBENCH__<SECTION>__<KEY>` environment variables, in that order.
//! Command-line flags are applied on top by the binary.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming the default provider.
pub const PROVIDER_ENV_VAR: &str = "DEFAULT_LLM_PROVIDER";

/// Environment variable naming the default model.
pub const MODEL_ENV_VAR: &str = "DEFAULT_LLM_MODEL";

/// Prefix for environment overrides of any setting.
pub const ENV_PREFIX: &str = "MERGEBENCH";

/// Settings file looked up in the working directory (extension implied).
pub const DEFAULT_CONFIG_NAME: &str = "mergebench";

pub const DEFAULT_PROVIDER: &str = "google";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Errors raised while assembling configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("config file not found: {0}")]
    MissingFile(PathBuf),

    #[error("unsupported provider: {0} (expected google, groq or maritaca)")]
    UnsupportedProvider(String),

    #[error("no API key found for provider {provider}: set {env_var}")]
    MissingApiKey {
        provider: String,
        env_var: &'static str,
    },

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Provider and model selection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LlmSettings {
    pub provider: String,
    pub model: String,
    pub temperature: f64,
    pub seed: Option<i64>,
    /// Overrides the provider's default endpoint.
    pub api_base: Option<String>,
    pub request_timeout_secs: u64,
}

impl LlmSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Batch generation settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunSettings {
    /// Fixed pause between provider calls and between batches.
    pub wait_time_secs: u64,
    /// Items per batch; a checkpoint is written after every batch.
    pub checkpoint_interval: usize,
    pub output_dir: PathBuf,
    /// Extra attempts for an item that failed with a rate-limit error.
    pub rate_limit_retries: u32,
}

/// Failure triage settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TriageSettings {
    pub wait_time_secs: u64,
    pub dataset_dir: PathBuf,
    /// Repository assumed when a result file does not record one.
    pub default_repository: String,
}

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    pub llm: LlmSettings,
    pub run: RunSettings,
    pub triage: TriageSettings,
}

impl AppConfig {
    /// Load settings, reading `path` if given or `mergebench.toml` if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let provider =
            env::var(PROVIDER_ENV_VAR).unwrap_or_else(|_| DEFAULT_PROVIDER.to_string());
        let model = env::var(MODEL_ENV_VAR).unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let mut builder = Config::builder()
            .set_default("llm.provider", provider)?
            .set_default("llm.model", model)?
            .set_default("llm.temperature", 0.3)?
            .set_default("llm.seed", 42)?
            .set_default("llm.request_timeout_secs", 300)?
            .set_default("run.wait_time_secs", 20)?
            .set_default("run.checkpoint_interval", 10)?
            .set_default("run.output_dir", "data/output")?
            .set_default("run.rate_limit_retries", 0)?
            .set_default("triage.wait_time_secs", 60)?
            .set_default("triage.dataset_dir", "data/dataset")?
            .set_default("triage.default_repository", "elastic")?;

        builder = match path {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::MissingFile(path.to_path_buf()));
                }
                builder.add_source(File::from(path).required(true))
            }
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_NAME).required(false)),
        };

        let config: AppConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.run.checkpoint_interval == 0 {
            return Err(ConfigError::Invalid {
                key: "run.checkpoint_interval",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid {
                key: "llm.temperature",
                reason: format!("{} is outside 0.0..=2.0", self.llm.temperature),
            });
        }
        Ok(())
    }
}
