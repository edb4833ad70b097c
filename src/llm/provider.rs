use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::{ConfigError, LlmSettings};

/// Request/response shape spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Google `models/{model}:generateContent`.
    Gemini,
    /// OpenAI-compatible `/chat/completions`.
    OpenAiChat,
}

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Google,
    Groq,
    Maritaca,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Groq => "groq",
            Provider::Maritaca => "maritaca",
        }
    }

    /// Environment variable holding the provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Google => "GOOGLE_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
            Provider::Maritaca => "MARITACA_API_KEY",
        }
    }

    pub fn default_api_base(&self) -> &'static str {
        match self {
            Provider::Google => "https://generativelanguage.googleapis.com/v1beta",
            Provider::Groq => "https://api.groq.com/openai/v1",
            Provider::Maritaca => "https://chat.maritaca.ai/api",
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Provider::Google => Dialect::Gemini,
            Provider::Groq | Provider::Maritaca => Dialect::OpenAiChat,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google" | "gemini" => Ok(Provider::Google),
            "groq" => Ok(Provider::Groq),
            "maritaca" => Ok(Provider::Maritaca),
            _ => Err(ConfigError::UnsupportedProvider(s.to_string())),
        }
    }
}

/// Fully resolved connection settings for one provider and model.
#[derive(Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
    pub api_base: String,
    pub temperature: f64,
    pub seed: Option<i64>,
    pub request_timeout: Duration,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("temperature", &self.temperature)
            .field("seed", &self.seed)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl LlmConfig {
    /// Resolve settings, reading the API key from the process environment.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self, ConfigError> {
        Self::resolve(settings, |name| env::var(name).ok())
    }

    /// Resolve settings with a custom environment lookup.
    pub fn resolve(
        settings: &LlmSettings,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let provider: Provider = settings.provider.parse()?;
        if settings.model.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "llm.model",
                reason: "model name is empty".to_string(),
            });
        }

        let env_var = provider.api_key_env();
        let api_key = lookup(env_var)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey {
                provider: provider.to_string(),
                env_var,
            })?;

        let api_base = settings
            .api_base
            .clone()
            .unwrap_or_else(|| provider.default_api_base().to_string());

        Ok(Self {
            provider,
            model: settings.model.clone(),
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            temperature: settings.temperature,
            seed: settings.seed,
            request_timeout: settings.request_timeout(),
        })
    }
}
