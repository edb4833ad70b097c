use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::provider::{Dialect, LlmConfig};
use super::{InvokeError, ResolutionInvoker};

/// HTTP client for the configured provider.
pub struct ChatClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(config: LlmConfig) -> Result<Self, InvokeError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Endpoint URL and JSON body for a prompt.
    pub fn request_parts(&self, prompt: &str) -> (String, Value) {
        let config = &self.config;
        match config.provider.dialect() {
            Dialect::Gemini => {
                let mut generation = json!({ "temperature": config.temperature });
                if let Some(seed) = config.seed {
                    generation["seed"] = json!(seed);
                }
                (
                    format!("{}/models/{}:generateContent", config.api_base, config.model),
                    json!({
                        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
                        "generationConfig": generation,
                    }),
                )
            }
            Dialect::OpenAiChat => {
                let mut body = json!({
                    "model": config.model,
                    "messages": [{ "role": "user", "content": prompt }],
                    "temperature": config.temperature,
                });
                if let Some(seed) = config.seed {
                    body["seed"] = json!(seed);
                }
                (format!("{}/chat/completions", config.api_base), body)
            }
        }
    }
}

/// Pull the generated text out of a provider response.
pub fn extract_text(dialect: Dialect, response: &Value) -> Option<String> {
    match dialect {
        Dialect::Gemini => {
            let parts = response
                .pointer("/candidates/0/content/parts")?
                .as_array()?;
            let text: String = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect();
            (!text.is_empty()).then_some(text)
        }
        Dialect::OpenAiChat => response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

#[async_trait]
impl ResolutionInvoker for ChatClient {
    async fn invoke(&self, prompt: &str) -> Result<String, InvokeError> {
        let dialect = self.config.provider.dialect();
        let (url, body) = self.request_parts(prompt);
        debug!(provider = %self.config.provider, model = %self.config.model, "sending request");

        let request = self.client.post(&url).json(&body);
        let request = match dialect {
            Dialect::Gemini => request.header("x-goog-api-key", &self.config.api_key),
            Dialect::OpenAiChat => request.bearer_auth(&self.config.api_key),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(InvokeError::from_status(status.as_u16(), error_text));
        }

        let json: Value = response.json().await?;
        extract_text(dialect, &json).ok_or(InvokeError::MissingContent)
    }
}
