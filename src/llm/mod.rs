//! Provider access for resolution generation.
//!
//! The batch runner and triage only see [`ResolutionInvoker`]: prompt in,
//! text out, or an [`InvokeError`]. [`ChatClient`] is the HTTP
//! implementation used by the binary.

pub mod client;
pub mod provider;

use async_trait::async_trait;
use thiserror::Error;

use crate::resolution::{Failure, FailureKind};

pub use client::ChatClient;
pub use provider::{Dialect, LlmConfig, Provider};

/// Longest provider error body kept in an error message.
const MAX_ERROR_BODY: usize = 500;

/// Errors raised by a single generation call.
#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rate limited by provider (HTTP {status}): {body}")]
    RateLimited { status: u16, body: String },

    #[error("provider rejected credentials (HTTP {status}): {body}")]
    Unauthorized { status: u16, body: String },

    #[error("provider error (HTTP {status}): {body}")]
    Status { status: u16, body: String },

    #[error("provider response missing content")]
    MissingContent,

    #[error("{0}")]
    Other(String),
}

impl InvokeError {
    /// Map a non-success HTTP status and body to an error.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = truncate(body.into());
        match status {
            429 => InvokeError::RateLimited { status, body },
            401 | 403 => InvokeError::Unauthorized { status, body },
            _ => InvokeError::Status { status, body },
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            InvokeError::Transport(err) if err.is_decode() => FailureKind::Provider,
            InvokeError::Transport(_) => FailureKind::Network,
            InvokeError::RateLimited { .. } => FailureKind::RateLimited,
            InvokeError::Unauthorized { .. } => FailureKind::Unauthorized,
            InvokeError::Status { .. } | InvokeError::MissingContent => FailureKind::Provider,
            InvokeError::Other(message) => FailureKind::classify(message),
        }
    }
}

impl From<&InvokeError> for Failure {
    fn from(err: &InvokeError) -> Self {
        Failure::new(err.kind(), err.to_string())
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
    body
}

/// A single "resolve this conflict" call against some model.
#[async_trait]
pub trait ResolutionInvoker: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<String, InvokeError>;
}
