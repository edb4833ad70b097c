use thiserror::Error;

use crate::checkpoint::{CheckpointError, MergeError};
use crate::config::ConfigError;
use crate::dataset::DatasetError;
use crate::eval::EvalError;
use crate::llm::InvokeError;
use crate::prompt::PromptError;
use crate::triage::TriageError;

/// Top-level error for the `mergebench` commands.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("provider error: {0}")]
    Invoke(#[from] InvokeError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("triage error: {0}")]
    Triage(#[from] TriageError),

    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("run interrupted; resume from {0}")]
    Interrupted(String),
}

pub type Result<T> = std::result::Result<T, Error>;
