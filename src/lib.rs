//! Batch generation of merge-conflict resolutions with LLM providers.
//!
//! A run walks a JSON-Lines dataset of conflicts, asks a provider for each
//! resolution, and checkpoints results so a long run can be resumed. Failed
//! items are recorded in place and can be regenerated later by [`triage`].

pub mod cancel;
pub mod checkpoint;
pub mod config;
pub mod dataset;
pub mod error;
pub mod eval;
pub mod llm;
pub mod logging;
pub mod observer;
pub mod prompt;
pub mod resolution;
pub mod runner;
pub mod triage;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
