//! Checkpointed, rate-limited batch generation.
//!
//! The runner walks a window of work items in fixed-size batches, asks the
//! [`ResolutionInvoker`](crate::llm::ResolutionInvoker) for each one, and
//! turns every failure into a failed record so nothing aborts the run. A
//! snapshot is written after every batch and once more at the end.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use mergebench::runner::{BatchRunner, RunRequest, RunnerConfig};
//!
//! let config = RunnerConfig::new()
//!     .with_batch_size(10)
//!     .with_wait_time(Duration::from_secs(20));
//!
//! let runner = BatchRunner::new(config, info, invoker, observer).with_store(store);
//! let report = runner.run(&items, RunRequest::new(0).with_max_requests(100)).await;
//! println!("last processed index: {:?}", report.last_processed_index);
//! ```

mod batch;
mod window;

use std::path::PathBuf;
use std::time::Duration;

use crate::checkpoint::CheckpointFile;
use crate::config::RunSettings;
use crate::resolution::ResultRecord;

pub use batch::BatchRunner;
pub use window::Window;

/// Pacing and batching behaviour of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Items per batch. A checkpoint is written after each batch.
    /// Default: 10
    pub batch_size: usize,

    /// Fixed pause after every item and between batches.
    /// Default: 20 seconds
    pub wait_time: Duration,

    /// Extra attempts for an item that failed with a rate-limit error.
    /// Default: 0 (record the failure and move on)
    pub rate_limit_retries: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            wait_time: Duration::from_secs(20),
            rate_limit_retries: 0,
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    pub fn with_rate_limit_retries(mut self, retries: u32) -> Self {
        self.rate_limit_retries = retries;
        self
    }
}

impl From<&RunSettings> for RunnerConfig {
    fn from(settings: &RunSettings) -> Self {
        Self::new()
            .with_batch_size(settings.checkpoint_interval)
            .with_wait_time(Duration::from_secs(settings.wait_time_secs))
            .with_rate_limit_retries(settings.rate_limit_retries)
    }
}

/// Where a run starts and what it builds on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRequest {
    pub start_index: usize,
    /// Maximum items to attempt; `None` runs to the end of the dataset.
    pub max_requests: Option<usize>,
    /// Results of an earlier run that this one continues.
    pub prior_results: Vec<ResultRecord>,
    pub prior_last_index: Option<usize>,
}

impl RunRequest {
    pub fn new(start_index: usize) -> Self {
        Self {
            start_index,
            ..Self::default()
        }
    }

    pub fn with_max_requests(mut self, max_requests: usize) -> Self {
        self.max_requests = Some(max_requests);
        self
    }

    /// Continue from a saved checkpoint, right after its last processed item.
    pub fn resume(file: CheckpointFile) -> Self {
        let last = file.metadata.last_processed_index;
        Self {
            start_index: last.map_or(0, |index| index + 1),
            max_requests: None,
            prior_results: file.results,
            prior_last_index: last,
        }
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Prior results followed by one record per attempted item.
    pub results: Vec<ResultRecord>,
    pub last_processed_index: Option<usize>,
    /// Items attempted by this run.
    pub attempted: usize,
    /// Items attempted by this run that ended as failures.
    pub failed: usize,
    pub interrupted: bool,
    /// Intermediate snapshots written after each batch.
    pub checkpoints: Vec<PathBuf>,
    /// File written when the run ended; `None` if that write failed or no
    /// store was configured.
    pub final_path: Option<PathBuf>,
}
