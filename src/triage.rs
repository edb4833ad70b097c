//! Regeneration of failed resolutions in saved result files.
//!
//! Only records whose resolution is a failure are re-attempted; successful
//! records are never touched, so running triage twice on the same file is a
//! no-op the second time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;

use crate::cancel::Cancellation;
use crate::checkpoint::file::iso_timestamp;
use crate::checkpoint::{CheckpointError, CheckpointStore};
use crate::dataset::{load_work_items, DatasetError, DatasetLocator, WorkItem};
use crate::llm::ResolutionInvoker;
use crate::observer::{RunEvent, RunObserver};
use crate::prompt::PromptBuilder;
use crate::resolution::{Failure, FailureKind, Resolution};

pub const DEFAULT_REPOSITORY: &str = "elastic";

/// Errors that stop triage of a file.
#[derive(Error, Debug)]
pub enum TriageError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("failed to read glob match: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("{first} and {second} would both be written to {output}")]
    OutputCollision {
        output: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },
}

/// Where the original work items come from.
#[derive(Debug, Clone)]
pub enum DatasetSource {
    /// One dataset file used for every result file.
    File(PathBuf),
    /// Look the dataset up by the repository recorded in each result file.
    Directory(DatasetLocator),
}

impl DatasetSource {
    fn resolve(&self, repository: &str) -> Option<PathBuf> {
        match self {
            DatasetSource::File(path) => path.is_file().then(|| path.clone()),
            DatasetSource::Directory(locator) => locator.find(repository),
        }
    }
}

/// Where a triaged file is written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// `<stem>_fixed.<ext>` next to the input.
    #[default]
    Sibling,
    /// Replace the input file.
    Overwrite,
    /// A fixed path; a directory when several files are processed.
    Path(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriageOutcome {
    /// No failed records; nothing was called or written.
    Unchanged(PathBuf),
    /// No dataset for the file's repository; the file was skipped.
    DatasetMissing { input: PathBuf, repository: String },
    Written {
        input: PathBuf,
        output: PathBuf,
        failing: usize,
        attempted: usize,
        regenerated: usize,
        interrupted: bool,
    },
}

pub struct Triage {
    invoker: Arc<dyn ResolutionInvoker>,
    dataset: DatasetSource,
    default_repository: String,
    output: OutputMode,
    wait_time: Duration,
    prompts: PromptBuilder,
    observer: Arc<dyn RunObserver>,
    cancellation: Cancellation,
}

impl Triage {
    pub fn new(
        invoker: Arc<dyn ResolutionInvoker>,
        dataset: DatasetSource,
        observer: Arc<dyn RunObserver>,
    ) -> Self {
        Self {
            invoker,
            dataset,
            default_repository: DEFAULT_REPOSITORY.to_string(),
            output: OutputMode::default(),
            wait_time: Duration::from_secs(60),
            prompts: PromptBuilder::new(),
            observer,
            cancellation: Cancellation::new(),
        }
    }

    /// Repository used when a result file does not record one.
    pub fn with_default_repository(mut self, repository: impl Into<String>) -> Self {
        self.default_repository = repository.into();
        self
    }

    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Triage a single result file.
    pub async fn process_file(&self, path: impl AsRef<Path>) -> Result<TriageOutcome, TriageError> {
        self.process(path.as_ref(), false).await
    }

    /// Triage every file matching `pattern`, in sorted order.
    ///
    /// Stops after the current file once cancelled.
    pub async fn process_glob(&self, pattern: &str) -> Result<Vec<TriageOutcome>, TriageError> {
        let mut matches = glob::glob(pattern)?.collect::<Result<Vec<PathBuf>, _>>()?;
        matches.sort();
        let many = matches.len() > 1;

        let mut targets: HashMap<PathBuf, &PathBuf> = HashMap::new();
        for path in &matches {
            let output = self.output_path(path, many);
            if let Some(first) = targets.insert(output.clone(), path) {
                return Err(TriageError::OutputCollision {
                    output,
                    first: first.clone(),
                    second: path.clone(),
                });
            }
        }

        let mut outcomes = Vec::with_capacity(matches.len());
        for path in matches {
            if self.cancellation.is_cancelled() {
                break;
            }
            outcomes.push(self.process(&path, many).await?);
        }
        Ok(outcomes)
    }

    async fn process(&self, input: &Path, many: bool) -> Result<TriageOutcome, TriageError> {
        let mut file = CheckpointStore::load(input)?;
        let failing = file.failed_indices();
        if failing.is_empty() {
            self.observer.notify(RunEvent::TriageNothingToDo {
                path: input.to_path_buf(),
            });
            return Ok(TriageOutcome::Unchanged(input.to_path_buf()));
        }

        let repository = file
            .metadata
            .repository_name
            .clone()
            .unwrap_or_else(|| self.default_repository.clone());
        let Some(dataset_path) = self.dataset.resolve(&repository) else {
            self.observer.notify(RunEvent::TriageDatasetMissing {
                path: input.to_path_buf(),
                repository: repository.clone(),
            });
            return Ok(TriageOutcome::DatasetMissing {
                input: input.to_path_buf(),
                repository,
            });
        };

        let items = load_work_items(&dataset_path)?;
        // First occurrence wins when a dataset repeats an id.
        let mut by_id: HashMap<u64, &WorkItem> = HashMap::with_capacity(items.len());
        for item in &items {
            by_id.entry(item.id).or_insert(item);
        }

        self.observer.notify(RunEvent::TriageStarted {
            path: input.to_path_buf(),
            failing: failing.len(),
        });

        let mut attempted = 0;
        let mut regenerated = 0;
        let mut interrupted = false;
        for index in failing.iter().copied() {
            let id = file.results[index].id;
            let Some(item) = by_id.get(&id) else {
                self.observer.notify(RunEvent::TriageItemMissing { id });
                continue;
            };

            let cancelled = if attempted > 0 {
                self.pace().await
            } else {
                self.cancellation.is_cancelled()
            };
            if cancelled {
                interrupted = true;
                break;
            }

            attempted += 1;
            let started = Instant::now();
            match self.regenerate(item).await {
                Ok(text) => {
                    file.results[index].conflict_resolution = Resolution::Generated(text);
                    regenerated += 1;
                    self.observer.notify(RunEvent::TriageRegenerated {
                        id,
                        elapsed: started.elapsed(),
                    });
                }
                Err(failure) => self.observer.notify(RunEvent::TriageFailed { id, failure }),
            }
        }

        file.metadata.regeneration_timestamp = Some(iso_timestamp(Utc::now()));
        file.metadata.regenerated_count = Some(regenerated);
        file.metadata.total_records = file.results.len();

        let output = self.output_path(input, many);
        CheckpointStore::write(&output, &file)?;
        self.observer.notify(RunEvent::TriageWritten {
            path: output.clone(),
            regenerated,
        });

        Ok(TriageOutcome::Written {
            input: input.to_path_buf(),
            output,
            failing: failing.len(),
            attempted,
            regenerated,
            interrupted,
        })
    }

    async fn regenerate(&self, item: &WorkItem) -> Result<String, Failure> {
        let prompt = self
            .prompts
            .build(&item.conflict_tuple, item.commit_message())
            .map_err(|err| Failure::new(FailureKind::InvalidInput, err.to_string()))?;
        self.invoker
            .invoke(&prompt)
            .await
            .map_err(|err| Failure::from(&err))
    }

    async fn pace(&self) -> bool {
        if !self.wait_time.is_zero() {
            self.observer.notify(RunEvent::Waiting {
                duration: self.wait_time,
            });
        }
        self.cancellation.pause(self.wait_time).await
    }

    fn output_path(&self, input: &Path, many: bool) -> PathBuf {
        match &self.output {
            OutputMode::Overwrite => input.to_path_buf(),
            OutputMode::Path(dir) if many => match input.file_name() {
                Some(name) => dir.join(name),
                None => sibling_path(input),
            },
            OutputMode::Path(path) => path.clone(),
            OutputMode::Sibling => sibling_path(input),
        }
    }
}

/// `<stem>_fixed.<ext>` in the input's directory.
pub fn sibling_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = input
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| "json".to_string());
    input.with_file_name(format!("{}_fixed.{}", stem, ext))
}
