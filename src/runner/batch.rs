use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::cancel::Cancellation;
use crate::checkpoint::{CheckpointStore, RunInfo};
use crate::dataset::WorkItem;
use crate::llm::ResolutionInvoker;
use crate::observer::{RunEvent, RunObserver};
use crate::prompt::PromptBuilder;
use crate::resolution::{Failure, FailureKind, Resolution, ResultRecord};

use super::{RunReport, RunRequest, RunnerConfig, Window};

/// Result of walking one batch.
struct BatchOutcome {
    records: Vec<ResultRecord>,
    /// First index not attempted.
    next: usize,
    interrupted: bool,
}

/// Drives a generation run over a slice of work items.
pub struct BatchRunner {
    config: RunnerConfig,
    info: RunInfo,
    invoker: Arc<dyn ResolutionInvoker>,
    prompts: PromptBuilder,
    store: Option<CheckpointStore>,
    observer: Arc<dyn RunObserver>,
    cancellation: Cancellation,
}

impl BatchRunner {
    pub fn new(
        config: RunnerConfig,
        info: RunInfo,
        invoker: Arc<dyn ResolutionInvoker>,
        observer: Arc<dyn RunObserver>,
    ) -> Self {
        Self {
            config,
            info,
            invoker,
            prompts: PromptBuilder::new(),
            store: None,
            observer,
            cancellation: Cancellation::new(),
        }
    }

    /// Persist checkpoints and the final result file through `store`.
    pub fn with_store(mut self, store: CheckpointStore) -> Self {
        self.store = Some(store);
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

    /// Process `items[start .. start + max]` and return every record.
    ///
    /// Per-item failures become failed records and checkpoint write errors
    /// are reported to the observer; neither stops the run.
    pub async fn run(&self, items: &[WorkItem], request: RunRequest) -> RunReport {
        let window = Window::clip(items.len(), request.start_index, request.max_requests);
        self.observer.notify(RunEvent::RunStarted {
            provider: self.info.provider.clone(),
            model: self.info.model.clone(),
            start: window.start,
            end: window.end,
            total_items: items.len(),
        });

        let prior_len = request.prior_results.len();
        let mut results = request.prior_results;
        let mut last_processed_index = request.prior_last_index;
        let mut checkpoints = Vec::new();
        let mut interrupted = false;

        for batch in window.batches(self.config.batch_size) {
            let outcome = self.run_batch(items, batch, window.end).await;
            if outcome.next > batch.start {
                last_processed_index = Some(outcome.next - 1);
            }
            results.extend(outcome.records);

            if outcome.interrupted || outcome.next < batch.end {
                interrupted = outcome.interrupted;
                self.observer.notify(RunEvent::Interrupted {
                    next_index: outcome.next,
                });
                break;
            }

            self.observer.notify(RunEvent::BatchCompleted {
                start: batch.start,
                end: batch.end,
            });
            if let Some(path) = self.save(&results, last_processed_index, false) {
                checkpoints.push(path);
            }

            if batch.end < window.end && self.pace().await {
                interrupted = true;
                self.observer.notify(RunEvent::Interrupted {
                    next_index: batch.end,
                });
                break;
            }
        }

        // An interrupted run stays resumable: its last write is a checkpoint.
        let final_path = self.save(&results, last_processed_index, !interrupted);

        let attempted = results.len() - prior_len;
        let failed = results[prior_len..]
            .iter()
            .filter(|record| record.is_failed())
            .count();
        self.observer.notify(RunEvent::RunFinished {
            attempted,
            failed,
            last_processed_index,
        });

        RunReport {
            results,
            last_processed_index,
            attempted,
            failed,
            interrupted,
            checkpoints,
            final_path,
        }
    }

    async fn run_batch(&self, items: &[WorkItem], batch: Window, window_end: usize) -> BatchOutcome {
        let mut records = Vec::with_capacity(batch.len());

        for index in batch.start..batch.end {
            if self.cancellation.is_cancelled() {
                return BatchOutcome {
                    records,
                    next: index,
                    interrupted: true,
                };
            }

            let item = &items[index];
            let resolution = self.resolve(index, item).await;
            records.push(ResultRecord::new(item.id, item.commit_sha.clone(), resolution));

            // No pause after the last item of the window.
            if index + 1 < window_end && self.pace().await {
                return BatchOutcome {
                    records,
                    next: index + 1,
                    interrupted: true,
                };
            }
        }

        BatchOutcome {
            records,
            next: batch.end,
            interrupted: false,
        }
    }

    async fn resolve(&self, index: usize, item: &WorkItem) -> Resolution {
        self.observer.notify(RunEvent::ItemStarted { index, id: item.id });

        let prompt = match self.prompts.build(&item.conflict_tuple, item.commit_message()) {
            Ok(prompt) => prompt,
            Err(err) => {
                let failure = Failure::new(FailureKind::InvalidInput, err.to_string());
                return self.fail(index, item.id, failure);
            }
        };

        let mut attempt = 0;
        loop {
            let started = Instant::now();
            match self.invoker.invoke(&prompt).await {
                Ok(text) => {
                    self.observer.notify(RunEvent::ItemResolved {
                        index,
                        id: item.id,
                        elapsed: started.elapsed(),
                    });
                    return Resolution::Generated(text);
                }
                Err(err) => {
                    let failure = Failure::from(&err);
                    let retry = failure.kind == FailureKind::RateLimited
                        && attempt < self.config.rate_limit_retries;
                    if !retry {
                        return self.fail(index, item.id, failure);
                    }

                    attempt += 1;
                    self.observer.notify(RunEvent::ItemRetrying {
                        index,
                        id: item.id,
                        attempt,
                    });
                    if self.pace().await {
                        return self.fail(index, item.id, failure);
                    }
                }
            }
        }
    }

    fn fail(&self, index: usize, id: u64, failure: Failure) -> Resolution {
        self.observer.notify(RunEvent::ItemFailed {
            index,
            id,
            failure: failure.clone(),
        });
        Resolution::Failed(failure)
    }

    /// Fixed-delay pacing. Returns `true` if cancelled while waiting.
    async fn pace(&self) -> bool {
        let wait = self.config.wait_time;
        if !wait.is_zero() {
            self.observer.notify(RunEvent::Waiting { duration: wait });
        }
        self.cancellation.pause(wait).await
    }

    fn save(
        &self,
        results: &[ResultRecord],
        last_processed_index: Option<usize>,
        is_final: bool,
    ) -> Option<PathBuf> {
        let store = self.store.as_ref()?;
        match store.save(results, &self.info, last_processed_index, is_final) {
            Ok(path) => {
                self.observer.notify(RunEvent::CheckpointSaved {
                    path: path.clone(),
                    is_final,
                });
                Some(path)
            }
            Err(err) => {
                self.observer.notify(RunEvent::CheckpointFailed {
                    error: err.to_string(),
                });
                None
            }
        }
    }
}
