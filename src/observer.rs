//! Progress events emitted by the runner and triage.
//!
//! Components never log directly; they report [`RunEvent`]s to the
//! [`RunObserver`] they were given. The binary wires in [`TracingObserver`].

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::resolution::Failure;

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    RunStarted {
        provider: String,
        model: String,
        start: usize,
        end: usize,
        total_items: usize,
    },
    ItemStarted {
        index: usize,
        id: u64,
    },
    ItemResolved {
        index: usize,
        id: u64,
        elapsed: Duration,
    },
    ItemFailed {
        index: usize,
        id: u64,
        failure: Failure,
    },
    ItemRetrying {
        index: usize,
        id: u64,
        attempt: u32,
    },
    BatchCompleted {
        start: usize,
        end: usize,
    },
    CheckpointSaved {
        path: PathBuf,
        is_final: bool,
    },
    CheckpointFailed {
        error: String,
    },
    Waiting {
        duration: Duration,
    },
    Interrupted {
        next_index: usize,
    },
    RunFinished {
        attempted: usize,
        failed: usize,
        last_processed_index: Option<usize>,
    },
    TriageStarted {
        path: PathBuf,
        failing: usize,
    },
    TriageNothingToDo {
        path: PathBuf,
    },
    TriageDatasetMissing {
        path: PathBuf,
        repository: String,
    },
    TriageItemMissing {
        id: u64,
    },
    TriageRegenerated {
        id: u64,
        elapsed: Duration,
    },
    TriageFailed {
        id: u64,
        failure: Failure,
    },
    TriageWritten {
        path: PathBuf,
        regenerated: usize,
    },
}

/// Receiver of progress events.
pub trait RunObserver: Send + Sync {
    fn notify(&self, event: RunEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn notify(&self, event: RunEvent) {
        match event {
            RunEvent::RunStarted {
                provider,
                model,
                start,
                end,
                total_items,
            } => info!(%provider, %model, start, end, total_items, "starting generation run"),
            RunEvent::ItemStarted { index, id } => debug!(index, id, "generating resolution"),
            RunEvent::ItemResolved { index, id, elapsed } => {
                info!(index, id, elapsed_ms = elapsed.as_millis() as u64, "resolution generated")
            }
            RunEvent::ItemFailed { index, id, failure } => warn!(
                index,
                id,
                kind = failure.kind.label(),
                error = %failure.detail,
                "resolution failed"
            ),
            RunEvent::ItemRetrying { index, id, attempt } => {
                warn!(index, id, attempt, "rate limited, retrying item")
            }
            RunEvent::BatchCompleted { start, end } => info!(start, end, "batch completed"),
            RunEvent::CheckpointSaved { path, is_final } => {
                info!(path = %path.display(), is_final, "results saved")
            }
            RunEvent::CheckpointFailed { error } => {
                error!(%error, "failed to save checkpoint, keeping results in memory")
            }
            RunEvent::Waiting { duration } => {
                debug!(secs = duration.as_secs_f64(), "waiting before next request")
            }
            RunEvent::Interrupted { next_index } => {
                warn!(next_index, "run interrupted, flushing accumulated results")
            }
            RunEvent::RunFinished {
                attempted,
                failed,
                last_processed_index,
            } => info!(attempted, failed, ?last_processed_index, "run finished"),
            RunEvent::TriageStarted { path, failing } => {
                info!(path = %path.display(), failing, "regenerating failed resolutions")
            }
            RunEvent::TriageNothingToDo { path } => {
                info!(path = %path.display(), "no failed resolutions, nothing to do")
            }
            RunEvent::TriageDatasetMissing { path, repository } => error!(
                path = %path.display(),
                %repository,
                "dataset not found, skipping file"
            ),
            RunEvent::TriageItemMissing { id } => {
                warn!(id, "id not found in original dataset, skipping")
            }
            RunEvent::TriageRegenerated { id, elapsed } => {
                info!(id, elapsed_ms = elapsed.as_millis() as u64, "resolution regenerated")
            }
            RunEvent::TriageFailed { id, failure } => warn!(
                id,
                kind = failure.kind.label(),
                error = %failure.detail,
                "regeneration failed, keeping previous error"
            ),
            RunEvent::TriageWritten { path, regenerated } => {
                info!(path = %path.display(), regenerated, "triaged results saved")
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl RunObserver for RecordingObserver {
    fn notify(&self, event: RunEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_keeps_order() {
        let observer = RecordingObserver::new();
        observer.notify(RunEvent::ItemStarted { index: 0, id: 1 });
        observer.notify(RunEvent::BatchCompleted { start: 0, end: 1 });

        assert_eq!(
            observer.events(),
            vec![
                RunEvent::ItemStarted { index: 0, id: 1 },
                RunEvent::BatchCompleted { start: 0, end: 1 },
            ]
        );
    }
}
