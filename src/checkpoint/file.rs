use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::resolution::ResultRecord;

/// Identity of a generation run, copied into every file it writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    pub provider: String,
    pub model: String,
    pub repository_name: Option<String>,
}

impl RunInfo {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            repository_name: None,
        }
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository_name = Some(repository.into());
        self
    }
}

/// Metadata block of a result file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
    /// ISO-8601 time the file was written.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timestamp: String,
    #[serde(default)]
    pub total_records: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_processed_index: Option<usize>,
    /// `true` for intermediate snapshots, `false` for a completed run.
    #[serde(default)]
    pub is_checkpoint: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regeneration_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regenerated_count: Option<usize>,
    /// Fields written by other tools, preserved on rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RunMetadata {
    pub fn new(
        info: &RunInfo,
        total_records: usize,
        last_processed_index: Option<usize>,
        is_checkpoint: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            provider: info.provider.clone(),
            model: info.model.clone(),
            repository_name: info.repository_name.clone(),
            timestamp: iso_timestamp(now),
            total_records,
            last_processed_index,
            is_checkpoint,
            ..Self::default()
        }
    }

    pub fn run_info(&self) -> RunInfo {
        RunInfo {
            provider: self.provider.clone(),
            model: self.model.clone(),
            repository_name: self.repository_name.clone(),
        }
    }
}

/// A persisted result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointFile {
    #[serde(default)]
    pub metadata: RunMetadata,
    pub results: Vec<ResultRecord>,
}

impl CheckpointFile {
    /// Indices of records whose generation failed, in file order.
    pub fn failed_indices(&self) -> Vec<usize> {
        self.results
            .iter()
            .enumerate()
            .filter(|(_, record)| record.is_failed())
            .map(|(index, _)| index)
            .collect()
    }

    /// Smallest record id, if any.
    pub fn min_id(&self) -> Option<u64> {
        self.results.iter().map(|record| record.id).min()
    }
}

/// Borrowed form used when saving, so results need not be cloned.
#[derive(Serialize)]
pub(crate) struct CheckpointView<'a> {
    pub metadata: &'a RunMetadata,
    pub results: &'a [ResultRecord],
}

/// On-disk shapes accepted when loading.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum StoredResults {
    Full(CheckpointFile),
    /// Plain array of records without metadata.
    Bare(Vec<ResultRecord>),
}

impl From<StoredResults> for CheckpointFile {
    fn from(stored: StoredResults) -> Self {
        match stored {
            StoredResults::Full(file) => file,
            StoredResults::Bare(results) => CheckpointFile {
                metadata: RunMetadata {
                    total_records: results.len(),
                    ..RunMetadata::default()
                },
                results,
            },
        }
    }
}

pub fn iso_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}
