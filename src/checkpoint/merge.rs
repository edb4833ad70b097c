use std::path::Path;

use chrono::Utc;
use thiserror::Error;

use crate::checkpoint::file::{iso_timestamp, CheckpointFile, RunMetadata};
use crate::checkpoint::store::{CheckpointError, CheckpointStore};

/// Errors raised when combining two result files.
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("models are different: {first} vs {second}")]
    ModelMismatch { first: String, second: String },

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// Combine two result sets produced by the same model.
///
/// The file whose smallest id is lower comes first; an empty file sorts
/// last and ties keep argument order.
pub fn merge_files(
    first: CheckpointFile,
    second: CheckpointFile,
) -> Result<CheckpointFile, MergeError> {
    if first.metadata.model != second.metadata.model {
        return Err(MergeError::ModelMismatch {
            first: first.metadata.model,
            second: second.metadata.model,
        });
    }

    let first_min = first.min_id().unwrap_or(u64::MAX);
    let second_min = second.min_id().unwrap_or(u64::MAX);
    let (lead, tail) = if first_min <= second_min {
        (first, second)
    } else {
        (second, first)
    };

    let last_processed_index = lead
        .metadata
        .last_processed_index
        .max(tail.metadata.last_processed_index);

    let mut results = lead.results;
    results.extend(tail.results);

    let metadata = RunMetadata {
        provider: lead.metadata.provider,
        model: lead.metadata.model,
        repository_name: lead.metadata.repository_name,
        timestamp: iso_timestamp(Utc::now()),
        total_records: results.len(),
        last_processed_index,
        is_checkpoint: false,
        ..RunMetadata::default()
    };

    Ok(CheckpointFile { metadata, results })
}

/// Load two files, merge them and write the result to `output`.
///
/// Nothing is written when the merge is rejected.
pub fn merge_paths(
    first: impl AsRef<Path>,
    second: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<CheckpointFile, MergeError> {
    let first = CheckpointStore::load(first)?;
    let second = CheckpointStore::load(second)?;
    let merged = merge_files(first, second)?;
    CheckpointStore::write(output, &merged)?;
    Ok(merged)
}
