//! Persistence of run results.

pub mod file;
pub mod merge;
pub mod store;

pub use file::{CheckpointFile, RunInfo, RunMetadata};
pub use merge::{merge_files, merge_paths, MergeError};
pub use store::{CheckpointError, CheckpointResult, CheckpointStore};
