use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::checkpoint::file::{CheckpointFile, CheckpointView, RunInfo, RunMetadata, StoredResults};
use crate::resolution::ResultRecord;

const FILE_PREFIX: &str = "solved_conflicts";
const FILE_EXTENSION: &str = "json";

/// Errors that can occur while reading or writing result files.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Writes run snapshots into an output directory.
///
/// File names embed the model and a UTC timestamp; intermediate snapshots
/// also embed the resume offset, so names sort chronologically and never
/// collide within a run.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    output_dir: PathBuf,
}

impl CheckpointStore {
    /// The directory is created lazily on the first save.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Persist `results` as a new file and return its path.
    ///
    /// `is_final` marks a completed run; otherwise the file is a resumable
    /// checkpoint named after the next offset to process.
    pub fn save(
        &self,
        results: &[ResultRecord],
        info: &RunInfo,
        last_processed_index: Option<usize>,
        is_final: bool,
    ) -> CheckpointResult<PathBuf> {
        let now = Utc::now();
        let metadata = RunMetadata::new(info, results.len(), last_processed_index, !is_final, now);

        let offset = (!is_final).then(|| last_processed_index.map_or(0, |index| index + 1));
        let file_name = Self::file_name(&info.model, now, offset);

        fs::create_dir_all(&self.output_dir).map_err(|source| CheckpointError::Io {
            path: self.output_dir.clone(),
            source,
        })?;
        let path = unique_path(self.output_dir.join(file_name));

        write_json(
            &path,
            &CheckpointView {
                metadata: &metadata,
                results,
            },
        )?;
        Ok(path)
    }

    /// `solved_conflicts_<model>_<YYYYmmdd_HHMMSS>[_checkpoint_<offset>].json`
    pub fn file_name(model: &str, timestamp: DateTime<Utc>, offset: Option<usize>) -> String {
        let stamp = timestamp.format("%Y%m%d_%H%M%S");
        let model = sanitize_model(model);
        match offset {
            Some(offset) => format!(
                "{}_{}_{}_checkpoint_{}.{}",
                FILE_PREFIX, model, stamp, offset, FILE_EXTENSION
            ),
            None => format!("{}_{}_{}.{}", FILE_PREFIX, model, stamp, FILE_EXTENSION),
        }
    }

    /// Read a result file (full or bare-array format).
    pub fn load(path: impl AsRef<Path>) -> CheckpointResult<CheckpointFile> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let stored: StoredResults =
            serde_json::from_str(&content).map_err(|source| CheckpointError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(stored.into())
    }

    /// Rewrite `file` at an explicit path.
    pub fn write(path: impl AsRef<Path>, file: &CheckpointFile) -> CheckpointResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| CheckpointError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        write_json(path, file)
    }
}

fn sanitize_model(model: &str) -> String {
    let cleaned: String = model
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | ' ' => '-',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        "unknown-model".to_string()
    } else {
        cleaned
    }
}

fn unique_path(path: PathBuf) -> PathBuf {
    if !path.exists() {
        return path;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
    (1..)
        .map(|n| parent.join(format!("{}_{}.{}", stem, n, FILE_EXTENSION)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(path)
}

/// Write through a temporary file and rename, so a crash never leaves a
/// half-written result file behind.
fn write_json<T: Serialize>(path: &Path, value: &T) -> CheckpointResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|source| CheckpointError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let io_err = |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name));

    let written = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    });
    if let Err(source) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(io_err(source));
    }

    Ok(())
}
