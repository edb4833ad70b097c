use std::fs;
use std::path::{Path, PathBuf};

/// Finds the dataset file a result set was generated from.
///
/// Datasets live under `<root>/<repository>/`, normally as
/// `<repository>_train_conflicts.jsonl`.
#[derive(Debug, Clone)]
pub struct DatasetLocator {
    root: PathBuf,
}

impl DatasetLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locate the dataset for `repository`, falling back to the first
    /// `.jsonl` file (by name) in the repository directory.
    pub fn find(&self, repository: &str) -> Option<PathBuf> {
        let repo_dir = self.root.join(repository);
        let preferred = repo_dir.join(format!("{}_train_conflicts.jsonl", repository));
        if preferred.is_file() {
            return Some(preferred);
        }

        let mut candidates: Vec<PathBuf> = fs::read_dir(&repo_dir)
            .ok()?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "jsonl"))
            .collect();
        candidates.sort();
        candidates.into_iter().next()
    }
}
