use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::dataset::item::WorkItem;

/// Errors raised while reading or writing JSON-Lines datasets.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}:{line}: invalid record: {source}")]
    InvalidLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

pub type DatasetResult<T> = Result<T, DatasetError>;

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> DatasetError + '_ {
    move |source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Load every work item of a JSON-Lines dataset, in file order.
///
/// Blank lines are skipped.
pub fn load_work_items(path: impl AsRef<Path>) -> DatasetResult<Vec<WorkItem>> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(io_error(path))?;
    let mut items = Vec::new();

    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_error(path))?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line).map_err(|source| DatasetError::InvalidLine {
            path: path.to_path_buf(),
            line: number + 1,
            source,
        })?;
        items.push(item);
    }

    Ok(items)
}

/// Filter raw conflict dumps down to records whose `field` contains `keyword`
/// (case-insensitive) and number them from 1 across all inputs.
///
/// Returns the number of records written.
pub fn extract_matching(
    inputs: &[PathBuf],
    output: &Path,
    field: &str,
    keyword: &str,
) -> DatasetResult<u64> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let mut writer = BufWriter::new(fs::File::create(output).map_err(io_error(output))?);
    let keyword = keyword.to_lowercase();
    let mut next_id = 1u64;

    for input in inputs {
        let file = fs::File::open(input).map_err(io_error(input))?;
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(io_error(input))?;
            if line.trim().is_empty() {
                continue;
            }
            let mut record: Value =
                serde_json::from_str(&line).map_err(|source| DatasetError::InvalidLine {
                    path: input.clone(),
                    line: number + 1,
                    source,
                })?;

            let matches = record
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|value| value.to_lowercase().contains(&keyword));
            if !matches {
                continue;
            }

            if let Some(object) = record.as_object_mut() {
                object.insert("id".to_string(), Value::from(next_id));
            }
            next_id += 1;
            writeln!(writer, "{}", record).map_err(io_error(output))?;
        }
    }

    writer.flush().map_err(io_error(output))?;
    Ok(next_id - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DATASET: &str = r#"{"id": 1, "commit_sha": "a1", "conflict_tuple": {"a_content": "x"}, "commit_message": "m1"}

{"id": 2, "commit_sha": "b2", "conflict_tuple": {"b_content": "y"}, "commit_message": "m2"}
"#;

    #[test]
    fn test_load_work_items_skips_blank_lines() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().join("elastic_train_conflicts.jsonl");
        fs::write(&path, DATASET).expect("write");

        let items = load_work_items(&path).expect("load");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 1);
        assert_eq!(items[1].commit_sha, "b2");
    }

    #[test]
    fn test_load_work_items_reports_line_number() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().join("broken.jsonl");
        fs::write(&path, "{\"id\": 1, \"commit_sha\": \"a\", \"conflict_tuple\": {}}\nnot json\n")
            .expect("write");

        let err = load_work_items(&path).expect_err("invalid line");
        match err {
            DatasetError::InvalidLine { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_work_items_missing_file() {
        let temp_dir = TempDir::new().expect("temp dir");
        let err = load_work_items(temp_dir.path().join("nope.jsonl")).expect_err("missing");
        assert!(matches!(err, DatasetError::Io { .. }));
    }

    #[test]
    fn test_extract_matching_renumbers_across_inputs() {
        let temp_dir = TempDir::new().expect("temp dir");
        let first = temp_dir.path().join("val.jsonl");
        let second = temp_dir.path().join("train.jsonl");
        fs::write(
            &first,
            "{\"repository_name\": \"eclipse/jetty\", \"id\": 90}\n{\"repository_name\": \"elastic/es\"}\n",
        )
        .expect("write");
        fs::write(&second, "{\"repository_name\": \"Eclipse/che\"}\n").expect("write");
        let output = temp_dir.path().join("out").join("filtered.jsonl");

        let written = extract_matching(
            &[first, second],
            &output,
            "repository_name",
            "eclipse/",
        )
        .expect("extract");

        assert_eq!(written, 2);
        let lines: Vec<Value> = fs::read_to_string(&output)
            .expect("read")
            .lines()
            .map(|l| serde_json::from_str(l).expect("json"))
            .collect();
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[1]["id"], 2);
        assert_eq!(lines[1]["repository_name"], "Eclipse/che");
    }
}
