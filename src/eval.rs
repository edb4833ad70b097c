//! Scoring generated resolutions against the dataset ground truth.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;
use similar::TextDiff;
use thiserror::Error;

use crate::dataset::WorkItem;
use crate::resolution::ResultRecord;

/// Similarity above which a resolution counts as "took one side".
const APPROACH_THRESHOLD: f64 = 90.0;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("invalid normalization pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Approach {
    ChoseA,
    ChoseB,
    ChoseBase,
    Custom,
}

impl Approach {
    /// Classify by the closest input side, preferring A, then B, then base.
    pub fn classify(a: f64, b: f64, base: f64) -> Self {
        let best = a.max(b).max(base);
        if best <= APPROACH_THRESHOLD {
            Approach::Custom
        } else if best == a {
            Approach::ChoseA
        } else if best == b {
            Approach::ChoseB
        } else {
            Approach::ChoseBase
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRecord {
    pub id: u64,
    pub exact_match: bool,
    pub similarity: f64,
    pub is_empty_resolution: bool,
    pub resolution_approach: Approach,
    pub a_similarity: f64,
    pub b_similarity: f64,
    pub base_similarity: f64,
    pub filename: String,
    pub commit_sha: String,
}

impl EvaluationRecord {
    /// Text after the last `.` of the filename, or `unknown`.
    pub fn file_extension(&self) -> &str {
        self.filename
            .rsplit_once('.')
            .map_or("unknown", |(_, ext)| ext)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub total_evaluated: usize,
    pub exact_matches: usize,
    /// Percentage of exact matches.
    pub exact_match_rate: f64,
    pub average_similarity: f64,
    pub failed_generations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionSummary {
    pub file_extension: String,
    pub count: usize,
    /// Fraction of exact matches, 0.0 to 1.0.
    pub exact_match_rate: f64,
    pub avg_similarity: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub records: Vec<EvaluationRecord>,
    /// Ids with a failed generation; not scored.
    pub failed_generations: usize,
}

impl Evaluation {
    pub fn summary(&self) -> EvaluationSummary {
        let total = self.records.len();
        let exact = self.records.iter().filter(|r| r.exact_match).count();
        EvaluationSummary {
            total_evaluated: total,
            exact_matches: exact,
            exact_match_rate: ratio(exact, total) * 100.0,
            average_similarity: mean(self.records.iter().map(|r| r.similarity)),
            failed_generations: self.failed_generations,
        }
    }

    /// Per-extension figures, largest group first.
    pub fn extension_summary(&self) -> Vec<ExtensionSummary> {
        let mut groups: Vec<(String, Vec<&EvaluationRecord>)> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for record in &self.records {
            let ext = record.file_extension();
            let slot = *positions.entry(ext).or_insert_with(|| {
                groups.push((ext.to_string(), Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(record);
        }

        let mut summary: Vec<ExtensionSummary> = groups
            .into_iter()
            .map(|(file_extension, records)| {
                let exact = records.iter().filter(|r| r.exact_match).count();
                ExtensionSummary {
                    file_extension,
                    count: records.len(),
                    exact_match_rate: ratio(exact, records.len()),
                    avg_similarity: mean(records.iter().map(|r| r.similarity)),
                }
            })
            .collect();
        // Stable sort keeps first-seen order among equal counts.
        summary.sort_by(|a, b| b.count.cmp(&a.count));
        summary
    }
}

/// Compares generated resolutions with the recorded ones.
#[derive(Debug, Clone)]
pub struct Evaluator {
    fences: Regex,
    trailing_spaces: Regex,
}

impl Evaluator {
    pub fn new() -> Result<Self, EvalError> {
        Ok(Self {
            fences: Regex::new(r"```\w*\n?|\n?```")?,
            trailing_spaces: Regex::new(r"(?m) +$")?,
        })
    }

    /// Drop Markdown code fences, surrounding whitespace and trailing spaces.
    pub fn normalize_code(&self, code: &str) -> String {
        let unfenced = self.fences.replace_all(code, "");
        self.trailing_spaces
            .replace_all(unfenced.trim(), "")
            .into_owned()
    }

    /// Character-level similarity of the normalized texts, 0 to 100.
    pub fn similarity(&self, left: &str, right: &str) -> f64 {
        match (left.is_empty(), right.is_empty()) {
            (true, true) => 100.0,
            (true, false) | (false, true) => 0.0,
            (false, false) => {
                let left = self.normalize_code(left);
                let right = self.normalize_code(right);
                f64::from(TextDiff::from_chars(left.as_str(), right.as_str()).ratio()) * 100.0
            }
        }
    }

    /// Score every dataset item that has a result, in dataset order.
    pub fn evaluate(&self, items: &[WorkItem], results: &[ResultRecord]) -> Evaluation {
        let by_id: HashMap<u64, &ResultRecord> = results.iter().map(|r| (r.id, r)).collect();

        let mut evaluation = Evaluation::default();
        for item in items {
            let Some(result) = by_id.get(&item.id) else {
                continue;
            };
            let Some(generated) = result.conflict_resolution.text() else {
                evaluation.failed_generations += 1;
                continue;
            };
            evaluation.records.push(self.score(item, generated));
        }
        evaluation
    }

    fn score(&self, item: &WorkItem, generated: &str) -> EvaluationRecord {
        let conflict = item.conflict().unwrap_or_default();
        let expected = conflict.resolution.as_deref().unwrap_or_default();
        let a = conflict.a_content.as_deref().unwrap_or_default();
        let b = conflict.b_content.as_deref().unwrap_or_default();
        let base = conflict.base_content.as_deref().unwrap_or_default();

        let expected_norm = self.normalize_code(expected);
        let a_similarity = self.similarity(generated, a);
        let b_similarity = self.similarity(generated, b);
        let base_similarity = self.similarity(generated, base);

        EvaluationRecord {
            id: item.id,
            exact_match: expected_norm == self.normalize_code(generated),
            similarity: self.similarity(expected, generated),
            is_empty_resolution: expected_norm.is_empty(),
            resolution_approach: Approach::classify(a_similarity, b_similarity, base_similarity),
            a_similarity,
            b_similarity,
            base_similarity,
            filename: item.filename.clone().unwrap_or_default(),
            commit_sha: item.commit_sha.clone(),
        }
    }
}

/// Write `<name>-resolution_evaluation.json` and
/// `<name>-file_extension_summary.json` into `output_dir`.
pub fn write_reports(
    evaluation: &Evaluation,
    output_dir: &Path,
    name: &str,
) -> Result<(PathBuf, PathBuf), EvalError> {
    fs::create_dir_all(output_dir).map_err(|source| EvalError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let records_path = output_dir.join(format!("{}-resolution_evaluation.json", name));
    write_pretty(&records_path, &evaluation.records)?;

    let summary_path = output_dir.join(format!("{}-file_extension_summary.json", name));
    write_pretty(&summary_path, &evaluation.extension_summary())?;

    Ok((records_path, summary_path))
}

fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), EvalError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| EvalError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| EvalError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
