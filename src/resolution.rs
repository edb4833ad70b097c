//! Generated resolutions and their on-disk representation.
//!
//! A result record carries either the text produced by the provider or a
//! failure. On disk both are a plain string under `conflict_resolution`; a
//! failure is written with the [`FAILURE_SENTINEL`] prefix so that files stay
//! readable by the existing evaluation tooling.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Prefix marking a failed generation in persisted result files.
pub const FAILURE_SENTINEL: &str = "Erro ao gerar: ";

/// Shortest prefix recognised as a failure when loading older files.
const FAILURE_MARKER: &str = "Erro ao gerar";

/// Broad category of a generation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Provider rejected the call because of rate or quota limits.
    RateLimited,
    /// Credentials missing, invalid or not allowed to use the model.
    Unauthorized,
    /// Transport-level failure (DNS, connect, timeout).
    Network,
    /// Provider answered but the response was unusable.
    Provider,
    /// The conflict record could not be turned into a prompt.
    InvalidInput,
    /// Kind could not be recovered (e.g. loaded from an older file).
    Unknown,
}

impl FailureKind {
    /// Best-effort recovery of the kind from a persisted error detail.
    pub fn classify(detail: &str) -> Self {
        let lower = detail.to_lowercase();
        if lower.contains("429")
            || lower.contains("rate limit")
            || lower.contains("resource_exhausted")
            || lower.contains("quota")
        {
            FailureKind::RateLimited
        } else if lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("unauthorized")
        {
            FailureKind::Unauthorized
        } else if lower.contains("timed out")
            || lower.contains("timeout")
            || lower.contains("connection")
        {
            FailureKind::Network
        } else if lower.contains("conflict_tuple") {
            FailureKind::InvalidInput
        } else {
            FailureKind::Unknown
        }
    }

    /// Stable label used in logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Unauthorized => "unauthorized",
            FailureKind::Network => "network",
            FailureKind::Provider => "provider",
            FailureKind::InvalidInput => "invalid_input",
            FailureKind::Unknown => "unknown",
        }
    }
}

/// A failed generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub detail: String,
}

impl Failure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.detail, self.kind.label())
    }
}

/// Outcome stored for one conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Generated(String),
    Failed(Failure),
}

impl Resolution {
    pub fn failed(kind: FailureKind, detail: impl Into<String>) -> Self {
        Resolution::Failed(Failure::new(kind, detail))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Resolution::Failed(_))
    }

    /// Generated text, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Resolution::Generated(text) => Some(text),
            Resolution::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Resolution::Generated(_) => None,
            Resolution::Failed(failure) => Some(failure),
        }
    }

    /// The string written to disk for this resolution.
    pub fn to_persisted(&self) -> String {
        match self {
            Resolution::Generated(text) => text.clone(),
            Resolution::Failed(failure) => format!("{}{}", FAILURE_SENTINEL, failure.detail),
        }
    }

    /// Parse the persisted string form.
    pub fn from_persisted(value: String) -> Self {
        match value.strip_prefix(FAILURE_MARKER) {
            Some(rest) => {
                let detail = rest.strip_prefix(':').unwrap_or(rest).trim_start();
                Resolution::Failed(Failure::new(FailureKind::classify(detail), detail))
            }
            None => Resolution::Generated(value),
        }
    }
}

impl Serialize for Resolution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_persisted())
    }
}

impl<'de> Deserialize<'de> for Resolution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Older result files occasionally carry `null` here.
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(Resolution::from_persisted(value.unwrap_or_default()))
    }
}

/// One persisted result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: u64,
    pub commit_sha: String,
    pub conflict_resolution: Resolution,
}

impl ResultRecord {
    pub fn new(id: u64, commit_sha: impl Into<String>, resolution: Resolution) -> Self {
        Self {
            id,
            commit_sha: commit_sha.into(),
            conflict_resolution: resolution,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.conflict_resolution.is_failed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_resolution_serializes_with_sentinel() {
        let record = ResultRecord::new(
            7,
            "abc123",
            Resolution::failed(FailureKind::Network, "timeout"),
        );
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(
            value,
            json!({"id": 7, "commit_sha": "abc123", "conflict_resolution": "Erro ao gerar: timeout"})
        );
    }

    #[test]
    fn test_generated_resolution_round_trips_as_plain_text() {
        let raw = json!({"id": 1, "commit_sha": "def", "conflict_resolution": "int x = 1;"});
        let record: ResultRecord = serde_json::from_value(raw.clone()).expect("deserialize");
        assert_eq!(record.conflict_resolution.text(), Some("int x = 1;"));
        assert_eq!(serde_json::to_value(&record).expect("serialize"), raw);
    }

    #[test]
    fn test_sentinel_is_parsed_into_failure() {
        let raw = json!({
            "id": 2,
            "commit_sha": "f00",
            "conflict_resolution": "Erro ao gerar: 429 RESOURCE_EXHAUSTED"
        });
        let record: ResultRecord = serde_json::from_value(raw).expect("deserialize");
        let failure = record.conflict_resolution.failure().expect("failure");
        assert_eq!(failure.kind, FailureKind::RateLimited);
        assert_eq!(failure.detail, "429 RESOURCE_EXHAUSTED");
    }

    #[test]
    fn test_sentinel_must_be_a_prefix() {
        let resolution = Resolution::from_persisted("// Erro ao gerar: not a failure".to_string());
        assert!(!resolution.is_failed());
    }

    #[test]
    fn test_legacy_failure_without_separator_is_parsed() {
        let resolution = Resolution::from_persisted("Erro ao gerar:timeout".to_string());
        let failure = resolution.failure().expect("failure");
        assert_eq!(failure.detail, "timeout");
        assert_eq!(resolution.to_persisted(), "Erro ao gerar: timeout");

        let bare = Resolution::from_persisted("Erro ao gerar".to_string());
        assert!(bare.is_failed());
        assert_eq!(bare.failure().map(|f| f.detail.as_str()), Some(""));
    }

    #[test]
    fn test_null_resolution_loads_as_empty_text() {
        let raw = json!({"id": 3, "commit_sha": "x", "conflict_resolution": null});
        let record: ResultRecord = serde_json::from_value(raw).expect("deserialize");
        assert_eq!(record.conflict_resolution, Resolution::Generated(String::new()));
    }

    #[test]
    fn test_classify_recovers_known_kinds() {
        assert_eq!(FailureKind::classify("HTTP 401"), FailureKind::Unauthorized);
        assert_eq!(
            FailureKind::classify("operation timed out"),
            FailureKind::Network
        );
        assert_eq!(
            FailureKind::classify("conflict_tuple is not an object"),
            FailureKind::InvalidInput
        );
        assert_eq!(FailureKind::classify("boom"), FailureKind::Unknown);
    }
}
