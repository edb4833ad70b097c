use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One merge conflict taken from a repository history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Stable identifier, unique within a dataset.
    pub id: u64,
    pub commit_sha: String,
    /// Raw `{a_content, b_content, base_content, resolution?}` object.
    ///
    /// Kept as JSON so a malformed tuple surfaces when its prompt is built
    /// instead of rejecting the whole dataset.
    pub conflict_tuple: Value,
    #[serde(default)]
    pub commit_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
}

impl WorkItem {
    pub fn commit_message(&self) -> &str {
        self.commit_message.as_deref().unwrap_or_default()
    }

    /// Typed view of the conflict tuple, if it is well formed.
    pub fn conflict(&self) -> Option<ConflictTuple> {
        ConflictTuple::from_value(&self.conflict_tuple)
    }
}

/// Three-way merge inputs for one conflict region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictTuple {
    pub a_content: Option<String>,
    pub b_content: Option<String>,
    pub base_content: Option<String>,
    /// Ground-truth resolution recorded in the repository.
    pub resolution: Option<String>,
}

impl ConflictTuple {
    /// Read the tuple from its JSON form. Returns `None` unless it is an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let field = |name: &str| {
            object
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Some(Self {
            a_content: field("a_content"),
            b_content: field("b_content"),
            base_content: field("base_content"),
            resolution: field("resolution"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_work_item_parses_dataset_line() {
        let item: WorkItem = serde_json::from_value(json!({
            "id": 4,
            "commit_sha": "9f1c",
            "conflict_tuple": {
                "a_content": "int a;",
                "b_content": "int b;",
                "base_content": "",
                "resolution": "int a;"
            },
            "commit_message": "Merge branch 'jetty-9.4.x'",
            "filename": "src/Foo.java",
            "repository_name": "eclipse/jetty.project"
        }))
        .expect("work item");

        assert_eq!(item.id, 4);
        assert_eq!(item.commit_message(), "Merge branch 'jetty-9.4.x'");
        let conflict = item.conflict().expect("conflict");
        assert_eq!(conflict.a_content.as_deref(), Some("int a;"));
        assert_eq!(conflict.resolution.as_deref(), Some("int a;"));
    }

    #[test]
    fn test_missing_commit_message_is_empty() {
        let item: WorkItem = serde_json::from_value(json!({
            "id": 1,
            "commit_sha": "x",
            "conflict_tuple": {},
            "commit_message": null
        }))
        .expect("work item");
        assert_eq!(item.commit_message(), "");
    }

    #[test]
    fn test_non_object_tuple_has_no_conflict_view() {
        assert!(ConflictTuple::from_value(&json!("a_content")).is_none());
        assert!(ConflictTuple::from_value(&json!(null)).is_none());
    }
}
