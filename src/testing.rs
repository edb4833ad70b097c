//! Shared fixtures for unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::cancel::Cancellation;
use crate::dataset::WorkItem;
use crate::llm::{InvokeError, ResolutionInvoker};

pub fn conflict_tuple(tag: &str) -> Value {
    json!({
        "a_content": format!("a {tag}"),
        "b_content": format!("b {tag}"),
        "base_content": format!("base {tag}"),
        "resolution": format!("merged {tag}"),
    })
}

pub fn work_item(id: u64) -> WorkItem {
    WorkItem {
        id,
        commit_sha: format!("sha{id}"),
        conflict_tuple: conflict_tuple(&id.to_string()),
        commit_message: Some(format!("commit {id}")),
        filename: None,
        repository_name: None,
    }
}

pub fn work_items(ids: std::ops::RangeInclusive<u64>) -> Vec<WorkItem> {
    ids.map(work_item).collect()
}

/// Answers `resolved #<call>` unless told otherwise.
#[derive(Default)]
pub struct ScriptedInvoker {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    /// Prompt substrings that make the call fail.
    failing: HashSet<String>,
    fail_all: bool,
    /// Leading calls answered with HTTP 429.
    rate_limited_calls: usize,
    /// Cancel this token once the given number of calls completed.
    cancel_after: Option<(usize, Cancellation)>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_all() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.failing.insert(marker.into());
        self
    }

    pub fn rate_limited_first(mut self, calls: usize) -> Self {
        self.rate_limited_calls = calls;
        self
    }

    pub fn cancel_after(mut self, calls: usize, cancellation: Cancellation) -> Self {
        self.cancel_after = Some((calls, cancellation));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

#[async_trait]
impl ResolutionInvoker for ScriptedInvoker {
    async fn invoke(&self, prompt: &str) -> Result<String, InvokeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().expect("prompts lock").push(prompt.to_string());

        if let Some((after, cancellation)) = &self.cancel_after {
            if call >= *after {
                cancellation.cancel();
            }
        }

        if call <= self.rate_limited_calls {
            return Err(InvokeError::from_status(429, "quota exceeded"));
        }
        if self.fail_all || self.failing.iter().any(|marker| prompt.contains(marker.as_str())) {
            return Err(InvokeError::Other("connection reset by peer".to_string()));
        }
        Ok(format!("resolved #{call}"))
    }
}
