//! Per-stream accumulation state

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A structured "thinking step" record
///
/// This is a plain `{key, params}` record; rendering it to human-readable text
/// is a presentation-layer concern outside this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingStep {
    /// Step key (e.g. "tool_use", "searching")
    pub key: String,
    /// Structured parameters for the step
    pub params: Value,
}

impl ThinkingStep {
    /// Create a thinking step
    pub fn new(key: impl Into<String>, params: Value) -> Self {
        Self {
            key: key.into(),
            params,
        }
    }
}

/// A citation source attached to the response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Source identifier
    pub id: String,
    /// Human-readable title
    pub title: String,
    /// Optional link
    pub url: Option<String>,
}

impl Source {
    /// Create a source
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: None,
        }
    }

    /// Attach a URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Structured result payload of a stream
///
/// Snapshots of this are written on durable checkpoints; the final snapshot is
/// carried by the terminal done event. On failure, `error` is set and the
/// partial `text` is preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamResult {
    /// Accumulated response text
    pub text: String,
    /// Ordered thinking steps
    pub thinking_steps: Vec<ThinkingStep>,
    /// Ordered, de-duplicated citation sources
    pub sources: Vec<Source>,
    /// Error text, set only on the failure path
    pub error: Option<String>,
}

/// Mutable state of one in-flight stream
///
/// Created when a stream starts, mutated only by the streaming core driving
/// that stream, discarded when the stream finalizes.
#[derive(Debug)]
pub struct StreamingState {
    /// Task this stream belongs to
    pub task_id: String,

    /// Subtask identifier (keys durable records and emitted events)
    pub subtask_id: String,

    /// Accumulated response text
    pub response: String,

    /// Bytes emitted so far
    pub offset: usize,

    /// Ordered thinking steps
    pub thinking_steps: Vec<ThinkingStep>,

    /// Ordered, de-duplicated sources (dedup key = id + title)
    pub sources: Vec<Source>,

    /// Clock of the last hot-cache save
    pub last_hot_save: Instant,

    /// Clock of the last durable save
    pub last_durable_save: Instant,

    /// Message ordering id for client-side ordering, once known
    pub message_id: Option<i64>,
}

impl StreamingState {
    /// Create state for a new stream
    pub fn new(task_id: impl Into<String>, subtask_id: impl Into<String>) -> Self {
        let now = Instant::now();
        Self {
            task_id: task_id.into(),
            subtask_id: subtask_id.into(),
            response: String::new(),
            offset: 0,
            thinking_steps: Vec::new(),
            sources: Vec::new(),
            last_hot_save: now,
            last_durable_save: now,
            message_id: None,
        }
    }

    /// Append a token, returning the pre-append offset
    pub fn append(&mut self, token: &str) -> usize {
        let offset = self.offset;
        self.response.push_str(token);
        self.offset += token.len();
        offset
    }

    /// Record a thinking step
    pub fn push_thinking(&mut self, step: ThinkingStep) {
        self.thinking_steps.push(step);
    }

    /// Record a source, dropping duplicates by (id, title)
    pub fn push_source(&mut self, source: Source) {
        let duplicate = self
            .sources
            .iter()
            .any(|s| s.id == source.id && s.title == source.title);
        if !duplicate {
            self.sources.push(source);
        }
    }

    /// Snapshot the current structured result
    pub fn snapshot(&self, error: Option<&str>) -> StreamResult {
        StreamResult {
            text: self.response.clone(),
            thinking_steps: self.thinking_steps.clone(),
            sources: self.sources.clone(),
            error: error.map(str::to_string),
        }
    }
}
