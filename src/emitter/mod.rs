//! Emitter - publish stream events to whoever is watching
//!
//! The streaming core never talks to a transport directly. It calls the
//! [`Emitter`] trait; the two provided implementations cover the two transport
//! shapes the platform uses:
//! - [`BufferedEmitter`]: pull-based queue, drained by a polling reader (SSE-style)
//! - [`BroadcastEmitter`]: push-based fan-out over a tokio broadcast channel

mod broadcast;
mod buffered;

pub use broadcast::BroadcastEmitter;
pub use buffered::BufferedEmitter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::streaming::StreamResult;

/// One event published on a stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EmittedEvent {
    /// Stream admitted and running
    Start {
        /// Task id
        task_id: String,
        /// Subtask id
        subtask_id: String,
    },

    /// Incremental content
    Chunk {
        /// The token text
        content: String,
        /// Offset before this chunk was appended
        offset: usize,
        /// Subtask id
        subtask_id: String,
        /// Optional structured snapshot riding along with the chunk
        snapshot: Option<StreamResult>,
    },

    /// Terminal event; exactly one per stream, on every path.
    /// On failure, `result.error` is set and partial text is preserved;
    /// on cancellation it carries the partial result with no error.
    Done {
        /// Task id
        task_id: String,
        /// Subtask id
        subtask_id: String,
        /// Final offset
        offset: usize,
        /// Final structured result
        result: StreamResult,
        /// Message ordering id, when resolved
        message_id: Option<i64>,
    },

    /// Error notification (always followed by a `Done` carrying the error)
    Error {
        /// Subtask id
        subtask_id: String,
        /// Error text
        error: String,
    },

    /// Stream was cancelled (always followed by a `Done` carrying the
    /// partial result)
    Cancelled {
        /// Subtask id
        subtask_id: String,
    },
}

impl EmittedEvent {
    /// Check if this event ends the stream for a consumer
    pub fn is_terminal(&self) -> bool {
        matches!(self, EmittedEvent::Done { .. })
    }
}

/// Publish events for one or more watched streams
///
/// Behavior contract shared by all implementations: within one stream, events
/// are delivered in emission order, and `emit_done` is eventually called
/// exactly once per stream.
#[async_trait]
pub trait Emitter: Send + Sync {
    /// Publish an event
    async fn emit(&self, event: EmittedEvent);

    /// Stream admitted and running
    async fn emit_start(&self, task_id: &str, subtask_id: &str) {
        self.emit(EmittedEvent::Start {
            task_id: task_id.to_string(),
            subtask_id: subtask_id.to_string(),
        })
        .await;
    }

    /// Incremental content, with the pre-append offset
    async fn emit_chunk(
        &self,
        content: &str,
        offset: usize,
        subtask_id: &str,
        snapshot: Option<StreamResult>,
    ) {
        self.emit(EmittedEvent::Chunk {
            content: content.to_string(),
            offset,
            subtask_id: subtask_id.to_string(),
            snapshot,
        })
        .await;
    }

    /// Terminal done event
    async fn emit_done(
        &self,
        task_id: &str,
        subtask_id: &str,
        offset: usize,
        result: StreamResult,
        message_id: Option<i64>,
    ) {
        self.emit(EmittedEvent::Done {
            task_id: task_id.to_string(),
            subtask_id: subtask_id.to_string(),
            offset,
            result,
            message_id,
        })
        .await;
    }

    /// Error notification
    async fn emit_error(&self, subtask_id: &str, error: &str) {
        self.emit(EmittedEvent::Error {
            subtask_id: subtask_id.to_string(),
            error: error.to_string(),
        })
        .await;
    }

    /// Cancellation notification
    async fn emit_cancelled(&self, subtask_id: &str) {
        self.emit(EmittedEvent::Cancelled {
            subtask_id: subtask_id.to_string(),
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_events() {
        let done = EmittedEvent::Done {
            task_id: "t".into(),
            subtask_id: "s".into(),
            offset: 0,
            result: StreamResult {
                text: String::new(),
                thinking_steps: Vec::new(),
                sources: Vec::new(),
                error: None,
            },
            message_id: None,
        };
        assert!(done.is_terminal());

        let chunk = EmittedEvent::Chunk {
            content: "hi".into(),
            offset: 0,
            subtask_id: "s".into(),
            snapshot: None,
        };
        assert!(!chunk.is_terminal());

        // Cancelled is a notification; the done that follows it terminates.
        let cancelled = EmittedEvent::Cancelled {
            subtask_id: "s".into(),
        };
        assert!(!cancelled.is_terminal());
    }
}
