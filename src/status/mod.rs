//! Durable status store contract
//!
//! The authoritative store for task history is owned by the backend, not by
//! this core; the core consumes it through the [`StatusStore`] trait. The
//! trait also covers the hot content cache (crash-tail recovery for
//! reconnecting readers) and the per-stream cancellation registry.
//!
//! [`MemoryStatusStore`] is a complete in-process implementation used for
//! embedding and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::{CoreResult, TaskState};
use crate::streaming::StreamResult;

/// Durable status store consumed by the streaming core
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Persist task status, optionally with a structured result and error text
    async fn update_status(
        &self,
        id: &str,
        status: TaskState,
        result: Option<&StreamResult>,
        error: Option<&str>,
    ) -> CoreResult<()>;

    /// Persist raw accumulated text to the hot cache
    async fn save_content(&self, id: &str, text: &str) -> CoreResult<()>;

    /// Delete the hot-cache entry for a stream
    async fn delete_content(&self, id: &str) -> CoreResult<()>;

    /// Resolve the message ordering id for a stream, if one exists
    async fn message_ordering_id(&self, id: &str) -> CoreResult<Option<i64>>;

    /// Register a stream for cancellation, returning its cancellation handle
    async fn register_stream(&self, id: &str) -> CancellationToken;

    /// Trip the cancellation handle of a registered stream
    async fn cancel_stream(&self, id: &str);

    /// Remove a stream from the cancellation registry
    async fn unregister_stream(&self, id: &str);

    /// Publish a cross-process "stream done" signal
    async fn publish_done(&self, id: &str, result: &StreamResult) -> CoreResult<()>;
}

/// One persisted status record
#[derive(Debug, Clone)]
pub struct StatusRecord {
    /// Last persisted status
    pub status: TaskState,
    /// Last persisted structured result
    pub result: Option<StreamResult>,
    /// Last persisted error text
    pub error: Option<String>,
}

#[derive(Default)]
struct MemoryInner {
    statuses: HashMap<String, StatusRecord>,
    contents: HashMap<String, String>,
    ordering_ids: HashMap<String, i64>,
    streams: HashMap<String, CancellationToken>,
    done_signals: HashMap<String, StreamResult>,
    next_ordering_id: i64,
}

/// In-memory status store
#[derive(Clone)]
pub struct MemoryStatusStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStatusStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner {
                next_ordering_id: 1,
                ..MemoryInner::default()
            })),
        }
    }

    /// Read the last persisted status record for a stream
    pub async fn status(&self, id: &str) -> Option<StatusRecord> {
        self.inner.lock().await.statuses.get(id).cloned()
    }

    /// Read the hot-cache content for a stream
    pub async fn content(&self, id: &str) -> Option<String> {
        self.inner.lock().await.contents.get(id).cloned()
    }

    /// Read the published done signal for a stream
    pub async fn done_signal(&self, id: &str) -> Option<StreamResult> {
        self.inner.lock().await.done_signals.get(id).cloned()
    }

    /// Check whether a stream is currently registered for cancellation
    pub async fn is_registered(&self, id: &str) -> bool {
        self.inner.lock().await.streams.contains_key(id)
    }
}

impl Default for MemoryStatusStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn update_status(
        &self,
        id: &str,
        status: TaskState,
        result: Option<&StreamResult>,
        error: Option<&str>,
    ) -> CoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.statuses.insert(
            id.to_string(),
            StatusRecord {
                status,
                result: result.cloned(),
                error: error.map(str::to_string),
            },
        );
        Ok(())
    }

    async fn save_content(&self, id: &str, text: &str) -> CoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.contents.insert(id.to_string(), text.to_string());
        Ok(())
    }

    async fn delete_content(&self, id: &str) -> CoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.contents.remove(id);
        Ok(())
    }

    async fn message_ordering_id(&self, id: &str) -> CoreResult<Option<i64>> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.ordering_ids.get(id) {
            return Ok(Some(*existing));
        }
        let next = inner.next_ordering_id;
        inner.next_ordering_id += 1;
        inner.ordering_ids.insert(id.to_string(), next);
        Ok(Some(next))
    }

    async fn register_stream(&self, id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        let mut inner = self.inner.lock().await;
        inner.streams.insert(id.to_string(), token.clone());
        token
    }

    async fn cancel_stream(&self, id: &str) {
        let inner = self.inner.lock().await;
        if let Some(token) = inner.streams.get(id) {
            token.cancel();
        } else {
            tracing::debug!(id = %id, "[StatusStore] Cancel for unregistered stream");
        }
    }

    async fn unregister_stream(&self, id: &str) {
        let mut inner = self.inner.lock().await;
        inner.streams.remove(id);
    }

    async fn publish_done(&self, id: &str, result: &StreamResult) -> CoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.done_signals.insert(id.to_string(), result.clone());
        Ok(())
    }
}
