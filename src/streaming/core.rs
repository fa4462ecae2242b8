//! StreamingCore - accumulation, checkpointing, and terminal paths of one stream
//!
//! One `StreamingCore` drives one stream through its lifecycle:
//! `INIT → ACQUIRING → RUNNING → {COMPLETED | FAILED | CANCELLED}`.
//! Acquisition failure is terminal; once running, every token re-checks for
//! cancellation before mutating state, so cancellation latency is bounded by
//! inter-token latency.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::CancellationToken;

use crate::core::{CoreResult, StreamingConfig, TaskState};
use crate::emitter::Emitter;
use crate::gate::ConcurrencyGate;
use crate::resources::ResourceManager;
use crate::status::StatusStore;
use crate::tasks::TaskStateManager;

use super::state::{Source, StreamResult, StreamingState, ThinkingStep};

/// Error reported when admission fails
pub const ADMISSION_ERROR: &str = "Too many concurrent chat requests";

/// Per-stream driver for accumulation, checkpointing, and terminal emission
pub struct StreamingCore {
    state: StreamingState,
    store: Arc<dyn StatusStore>,
    emitter: Arc<dyn Emitter>,
    gate: ConcurrencyGate,
    tasks: TaskStateManager,
    config: StreamingConfig,
    shutdown: CancellationToken,

    /// Held admission slot; dropping it is the only release path
    permit: Option<OwnedSemaphorePermit>,

    /// Per-stream cancellation handle, registered with the store
    cancellation: Option<CancellationToken>,

    /// Attached sub-resources (e.g. a tool-provider connection), released LIFO
    resources: ResourceManager,

    /// Set once a terminal event has been emitted
    finished: bool,
}

impl StreamingCore {
    /// Create the core for a new stream
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        task_id: impl Into<String>,
        subtask_id: impl Into<String>,
        store: Arc<dyn StatusStore>,
        emitter: Arc<dyn Emitter>,
        gate: ConcurrencyGate,
        tasks: TaskStateManager,
        config: StreamingConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            state: StreamingState::new(task_id, subtask_id),
            store,
            emitter,
            gate,
            tasks,
            config,
            shutdown,
            permit: None,
            cancellation: None,
            resources: ResourceManager::new(),
            finished: false,
        }
    }

    /// Task id of this stream
    pub fn task_id(&self) -> &str {
        &self.state.task_id
    }

    /// Subtask id of this stream
    pub fn subtask_id(&self) -> &str {
        &self.state.subtask_id
    }

    /// Accumulated state (read-only)
    pub fn state(&self) -> &StreamingState {
        &self.state
    }

    /// Register an attached sub-resource for LIFO cleanup on release
    pub fn resources_mut(&mut self) -> &mut ResourceManager {
        &mut self.resources
    }

    /// Acquire the admission slot and register the stream
    ///
    /// On success: registers for cancellation, marks the task RUNNING in the
    /// durable store, emits the start event, returns `true`. On timeout: emits
    /// the admission error, persists FAILED, returns `false` — the caller must
    /// not proceed.
    pub async fn acquire_resources(&mut self) -> CoreResult<bool> {
        match self.gate.acquire(self.config.acquire_timeout).await {
            Some(permit) => {
                self.permit = Some(permit);
                let token = self.store.register_stream(&self.state.subtask_id).await;
                self.cancellation = Some(token);
                self.tasks.set(&self.state.task_id, TaskState::Running).await;
                self.store
                    .update_status(&self.state.subtask_id, TaskState::Running, None, None)
                    .await?;
                self.emitter
                    .emit_start(&self.state.task_id, &self.state.subtask_id)
                    .await;
                tracing::info!(
                    task_id = %self.state.task_id,
                    subtask_id = %self.state.subtask_id,
                    "[StreamingCore] Stream admitted"
                );
                Ok(true)
            }
            None => {
                tracing::warn!(
                    task_id = %self.state.task_id,
                    "[StreamingCore] Admission failed: {}",
                    ADMISSION_ERROR
                );
                self.emitter
                    .emit_error(&self.state.subtask_id, ADMISSION_ERROR)
                    .await;
                self.tasks.set(&self.state.task_id, TaskState::Failed).await;
                self.store
                    .update_status(
                        &self.state.subtask_id,
                        TaskState::Failed,
                        None,
                        Some(ADMISSION_ERROR),
                    )
                    .await?;
                self.finished = true;
                Ok(false)
            }
        }
    }

    /// Process one token from the agent
    ///
    /// The only mutation point for stream state. Checks the cancellation
    /// handle and the global shutdown signal before mutating; if either is
    /// set, emits the cancelled event, marks the task CANCELLED, and returns
    /// `false` — the caller must stop iterating the source.
    pub async fn process_token(&mut self, token: &str) -> CoreResult<bool> {
        let cancel_requested = self
            .cancellation
            .as_ref()
            .map(|t| t.is_cancelled())
            .unwrap_or(false);

        if cancel_requested || self.shutdown.is_cancelled() {
            self.emit_cancelled_terminal().await;
            self.tasks.set(&self.state.task_id, TaskState::Cancelled).await;
            return Ok(false);
        }

        let offset = self.state.append(token);
        self.emitter
            .emit_chunk(token, offset, &self.state.subtask_id, None)
            .await;
        self.periodic_save().await;
        Ok(true)
    }

    /// Run the two checkpoint cadences
    ///
    /// Hot save persists only the raw text to the fast cache so a
    /// reconnecting reader does not lose the tail between durable writes.
    /// Durable save persists the full structured result, status still
    /// RUNNING, to the authoritative store. Checkpoint failures are logged
    /// and never escalate.
    pub async fn periodic_save(&mut self) {
        let now = Instant::now();

        if now.duration_since(self.state.last_hot_save) >= self.config.hot_save_interval {
            self.state.last_hot_save = now;
            if let Err(e) = self
                .store
                .save_content(&self.state.subtask_id, &self.state.response)
                .await
            {
                tracing::warn!(
                    subtask_id = %self.state.subtask_id,
                    error = %e,
                    "[StreamingCore] Hot save failed"
                );
            }
        }

        if now.duration_since(self.state.last_durable_save) >= self.config.durable_save_interval {
            self.state.last_durable_save = now;
            let snapshot = self.state.snapshot(None);
            if let Err(e) = self
                .store
                .update_status(
                    &self.state.subtask_id,
                    TaskState::Running,
                    Some(&snapshot),
                    None,
                )
                .await
            {
                tracing::warn!(
                    subtask_id = %self.state.subtask_id,
                    error = %e,
                    "[StreamingCore] Durable save failed"
                );
            }
        }
    }

    /// Record a thinking step
    pub fn record_thinking(&mut self, key: impl Into<String>, params: Value) {
        self.state.push_thinking(ThinkingStep::new(key, params));
    }

    /// Record a citation source (de-duplicated by id + title)
    pub fn record_source(&mut self, source: Source) {
        self.state.push_source(source);
    }

    /// Finalize the stream on the success path
    ///
    /// Persists final content to the hot cache for straggling readers,
    /// publishes the cross-process done signal, writes COMPLETED with the
    /// final structured result, resolves the message ordering id, and emits
    /// the terminal done event.
    pub async fn finalize(&mut self) -> CoreResult<StreamResult> {
        let result = self.state.snapshot(None);

        self.store
            .save_content(&self.state.subtask_id, &self.state.response)
            .await?;
        self.store
            .publish_done(&self.state.subtask_id, &result)
            .await?;
        self.tasks.set(&self.state.task_id, TaskState::Completed).await;
        self.store
            .update_status(
                &self.state.subtask_id,
                TaskState::Completed,
                Some(&result),
                None,
            )
            .await?;

        let message_id = self.resolve_message_id().await;

        if !self.finished {
            self.finished = true;
            self.emitter
                .emit_done(
                    &self.state.task_id,
                    &self.state.subtask_id,
                    self.state.offset,
                    result.clone(),
                    message_id,
                )
                .await;
        }

        tracing::info!(
            task_id = %self.state.task_id,
            subtask_id = %self.state.subtask_id,
            bytes = self.state.offset,
            "[StreamingCore] Stream completed"
        );
        Ok(result)
    }

    /// Terminal error path
    ///
    /// Emits the error event, persists FAILED with the partial result, and
    /// also emits a terminal done event carrying the error so a consumer
    /// relying solely on "done" is never left hanging.
    pub async fn handle_error(&mut self, error: &str) {
        if self.finished {
            tracing::debug!(
                subtask_id = %self.state.subtask_id,
                "[StreamingCore] Error after terminal event, ignoring: {}",
                error
            );
            return;
        }

        tracing::error!(
            task_id = %self.state.task_id,
            subtask_id = %self.state.subtask_id,
            "[StreamingCore] Stream failed: {}",
            error
        );

        self.emitter.emit_error(&self.state.subtask_id, error).await;
        self.tasks.set(&self.state.task_id, TaskState::Failed).await;

        let result = self.state.snapshot(Some(error));
        if let Err(e) = self
            .store
            .update_status(
                &self.state.subtask_id,
                TaskState::Failed,
                Some(&result),
                Some(error),
            )
            .await
        {
            tracing::warn!(
                subtask_id = %self.state.subtask_id,
                error = %e,
                "[StreamingCore] Failed to persist FAILED status"
            );
        }

        let message_id = self.resolve_message_id().await;
        self.finished = true;
        self.emitter
            .emit_done(
                &self.state.task_id,
                &self.state.subtask_id,
                self.state.offset,
                result,
                message_id,
            )
            .await;
    }

    /// Terminal cancellation path used when the upstream acknowledged an
    /// interrupt (the execution-error tail of a cancellation sequence).
    /// Emits the cancelled event followed by the terminal done event carrying
    /// the partial result, never an error event.
    pub async fn cancelled(&mut self) {
        self.emit_cancelled_terminal().await;
    }

    /// Release everything this stream holds, in `finally` position
    ///
    /// Unregisters the cancellation handle, deletes the hot-cache entry,
    /// releases attached sub-resources LIFO, then drops the admission permit.
    /// The permit is released last, and only if acquisition succeeded.
    pub async fn release_resources(&mut self) {
        if self.cancellation.take().is_some() {
            self.store.unregister_stream(&self.state.subtask_id).await;
        }

        if let Err(e) = self.store.delete_content(&self.state.subtask_id).await {
            tracing::warn!(
                subtask_id = %self.state.subtask_id,
                error = %e,
                "[StreamingCore] Hot-cache delete failed"
            );
        }

        self.resources.release_all().await;

        // Dropping the permit is the semaphore release; it must come last.
        self.permit.take();

        tracing::debug!(
            subtask_id = %self.state.subtask_id,
            "[StreamingCore] Resources released"
        );
    }

    async fn emit_cancelled_terminal(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        tracing::info!(
            task_id = %self.state.task_id,
            subtask_id = %self.state.subtask_id,
            "[StreamingCore] Stream cancelled"
        );

        self.emitter.emit_cancelled(&self.state.subtask_id).await;

        let snapshot = self.state.snapshot(None);
        if let Err(e) = self
            .store
            .update_status(
                &self.state.subtask_id,
                TaskState::Cancelled,
                Some(&snapshot),
                None,
            )
            .await
        {
            tracing::warn!(
                subtask_id = %self.state.subtask_id,
                error = %e,
                "[StreamingCore] Failed to persist CANCELLED status"
            );
        }

        // The done event is owed on every path; here it carries the partial
        // result with no error.
        let message_id = self.resolve_message_id().await;
        self.emitter
            .emit_done(
                &self.state.task_id,
                &self.state.subtask_id,
                self.state.offset,
                snapshot,
                message_id,
            )
            .await;
    }

    async fn resolve_message_id(&self) -> Option<i64> {
        if let Some(id) = self.state.message_id {
            return Some(id);
        }
        match self.store.message_ordering_id(&self.state.subtask_id).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(
                    subtask_id = %self.state.subtask_id,
                    error = %e,
                    "[StreamingCore] Could not resolve message ordering id"
                );
                None
            }
        }
    }
}
