//! StreamRuntime - the control-flow owner of every stream
//!
//! One runtime instance serves the whole process: it owns the admission gate,
//! the task-state table, the session manager, and the durable store handle.
//! `run` drives one stream end to end inside an error boundary, so every
//! stream terminates with exactly one terminal event and releases everything
//! it holds, no matter which phase failed.

use std::sync::Arc;

use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::{StreamingConfig, TaskState};
use crate::emitter::Emitter;
use crate::gate::ConcurrencyGate;
use crate::processor::{ResponseProcessor, TurnOutcome};
use crate::session::{AgentClientFactory, SessionManager};
use crate::status::StatusStore;
use crate::streaming::{StreamingCore, ADMISSION_ERROR};
use crate::tasks::TaskStateManager;

/// Everything needed to start one stream
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Task this stream belongs to
    pub task_id: String,

    /// Unit of work within the task; also the stream's id in the store
    pub subtask_id: String,

    /// Prompt to send on the session
    pub prompt: String,

    /// Sub-agent qualifier, when the task runs several agents
    pub sub_agent_id: Option<String>,

    /// Force a fresh session even when a saved durable id exists
    pub new_session: bool,
}

impl StreamRequest {
    /// Create a request for the task's primary agent
    pub fn new(
        task_id: impl Into<String>,
        subtask_id: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            subtask_id: subtask_id.into(),
            prompt: prompt.into(),
            sub_agent_id: None,
            new_session: false,
        }
    }

    /// Address a named sub-agent of the task
    pub fn with_sub_agent(mut self, sub_agent_id: impl Into<String>) -> Self {
        self.sub_agent_id = Some(sub_agent_id.into());
        self
    }

    /// Force a fresh session
    pub fn with_new_session(mut self, new_session: bool) -> Self {
        self.new_session = new_session;
        self
    }
}

/// Process-wide stream lifecycle owner
pub struct StreamRuntime {
    config: StreamingConfig,
    gate: ConcurrencyGate,
    tasks: TaskStateManager,
    sessions: Arc<SessionManager>,
    store: Arc<dyn StatusStore>,
    emitter: Arc<dyn Emitter>,
    factory: Arc<dyn AgentClientFactory>,
    processor: ResponseProcessor,
    shutdown: CancellationToken,
}

impl StreamRuntime {
    /// Wire up a runtime
    pub fn new(
        config: StreamingConfig,
        store: Arc<dyn StatusStore>,
        emitter: Arc<dyn Emitter>,
        factory: Arc<dyn AgentClientFactory>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        let gate = ConcurrencyGate::new(config.max_concurrent_streams);
        let tasks = TaskStateManager::new();
        let processor = ResponseProcessor::new(sessions.clone(), tasks.clone(), config.max_retries);
        Self {
            config,
            gate,
            tasks,
            sessions,
            store,
            emitter,
            factory,
            processor,
            shutdown: CancellationToken::new(),
        }
    }

    /// Replace the response processor (custom classifier or resume strategy)
    pub fn with_processor(mut self, processor: ResponseProcessor) -> Self {
        self.processor = processor;
        self
    }

    /// Task-state table shared with this runtime
    pub fn tasks(&self) -> &TaskStateManager {
        &self.tasks
    }

    /// Session manager shared with this runtime
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Admission gate shared with this runtime
    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Run one stream end to end
    ///
    /// Always terminates the stream properly: any phase error is converted
    /// into the terminal error path, and held resources are released before
    /// returning. Admission failure surfaces as `Failed` with the admission
    /// error text.
    pub async fn run(&self, request: StreamRequest) -> TurnOutcome {
        tracing::info!(
            task_id = %request.task_id,
            subtask_id = %request.subtask_id,
            "[StreamRuntime] Starting stream"
        );

        let mut core = StreamingCore::new(
            request.task_id.clone(),
            request.subtask_id.clone(),
            self.store.clone(),
            self.emitter.clone(),
            self.gate.clone(),
            self.tasks.clone(),
            self.config.clone(),
            self.shutdown.clone(),
        );

        let outcome = match self.execute(&request, &mut core).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // Error boundary: whatever failed, the stream still ends with
                // its terminal event.
                let msg = e.to_string();
                core.handle_error(&msg).await;
                TurnOutcome::Failed(msg)
            }
        };

        core.release_resources().await;
        outcome
    }

    async fn execute(
        &self,
        request: &StreamRequest,
        core: &mut StreamingCore,
    ) -> crate::core::CoreResult<TurnOutcome> {
        if !core.acquire_resources().await? {
            return Ok(TurnOutcome::Failed(ADMISSION_ERROR.to_string()));
        }

        let (session_key, client) = self
            .sessions
            .obtain(
                self.factory.as_ref(),
                &request.task_id,
                request.sub_agent_id.as_deref(),
                &request.subtask_id,
                request.new_session,
            )
            .await?;

        client.query(&request.prompt).await?;
        self.processor.drive(client, &session_key, core).await
    }

    /// Request cancellation of a running stream
    ///
    /// Marks the task cancelled (stopping token processing at the next token),
    /// fires the stream's cancellation handle, and asks the live client to
    /// interrupt. Then waits up to the grace window for the upstream to
    /// acknowledge (the task reaching INTERRUPTED). An unresponsive client is
    /// torn down once the window expires, which unblocks the drive loop and
    /// frees the stream's admission slot. Returns whether the acknowledgment
    /// arrived; either way the stream will terminate.
    pub async fn cancel(&self, task_id: &str, subtask_id: &str) -> bool {
        tracing::info!(task_id = %task_id, subtask_id = %subtask_id, "[StreamRuntime] Cancel requested");

        self.tasks.set(task_id, TaskState::Cancelled).await;
        self.store.cancel_stream(subtask_id).await;

        let Some(client) = self.sessions.client_for_task(task_id).await else {
            tracing::debug!(task_id = %task_id, "[StreamRuntime] No live client to interrupt");
            return false;
        };

        if let Err(e) = client.interrupt().await {
            tracing::warn!(task_id = %task_id, error = %e, "[StreamRuntime] Interrupt failed");
            return false;
        }

        let deadline = Instant::now() + self.config.cancel_grace;
        while Instant::now() < deadline {
            if self.tasks.get(task_id).await == Some(TaskState::Interrupted) {
                tracing::info!(task_id = %task_id, "[StreamRuntime] Interrupt acknowledged");
                return true;
            }
            sleep(Duration::from_millis(50)).await;
        }

        tracing::warn!(
            task_id = %task_id,
            "[StreamRuntime] Interrupt not acknowledged within grace window, forcing teardown"
        );
        let removed = self.sessions.cleanup_task_clients(task_id).await;
        tracing::info!(
            task_id = %task_id,
            count = removed,
            "[StreamRuntime] Tore down unresponsive clients"
        );
        false
    }

    /// Signal every running stream to stop at its next token
    pub fn shutdown(&self) {
        tracing::info!("[StreamRuntime] Shutdown signalled");
        self.shutdown.cancel();
    }
}
