//! ResponseProcessor - the state machine over the inbound agent event stream
//!
//! Consumes events from a live agent client and drives the streaming core:
//! tokens are accumulated and emitted, durable session ids persisted the
//! moment they are observed, transient upstream errors retried on a bounded
//! budget, and cancellation drained through the upstream's own acknowledgment
//! sequence before the turn is reported as cancelled.

pub mod classifier;
pub mod resume;

pub use classifier::{SubstringClassifier, TransientErrorClassifier};
pub use resume::{ContinuationResume, ResumeStrategy};

use std::sync::Arc;

use serde_json::json;

use crate::core::{AgentEvent, CoreResult, ResultSubtype, TaskState};
use crate::session::{AgentClient, SessionManager};
use crate::streaming::{StreamResult, StreamingCore};
use crate::tasks::TaskStateManager;

/// Literal marker the agent SDK echoes when a running turn is interrupted.
/// Seeing it is evidence of cancellation even before the task-state table
/// catches up.
pub const INTERRUPTION_MARKER: &str = "[Request interrupted by user";

/// How one turn ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Turn finalized successfully
    Completed(StreamResult),

    /// Turn failed; the error is also carried by the terminal done event
    Failed(String),

    /// Turn was cancelled
    Cancelled,
}

/// Drives one turn of a stream from the agent's event sequence
pub struct ResponseProcessor {
    sessions: Arc<SessionManager>,
    tasks: TaskStateManager,
    classifier: Arc<dyn TransientErrorClassifier>,
    resume: Arc<dyn ResumeStrategy>,
    max_retries: u32,
}

impl ResponseProcessor {
    /// Create a processor with the default classifier and resume strategy
    pub fn new(sessions: Arc<SessionManager>, tasks: TaskStateManager, max_retries: u32) -> Self {
        Self {
            sessions,
            tasks,
            classifier: Arc::new(SubstringClassifier::default()),
            resume: Arc::new(ContinuationResume),
            max_retries,
        }
    }

    /// Replace the transient-error classifier
    pub fn with_classifier(mut self, classifier: Arc<dyn TransientErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Replace the resume strategy
    pub fn with_resume_strategy(mut self, resume: Arc<dyn ResumeStrategy>) -> Self {
        self.resume = resume;
        self
    }

    /// Consume the event stream of one turn
    ///
    /// `session_key` is the internal key under which durable session ids are
    /// persisted. Returns the turn outcome; the terminal event has already
    /// been emitted by the streaming core when this returns.
    pub async fn drive(
        &self,
        client: Arc<dyn AgentClient>,
        session_key: &str,
        core: &mut StreamingCore,
    ) -> CoreResult<TurnOutcome> {
        let task_id = core.task_id().to_string();

        // Cancellation noticed but not yet acknowledged by the upstream;
        // keep draining until its own acknowledgment sequence arrives.
        let mut cancel_pending = false;

        // Retry budget for this session-resume cycle; never persisted.
        let mut retries: u32 = 0;

        // Set right after a retry query on a resumed session; the next
        // execution-error result may be a resume artifact, not a failure.
        let mut fresh_resume = false;

        // Once low-level deltas appear, coarser assistant text is a duplicate.
        let mut saw_delta = false;

        loop {
            if !cancel_pending && self.tasks.is_cancel_requested(&task_id).await {
                tracing::info!(task_id = %task_id, "[ResponseProcessor] Cancellation requested, draining");
                cancel_pending = true;
            }

            let Some(event) = client.next_event().await else {
                // The cancel may have landed while parked in next_event, so
                // the table is re-checked: a subprocess dying under an
                // interrupt is the cancellation sequence, not a failure.
                if cancel_pending || self.tasks.is_cancel_requested(&task_id).await {
                    core.cancelled().await;
                    self.tasks.set(&task_id, TaskState::Interrupted).await;
                    return Ok(TurnOutcome::Cancelled);
                }
                let msg = "agent stream ended without a result".to_string();
                core.handle_error(&msg).await;
                return Ok(TurnOutcome::Failed(msg));
            };

            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    if cancel_pending || self.tasks.is_cancel_requested(&task_id).await {
                        core.cancelled().await;
                        self.tasks.set(&task_id, TaskState::Interrupted).await;
                        return Ok(TurnOutcome::Cancelled);
                    }
                    let msg = e.to_string();
                    core.handle_error(&msg).await;
                    return Ok(TurnOutcome::Failed(msg));
                }
            };

            match event {
                AgentEvent::System { subtype } => {
                    tracing::trace!(subtype = %subtype, "[ResponseProcessor] System event");
                }

                AgentEvent::UserEcho { content } => {
                    if content.contains(INTERRUPTION_MARKER) {
                        // The agent's SDK noticed the cancel before the state
                        // table was read.
                        tracing::info!(task_id = %task_id, "[ResponseProcessor] Interruption marker observed");
                        cancel_pending = true;
                    }
                }

                AgentEvent::StreamDelta { text } => {
                    saw_delta = true;
                    if !core.process_token(&text).await? {
                        return Ok(TurnOutcome::Cancelled);
                    }
                }

                AgentEvent::Assistant {
                    text,
                    tool_uses,
                    sources,
                } => {
                    for tool in tool_uses {
                        core.record_thinking(
                            "tool_use",
                            json!({ "id": tool.id, "name": tool.name }),
                        );
                    }
                    for source in sources {
                        core.record_source(source);
                    }
                    if let Some(text) = text {
                        if !saw_delta && !core.process_token(&text).await? {
                            return Ok(TurnOutcome::Cancelled);
                        }
                    }
                }

                AgentEvent::Result(result) => {
                    // Persist the resumable id the moment it is observed, even
                    // if this turn later fails, so the next attempt resumes
                    // from the furthest known point.
                    if let Some(durable) = &result.session_id {
                        if let Err(e) = self.sessions.save_session_id(session_key, durable).await {
                            tracing::warn!(
                                session_key = %session_key,
                                error = %e,
                                "[ResponseProcessor] Failed to persist durable session id"
                            );
                        }
                    }

                    if !result.is_error() {
                        let final_result = core.finalize().await?;
                        return Ok(TurnOutcome::Completed(final_result));
                    }

                    if result.subtype == ResultSubtype::ErrorDuringExecution
                        && result.error.is_none()
                    {
                        if cancel_pending {
                            // The expected tail of a cancellation sequence:
                            // the session survives for a later resume.
                            core.cancelled().await;
                            self.tasks.set(&task_id, TaskState::Interrupted).await;
                            return Ok(TurnOutcome::Cancelled);
                        }

                        if fresh_resume && retries < self.max_retries && client.is_alive() {
                            retries += 1;
                            tracing::warn!(
                                task_id = %task_id,
                                attempt = retries,
                                "[ResponseProcessor] Execution error right after resume, retrying"
                            );
                            client.query(&self.resume.retry_prompt(retries)).await?;
                            continue;
                        }

                        let msg = "agent ended due to execution error".to_string();
                        core.handle_error(&msg).await;
                        return Ok(TurnOutcome::Failed(msg));
                    }

                    let msg = result
                        .error
                        .clone()
                        .unwrap_or_else(|| "agent returned an error result".to_string());

                    if self.classifier.is_transient(&msg)
                        && retries < self.max_retries
                        && client.is_alive()
                    {
                        retries += 1;
                        fresh_resume = true;
                        tracing::warn!(
                            task_id = %task_id,
                            attempt = retries,
                            max = self.max_retries,
                            "[ResponseProcessor] Transient upstream error, retrying: {}",
                            msg
                        );
                        client.query(&self.resume.retry_prompt(retries)).await?;
                        continue;
                    }

                    core.handle_error(&msg).await;
                    return Ok(TurnOutcome::Failed(msg));
                }
            }
        }
    }
}
