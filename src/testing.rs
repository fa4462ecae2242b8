//! Shared test doubles
//!
//! Scripted stand-ins for the agent client, its factory, and the emitter.
//! Only compiled for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::core::{AgentEvent, CoreError, CoreResult, ResultEvent};
use crate::emitter::{EmittedEvent, Emitter};
use crate::processor::INTERRUPTION_MARKER;
use crate::session::{AgentClient, AgentClientFactory};

/// Agent client that replays a scripted event sequence
///
/// Events are organized in batches: each `query` loads the next batch into
/// the inbound queue, so retry flows can be scripted turn by turn. When the
/// queue runs dry, `next_event` returns `None` unless `hang_when_empty` is
/// set, in which case it parks until more events arrive (the shape of a live
/// connection between turns).
pub struct ScriptedClient {
    session_id: String,
    queue: Mutex<VecDeque<CoreResult<AgentEvent>>>,
    batches: Mutex<VecDeque<Vec<CoreResult<AgentEvent>>>>,
    queries: Mutex<Vec<String>>,
    notify: Notify,
    alive: AtomicBool,
    fail_next_connect: AtomicBool,
    ack_interrupts: AtomicBool,
    hang_when_empty: AtomicBool,
}

impl ScriptedClient {
    /// Client with no scripted events
    pub fn idle(session_id: impl Into<String>) -> Arc<Self> {
        Self::with_batches(session_id, Vec::new())
    }

    /// Client whose queue is pre-loaded with one event sequence
    pub fn with_events(
        session_id: impl Into<String>,
        events: Vec<CoreResult<AgentEvent>>,
    ) -> Arc<Self> {
        let client = Self::with_batches(session_id, Vec::new());
        client
            .queue
            .try_lock()
            .expect("fresh client queue is uncontended")
            .extend(events);
        client
    }

    /// Client that loads one batch per `query`
    pub fn with_batches(
        session_id: impl Into<String>,
        batches: Vec<Vec<CoreResult<AgentEvent>>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            session_id: session_id.into(),
            queue: Mutex::new(VecDeque::new()),
            batches: Mutex::new(batches.into()),
            queries: Mutex::new(Vec::new()),
            notify: Notify::new(),
            alive: AtomicBool::new(true),
            fail_next_connect: AtomicBool::new(false),
            ack_interrupts: AtomicBool::new(false),
            hang_when_empty: AtomicBool::new(false),
        })
    }

    /// Simulate the underlying process exiting
    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Make the next `connect` call fail
    pub fn fail_next_connect(&self) {
        self.fail_next_connect.store(true, Ordering::SeqCst);
    }

    /// Answer `interrupt` with the upstream acknowledgment sequence
    /// (interruption-marker echo followed by an execution-error result)
    pub fn ack_interrupts(&self) {
        self.ack_interrupts.store(true, Ordering::SeqCst);
    }

    /// Park `next_event` on an empty queue instead of returning `None`
    pub fn hang_when_empty(&self) {
        self.hang_when_empty.store(true, Ordering::SeqCst);
    }

    /// Record the original prompt of a turn, loading the first batch.
    /// Equivalent to `query`, named for call sites that model turn start.
    pub async fn begin_turn(&self, prompt: &str) {
        let _ = self.query(prompt).await;
    }

    /// Push more events onto the inbound queue mid-test
    pub async fn push_events(&self, events: Vec<CoreResult<AgentEvent>>) {
        self.queue.lock().await.extend(events);
        self.notify.notify_waiters();
    }

    /// All prompts sent so far
    pub async fn queries(&self) -> Vec<String> {
        self.queries.lock().await.clone()
    }
}

#[async_trait]
impl AgentClient for ScriptedClient {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> CoreResult<()> {
        if self.fail_next_connect.swap(false, Ordering::SeqCst) {
            return Err(CoreError::ClientUnavailable(self.session_id.clone()));
        }
        Ok(())
    }

    async fn disconnect(&self) -> CoreResult<()> {
        self.alive.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn query(&self, prompt: &str) -> CoreResult<()> {
        self.queries.lock().await.push(prompt.to_string());
        if let Some(batch) = self.batches.lock().await.pop_front() {
            self.queue.lock().await.extend(batch);
            self.notify.notify_waiters();
        }
        Ok(())
    }

    async fn next_event(&self) -> Option<CoreResult<AgentEvent>> {
        loop {
            if let Some(event) = self.queue.lock().await.pop_front() {
                return Some(event);
            }
            if !self.hang_when_empty.load(Ordering::SeqCst) || !self.is_alive() {
                return None;
            }
            self.notify.notified().await;
        }
    }

    async fn interrupt(&self) -> CoreResult<()> {
        if self.ack_interrupts.load(Ordering::SeqCst) {
            self.push_events(vec![
                Ok(AgentEvent::user_echo(format!("{}]", INTERRUPTION_MARKER))),
                Ok(AgentEvent::Result(ResultEvent::execution_error())),
            ])
            .await;
        }
        Ok(())
    }
}

/// Factory that hands out a fixed list of pre-built clients, in order
pub struct StaticFactory {
    clients: std::sync::Mutex<VecDeque<Arc<ScriptedClient>>>,
    created: std::sync::Mutex<Vec<(String, Option<String>)>>,
}

impl StaticFactory {
    pub fn new(clients: Vec<Arc<ScriptedClient>>) -> Self {
        Self {
            clients: std::sync::Mutex::new(clients.into()),
            created: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// The (session_id, resume_from) pairs `create` was called with
    pub fn created(&self) -> Vec<(String, Option<String>)> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentClientFactory for StaticFactory {
    async fn create(
        &self,
        session_id: &str,
        resume_from: Option<&str>,
    ) -> CoreResult<Arc<dyn AgentClient>> {
        self.created
            .lock()
            .unwrap()
            .push((session_id.to_string(), resume_from.map(String::from)));
        let client = self
            .clients
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| CoreError::other("factory has no more scripted clients"))?;
        Ok(client)
    }
}

/// Emitter that records everything it is asked to publish
pub struct RecordingEmitter {
    events: Mutex<Vec<EmittedEvent>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of everything emitted so far
    pub async fn events(&self) -> Vec<EmittedEvent> {
        self.events.lock().await.clone()
    }
}

impl Default for RecordingEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Emitter for RecordingEmitter {
    async fn emit(&self, event: EmittedEvent) {
        self.events.lock().await.push(event);
    }
}
