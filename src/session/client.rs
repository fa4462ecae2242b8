//! Agent client contract
//!
//! The live agent process/connection is opaque to this core. It is reached
//! only through [`AgentClient`]; construction (and resumption, by passing a
//! previously observed durable session id) goes through [`AgentClientFactory`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{AgentEvent, CoreResult};

/// Handle to a live agent process or connection
///
/// The handle is a single-owner resource: only the `SessionManager` caches it,
/// and only the `SessionManager` tears it down.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Session id this client was constructed for
    fn session_id(&self) -> &str;

    /// Check whether the underlying process is still alive
    ///
    /// A dead client must never be handed to a caller; the session manager
    /// discards dead cache entries and creates a fresh client instead.
    fn is_alive(&self) -> bool;

    /// Establish the connection
    async fn connect(&self) -> CoreResult<()>;

    /// Tear the connection down
    async fn disconnect(&self) -> CoreResult<()>;

    /// Send a prompt on this session
    async fn query(&self, prompt: &str) -> CoreResult<()>;

    /// Receive the next inbound event
    ///
    /// Returns `None` when the upstream stream has ended.
    async fn next_event(&self) -> Option<CoreResult<AgentEvent>>;

    /// Ask the agent to stop cooperatively
    async fn interrupt(&self) -> CoreResult<()>;
}

/// Factory for agent clients
#[async_trait]
pub trait AgentClientFactory: Send + Sync {
    /// Create a client for `session_id`
    ///
    /// `resume_from` carries a previously observed durable session id; when
    /// set, the new client resumes that session instead of starting fresh.
    async fn create(
        &self,
        session_id: &str,
        resume_from: Option<&str>,
    ) -> CoreResult<Arc<dyn AgentClient>>;
}
