//! Session management
//!
//! A session is a logical, resumable conversation with one agent process. The
//! [`SessionManager`] caches live [`AgentClient`] handles keyed by session id
//! and persists durable session ids through [`SessionIdStore`] so crashed
//! executors can resume.

pub mod client;
pub mod id_store;
pub mod manager;

pub use client::{AgentClient, AgentClientFactory};
pub use id_store::{SavedSessionId, SessionIdStore};
pub use manager::SessionManager;
