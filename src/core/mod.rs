//! Core types shared across the streaming platform
//!
//! - [`CoreError`] / [`CoreResult`]: crate-wide error taxonomy
//! - [`TaskState`]: task lifecycle states and external visibility mapping
//! - [`AgentEvent`]: closed union of inbound agent events
//! - [`StreamingConfig`]: tunables for admission, checkpointing, retries

pub mod config;
pub mod error;
pub mod events;
pub mod state;

pub use config::StreamingConfig;
pub use error::{CoreError, CoreResult};
pub use events::{AgentEvent, ResultEvent, ResultSubtype, ToolUse};
pub use state::TaskState;
