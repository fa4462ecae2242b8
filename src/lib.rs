//! Session streaming and lifecycle runtime for agent-backed tasks
//!
//! This crate owns the path between a live agent process and whoever is
//! watching its output: admission control over concurrent streams, token
//! accumulation with dual-cadence checkpointing, session identity and
//! resumption, cancellation with upstream acknowledgment, and terminal
//! event delivery with an exactly-once guarantee.
//!
//! # Architecture
//!
//! - [`runtime::StreamRuntime`] is the entry point: one instance per process,
//!   driving each stream end to end inside an error boundary
//! - [`streaming::StreamingCore`] accumulates tokens, checkpoints, and emits
//!   exactly one terminal event per stream
//! - [`processor::ResponseProcessor`] is the state machine over inbound agent
//!   events: retries, interruption handling, session-id capture
//! - [`session::SessionManager`] caches live agent clients and resolves
//!   session identity for resumption
//! - [`gate::ConcurrencyGate`] bounds concurrent streams with a timed
//!   counting semaphore
//! - [`status::StatusStore`] and [`session::AgentClient`] are the two
//!   external seams: durable persistence and the live agent transport
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use taskstream::core::StreamingConfig;
//! use taskstream::runtime::{StreamRequest, StreamRuntime};
//!
//! let runtime = StreamRuntime::new(
//!     StreamingConfig::new(),
//!     store,    // Arc<dyn StatusStore>
//!     emitter,  // Arc<dyn Emitter>
//!     factory,  // Arc<dyn AgentClientFactory>
//!     sessions, // Arc<SessionManager>
//! );
//!
//! let outcome = runtime
//!     .run(StreamRequest::new("task-1", "subtask-1", "Summarize the report"))
//!     .await;
//! ```

pub mod callback;
pub mod core;
pub mod emitter;
pub mod gate;
pub mod logging;
pub mod processor;
pub mod resources;
pub mod runtime;
pub mod session;
pub mod status;
pub mod streaming;
pub mod tasks;

#[cfg(test)]
pub mod testing;

pub use crate::core::{AgentEvent, CoreError, CoreResult, StreamingConfig, TaskState};
pub use crate::emitter::{BroadcastEmitter, BufferedEmitter, EmittedEvent, Emitter};
pub use crate::gate::ConcurrencyGate;
pub use crate::processor::{ResponseProcessor, TurnOutcome};
pub use crate::runtime::{StreamRequest, StreamRuntime};
pub use crate::session::{AgentClient, AgentClientFactory, SessionManager};
pub use crate::status::StatusStore;
pub use crate::streaming::{StreamResult, StreamingCore};
pub use crate::tasks::TaskStateManager;
