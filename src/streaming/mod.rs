//! Streaming core
//!
//! Per-stream accumulation state and the driver that turns inbound tokens
//! into emitted chunks, checkpoints, and exactly one terminal event.

pub mod core;
pub mod state;

pub use core::{StreamingCore, ADMISSION_ERROR};
pub use state::{Source, StreamResult, StreamingState, ThinkingStep};
