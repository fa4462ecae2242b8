//! Core error types

use thiserror::Error;

/// Errors that can occur in the streaming core
#[derive(Error, Debug)]
pub enum CoreError {
    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Agent client is not connected or its process has exited
    #[error("Agent client unavailable: {0}")]
    ClientUnavailable(String),

    /// Agent transport failure (connect, query, interrupt, event stream)
    #[error("Agent error: {0}")]
    Agent(String),

    /// Durable status store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Control-plane callback rejected or exhausted retries
    #[error("Callback error: {0}")]
    Callback(String),

    /// Channel closed unexpectedly
    #[error("Channel closed")]
    ChannelClosed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        CoreError::Other(msg.into())
    }

    /// Create an agent transport error
    pub fn agent(msg: impl Into<String>) -> Self {
        CoreError::Agent(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        CoreError::Store(msg.into())
    }
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
