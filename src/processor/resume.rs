//! Resume strategies
//!
//! Whether a resumed session needs the original prompt replayed or only a
//! continuation marker is upstream-SDK-specific, so the prompt sent on a
//! retry is an injectable strategy.

/// Produce the prompt sent when retrying on the same or a resumed session
pub trait ResumeStrategy: Send + Sync {
    /// Prompt for retry number `attempt` (1-based)
    fn retry_prompt(&self, attempt: u32) -> String;
}

/// Default strategy: send a continuation marker, never replay the prompt
pub struct ContinuationResume;

impl ResumeStrategy for ContinuationResume {
    fn retry_prompt(&self, attempt: u32) -> String {
        tracing::debug!(attempt, "[ContinuationResume] Building retry prompt");
        "Please continue from where you left off.".to_string()
    }
}
