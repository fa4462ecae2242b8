//! Inbound agent event types
//!
//! Every message kind the agent process can send is a variant of [`AgentEvent`],
//! so the response loop matches exhaustively instead of sniffing shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::streaming::Source;

/// A tool invocation requested by the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUse {
    /// Tool use ID
    pub id: String,
    /// Tool name
    pub name: String,
    /// Tool input
    pub input: Value,
}

/// Subtype of a terminal `Result` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSubtype {
    /// Turn finished normally
    Success,

    /// Turn ended because the agent process hit an execution error.
    /// This is also the expected tail of an acknowledged interrupt.
    ErrorDuringExecution,

    /// Turn ended because the agent exhausted its turn budget
    ErrorMaxTurns,
}

/// Terminal-for-this-turn summary from the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEvent {
    /// Result subtype
    pub subtype: ResultSubtype,

    /// Error text, set on explicit upstream API errors
    pub error: Option<String>,

    /// Durable session id that can resume this session later
    pub session_id: Option<String>,

    /// Final result text, if the agent produced one
    pub result: Option<String>,
}

impl ResultEvent {
    /// Create a success result
    pub fn success(result: impl Into<String>) -> Self {
        Self {
            subtype: ResultSubtype::Success,
            error: None,
            session_id: None,
            result: Some(result.into()),
        }
    }

    /// Create an explicit upstream error result
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            subtype: ResultSubtype::ErrorMaxTurns,
            error: Some(message.into()),
            session_id: None,
            result: None,
        }
    }

    /// Create an execution-error result (the interrupt acknowledgment tail)
    pub fn execution_error() -> Self {
        Self {
            subtype: ResultSubtype::ErrorDuringExecution,
            error: None,
            session_id: None,
            result: None,
        }
    }

    /// Attach a durable session id
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Check if this result reports any error
    pub fn is_error(&self) -> bool {
        self.subtype != ResultSubtype::Success || self.error.is_some()
    }
}

/// Events received from a live agent process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentEvent {
    /// Out-of-band system notification (init, tool registration, ...)
    System {
        /// System event subtype
        subtype: String,
    },

    /// Echo of user-side content; may carry tool results or the literal
    /// interruption marker when the agent's own SDK noticed a cancel
    UserEcho {
        /// Echoed content
        content: String,
    },

    /// Assistant message: coarse text plus any tool-use requests and citations
    Assistant {
        /// Complete text of the assistant block, if any
        text: Option<String>,
        /// Tool invocations requested in this block
        tool_uses: Vec<ToolUse>,
        /// Citation sources attached to this block
        sources: Vec<Source>,
    },

    /// Low-level incremental token. When present, it supersedes the text of
    /// the coarser `Assistant` event for emission purposes.
    StreamDelta {
        /// Incremental text
        text: String,
    },

    /// Terminal summary for this turn
    Result(ResultEvent),
}

impl AgentEvent {
    /// Create a stream delta event
    pub fn delta(text: impl Into<String>) -> Self {
        AgentEvent::StreamDelta { text: text.into() }
    }

    /// Create an assistant event carrying only text
    pub fn assistant_text(text: impl Into<String>) -> Self {
        AgentEvent::Assistant {
            text: Some(text.into()),
            tool_uses: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Create a user echo event
    pub fn user_echo(content: impl Into<String>) -> Self {
        AgentEvent::UserEcho {
            content: content.into(),
        }
    }

    /// Check if this is a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::Result(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_is_error() {
        assert!(!ResultEvent::success("done").is_error());
        assert!(ResultEvent::error("Overloaded").is_error());
        assert!(ResultEvent::execution_error().is_error());
    }

    #[test]
    fn test_session_id_attachment() {
        let res = ResultEvent::success("ok").with_session_id("durable-1");
        assert_eq!(res.session_id.as_deref(), Some("durable-1"));
    }

    #[test]
    fn test_terminal_check() {
        assert!(AgentEvent::Result(ResultEvent::success("ok")).is_terminal());
        assert!(!AgentEvent::delta("hi").is_terminal());
    }
}
