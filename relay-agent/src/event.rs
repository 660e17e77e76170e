// ABOUTME: Event types emitted by the orchestration engine during one conversation turn.
// ABOUTME: Covers turn/subtask lifecycle, token streaming, the final result, errors and completion.

use serde::{Deserialize, Serialize};

/// Events emitted by an agent backend while it works on one prompt.
///
/// On the wire (see [`crate::backends::command`]) each event is one JSON
/// object tagged by `type`, e.g. `{"type":"token_chunk","text":"Hel"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The agent started working on the turn
    TurnStart,

    /// A subtask began, optionally with the model's reasoning and the
    /// actions (tool calls) it is about to take
    SubtaskStart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thought: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actions: Option<Vec<String>>,
    },

    /// A subtask finished
    SubtaskFinish,

    /// Streaming text fragment
    TokenChunk {
        text: String,
        #[serde(default)]
        kind: TokenKind,
    },

    /// Final text output of the turn
    Result { text: String },

    /// Error occurred during execution
    Error {
        /// Typed error code for programmatic handling
        code: ErrorCode,
        /// Human-readable error message
        message: String,
    },

    /// No more events will follow for this turn
    Done,
}

impl AgentEvent {
    /// Shorthand for a normal (non-tool) token fragment
    pub fn token(text: impl Into<String>) -> Self {
        Self::TokenChunk {
            text: text.into(),
            kind: TokenKind::Text,
        }
    }

    /// Whether this event ends the turn's event stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Distinguishes normal output tokens from tokens that belong to a tool
/// invocation the model is composing
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    #[default]
    Text,
    Action,
}

/// Typed error codes for programmatic handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Request timed out
    Timeout,
    /// Rate limited by the backend
    RateLimited,
    /// Tool execution failed
    ToolFailed,
    /// Backend-specific error
    BackendError,
    /// Unknown error
    Unknown,
}
