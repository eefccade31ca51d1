//! Error types for the tether domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] wraps them all.

use std::time::Duration;

use thiserror::Error;

/// The top-level error type returned by a conversation run.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Transcript invariant violations ---
    #[error("Transcript error: {0}")]
    Transcript(#[from] TranscriptError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Run cancelled")]
    Cancelled,
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures raised by a provider adapter.
///
/// `Transport`, `Status` and `Api` are the three remote conditions and are
/// kept apart so callers can tell them apart in logs, even though a run
/// treats all of them as fatal.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("{provider}: API key not set")]
    MissingCredential { provider: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API error: {kind}: {message}")]
    Api { kind: String, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// True for errors produced after a request left the process.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Status { .. } | Self::Api { .. }
        )
    }
}

/// Failures raised while resolving or running a tool call.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("invalid tool name: {0} (expected tool.command)")]
    InvalidName(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("unknown command: {tool}.{command}")]
    UnknownCommand { tool: String, command: String },

    #[error("parse tool arguments: {0}")]
    InvalidArguments(String),

    #[error("{tool}.{command} could not be started: {reason}")]
    Spawn {
        tool: String,
        command: String,
        reason: String,
    },

    #[error("{tool}.{command} timed out after {timeout:?}")]
    Timeout {
        tool: String,
        command: String,
        timeout: Duration,
    },

    #[error("{tool}.{command} failed: {reason}")]
    Failed {
        tool: String,
        command: String,
        reason: String,
    },
}

impl ToolError {
    /// True when the call was rejected before any subprocess was started.
    pub fn is_local_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidName(_)
                | Self::UnknownTool(_)
                | Self::UnknownCommand { .. }
                | Self::InvalidArguments(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error on session {key}: {reason}")]
    Io { key: String, reason: String },

    #[error("Failed to serialize session {key}: {reason}")]
    Serialization { key: String, reason: String },
}

/// Violations of the assistant/tool correlation invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptError {
    #[error("tool message without a tool_call_id")]
    MissingToolCallId,

    #[error("tool result {0} does not answer a call from the preceding assistant turn")]
    OrphanToolResult(String),

    #[error("tool call {0} answered more than once")]
    DuplicateToolResult(String),

    #[error("tool call id {0} issued more than once in one assistant turn")]
    DuplicateToolCallId(String),

    #[error("tool call {0} has no result before the next turn")]
    UnansweredToolCall(String),
}
