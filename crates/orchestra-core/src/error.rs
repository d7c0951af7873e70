//! Error Types
//!
//! The taxonomy mirrors how failures are handled at runtime: only
//! transport-class errors ever surface to the caller of an agent run;
//! tool failures are converted to failed `ToolResult`s and fed back to
//! the model, and parse failures are recovered locally.

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Backend unreachable, request timed out, or response malformed.
    /// Retried with bounded backoff at the call site before surfacing.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider answered but the completion was unusable
    /// (e.g. an HTTP 4xx that retrying will not fix)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool argument validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Parse error (tool call, plan, or verdict parsing)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if the error is worth retrying at the transport layer
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::Transport(_) | AgentError::Io(_))
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}
