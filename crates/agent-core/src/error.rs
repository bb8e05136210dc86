//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Model service rejected or failed the turn
    #[error("Service error: {0}")]
    Service(String),

    /// Model service unreachable or timed out
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A function call named a tool absent from the dispatch table.
    ///
    /// Means the manifest and the dispatch table drifted apart; never recovered.
    #[error("Unknown tool dispatched: {0}")]
    UnknownTool(String),

    /// Tool arguments failed validation
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool handler failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Remote tool declaration is not a typed JSON object
    #[error("Invalid tool declaration: {0}")]
    InvalidToolSpec(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable(_) | Self::RateLimited(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Service(msg) => format!("The AI service encountered an error: {msg}"),
            Self::ServiceUnavailable(_) => "The AI service is currently unavailable. Please try again.".into(),
            Self::UnknownTool(name) => format!("The tool '{name}' is not available."),
            Self::ToolValidation(msg) => format!("Invalid tool input: {msg}"),
            Self::ToolExecution(msg) => format!("Tool error: {msg}"),
            Self::RateLimited(_) => "You've made too many requests. Please wait a moment.".into(),
            Self::Auth(_) => "Authentication failed. Please check your credentials.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::ToolExecution(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(AgentError::RateLimited("slow down".into()).is_retryable());
        assert!(AgentError::ServiceUnavailable("timeout".into()).is_retryable());
        assert!(!AgentError::Auth("bad key".into()).is_retryable());
        assert!(!AgentError::UnknownTool("x".into()).is_retryable());
    }

    #[test]
    fn test_anyhow_becomes_tool_failure() {
        let err: AgentError = anyhow::anyhow!("disk full").into();
        assert!(matches!(err, AgentError::ToolExecution(_)));
        assert_eq!(err.to_string(), "Tool execution error: disk full");
    }
}
