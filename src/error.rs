//! Error types for the orchestration engine

use thiserror::Error;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the orchestration engine
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid registry, classifier, tool or orchestrator setup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Resolution found no agent and no default is configured
    #[error("No agent available: {0}")]
    NoAgentAvailable(String),

    /// Provider tag without a registered wire format
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Tool lookup failed
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool callable failed
    #[error("Tool invocation error: {tool}: {message}")]
    ToolInvocation {
        /// Tool name
        tool: String,
        /// Failure description
        message: String,
    },

    /// An agent call failed
    #[error("Agent error: {0}")]
    Agent(String),

    /// Memory collaborator failure
    #[error("Memory error: {0}")]
    Memory(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The caller cancelled the operation
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a no-agent-available error
    pub fn no_agent(msg: impl Into<String>) -> Self {
        Self::NoAgentAvailable(msg.into())
    }

    /// Create an unsupported provider error
    pub fn unsupported_provider(tag: impl Into<String>) -> Self {
        Self::UnsupportedProvider(tag.into())
    }

    /// Create a tool invocation error
    pub fn tool_invocation(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolInvocation {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create an agent error
    pub fn agent(msg: impl Into<String>) -> Self {
        Self::Agent(msg.into())
    }

    /// Create a memory error
    pub fn memory(msg: impl Into<String>) -> Self {
        Self::Memory(msg.into())
    }

    /// Create an other error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether the orchestrator can not proceed at all (as opposed to a
    /// per-call or per-step failure)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::NoAgentAvailable(_) | Self::UnsupportedProvider(_)
        )
    }

    /// Render this error as a sentence that is safe to show an end user
    pub fn user_message(&self) -> String {
        match self {
            Self::NoAgentAvailable(_) => {
                "No handler is available for this request right now.".to_string()
            }
            Self::Cancelled(_) => "The request was cancelled before it completed.".to_string(),
            Self::Config(_) | Self::UnsupportedProvider(_) => {
                "The assistant is not configured to handle this request.".to_string()
            }
            _ => "The assistant could not complete this request. Please try again.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::config("bad").is_fatal());
        assert!(Error::no_agent("none").is_fatal());
        assert!(Error::unsupported_provider("mystery").is_fatal());
        assert!(!Error::agent("timeout").is_fatal());
        assert!(!Error::tool_invocation("calc", "boom").is_fatal());
    }

    #[test]
    fn test_user_message_hides_details() {
        let err = Error::agent("upstream returned 502 with secret token abc");
        assert!(!err.user_message().contains("abc"));
        assert!(Error::no_agent("x").user_message().contains("No handler"));
    }
}
