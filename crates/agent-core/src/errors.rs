use thiserror::Error;

/// Errors emitted by the agent-core crate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AgentError {
    /// Raised when a request to a collaborator is malformed or unsupported.
    #[error("invalid agent request: {0}")]
    InvalidRequest(String),

    /// Screenshot acquisition returned nothing usable after all attempts.
    #[error("screenshot unavailable: {0}")]
    ScreenshotUnavailable(String),

    /// The session backend failed a command or a fetch.
    #[error("backend error: {0}")]
    Backend(String),

    /// The vision model call failed or answered outside the tool grammar.
    #[error("model error: {0}")]
    Model(String),

    /// A model function call named an unknown tool or carried bad arguments.
    #[error("invalid tool call: {0}")]
    InvalidToolCall(String),

    /// A bounded call ran past its deadline.
    #[error("timed out: {0}")]
    Timeout(String),
}

impl AgentError {
    /// Helper for wrapping static string errors.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Helper for model-side failures.
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }

    pub fn invalid_tool_call(message: impl Into<String>) -> Self {
        Self::InvalidToolCall(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// Whether another model attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::Model(_) | AgentError::InvalidToolCall(_) | AgentError::Timeout(_)
        )
    }
}

impl From<action_locator::CommandError> for AgentError {
    fn from(err: action_locator::CommandError) -> Self {
        AgentError::Backend(err.to_string())
    }
}
