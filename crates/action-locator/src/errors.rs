//! Error types for locator system

use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// No tier produced a usable target
    #[error("No target found: {0}")]
    TargetNotFound(String),

    /// Strategy execution failed
    #[error("Strategy '{strategy}' failed: {reason}")]
    StrategyFailed { strategy: String, reason: String },

    /// Vision model call failed
    #[error("Model error: {0}")]
    Model(String),

    /// Model answered outside the expected grammar
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    /// Timeout during resolution
    #[error("Resolution timeout: {0}")]
    Timeout(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LocatorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, LocatorError::Timeout(_) | LocatorError::Model(_))
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::Internal(_) => 3,
            LocatorError::Model(_) | LocatorError::Timeout(_) => 2,
            LocatorError::TargetNotFound(_) | LocatorError::StrategyFailed { .. } => 1,
            LocatorError::MalformedResponse(_) => 0,
        }
    }
}

/// Failure reported by the session's command endpoint.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Endpoint rejected or failed the command after its own retries
    #[error("command '{tool}' failed: {reason}")]
    Rejected { tool: String, reason: String },

    /// Tool name or arguments not understood by the endpoint
    #[error("invalid command '{tool}': {reason}")]
    Invalid { tool: String, reason: String },
}

impl CommandError {
    pub fn rejected(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(LocatorError::Timeout("model".into()).is_retryable());
        assert!(!LocatorError::MalformedResponse("x".into()).is_retryable());
        assert_eq!(LocatorError::Internal("x".into()).severity(), 3);
    }

    #[test]
    fn test_command_error_display() {
        let err = CommandError::rejected("move_mouse", "session closed");
        assert_eq!(err.to_string(), "command 'move_mouse' failed: session closed");
    }
}
