//! Step execution error types.

use thiserror::Error;

/// Errors that can occur while executing a step.
#[derive(Debug, Error)]
pub enum StepError {
    /// Transport-level failure reaching a remote backend.
    #[error("Network error: {0}")]
    Network(String),

    /// The remote backend answered with an error.
    #[error("Remote error: {0}")]
    Remote(String),

    /// Step execution timed out.
    #[error("Execution timed out after {0} seconds")]
    Timeout(u64),

    /// No handler is registered for the step's declared type.
    #[error("Unsupported step type: {0}")]
    Unsupported(String),

    /// The resolved input does not satisfy the handler's contract.
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// The run was cancelled while the step was in flight.
    #[error("Step cancelled")]
    Cancelled,

    /// Handler-internal failure.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
}

impl StepError {
    /// Whether a failure of this kind may succeed on a later attempt.
    ///
    /// Unsupported types, invalid inputs, and cancellations are terminal;
    /// retrying them cannot change the outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StepError::Network(_)
                | StepError::Remote(_)
                | StepError::Timeout(_)
                | StepError::Execution(_)
        )
    }
}

impl From<serde_json::Error> for StepError {
    fn from(e: serde_json::Error) -> Self {
        StepError::Json(e.to_string())
    }
}

impl From<reqwest::Error> for StepError {
    fn from(e: reqwest::Error) -> Self {
        StepError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StepError::Unsupported("webhook".to_string());
        assert_eq!(err.to_string(), "Unsupported step type: webhook");

        let err = StepError::Timeout(30);
        assert_eq!(err.to_string(), "Execution timed out after 30 seconds");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(StepError::Network("reset".to_string()).is_retryable());
        assert!(StepError::Remote("503".to_string()).is_retryable());
        assert!(StepError::Timeout(10).is_retryable());
        assert!(!StepError::Unsupported("x".to_string()).is_retryable());
        assert!(!StepError::Invalid("missing field".to_string()).is_retryable());
        assert!(!StepError::Cancelled.is_retryable());
    }
}
