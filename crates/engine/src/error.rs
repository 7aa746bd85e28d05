//! Error types for the taskflow engine.
//!
//! Step-level failures are converted into state transitions inside the
//! run loop and never surface from `run`; the errors here cover plan
//! construction, lookup, persistence, and programmer errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine-level errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The step graph is invalid (cycle, unknown type, bad reference).
    #[error("Invalid plan: {0}")]
    PlanInvalid(String),

    /// No plan exists under the given id.
    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    /// No active or checkpointed run exists for the given plan.
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// A step declares a type with no registered handler.
    #[error("Unsupported step type: {0}")]
    UnsupportedStepType(String),

    /// A step handler failed.
    #[error("Step execution failed: {0}")]
    StepExecution(String),

    /// Conflicting operation (e.g. a second run on an active plan).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Persistent store failure.
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::PlanInvalid(_) => "plan_invalid",
            EngineError::PlanNotFound(_) => "plan_not_found",
            EngineError::RunNotFound(_) => "run_not_found",
            EngineError::UnsupportedStepType(_) => "unsupported_step_type",
            EngineError::StepExecution(_) => "step_execution",
            EngineError::Conflict(_) => "conflict",
            EngineError::Store(_) => "store",
            EngineError::Serialization(_) => "serialization",
            EngineError::Config(_) => "config",
            EngineError::Internal(_) => "internal",
        }
    }

    /// Project the error into the `{code, message}` wire shape.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

/// Wire representation of an engine error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Internal(err.to_string())
    }
}

/// Boundary conversion for hosts surfacing a step failure as an engine
/// error. Inside the run loop step errors become state transitions and
/// never cross this boundary.
impl From<taskflow_steps::StepError> for EngineError {
    fn from(err: taskflow_steps::StepError) -> Self {
        match err {
            taskflow_steps::StepError::Unsupported(kind) => EngineError::UnsupportedStepType(kind),
            other => EngineError::StepExecution(other.to_string()),
        }
    }
}
