//! Progress notification sink.

use serde::{Deserialize, Serialize};

use crate::run::state::StepStatus;

/// Notification emitted after a dispatched step resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Run the step belongs to.
    pub run_id: String,

    /// Plan the step belongs to.
    pub plan_id: String,

    /// Step that resolved.
    pub step_id: String,

    /// Step name.
    pub step_name: String,

    /// Status after the state machine applied the outcome.
    pub status: StepStatus,

    /// Terminal steps so far.
    pub finished_steps: usize,

    /// Total steps in the plan.
    pub total_steps: usize,

    /// Completion percentage of the plan, 0-100.
    pub percent_complete: f32,

    /// Failure message, when the outcome was a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Receiver of progress updates.
///
/// Called from the scheduling loop after each step resolves;
/// implementations must return promptly and must not block.
pub trait ProgressSink: Send + Sync {
    /// Handle one update.
    fn on_progress(&self, update: &ProgressUpdate);
}

/// Sink that discards updates.
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_progress(&self, _update: &ProgressUpdate) {}
}
