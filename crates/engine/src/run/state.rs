//! Per-step state machine and run state.
//!
//! `pending → running → {completed | failed}`, with `failed → pending`
//! while retry budget remains. One [`RetryPolicy`] applies uniformly to
//! every step of a run; non-retryable failures are terminal regardless
//! of budget.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskflow_steps::StepOutput;

use crate::plan::Plan;

/// Execution status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not yet selected by the scheduler.
    Pending,
    /// Dispatched, awaiting its outcome.
    Running,
    /// Finished successfully. Terminal.
    Completed,
    /// Failed with no retry budget left. Terminal.
    Failed,
}

impl StepStatus {
    /// Whether the status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Running => write!(f, "running"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Retry backoff strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "strategy")]
pub enum Backoff {
    /// Retried steps are immediately re-eligible.
    #[default]
    None,
    /// Fixed delay before a retried step's next round.
    Fixed { delay_ms: u64 },
    /// Exponential delay, doubling per attempt up to a cap.
    Exponential { initial_delay_ms: u64, max_delay_ms: u64 },
}

/// Retry policy applied uniformly by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum retries per step after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff between retries.
    #[serde(default)]
    pub backoff: Backoff,
}

fn default_max_retries() -> u32 {
    3
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff: Backoff::None,
        }
    }
}

impl RetryPolicy {
    /// Delay to apply before dispatching the given retry attempt.
    ///
    /// `retry` is 1-based; returns `None` when no delay applies.
    pub fn delay_for(&self, retry: u32) -> Option<Duration> {
        match self.backoff {
            Backoff::None => None,
            Backoff::Fixed { delay_ms } => Some(Duration::from_millis(delay_ms)),
            Backoff::Exponential {
                initial_delay_ms,
                max_delay_ms,
            } => {
                let factor = 2u64.saturating_pow(retry.saturating_sub(1));
                let delay = initial_delay_ms.saturating_mul(factor).min(max_delay_ms);
                Some(Duration::from_millis(delay))
            }
        }
    }
}

/// What the state machine decided about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Budget remained; the step is pending again.
    Retried,
    /// The step is terminally failed.
    Terminal,
}

/// Mutable execution state of one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step this record tracks.
    pub step_id: String,

    /// Current status.
    pub status: StepStatus,

    /// Output, set once on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<StepOutput>,

    /// Last failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Number of retries consumed.
    pub retry_count: u32,

    /// When the step first entered `running`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the step reached a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Duration of the last attempt in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl StepRecord {
    /// Create a pending record.
    pub fn new(step_id: &str) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Pending,
            output: None,
            error: None,
            retry_count: 0,
            started_at: None,
            completed_at: None,
            duration_ms: None,
        }
    }

    /// Transition `pending → running`. Only the scheduler's selection
    /// triggers this; any other starting state is a bug and is logged.
    pub fn mark_running(&mut self) {
        if self.status != StepStatus::Pending {
            tracing::warn!(
                step_id = %self.step_id,
                status = %self.status,
                "mark_running on a non-pending step ignored"
            );
            return;
        }
        self.status = StepStatus::Running;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    /// Transition `running → completed` with the step's output.
    pub fn record_success(&mut self, output: StepOutput, duration_ms: u64) {
        self.status = StepStatus::Completed;
        self.output = Some(output);
        self.error = None;
        self.duration_ms = Some(duration_ms);
        self.completed_at = Some(Utc::now());
    }

    /// Apply a failure under the retry policy.
    ///
    /// A retryable failure with budget left returns the step to
    /// `pending` with `retry_count` incremented; otherwise the step is
    /// terminally `failed`.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        retryable: bool,
        policy: &RetryPolicy,
    ) -> FailureDisposition {
        let error = error.into();
        self.error = Some(error.clone());
        self.completed_at = Some(Utc::now());

        if retryable && self.retry_count < policy.max_retries {
            self.retry_count += 1;
            self.status = StepStatus::Pending;
            tracing::debug!(
                step_id = %self.step_id,
                retry = self.retry_count,
                max_retries = policy.max_retries,
                error = %error,
                "Step failed, retrying"
            );
            FailureDisposition::Retried
        } else {
            self.status = StepStatus::Failed;
            tracing::warn!(
                step_id = %self.step_id,
                retries = self.retry_count,
                error = %error,
                "Step terminally failed"
            );
            FailureDisposition::Terminal
        }
    }
}

/// Execution state of every step in a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    records: HashMap<String, StepRecord>,
}

impl RunState {
    /// Initialize pending records for every step of a plan.
    pub fn for_plan(plan: &Plan) -> Self {
        let records = plan
            .steps
            .iter()
            .map(|s| (s.id.clone(), StepRecord::new(&s.id)))
            .collect();
        Self { records }
    }

    /// Get a step's record.
    pub fn record(&self, step_id: &str) -> Option<&StepRecord> {
        self.records.get(step_id)
    }

    /// Get a step's record mutably.
    pub fn record_mut(&mut self, step_id: &str) -> Option<&mut StepRecord> {
        self.records.get_mut(step_id)
    }

    /// Status of a step, `Pending` if unknown.
    pub fn status(&self, step_id: &str) -> StepStatus {
        self.records
            .get(step_id)
            .map(|r| r.status)
            .unwrap_or(StepStatus::Pending)
    }

    /// Whether a step completed successfully.
    pub fn is_completed(&self, step_id: &str) -> bool {
        self.status(step_id) == StepStatus::Completed
    }

    /// Whether a step terminally failed.
    pub fn is_failed(&self, step_id: &str) -> bool {
        self.status(step_id) == StepStatus::Failed
    }

    /// Number of completed steps.
    pub fn completed_count(&self) -> usize {
        self.records
            .values()
            .filter(|r| r.status == StepStatus::Completed)
            .count()
    }

    /// Number of terminally failed steps.
    pub fn failed_count(&self) -> usize {
        self.records
            .values()
            .filter(|r| r.status == StepStatus::Failed)
            .count()
    }

    /// Number of terminal steps (completed or failed).
    pub fn terminal_count(&self) -> usize {
        self.records
            .values()
            .filter(|r| r.status.is_terminal())
            .count()
    }

    /// Total number of tracked steps.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no steps are tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over all records.
    pub fn records(&self) -> impl Iterator<Item = &StepRecord> {
        self.records.values()
    }

    /// Return steps stuck in `running` to `pending`.
    ///
    /// Used when resuming a checkpoint written mid-round: dispatched
    /// steps that never reported back are re-run, keeping their retry
    /// counts.
    pub fn reset_running(&mut self) {
        for record in self.records.values_mut() {
            if record.status == StepStatus::Running {
                record.status = StepStatus::Pending;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_and_terminality() {
        assert_eq!(StepStatus::Pending.to_string(), "pending");
        assert_eq!(StepStatus::Failed.to_string(), "failed");
        assert!(!StepStatus::Running.is_terminal());
        assert!(StepStatus::Completed.is_terminal());
    }

    #[test]
    fn test_mark_running_only_from_pending() {
        let mut record = StepRecord::new("a");
        record.mark_running();
        assert_eq!(record.status, StepStatus::Running);
        assert!(record.started_at.is_some());

        record.record_success(StepOutput::from_value(serde_json::json!({})), 5);
        record.mark_running();
        assert_eq!(record.status, StepStatus::Completed);
    }

    #[test]
    fn test_retry_until_budget_exhausted() {
        let policy = RetryPolicy::default();
        let mut record = StepRecord::new("a");

        for expected_retry in 1..=3 {
            record.mark_running();
            let disposition = record.record_failure("boom", true, &policy);
            assert_eq!(disposition, FailureDisposition::Retried);
            assert_eq!(record.status, StepStatus::Pending);
            assert_eq!(record.retry_count, expected_retry);
        }

        record.mark_running();
        let disposition = record.record_failure("boom", true, &policy);
        assert_eq!(disposition, FailureDisposition::Terminal);
        assert_eq!(record.status, StepStatus::Failed);
        assert_eq!(record.retry_count, 3);
    }

    #[test]
    fn test_non_retryable_failure_is_terminal_immediately() {
        let policy = RetryPolicy::default();
        let mut record = StepRecord::new("a");
        record.mark_running();

        let disposition = record.record_failure("unsupported", false, &policy);
        assert_eq!(disposition, FailureDisposition::Terminal);
        assert_eq!(record.retry_count, 0);
    }

    #[test]
    fn test_success_clears_previous_error() {
        let policy = RetryPolicy::default();
        let mut record = StepRecord::new("a");
        record.mark_running();
        record.record_failure("transient", true, &policy);

        record.mark_running();
        record.record_success(StepOutput::from_value(serde_json::json!({"ok": true})), 12);
        assert_eq!(record.status, StepStatus::Completed);
        assert!(record.error.is_none());
        assert_eq!(record.duration_ms, Some(12));
    }

    #[test]
    fn test_backoff_delays() {
        let none = RetryPolicy::default();
        assert_eq!(none.delay_for(1), None);

        let fixed = RetryPolicy {
            max_retries: 3,
            backoff: Backoff::Fixed { delay_ms: 250 },
        };
        assert_eq!(fixed.delay_for(2), Some(Duration::from_millis(250)));

        let exponential = RetryPolicy {
            max_retries: 5,
            backoff: Backoff::Exponential {
                initial_delay_ms: 100,
                max_delay_ms: 500,
            },
        };
        assert_eq!(exponential.delay_for(1), Some(Duration::from_millis(100)));
        assert_eq!(exponential.delay_for(2), Some(Duration::from_millis(200)));
        assert_eq!(exponential.delay_for(4), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_run_state_counts() {
        let mut state = RunState::default();
        state
            .records
            .insert("a".to_string(), StepRecord::new("a"));
        state
            .records
            .insert("b".to_string(), StepRecord::new("b"));

        state.record_mut("a").unwrap().mark_running();
        state
            .record_mut("a")
            .unwrap()
            .record_success(StepOutput::from_value(serde_json::json!({})), 1);

        assert_eq!(state.completed_count(), 1);
        assert_eq!(state.failed_count(), 0);
        assert_eq!(state.terminal_count(), 1);
        assert!(state.is_completed("a"));
        assert!(!state.is_completed("b"));
        assert_eq!(state.status("missing"), StepStatus::Pending);
    }
}
