//! Final run report aggregation.

use serde::{Deserialize, Serialize};

use chrono::{DateTime, Utc};
use taskflow_steps::Artifact;

use crate::plan::Plan;
use crate::run::state::{RunState, StepStatus};

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every step completed.
    Completed,
    /// Some steps completed, some failed or never became eligible.
    Partial,
    /// No step completed.
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Partial => write!(f, "partial"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Aggregate run metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Total steps in the plan.
    pub total_steps: usize,

    /// Steps that completed successfully.
    pub completed_steps: usize,

    /// Steps that terminally failed.
    pub failed_steps: usize,

    /// Rounds the scheduler dispatched.
    pub rounds: u32,

    /// Wall-clock duration of the run in milliseconds.
    pub elapsed_ms: u64,

    /// completed / total.
    pub success_rate: f64,
}

/// Per-step view in the final report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Step identifier.
    pub step_id: String,

    /// Step name.
    pub name: String,

    /// Final status.
    pub status: StepStatus,

    /// Output data, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,

    /// Handler-provided summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Failure message, present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Retries consumed.
    pub retry_count: u32,

    /// Duration of the last attempt in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Final result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: String,

    /// Plan the run executed.
    pub plan_id: String,

    /// Overall status derived from per-step outcomes.
    pub status: RunStatus,

    /// Whether the run was cancelled before finishing.
    pub cancelled: bool,

    /// Per-step outcomes in declaration order.
    pub steps: Vec<StepOutcome>,

    /// Derived human-readable summary.
    pub summary: String,

    /// Recommendations collected from step outputs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,

    /// Artifacts collected from step outputs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    /// Aggregate metrics.
    pub metrics: RunMetrics,

    /// When the report was produced.
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Aggregate the final report from the plan and run state.
    pub fn aggregate(
        plan: &Plan,
        state: &RunState,
        run_id: &str,
        rounds: u32,
        elapsed_ms: u64,
        cancelled: bool,
    ) -> Self {
        let total_steps = plan.len();
        let completed_steps = state.completed_count();
        let failed_steps = state.failed_count();

        let status = if completed_steps == total_steps {
            RunStatus::Completed
        } else if completed_steps == 0 {
            RunStatus::Failed
        } else {
            RunStatus::Partial
        };

        let mut steps = Vec::with_capacity(total_steps);
        let mut recommendations = Vec::new();
        let mut artifacts = Vec::new();
        let mut failed_names = Vec::new();

        for step in &plan.steps {
            let record = state.record(&step.id);

            let (step_status, output, summary, error, retry_count, duration_ms) = match record {
                Some(record) => (
                    record.status,
                    record.output.as_ref().map(|o| o.data.clone()),
                    record.output.as_ref().and_then(|o| o.summary.clone()),
                    record.error.clone(),
                    record.retry_count,
                    record.duration_ms,
                ),
                None => (StepStatus::Pending, None, None, None, 0, None),
            };

            if step_status == StepStatus::Failed {
                failed_names.push(step.id.clone());
            }

            if let Some(record) = record {
                if let Some(output) = &record.output {
                    artifacts.extend(output.artifacts.iter().cloned());
                    if let Some(recs) = output.data.get("recommendations").and_then(|v| v.as_array())
                    {
                        recommendations
                            .extend(recs.iter().filter_map(|r| r.as_str()).map(String::from));
                    }
                }
            }

            steps.push(StepOutcome {
                step_id: step.id.clone(),
                name: step.name.clone(),
                status: step_status,
                output,
                summary,
                error,
                retry_count,
                duration_ms,
            });
        }

        let mut summary = format!(
            "Completed {} of {} step(s) for task '{}'",
            completed_steps, total_steps, plan.description
        );
        if !failed_names.is_empty() {
            summary.push_str(&format!("; failed: {}", failed_names.join(", ")));
        }
        if cancelled {
            summary.push_str("; run was cancelled");
        }

        let success_rate = if total_steps > 0 {
            completed_steps as f64 / total_steps as f64
        } else {
            0.0
        };

        Self {
            run_id: run_id.to_string(),
            plan_id: plan.id.clone(),
            status,
            cancelled,
            steps,
            summary,
            recommendations,
            artifacts,
            metrics: RunMetrics {
                total_steps,
                completed_steps,
                failed_steps,
                rounds,
                elapsed_ms,
                success_rate,
            },
            finished_at: Utc::now(),
        }
    }
}
