//! Dependency-based step selection.
//!
//! A step is eligible when it is pending and every dependency has
//! completed. Steps downstream of a terminal failure are never selected
//! automatically; they simply stay pending and the run ends around them.

use crate::plan::{Plan, Step};
use crate::run::state::{RunState, StepStatus};

/// Select the eligible steps of a plan given the current run state.
///
/// Ordering: fewer dependencies first, then declaration order. The
/// caller bounds the batch to its concurrency limit.
pub fn eligible_steps<'a>(plan: &'a Plan, state: &RunState) -> Vec<&'a Step> {
    let mut eligible: Vec<(usize, &Step)> = plan
        .steps
        .iter()
        .enumerate()
        .filter(|(_, step)| state.status(&step.id) == StepStatus::Pending)
        .filter(|(_, step)| step.depends_on.iter().all(|dep| state.is_completed(dep)))
        .collect();

    eligible.sort_by_key(|(index, step)| (step.depends_on.len(), *index));
    eligible.into_iter().map(|(_, step)| step).collect()
}

/// Whether any pending step can still become eligible.
///
/// False once every pending step is blocked behind a terminal failure,
/// which is when the run loop should stop even though steps remain
/// non-terminal.
pub fn has_runnable_steps(plan: &Plan, state: &RunState) -> bool {
    !eligible_steps(plan, state).is_empty()
}
