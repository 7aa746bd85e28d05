//! Execution context handed to step handlers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Context passed to a handler alongside its resolved input.
///
/// Carries the identifiers of the surrounding plan and run, the original
/// task the plan was built from, and the current execution attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepContext {
    /// Plan the step belongs to.
    pub plan_id: String,

    /// Run executing the step.
    pub run_id: String,

    /// Step identifier, unique within the plan.
    pub step_id: String,

    /// Human-readable step name.
    pub step_name: String,

    /// Original task description.
    pub task: String,

    /// User requirements attached to the task.
    #[serde(default)]
    pub requirements: Vec<String>,

    /// Task-level constraints.
    #[serde(default)]
    pub constraints: HashMap<String, serde_json::Value>,

    /// Execution attempt, 1-based. Incremented by the engine on retry.
    #[serde(default = "default_attempt")]
    pub attempt: u32,
}

fn default_attempt() -> u32 {
    1
}

impl StepContext {
    /// Create a context for a step within a plan and run.
    pub fn new(
        plan_id: impl Into<String>,
        run_id: impl Into<String>,
        step_id: impl Into<String>,
    ) -> Self {
        Self {
            plan_id: plan_id.into(),
            run_id: run_id.into(),
            step_id: step_id.into(),
            step_name: String::new(),
            task: String::new(),
            requirements: Vec::new(),
            constraints: HashMap::new(),
            attempt: 1,
        }
    }

    /// Set the step name.
    pub fn with_step_name(mut self, name: impl Into<String>) -> Self {
        self.step_name = name.into();
        self
    }

    /// Set the originating task description.
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = task.into();
        self
    }

    /// Set the execution attempt.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_new() {
        let ctx = StepContext::new("plan-1", "run-1", "gather");
        assert_eq!(ctx.plan_id, "plan-1");
        assert_eq!(ctx.run_id, "run-1");
        assert_eq!(ctx.step_id, "gather");
        assert_eq!(ctx.attempt, 1);
    }

    #[test]
    fn test_context_builder() {
        let ctx = StepContext::new("p", "r", "s")
            .with_step_name("Gather sources")
            .with_task("summarize the quarterly report")
            .with_attempt(2);

        assert_eq!(ctx.step_name, "Gather sources");
        assert_eq!(ctx.task, "summarize the quarterly report");
        assert_eq!(ctx.attempt, 2);
    }

    #[test]
    fn test_context_attempt_default_on_deserialize() {
        let ctx: StepContext = serde_json::from_str(
            r#"{"plan_id":"p","run_id":"r","step_id":"s","step_name":"","task":""}"#,
        )
        .unwrap();
        assert_eq!(ctx.attempt, 1);
    }
}
