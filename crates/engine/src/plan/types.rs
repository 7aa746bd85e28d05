//! Plan and step graph types.
//!
//! A [`Plan`] is the declarative step graph built from a task request.
//! Step definitions are immutable after build; mutable execution state
//! lives on the run (`run::state`), and inter-step data passes through
//! the blackboard on [`PlanContext`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use taskflow_steps::StepKind;

/// Incoming task submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRequest {
    /// High-level task description.
    pub description: String,

    /// User requirements attached to the task.
    #[serde(default)]
    pub requirements: Vec<String>,

    /// Task-level constraints (budget, format, deadline, ...).
    #[serde(default)]
    pub constraints: HashMap<String, serde_json::Value>,

    /// Explicit step graph. When absent the builder decomposes the
    /// description heuristically.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Step>>,
}

impl TaskRequest {
    /// Create a request from a description alone.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    /// Attach an explicit step graph.
    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = Some(steps);
        self
    }

    /// Attach a requirement.
    pub fn with_requirement(mut self, requirement: impl Into<String>) -> Self {
        self.requirements.push(requirement.into());
        self
    }
}

/// One node of the step graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Identifier, unique within the plan.
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// Declared type, selects the execution strategy.
    pub kind: StepKind,

    /// Ids of steps that must complete before this one becomes eligible.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Handler input. May contain `${step.path}` references resolved
    /// against the blackboard immediately before dispatch.
    #[serde(default)]
    pub input: serde_json::Value,

    /// Per-step execution timeout. Falls back to the run option default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Step {
    /// Create a step with no dependencies and empty input.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            depends_on: Vec::new(),
            input: serde_json::Value::Null,
            timeout_secs: None,
        }
    }

    /// Add a dependency.
    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        self.depends_on.push(step_id.into());
        self
    }

    /// Set the handler input.
    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = input;
        self
    }

    /// Set the execution timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// Shared context carried by a plan across its whole lifecycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanContext {
    /// Original task description.
    pub request: String,

    /// User requirements.
    #[serde(default)]
    pub requirements: Vec<String>,

    /// Task-level constraints.
    #[serde(default)]
    pub constraints: HashMap<String, serde_json::Value>,

    /// Blackboard: step id -> resolved output data. Written only by the
    /// controller between rounds.
    #[serde(default)]
    pub blackboard: HashMap<String, serde_json::Value>,
}

/// Complexity class estimated at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Complexity::Simple => write!(f, "simple"),
            Complexity::Moderate => write!(f, "moderate"),
            Complexity::Complex => write!(f, "complex"),
        }
    }
}

/// Build-time plan metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMetadata {
    /// Rough duration estimate for the whole plan.
    pub estimated_duration_secs: u64,

    /// Complexity class from step count and graph depth.
    pub complexity: Complexity,

    /// Distinct step kinds referenced by the plan.
    pub referenced_kinds: Vec<StepKind>,
}

/// Declarative step graph built from a task request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Plan identifier.
    pub id: String,

    /// Task description the plan was built from.
    pub description: String,

    /// Steps in declaration order.
    pub steps: Vec<Step>,

    /// Shared context including the blackboard.
    pub context: PlanContext,

    /// Build-time metadata.
    pub metadata: PlanMetadata,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Plan {
    /// Get a step by id.
    pub fn get_step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// All step ids in declaration order.
    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the plan has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_builder() {
        let step = Step::new("render", "Render cover", StepKind::Tool)
            .depends_on("brief")
            .with_input(serde_json::json!({"tool": "image_generation"}))
            .with_timeout_secs(120);

        assert_eq!(step.id, "render");
        assert_eq!(step.depends_on, vec!["brief"]);
        assert_eq!(step.timeout_secs, Some(120));
    }

    #[test]
    fn test_request_builder() {
        let request = TaskRequest::new("write a report")
            .with_requirement("cite sources")
            .with_steps(vec![Step::new("draft", "Draft", StepKind::Expert)]);

        assert_eq!(request.description, "write a report");
        assert_eq!(request.requirements, vec!["cite sources"]);
        assert_eq!(request.steps.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_step_serde_defaults() {
        let step: Step = serde_json::from_str(
            r#"{"id":"a","name":"A","kind":"analysis"}"#,
        )
        .unwrap();
        assert!(step.depends_on.is_empty());
        assert!(step.input.is_null());
        assert!(step.timeout_secs.is_none());
    }

    #[test]
    fn test_complexity_display() {
        assert_eq!(Complexity::Simple.to_string(), "simple");
        assert_eq!(Complexity::Complex.to_string(), "complex");
    }
}
