//! Step type vocabulary.

use serde::{Deserialize, Serialize};

/// Declared type of a workflow step.
///
/// The kind selects the execution strategy a step is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Remote expert consultation via the invocation client.
    Expert,
    /// Remote tool invocation (generation, conversion, lookup).
    Tool,
    /// Local analysis over upstream outputs.
    Analysis,
    /// Local assembly of upstream outputs into a deliverable.
    Integration,
    /// Deterministic choice among declared options.
    Decision,
    /// Join point for steps fanned out by the scheduler.
    Parallel,
    /// Boolean predicate over resolved input.
    Condition,
}

impl StepKind {
    /// All kinds with a built-in handler.
    pub fn all() -> [StepKind; 7] {
        [
            StepKind::Expert,
            StepKind::Tool,
            StepKind::Analysis,
            StepKind::Integration,
            StepKind::Decision,
            StepKind::Parallel,
            StepKind::Condition,
        ]
    }

    /// Stable string form used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Expert => "expert",
            StepKind::Tool => "tool",
            StepKind::Analysis => "analysis",
            StepKind::Integration => "integration",
            StepKind::Decision => "decision",
            StepKind::Parallel => "parallel",
            StepKind::Condition => "condition",
        }
    }

    /// Parse a kind from its string form. Unknown kinds yield `None`.
    pub fn parse(s: &str) -> Option<StepKind> {
        match s.to_lowercase().as_str() {
            "expert" => Some(StepKind::Expert),
            "tool" => Some(StepKind::Tool),
            "analysis" => Some(StepKind::Analysis),
            "integration" => Some(StepKind::Integration),
            "decision" => Some(StepKind::Decision),
            "parallel" => Some(StepKind::Parallel),
            "condition" => Some(StepKind::Condition),
            _ => None,
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
