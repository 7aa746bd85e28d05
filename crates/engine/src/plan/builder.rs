//! Plan construction and graph validation.
//!
//! Turns a [`TaskRequest`] into a validated [`Plan`]. Callers may supply
//! an explicit step graph; otherwise the builder decomposes the task
//! description heuristically. Either way the graph is validated here —
//! cyclic or malformed graphs are rejected at build time, never at run
//! time.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::Utc;
use taskflow_steps::StepKind;

use crate::error::{EngineError, EngineResult};
use crate::plan::types::{Complexity, Plan, PlanContext, PlanMetadata, Step, TaskRequest};

/// Rough per-kind duration estimates used for plan metadata.
fn kind_duration_secs(kind: StepKind) -> u64 {
    match kind {
        StepKind::Expert => 20,
        StepKind::Tool => 30,
        StepKind::Analysis => 10,
        StepKind::Integration => 10,
        StepKind::Decision => 5,
        StepKind::Parallel => 2,
        StepKind::Condition => 2,
    }
}

/// Builds validated plans from task requests.
pub struct PlanBuilder;

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanBuilder {
    /// Create a new plan builder.
    pub fn new() -> Self {
        Self
    }

    /// Build a plan from a request.
    ///
    /// Uses the request's explicit steps when present, otherwise
    /// decomposes the description. Fails with
    /// [`EngineError::PlanInvalid`] on an empty or malformed graph.
    pub fn build(&self, request: TaskRequest) -> EngineResult<Plan> {
        let steps = match request.steps.clone() {
            Some(steps) => steps,
            None => self.decompose(&request),
        };

        if steps.is_empty() {
            return Err(EngineError::PlanInvalid(
                "plan must contain at least one step".to_string(),
            ));
        }

        let depth = validate_graph(&steps)?;
        validate_step_inputs(&steps)?;
        let metadata = build_metadata(&steps, depth);

        let plan = Plan {
            id: uuid::Uuid::new_v4().to_string(),
            description: request.description.clone(),
            context: PlanContext {
                request: request.description,
                requirements: request.requirements,
                constraints: request.constraints,
                blackboard: HashMap::new(),
            },
            steps,
            metadata,
            created_at: Utc::now(),
        };

        tracing::info!(
            plan_id = %plan.id,
            step_count = plan.len(),
            complexity = %plan.metadata.complexity,
            "Plan built"
        );

        Ok(plan)
    }

    /// Heuristic decomposition of a task description into a step graph.
    ///
    /// Always opens with an expert consultation; keyword scanning adds
    /// generation and analysis steps, and everything feeds a final
    /// integration step.
    fn decompose(&self, request: &TaskRequest) -> Vec<Step> {
        let description = request.description.to_lowercase();
        let mut steps = Vec::new();

        steps.push(
            Step::new("gather", "Gather context", StepKind::Expert).with_input(serde_json::json!({
                "specialty": "general",
                "question": request.description,
            })),
        );

        let wants_image = ["image", "diagram", "logo", "illustration", "picture"]
            .iter()
            .any(|kw| description.contains(kw));
        if wants_image {
            steps.push(
                Step::new("render_image", "Generate image", StepKind::Tool)
                    .depends_on("gather")
                    .with_input(serde_json::json!({
                        "tool": "image_generation",
                        "params": {
                            "prompt": request.description,
                            "brief": "${gather}",
                        },
                    })),
            );
        }

        let wants_document = ["document", "report", "pdf", "write", "article"]
            .iter()
            .any(|kw| description.contains(kw));
        if wants_document {
            steps.push(
                Step::new("draft_document", "Draft document", StepKind::Tool)
                    .depends_on("gather")
                    .with_input(serde_json::json!({
                        "tool": "document_generation",
                        "params": {
                            "outline": "${gather}",
                        },
                    })),
            );
        }

        let wants_analysis = ["analyze", "analysis", "research", "review", "compare"]
            .iter()
            .any(|kw| description.contains(kw));
        if wants_analysis {
            steps.push(
                Step::new("analyze", "Analyze findings", StepKind::Analysis)
                    .depends_on("gather")
                    .with_input(serde_json::json!({
                        "research": "${gather}",
                    })),
            );
        }

        let upstream: Vec<String> = steps.iter().map(|s| s.id.clone()).collect();
        let mut compose_input = serde_json::Map::new();
        for id in &upstream {
            compose_input.insert(id.clone(), serde_json::json!(format!("${{{}}}", id)));
        }
        let mut compose = Step::new("compose", "Compose result", StepKind::Integration)
            .with_input(serde_json::Value::Object(compose_input));
        compose.depends_on = upstream;
        steps.push(compose);

        steps
    }
}

/// Validate the step graph and return its depth.
///
/// Checks id uniqueness, dependency references, self-dependencies, and
/// acyclicity (Kahn's algorithm). The depth is the longest dependency
/// chain, used for complexity classing.
fn validate_graph(steps: &[Step]) -> EngineResult<usize> {
    let mut ids = HashSet::new();
    for step in steps {
        if step.id.is_empty() {
            return Err(EngineError::PlanInvalid(
                "step with empty id".to_string(),
            ));
        }
        if !ids.insert(step.id.as_str()) {
            return Err(EngineError::PlanInvalid(format!(
                "duplicate step id '{}'",
                step.id
            )));
        }
    }

    for step in steps {
        for dep in &step.depends_on {
            if dep == &step.id {
                return Err(EngineError::PlanInvalid(format!(
                    "step '{}' depends on itself",
                    step.id
                )));
            }
            if !ids.contains(dep.as_str()) {
                return Err(EngineError::PlanInvalid(format!(
                    "step '{}' depends on unknown step '{}'",
                    step.id, dep
                )));
            }
        }
    }

    // Kahn's algorithm: peel zero-indegree steps level by level. Anything
    // left unprocessed sits on a cycle.
    let mut indegree: HashMap<&str, usize> = steps
        .iter()
        .map(|s| (s.id.as_str(), s.depends_on.len()))
        .collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for step in steps {
        for dep in &step.depends_on {
            dependents
                .entry(dep.as_str())
                .or_default()
                .push(step.id.as_str());
        }
    }

    let mut queue: VecDeque<(&str, usize)> = indegree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| (*id, 1))
        .collect();

    let mut processed = 0;
    let mut depth = 0;
    while let Some((id, level)) = queue.pop_front() {
        processed += 1;
        depth = depth.max(level);
        for dependent in dependents.get(id).into_iter().flatten() {
            let degree = indegree
                .get_mut(dependent)
                .ok_or_else(|| EngineError::Internal("indegree bookkeeping".to_string()))?;
            *degree -= 1;
            if *degree == 0 {
                queue.push_back((dependent, level + 1));
            }
        }
    }

    if processed < steps.len() {
        let mut cyclic: Vec<&str> = indegree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(id, _)| *id)
            .collect();
        cyclic.sort_unstable();
        return Err(EngineError::PlanInvalid(format!(
            "dependency cycle through step(s): {}",
            cyclic.join(", ")
        )));
    }

    Ok(depth)
}

/// Per-kind input checks, moved from execution time to build time.
///
/// A value may be a `${...}` reference bound at run time; those pass
/// here and the handler still fails closed on a bad resolved value.
fn validate_step_inputs(steps: &[Step]) -> EngineResult<()> {
    const CONDITION_OPS: [&str; 8] = ["eq", "ne", "gt", "gte", "lt", "lte", "contains", "exists"];

    for step in steps {
        match step.kind {
            StepKind::Tool => {
                let named = step
                    .input
                    .get("tool")
                    .and_then(|v| v.as_str())
                    .map(|s| !s.is_empty())
                    .unwrap_or(false);
                if !named {
                    return Err(EngineError::PlanInvalid(format!(
                        "step '{}': tool steps require a 'tool' name in input",
                        step.id
                    )));
                }
            }
            StepKind::Decision => {
                let has_options = match step.input.get("options") {
                    Some(serde_json::Value::Array(options)) => !options.is_empty(),
                    Some(serde_json::Value::String(reference)) => reference.contains("${"),
                    _ => false,
                };
                if !has_options {
                    return Err(EngineError::PlanInvalid(format!(
                        "step '{}': decision steps require a non-empty 'options' list",
                        step.id
                    )));
                }
            }
            StepKind::Condition => {
                let op = step.input.get("op").and_then(|v| v.as_str());
                if !op.map(|op| CONDITION_OPS.contains(&op)).unwrap_or(false) {
                    return Err(EngineError::PlanInvalid(format!(
                        "step '{}': condition steps require 'op' of {:?}",
                        step.id, CONDITION_OPS
                    )));
                }
                if step.input.get("left").is_none() {
                    return Err(EngineError::PlanInvalid(format!(
                        "step '{}': condition steps require 'left'",
                        step.id
                    )));
                }
            }
            _ => {}
        }
    }

    Ok(())
}

/// Derive build-time metadata from the validated graph.
fn build_metadata(steps: &[Step], depth: usize) -> PlanMetadata {
    let mut referenced_kinds = Vec::new();
    for step in steps {
        if !referenced_kinds.contains(&step.kind) {
            referenced_kinds.push(step.kind);
        }
    }

    let estimated_duration_secs = steps.iter().map(|s| kind_duration_secs(s.kind)).sum();

    let complexity = if steps.len() <= 2 && depth <= 2 {
        Complexity::Simple
    } else if steps.len() <= 5 && depth <= 3 {
        Complexity::Moderate
    } else {
        Complexity::Complex
    };

    PlanMetadata {
        estimated_duration_secs,
        complexity,
        referenced_kinds,
    }
}
