//! Plan persistence seam.
//!
//! The controller checkpoints after every round so a crashed run can be
//! resumed from the last completed round. The durable store itself is an
//! external collaborator; this module defines the trait and an in-memory
//! implementation. TTL and eviction are the store's concern.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::EngineResult;
use crate::plan::Plan;
use crate::run::state::RunState;

/// Persisted plan plus the execution state of its latest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The plan, including the current blackboard.
    pub plan: Plan,

    /// Step execution state. Freshly submitted plans carry an
    /// all-pending state.
    pub state: RunState,

    /// Run that produced this checkpoint, absent before first execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// When the checkpoint was written.
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Checkpoint for a freshly built plan.
    pub fn initial(plan: Plan) -> Self {
        let state = RunState::for_plan(&plan);
        Self {
            plan,
            state,
            run_id: None,
            saved_at: Utc::now(),
        }
    }

    /// Checkpoint mid-run.
    pub fn of_round(plan: &Plan, state: &RunState, run_id: &str) -> Self {
        Self {
            plan: plan.clone(),
            state: state.clone(),
            run_id: Some(run_id.to_string()),
            saved_at: Utc::now(),
        }
    }
}

/// Persistent plan storage.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Persist a checkpoint under the plan id, replacing any previous one.
    async fn save(&self, plan_id: &str, checkpoint: &Checkpoint) -> EngineResult<()>;

    /// Load the latest checkpoint for a plan, `None` if unknown.
    async fn load(&self, plan_id: &str) -> EngineResult<Option<Checkpoint>>;

    /// Remove a plan's checkpoint.
    async fn delete(&self, plan_id: &str) -> EngineResult<()>;
}

/// In-memory store for tests and single-process hosts.
#[derive(Default)]
pub struct MemoryPlanStore {
    inner: RwLock<HashMap<String, Checkpoint>>,
}

impl MemoryPlanStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn save(&self, plan_id: &str, checkpoint: &Checkpoint) -> EngineResult<()> {
        self.inner
            .write()
            .await
            .insert(plan_id.to_string(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, plan_id: &str) -> EngineResult<Option<Checkpoint>> {
        Ok(self.inner.read().await.get(plan_id).cloned())
    }

    async fn delete(&self, plan_id: &str) -> EngineResult<()> {
        self.inner.write().await.remove(plan_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{PlanBuilder, Step, TaskRequest};
    use taskflow_steps::StepKind;

    fn make_plan() -> Plan {
        PlanBuilder::new()
            .build(
                TaskRequest::new("test").with_steps(vec![Step::new("a", "A", StepKind::Analysis)]),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let store = MemoryPlanStore::new();
        let plan = make_plan();
        let plan_id = plan.id.clone();

        store
            .save(&plan_id, &Checkpoint::initial(plan))
            .await
            .unwrap();

        let loaded = store.load(&plan_id).await.unwrap().unwrap();
        assert_eq!(loaded.plan.id, plan_id);
        assert!(loaded.run_id.is_none());
        assert_eq!(loaded.state.len(), 1);
    }

    #[tokio::test]
    async fn test_load_unknown_is_none() {
        let store = MemoryPlanStore::new();
        assert!(store.load("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_checkpoint() {
        let store = MemoryPlanStore::new();
        let plan = make_plan();
        let plan_id = plan.id.clone();

        store
            .save(&plan_id, &Checkpoint::initial(plan))
            .await
            .unwrap();
        store.delete(&plan_id).await.unwrap();
        assert!(store.load(&plan_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_checkpoint_serialization_roundtrip() {
        let plan = make_plan();
        let checkpoint = Checkpoint::initial(plan);

        let json = serde_json::to_string(&checkpoint).unwrap();
        let back: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back.plan.id, checkpoint.plan.id);
    }
}
