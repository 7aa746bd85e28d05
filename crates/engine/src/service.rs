//! Task submission surface.
//!
//! The service ties the builder, controller, and store together behind
//! the submit/execute/pause/resume/cancel operations a host calls. At
//! most one run may be active per plan.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::plan::{Plan, PlanBuilder, TaskRequest};
use crate::report::RunReport;
use crate::run::controller::{RunController, RunHandle, RunSignals};
use crate::store::{Checkpoint, PlanStore};

/// Facade over plan building and run control.
pub struct TaskService {
    builder: PlanBuilder,
    controller: RunController,
    store: Arc<dyn PlanStore>,
    config: EngineConfig,
    active: Mutex<HashMap<String, RunHandle>>,
}

impl TaskService {
    /// Create a service over a controller and store.
    pub fn new(controller: RunController, store: Arc<dyn PlanStore>) -> Self {
        Self {
            builder: PlanBuilder::new(),
            controller,
            store,
            config: EngineConfig::default(),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build a plan from a task request and persist it.
    pub async fn submit(&self, request: TaskRequest) -> EngineResult<Plan> {
        let plan = self.builder.build(request)?;
        self.store
            .save(&plan.id, &Checkpoint::initial(plan.clone()))
            .await?;

        tracing::info!(plan_id = %plan.id, "Task submitted");
        Ok(plan)
    }

    /// Execute a submitted plan to completion and return its report.
    pub async fn execute(&self, plan_id: &str) -> EngineResult<RunReport> {
        let checkpoint = self.load_checkpoint(plan_id).await?;
        let mut plan = checkpoint.plan;

        let signals = self.register_run(plan_id)?;
        let options = self.config.run_options();
        let report = self.controller.run(&mut plan, &options, signals).await;
        self.unregister_run(plan_id);

        Ok(report)
    }

    /// Continue a previously checkpointed run (e.g. after a crash).
    pub async fn recover(&self, plan_id: &str) -> EngineResult<RunReport> {
        let checkpoint = self.load_checkpoint(plan_id).await?;

        let signals = self.register_run(plan_id)?;
        let options = self.config.run_options();
        let report = self.controller.resume(checkpoint, &options, signals).await;
        self.unregister_run(plan_id);

        Ok(report)
    }

    /// Pause the active run of a plan before its next round.
    pub fn pause(&self, plan_id: &str) -> EngineResult<()> {
        self.with_handle(plan_id, |handle| handle.pause())
    }

    /// Resume a paused run.
    pub fn resume(&self, plan_id: &str) -> EngineResult<()> {
        self.with_handle(plan_id, |handle| handle.resume())
    }

    /// Cancel the active run of a plan.
    pub fn cancel(&self, plan_id: &str) -> EngineResult<()> {
        self.with_handle(plan_id, |handle| handle.cancel())
    }

    /// Load a plan by id.
    pub async fn plan(&self, plan_id: &str) -> EngineResult<Plan> {
        Ok(self.load_checkpoint(plan_id).await?.plan)
    }

    async fn load_checkpoint(&self, plan_id: &str) -> EngineResult<Checkpoint> {
        self.store
            .load(plan_id)
            .await?
            .ok_or_else(|| EngineError::PlanNotFound(plan_id.to_string()))
    }

    fn register_run(&self, plan_id: &str) -> EngineResult<RunSignals> {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if active.contains_key(plan_id) {
            return Err(EngineError::Conflict(format!(
                "plan '{}' already has an active run",
                plan_id
            )));
        }

        let (handle, signals) = RunHandle::new();
        active.insert(plan_id.to_string(), handle);
        Ok(signals)
    }

    fn unregister_run(&self, plan_id: &str) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(plan_id);
    }

    fn with_handle(&self, plan_id: &str, f: impl FnOnce(&RunHandle)) -> EngineResult<()> {
        let active = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let handle = active
            .get(plan_id)
            .ok_or_else(|| EngineError::RunNotFound(plan_id.to_string()))?;
        f(handle);
        Ok(())
    }
}
