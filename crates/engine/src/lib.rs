//! Taskflow Engine
//!
//! This crate provides the orchestration core that turns a high-level
//! task request into an executable step graph and drives it to a final
//! report:
//!
//! - **Plan Building**: decompose a request into a validated step DAG;
//!   cyclic or malformed graphs are rejected at build time
//! - **Dependency Scheduling**: select pending steps whose dependencies
//!   completed, batched to a concurrency limit
//! - **Step State Machine**: pending → running → completed/failed with a
//!   uniform bounded-retry policy
//! - **Run Control**: cooperative round loop with pause/cancel flags,
//!   per-round checkpoints, and progress notifications
//! - **Variable Resolution**: `${step.path}` references between step
//!   outputs over a shared blackboard
//! - **Resource Governing**: environment-aware concurrency throttling
//!
//! ## Architecture
//!
//! Execution is round-based fan-out/fan-in: each round dispatches up to
//! the effective concurrency limit of eligible steps and awaits the
//! whole batch before the blackboard or step states mutate. Handlers
//! (the `taskflow-steps` crate) own all side effects; the engine owns
//! ordering, retries, and aggregation. External collaborators — the
//! remote backend client, the durable store, the progress sink — are
//! injected traits.
//!
//! ## Modules
//!
//! - [`config`]: Engine configuration and per-run options
//! - [`error`]: Engine error taxonomy with stable codes
//! - [`plan`]: Plan model and builder
//! - [`progress`]: Progress sink trait
//! - [`report`]: Final report aggregation
//! - [`resolver`]: `${step.path}` variable resolution
//! - [`run`]: Scheduler, state machine, governor, and controller
//! - [`service`]: Task submission surface
//! - [`store`]: Plan persistence seam
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use taskflow_engine::{RunController, TaskService, TaskRequest};
//! use taskflow_engine::store::MemoryPlanStore;
//! use taskflow_steps::{default_registry, HttpInvocationClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Arc::new(HttpInvocationClient::new("https://backend.example.com"));
//!     let registry = Arc::new(default_registry(client));
//!     let store = Arc::new(MemoryPlanStore::new());
//!
//!     let controller = RunController::new(registry, store.clone());
//!     let service = TaskService::new(controller, store);
//!
//!     let plan = service.submit(TaskRequest::new("write a launch report")).await?;
//!     let report = service.execute(&plan.id).await?;
//!     println!("{}: {}", report.status, report.summary);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod plan;
pub mod progress;
pub mod report;
pub mod resolver;
pub mod run;
pub mod service;
pub mod store;

pub use config::{EngineConfig, RunOptions};
pub use error::{EngineError, EngineResult, ErrorBody};
pub use plan::{Plan, PlanBuilder, Step, TaskRequest};
pub use report::{RunReport, RunStatus};
pub use run::{RunController, RunHandle, RunSignals};
pub use service::TaskService;
