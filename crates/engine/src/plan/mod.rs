//! Plan model and construction.

pub mod builder;
pub mod types;

pub use builder::PlanBuilder;
pub use types::{Complexity, Plan, PlanContext, PlanMetadata, Step, TaskRequest};
