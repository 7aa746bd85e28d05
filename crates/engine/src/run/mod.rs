//! Run execution: scheduling, state machine, control, throttling.

pub mod controller;
pub mod governor;
pub mod scheduler;
pub mod state;

pub use controller::{RunController, RunHandle, RunSignals};
pub use governor::{ResourceGovernor, SignalSource};
pub use state::{Backoff, RetryPolicy, RunState, StepStatus};
