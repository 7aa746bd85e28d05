//! Taskflow Step Execution Library
//!
//! This crate provides the pluggable execution layer of the taskflow
//! engine:
//!
//! - **Handler Registry**: dispatch steps to execution strategies by
//!   declared type
//! - **Built-in Handlers**: expert/tool steps backed by a remote
//!   invocation client, plus local analysis, integration, decision,
//!   condition, and parallel-join handlers
//! - **Invocation Client**: the seam to the remote expert/tool backend
//!
//! ## Modules
//!
//! - [`client`]: Remote backend invocation trait and HTTP implementation
//! - [`context`]: Execution context passed to handlers
//! - [`error`]: Typed step failures with retryability classification
//! - [`handlers`]: Built-in handlers and the default registry
//! - [`kind`]: Step type vocabulary
//! - [`output`]: Step output and artifact types
//! - [`registry`]: Handler trait and registry

pub mod client;
pub mod context;
pub mod error;
pub mod handlers;
pub mod kind;
pub mod output;
pub mod registry;

pub use client::{HttpInvocationClient, InvocationClient};
pub use context::StepContext;
pub use error::StepError;
pub use handlers::default_registry;
pub use kind::StepKind;
pub use output::{Artifact, ArtifactKind, StepOutput};
pub use registry::{HandlerRegistry, StepHandler};
