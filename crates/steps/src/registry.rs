//! Step handler registry and dispatch.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::StepContext;
use crate::error::StepError;
use crate::kind::StepKind;
use crate::output::StepOutput;

/// Trait implemented by step execution strategies.
///
/// Handlers receive variable-resolved input and own all side effects;
/// the engine only requires bounded completion under the timeout and
/// cancellation contract it enforces around `execute`.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// The step kind this handler executes.
    fn kind(&self) -> StepKind;

    /// Execute the step with resolved input and execution context.
    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &StepContext,
    ) -> Result<StepOutput, StepError>;
}

/// Registry mapping step kinds to their handlers.
pub struct HandlerRegistry {
    handlers: HashMap<StepKind, Arc<dyn StepHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under its declared kind.
    pub fn register<H: StepHandler + 'static>(&mut self, handler: H) {
        let kind = handler.kind();
        self.handlers.insert(kind, Arc::new(handler));
    }

    /// Get the handler for a kind.
    pub fn get(&self, kind: StepKind) -> Option<Arc<dyn StepHandler>> {
        self.handlers.get(&kind).cloned()
    }

    /// Check whether a kind has a registered handler.
    pub fn has(&self, kind: StepKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// List the registered kinds.
    pub fn kinds(&self) -> Vec<StepKind> {
        self.handlers.keys().copied().collect()
    }

    /// Dispatch a step to its handler.
    ///
    /// Fails closed with [`StepError::Unsupported`] when no handler is
    /// registered for the kind.
    pub async fn execute(
        &self,
        kind: StepKind,
        input: serde_json::Value,
        ctx: &StepContext,
    ) -> Result<StepOutput, StepError> {
        let handler = self
            .get(kind)
            .ok_or_else(|| StepError::Unsupported(kind.to_string()))?;
        handler.execute(input, ctx).await
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
