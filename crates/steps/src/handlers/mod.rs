//! Built-in step handlers.

pub mod analysis;
pub mod condition;
pub mod decision;
pub mod expert;
pub mod integration;
pub mod parallel;
pub mod tool;

pub use analysis::AnalysisHandler;
pub use condition::ConditionHandler;
pub use decision::DecisionHandler;
pub use expert::ExpertHandler;
pub use integration::IntegrationHandler;
pub use parallel::ParallelHandler;
pub use tool::ToolHandler;

use std::sync::Arc;

use crate::client::InvocationClient;
use crate::registry::HandlerRegistry;

/// Build a registry with every built-in handler registered.
///
/// Remote kinds (`expert`, `tool`) are backed by the given client; the
/// remaining kinds execute locally.
pub fn default_registry(client: Arc<dyn InvocationClient>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(ExpertHandler::new(client.clone()));
    registry.register(ToolHandler::new(client));
    registry.register(AnalysisHandler);
    registry.register(IntegrationHandler);
    registry.register(DecisionHandler);
    registry.register(ConditionHandler);
    registry.register(ParallelHandler);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;
    use crate::kind::StepKind;
    use async_trait::async_trait;

    struct NullClient;

    #[async_trait]
    impl InvocationClient for NullClient {
        async fn invoke(
            &self,
            _kind: &str,
            _payload: serde_json::Value,
        ) -> Result<serde_json::Value, StepError> {
            Ok(serde_json::json!({}))
        }
    }

    #[test]
    fn test_default_registry_covers_all_kinds() {
        let registry = default_registry(Arc::new(NullClient));
        for kind in StepKind::all() {
            assert!(registry.has(kind), "missing handler for {}", kind);
        }
    }
}
