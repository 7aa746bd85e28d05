//! Remote tool invocation handler.

use async_trait::async_trait;
use std::sync::Arc;

use crate::client::InvocationClient;
use crate::context::StepContext;
use crate::error::StepError;
use crate::kind::StepKind;
use crate::output::{Artifact, StepOutput};
use crate::registry::StepHandler;

/// Routes a step to a named remote tool (generation, conversion, lookup).
///
/// The input must name the `tool`; `params` are forwarded as the tool's
/// arguments. Artifacts reported by the tool are lifted onto the output.
pub struct ToolHandler {
    client: Arc<dyn InvocationClient>,
}

impl ToolHandler {
    /// Create a handler backed by the given client.
    pub fn new(client: Arc<dyn InvocationClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StepHandler for ToolHandler {
    fn kind(&self) -> StepKind {
        StepKind::Tool
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &StepContext,
    ) -> Result<StepOutput, StepError> {
        let tool = input
            .get("tool")
            .and_then(|v| v.as_str())
            .ok_or_else(|| StepError::Invalid("tool step requires a 'tool' name".to_string()))?
            .to_string();

        let params = input.get("params").cloned().unwrap_or(serde_json::json!({}));

        let payload = serde_json::json!({
            "task": ctx.task,
            "params": params,
        });

        tracing::debug!(step_id = %ctx.step_id, tool = %tool, "Invoking remote tool");

        let response = self.client.invoke(&tool, payload).await?;

        let artifacts = response
            .get("artifacts")
            .cloned()
            .map(|v| serde_json::from_value::<Vec<Artifact>>(v).unwrap_or_default())
            .unwrap_or_default();

        let summary = response
            .get("summary")
            .and_then(|v| v.as_str())
            .map(String::from);

        let mut output = StepOutput::from_value(response).with_artifacts(artifacts);
        if let Some(summary) = summary {
            output = output.with_summary(summary);
        }
        Ok(output)
    }
}
