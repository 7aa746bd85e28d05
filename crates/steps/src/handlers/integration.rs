//! Output integration handler.

use async_trait::async_trait;

use crate::context::StepContext;
use crate::error::StepError;
use crate::kind::StepKind;
use crate::output::{Artifact, StepOutput};
use crate::registry::StepHandler;

/// Assembles upstream outputs into a single deliverable.
///
/// Each top-level input entry becomes a named section of the combined
/// document. Artifact lists found inside sections are lifted onto the
/// output so they reach the final report.
pub struct IntegrationHandler;

#[async_trait]
impl StepHandler for IntegrationHandler {
    fn kind(&self) -> StepKind {
        StepKind::Integration
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &StepContext,
    ) -> Result<StepOutput, StepError> {
        let entries: Vec<(String, serde_json::Value)> = match input {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            serde_json::Value::Null => Vec::new(),
            other => vec![("content".to_string(), other)],
        };

        let mut artifacts: Vec<Artifact> = Vec::new();
        let mut sections = Vec::new();

        for (name, value) in entries {
            if let Some(list) = value.get("artifacts").cloned() {
                artifacts.extend(serde_json::from_value::<Vec<Artifact>>(list).unwrap_or_default());
            }
            sections.push(serde_json::json!({
                "name": name,
                "content": value,
            }));
        }

        tracing::debug!(
            step_id = %ctx.step_id,
            section_count = sections.len(),
            "Assembled deliverable"
        );

        let summary = format!("Integrated {} section(s)", sections.len());
        let data = serde_json::json!({
            "title": if ctx.step_name.is_empty() { &ctx.task } else { &ctx.step_name },
            "sections": sections,
        });

        Ok(StepOutput::from_value(data)
            .with_summary(summary)
            .with_artifacts(artifacts))
    }
}
