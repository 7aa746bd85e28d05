//! Local analysis handler.

use async_trait::async_trait;

use crate::context::StepContext;
use crate::error::StepError;
use crate::kind::StepKind;
use crate::output::StepOutput;
use crate::registry::StepHandler;

/// Profiles upstream outputs without leaving the process.
///
/// Each top-level input entry is treated as one source (typically a
/// `${step.field}` reference resolved by the engine). Findings describe
/// the shape of every source; `recommendations` arrays found inside
/// sources are propagated so the final report can surface them.
pub struct AnalysisHandler;

#[async_trait]
impl StepHandler for AnalysisHandler {
    fn kind(&self) -> StepKind {
        StepKind::Analysis
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &StepContext,
    ) -> Result<StepOutput, StepError> {
        let sources: Vec<(String, serde_json::Value)> = match input {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            serde_json::Value::Null => Vec::new(),
            other => vec![("input".to_string(), other)],
        };

        let mut findings = Vec::new();
        let mut recommendations: Vec<String> = Vec::new();

        for (name, value) in &sources {
            match value {
                serde_json::Value::Array(items) => {
                    findings.push(format!("{}: {} item(s)", name, items.len()));
                }
                serde_json::Value::Object(map) => {
                    findings.push(format!("{}: {} field(s)", name, map.len()));
                    if let Some(recs) = map.get("recommendations").and_then(|v| v.as_array()) {
                        recommendations
                            .extend(recs.iter().filter_map(|r| r.as_str()).map(String::from));
                    }
                }
                serde_json::Value::String(s) => {
                    findings.push(format!("{}: {} character(s)", name, s.len()));
                }
                other => {
                    findings.push(format!("{}: {}", name, other));
                }
            }
        }

        tracing::debug!(
            step_id = %ctx.step_id,
            source_count = sources.len(),
            "Analyzed upstream sources"
        );

        let source_names: Vec<&str> = sources.iter().map(|(n, _)| n.as_str()).collect();
        let summary = format!("Analyzed {} input source(s)", sources.len());
        let data = serde_json::json!({
            "sources": source_names,
            "findings": findings,
            "recommendations": recommendations,
            "analyzed_at": chrono::Utc::now().to_rfc3339(),
        });

        Ok(StepOutput::from_value(data).with_summary(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_analysis_profiles_sources() {
        let handler = AnalysisHandler;
        let ctx = StepContext::new("p", "r", "analyze");

        let input = serde_json::json!({
            "research": {"topic": "storage engines", "depth": 2},
            "samples": [1, 2, 3],
            "notes": "compare write amplification",
        });

        let output = handler.execute(input, &ctx).await.unwrap();
        let findings = output.data["findings"].as_array().unwrap();
        assert_eq!(findings.len(), 3);
        assert_eq!(output.data["sources"].as_array().unwrap().len(), 3);
        assert_eq!(output.summary.as_deref(), Some("Analyzed 3 input source(s)"));
    }

    #[tokio::test]
    async fn test_analysis_propagates_recommendations() {
        let handler = AnalysisHandler;
        let ctx = StepContext::new("p", "r", "analyze");

        let input = serde_json::json!({
            "review": {"recommendations": ["add an index", "batch the writes"]},
        });

        let output = handler.execute(input, &ctx).await.unwrap();
        let recs = output.data["recommendations"].as_array().unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0], "add an index");
    }

    #[tokio::test]
    async fn test_analysis_wraps_scalar_input() {
        let handler = AnalysisHandler;
        let ctx = StepContext::new("p", "r", "analyze");

        let output = handler.execute(serde_json::json!(42), &ctx).await.unwrap();
        assert_eq!(output.data["sources"], serde_json::json!(["input"]));
    }
}
