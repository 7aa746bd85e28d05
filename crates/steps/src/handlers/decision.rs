//! Deterministic decision handler.

use async_trait::async_trait;

use crate::context::StepContext;
use crate::error::StepError;
use crate::kind::StepKind;
use crate::output::StepOutput;
use crate::registry::StepHandler;

/// Scores declared options and selects the best one.
///
/// Input shape: `{"options": [{"name": ..., "score": ...}, ...]}`.
/// An option without an explicit `score` is scored from the optional
/// top-level `criteria` weight map (sum of weight * option field value).
/// Ties keep the first declared option.
pub struct DecisionHandler;

impl DecisionHandler {
    fn score_option(
        option: &serde_json::Value,
        criteria: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> f64 {
        if let Some(score) = option.get("score").and_then(|v| v.as_f64()) {
            return score;
        }

        let Some(weights) = criteria else {
            return 0.0;
        };

        weights
            .iter()
            .filter_map(|(key, weight)| {
                let weight = weight.as_f64()?;
                let value = option.get(key).and_then(|v| v.as_f64())?;
                Some(weight * value)
            })
            .sum()
    }
}

#[async_trait]
impl StepHandler for DecisionHandler {
    fn kind(&self) -> StepKind {
        StepKind::Decision
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &StepContext,
    ) -> Result<StepOutput, StepError> {
        let options = input
            .get("options")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                StepError::Invalid("decision step requires an 'options' list".to_string())
            })?;

        if options.is_empty() {
            return Err(StepError::Invalid(
                "decision step requires at least one option".to_string(),
            ));
        }

        let criteria = input.get("criteria").and_then(|v| v.as_object());

        let mut best_index = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (index, option) in options.iter().enumerate() {
            let score = Self::score_option(option, criteria);
            if score > best_score {
                best_score = score;
                best_index = index;
            }
        }

        let best = &options[best_index];
        let name = best
            .get("name")
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_else(|| format!("option_{}", best_index));

        tracing::debug!(
            step_id = %ctx.step_id,
            decision = %name,
            considered = options.len(),
            "Decision made"
        );

        let summary = format!("Selected '{}' from {} option(s)", name, options.len());
        let data = serde_json::json!({
            "decision": name,
            "score": best_score,
            "considered": options.len(),
            "selected": best,
        });

        Ok(StepOutput::from_value(data).with_summary(summary))
    }
}
