//! Condition evaluation handler.

use async_trait::async_trait;

use crate::context::StepContext;
use crate::error::StepError;
use crate::kind::StepKind;
use crate::output::StepOutput;
use crate::registry::StepHandler;

/// Evaluates a comparison over resolved input.
///
/// Input shape: `{"left": ..., "op": ..., "right": ...}` with operators
/// `eq`, `ne`, `gt`, `gte`, `lt`, `lte`, `contains`, `exists`.
/// Ordering operators require numeric operands.
pub struct ConditionHandler;

impl ConditionHandler {
    fn compare_numeric(
        left: &serde_json::Value,
        right: &serde_json::Value,
        op: &str,
    ) -> Result<bool, StepError> {
        let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) else {
            return Err(StepError::Invalid(format!(
                "operator '{}' requires numeric operands",
                op
            )));
        };

        Ok(match op {
            "gt" => l > r,
            "gte" => l >= r,
            "lt" => l < r,
            "lte" => l <= r,
            _ => false,
        })
    }

    fn contains(left: &serde_json::Value, right: &serde_json::Value) -> Result<bool, StepError> {
        match left {
            serde_json::Value::String(s) => {
                let needle = right.as_str().ok_or_else(|| {
                    StepError::Invalid("'contains' on a string requires a string".to_string())
                })?;
                Ok(s.contains(needle))
            }
            serde_json::Value::Array(items) => Ok(items.contains(right)),
            _ => Err(StepError::Invalid(
                "'contains' requires a string or array on the left".to_string(),
            )),
        }
    }
}

#[async_trait]
impl StepHandler for ConditionHandler {
    fn kind(&self) -> StepKind {
        StepKind::Condition
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &StepContext,
    ) -> Result<StepOutput, StepError> {
        let op = input
            .get("op")
            .and_then(|v| v.as_str())
            .ok_or_else(|| StepError::Invalid("condition step requires 'op'".to_string()))?;

        let left = input
            .get("left")
            .ok_or_else(|| StepError::Invalid("condition step requires 'left'".to_string()))?;
        let right = input.get("right").cloned().unwrap_or(serde_json::Value::Null);

        let matched = match op {
            "eq" => *left == right,
            "ne" => *left != right,
            "gt" | "gte" | "lt" | "lte" => Self::compare_numeric(left, &right, op)?,
            "contains" => Self::contains(left, &right)?,
            "exists" => !left.is_null(),
            other => {
                return Err(StepError::Invalid(format!(
                    "unknown condition operator '{}'",
                    other
                )))
            }
        };

        tracing::debug!(step_id = %ctx.step_id, op = %op, matched, "Condition evaluated");

        let data = serde_json::json!({"matched": matched, "op": op});
        Ok(StepOutput::from_value(data)
            .with_summary(if matched { "Condition matched" } else { "Condition not matched" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn eval(input: serde_json::Value) -> Result<StepOutput, StepError> {
        let handler = ConditionHandler;
        let ctx = StepContext::new("p", "r", "check");
        handler.execute(input, &ctx).await
    }

    #[tokio::test]
    async fn test_condition_eq_and_ne() {
        let out = eval(serde_json::json!({"left": "a", "op": "eq", "right": "a"}))
            .await
            .unwrap();
        assert_eq!(out.data["matched"], true);

        let out = eval(serde_json::json!({"left": 1, "op": "ne", "right": 2}))
            .await
            .unwrap();
        assert_eq!(out.data["matched"], true);
    }

    #[tokio::test]
    async fn test_condition_numeric_ordering() {
        let out = eval(serde_json::json!({"left": 10, "op": "gt", "right": 5}))
            .await
            .unwrap();
        assert_eq!(out.data["matched"], true);

        let out = eval(serde_json::json!({"left": 3, "op": "lte", "right": 3}))
            .await
            .unwrap();
        assert_eq!(out.data["matched"], true);
    }

    #[tokio::test]
    async fn test_condition_ordering_rejects_non_numeric() {
        let result = eval(serde_json::json!({"left": "high", "op": "gt", "right": 5})).await;
        assert!(matches!(result, Err(StepError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_condition_contains() {
        let out = eval(serde_json::json!({"left": "hello world", "op": "contains", "right": "world"}))
            .await
            .unwrap();
        assert_eq!(out.data["matched"], true);

        let out = eval(serde_json::json!({"left": [1, 2, 3], "op": "contains", "right": 2}))
            .await
            .unwrap();
        assert_eq!(out.data["matched"], true);
    }

    #[tokio::test]
    async fn test_condition_exists() {
        let out = eval(serde_json::json!({"left": "anything", "op": "exists"}))
            .await
            .unwrap();
        assert_eq!(out.data["matched"], true);

        let out = eval(serde_json::json!({"left": null, "op": "exists"}))
            .await
            .unwrap();
        assert_eq!(out.data["matched"], false);
    }

    #[tokio::test]
    async fn test_condition_unknown_operator() {
        let result = eval(serde_json::json!({"left": 1, "op": "xor", "right": 2})).await;
        assert!(matches!(result, Err(StepError::Invalid(_))));
    }
}
