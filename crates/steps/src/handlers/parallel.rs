//! Parallel join handler.

use async_trait::async_trait;

use crate::context::StepContext;
use crate::error::StepError;
use crate::kind::StepKind;
use crate::output::StepOutput;
use crate::registry::StepHandler;

/// Join point for branches fanned out by the scheduler.
///
/// Concurrency itself is the scheduler's job; a `parallel` step simply
/// declares the fanned-out steps as dependencies and forwards their
/// resolved outputs downstream as one value.
pub struct ParallelHandler;

#[async_trait]
impl StepHandler for ParallelHandler {
    fn kind(&self) -> StepKind {
        StepKind::Parallel
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &StepContext,
    ) -> Result<StepOutput, StepError> {
        let branch_count = input.as_object().map(|m| m.len()).unwrap_or(1);

        tracing::debug!(step_id = %ctx.step_id, branch_count, "Joined parallel branches");

        Ok(StepOutput::from_value(input)
            .with_summary(format!("Joined {} branch result(s)", branch_count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parallel_forwards_branch_outputs() {
        let handler = ParallelHandler;
        let ctx = StepContext::new("p", "r", "join");

        let input = serde_json::json!({
            "branch_a": {"value": 1},
            "branch_b": {"value": 2},
        });

        let output = handler.execute(input.clone(), &ctx).await.unwrap();
        assert_eq!(output.data, input);
        assert_eq!(output.summary.as_deref(), Some("Joined 2 branch result(s)"));
    }
}
