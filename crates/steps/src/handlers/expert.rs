//! Expert consultation handler.

use async_trait::async_trait;
use std::sync::Arc;

use crate::client::InvocationClient;
use crate::context::StepContext;
use crate::error::StepError;
use crate::kind::StepKind;
use crate::output::StepOutput;
use crate::registry::StepHandler;

/// Routes a step to the remote expert backend.
///
/// The input may name a `specialty`; everything else is forwarded verbatim
/// so the backend sees the resolved upstream data.
pub struct ExpertHandler {
    client: Arc<dyn InvocationClient>,
}

impl ExpertHandler {
    /// Create a handler backed by the given client.
    pub fn new(client: Arc<dyn InvocationClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StepHandler for ExpertHandler {
    fn kind(&self) -> StepKind {
        StepKind::Expert
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &StepContext,
    ) -> Result<StepOutput, StepError> {
        let specialty = input
            .get("specialty")
            .and_then(|v| v.as_str())
            .unwrap_or("general")
            .to_string();

        let payload = serde_json::json!({
            "task": ctx.task,
            "step": ctx.step_name,
            "specialty": specialty,
            "requirements": ctx.requirements,
            "input": input,
            "attempt": ctx.attempt,
        });

        tracing::debug!(
            step_id = %ctx.step_id,
            specialty = %specialty,
            "Consulting expert backend"
        );

        let response = self.client.invoke("expert", payload).await?;

        let summary = response
            .get("summary")
            .and_then(|v| v.as_str())
            .map(String::from);

        let mut output = StepOutput::from_value(response);
        if let Some(summary) = summary {
            output = output.with_summary(summary);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingClient {
        response: serde_json::Value,
        last_payload: Mutex<Option<serde_json::Value>>,
    }

    impl RecordingClient {
        fn new(response: serde_json::Value) -> Self {
            Self {
                response,
                last_payload: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl InvocationClient for RecordingClient {
        async fn invoke(
            &self,
            _kind: &str,
            payload: serde_json::Value,
        ) -> Result<serde_json::Value, StepError> {
            *self.last_payload.lock().unwrap() = Some(payload);
            Ok(self.response.clone())
        }
    }

    #[tokio::test]
    async fn test_expert_forwards_task_and_specialty() {
        let client = Arc::new(RecordingClient::new(serde_json::json!({
            "answer": "use a queue",
            "summary": "queueing recommended"
        })));
        let handler = ExpertHandler::new(client.clone());

        let ctx = StepContext::new("p", "r", "consult")
            .with_step_name("Consult architect")
            .with_task("design a batch pipeline");
        let input = serde_json::json!({"specialty": "architecture", "question": "how?"});

        let output = handler.execute(input, &ctx).await.unwrap();
        assert_eq!(output.data["answer"], "use a queue");
        assert_eq!(output.summary.as_deref(), Some("queueing recommended"));

        let payload = client.last_payload.lock().unwrap().clone().unwrap();
        assert_eq!(payload["specialty"], "architecture");
        assert_eq!(payload["task"], "design a batch pipeline");
        assert_eq!(payload["attempt"], 1);
    }

    #[tokio::test]
    async fn test_expert_defaults_specialty() {
        let client = Arc::new(RecordingClient::new(serde_json::json!({})));
        let handler = ExpertHandler::new(client.clone());

        let ctx = StepContext::new("p", "r", "s");
        handler.execute(serde_json::json!({}), &ctx).await.unwrap();

        let payload = client.last_payload.lock().unwrap().clone().unwrap();
        assert_eq!(payload["specialty"], "general");
    }

    #[tokio::test]
    async fn test_expert_propagates_remote_error() {
        struct FailingClient;

        #[async_trait]
        impl InvocationClient for FailingClient {
            async fn invoke(
                &self,
                _kind: &str,
                _payload: serde_json::Value,
            ) -> Result<serde_json::Value, StepError> {
                Err(StepError::Remote("backend overloaded".to_string()))
            }
        }

        let handler = ExpertHandler::new(Arc::new(FailingClient));
        let ctx = StepContext::new("p", "r", "s");
        let result = handler.execute(serde_json::json!({}), &ctx).await;
        assert!(matches!(result, Err(StepError::Remote(_))));
    }
}
