//! Remote expert/tool invocation client.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::StepError;

/// Client for invoking a remote expert or tool backend.
///
/// The engine treats the backend as opaque: a capability name plus a JSON
/// payload in, a JSON result out. Transport failures surface as
/// [`StepError::Network`], backend-reported failures as
/// [`StepError::Remote`].
#[async_trait]
pub trait InvocationClient: Send + Sync {
    /// Invoke a remote capability with a JSON payload.
    async fn invoke(
        &self,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, StepError>;
}

/// HTTP implementation of [`InvocationClient`].
///
/// Posts to `{base_url}/invoke/{kind}` with the payload as the JSON body.
#[derive(Clone)]
pub struct HttpInvocationClient {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpInvocationClient {
    /// Create a client for the given backend URL with a 30 second timeout.
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a client with an explicit request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: None,
        }
    }

    /// Attach a bearer token sent with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Backend base URL, normalized without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl InvocationClient for HttpInvocationClient {
    async fn invoke(
        &self,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, StepError> {
        let url = format!("{}/invoke/{}", self.base_url, kind);

        tracing::debug!(kind = %kind, url = %url, "Dispatching remote invocation");

        let mut request = self.client.post(&url).json(&payload);
        if let Some(ref token) = self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StepError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(kind = %kind, status = %status, "Remote invocation failed");
            return Err(StepError::Remote(format!(
                "'{}' returned {}: {}",
                kind, status, body
            )));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| StepError::Remote(format!("invalid response body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = HttpInvocationClient::new("https://backend.example.com/");
        assert_eq!(client.base_url(), "https://backend.example.com");
    }

    #[test]
    fn test_client_with_token() {
        let client = HttpInvocationClient::new("https://backend.example.com").with_token("abc123");
        assert_eq!(client.api_token.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_invoke_unreachable_is_network_error() {
        // Reserved TEST-NET address, nothing listens there.
        let client =
            HttpInvocationClient::with_timeout("http://192.0.2.1:9", Duration::from_millis(100));
        let result = client.invoke("expert", serde_json::json!({})).await;
        assert!(matches!(result, Err(StepError::Network(_))));
    }
}
