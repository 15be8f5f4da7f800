//! Dispatch transport to the local tool HTTP service.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::ToolError;

/// Default timeout for one tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport over which non-handoff tools are executed.
///
/// Tool invocations are not idempotent, so the transport never retries; a
/// failure terminates the invocation and the session continues.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Execute `tool` with `input`, returning the downstream `result` value.
    async fn execute(&self, tool: &str, input: &Value) -> Result<Value, ToolError>;
}

/// Production transport: `POST {base_url}/tools/execute`.
#[derive(Debug, Clone)]
pub struct HttpToolTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpToolTransport {
    /// Create a transport against the given service base URL.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Transport with [`DEFAULT_TOOL_TIMEOUT`].
    pub fn with_defaults(base_url: impl Into<String>) -> Result<Self, ToolError> {
        Self::new(base_url, DEFAULT_TOOL_TIMEOUT)
    }
}

#[async_trait]
impl ToolTransport for HttpToolTransport {
    async fn execute(&self, tool: &str, input: &Value) -> Result<Value, ToolError> {
        let url = format!("{}/tools/execute", self.base_url);
        debug!(tool, url = %url, "Dispatching tool");

        let response = self
            .client
            .post(&url)
            .json(&json!({ "tool": tool, "input": input }))
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Transport(format!(
                "tool service returned {status}: {body}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolError::BadResponse(e.to_string()))?;
        body.get("result")
            .cloned()
            .ok_or_else(|| ToolError::BadResponse("missing `result` field".to_string()))
    }
}
