//! HTTP client for the tool gateway.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};

use crate::error::GatewayError;
use crate::gateway::envelope;
use crate::gateway::{ToolDescriptor, ToolGateway};

const LIST_TOOLS_ID: &str = "list-tools-request";

/// JSON-RPC client bound to one gateway endpoint and access token.
pub struct GatewayClient {
    endpoint: String,
    token: SecretString,
    timeout: Duration,
    client: reqwest::Client,
}

impl GatewayClient {
    /// Fails with [`GatewayError::MissingToken`] when `token` is empty.
    pub fn new(
        endpoint: impl Into<String>,
        token: SecretString,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        if token.expose_secret().trim().is_empty() {
            return Err(GatewayError::MissingToken);
        }
        Ok(Self {
            endpoint: endpoint.into(),
            token,
            timeout,
            client: reqwest::Client::new(),
        })
    }

    /// POST an envelope and decode the JSON body. Non-2xx statuses are errors.
    async fn post(&self, body: &Value) -> Result<Value, GatewayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.token.expose_secret())
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.timeout)
                } else {
                    GatewayError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ToolGateway for GatewayClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, GatewayError> {
        let body = envelope::request(LIST_TOOLS_ID, "tools/list", None);
        let response = self.post(&body).await?;

        match envelope::parse_tool_list(&response) {
            Some(tools) => {
                tracing::info!(count = tools.len(), "Fetched gateway tool list");
                Ok(tools)
            }
            None => {
                tracing::warn!(
                    response = %response,
                    "Unexpected tools/list response shape, continuing with no tools"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn call_tool(
        &self,
        tool: &str,
        mut arguments: Map<String, Value>,
        caller: &str,
    ) -> Result<Value, GatewayError> {
        if tool.trim().is_empty() {
            return Err(GatewayError::MissingToolName);
        }

        // Caller identity is never taken from model output.
        arguments.insert("auth_email".to_string(), Value::String(caller.to_string()));

        let body = envelope::request(
            &format!("call-tool-{tool}"),
            "tools/call",
            Some(serde_json::json!({
                "name": tool,
                "arguments": arguments,
            })),
        );

        tracing::debug!(tool, "Calling gateway tool");
        let response = self.post(&body).await?;
        envelope::unwrap_call_response(tool, &response)
    }
}
