//! Tool gateway: a JSON-RPC 2.0 endpoint that lists and executes remote tools.

pub mod auth;
pub mod client;
pub mod envelope;

pub use auth::fetch_access_token;
pub use client::GatewayClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;

/// A tool advertised by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

/// Remote tool execution.
#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// List available tools. An unexpected response shape yields an empty list.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, GatewayError>;

    /// Call `tool` with `arguments`. `auth_email` is always set to `caller`.
    async fn call_tool(
        &self,
        tool: &str,
        arguments: serde_json::Map<String, Value>,
        caller: &str,
    ) -> Result<Value, GatewayError>;
}
