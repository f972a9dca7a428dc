//! Error types for the superagent engine.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Malformed model output or trigger payload.
///
/// Every variant names the field (or phase) that failed so the message is
/// useful without the raw payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Plan has no steps")]
    EmptySteps,

    #[error("Expected a JSON object for {context}")]
    NotAnObject { context: String },

    #[error("Invalid JSON from {context}: {reason}")]
    InvalidJson { context: String, reason: String },
}

impl SchemaError {
    pub(crate) fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Tool gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway access token not available; fetch it before creating the client")]
    MissingToken,

    #[error("Tool name is required for tool execution")]
    MissingToolName,

    #[error("Gateway request failed: {0}")]
    Http(String),

    #[error("Gateway returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Gateway request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Gateway response is not valid JSON: {0}")]
    Decode(String),

    #[error("Tool {tool} failed: {message}")]
    ToolCall { tool: String, message: String },

    #[error("Unexpected gateway response: {0}")]
    Protocol(String),

    #[error("Tool result text is not valid JSON ({reason}): {text}")]
    InnerPayload { text: String, reason: String },

    #[error("Token endpoint error: {0}")]
    Auth(String),
}

impl GatewayError {
    /// Whether the remote tool itself reported the failure (as opposed to
    /// transport or protocol problems).
    pub fn is_tool_failure(&self) -> bool {
        matches!(self, Self::ToolCall { .. })
    }
}

/// Outbound notification errors.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Failure of a single plan step.
///
/// Recorded on the step's result; never aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Sub-agent call failed: {0}")]
    SubAgent(#[from] LlmError),

    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error("{agent} returned {status}: {message}")]
    Rejected {
        agent: String,
        status: String,
        message: String,
    },

    #[error("Unknown step intent: {0}")]
    UnknownIntent(String),

    #[error("{phase} timed out after {after:?}")]
    Timeout { phase: String, after: Duration },

    #[error("Step panicked: {0}")]
    Panicked(String),
}

/// Run-level failures reported by the engine entry point as `{"error": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InputValidation(String),

    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("Planning produced an invalid plan: {0}")]
    InvalidPlan(#[from] SchemaError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
