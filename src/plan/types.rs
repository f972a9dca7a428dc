//! Plan and step data model.
//!
//! These records are created once per run and never mutated. The only state
//! carried between steps is the ordered list of [`StepExecutionResult`]s.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SchemaError;

/// Tool name given to `communicate` steps that do not name one.
pub const COMMUNICATE_TOOL_NAME: &str = "send_email";

// ── Inbound email ───────────────────────────────────────────────────

/// The email that triggered a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailPayload {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub agent_email: String,
    pub subject: String,
    pub body: String,
    /// Current date and time (RFC 3339), used by agents to resolve relative dates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today: Option<String>,
}

// ── Plan ────────────────────────────────────────────────────────────

/// What kind of work a step performs.
///
/// Unknown intents survive validation as `Unrecognized` so the executor can
/// fail that one step instead of rejecting the whole plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StepIntent {
    ToolExecution,
    Communicate,
    Replan,
    Unrecognized(String),
}

impl StepIntent {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "tool_execution" => Self::ToolExecution,
            "communicate" => Self::Communicate,
            "replan" => Self::Replan,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::ToolExecution => "tool_execution",
            Self::Communicate => "communicate",
            Self::Replan => "replan",
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl std::fmt::Display for StepIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StepIntent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StepIntent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// One step of an execution plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    /// Informational ordering from the planner. List order is authoritative.
    pub execution_order: i64,
    pub intent: StepIntent,
    /// Human-readable goal of the step.
    pub step_outcome: String,
    /// Free-text guidance for downstream agents.
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

/// A validated plan: non-empty, and every `tool_execution` step names a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub goal: String,
    pub deliverable: String,
    pub steps: Vec<PlanStep>,
}

// ── Step agent I/O ──────────────────────────────────────────────────

/// Projection of a [`PlanStep`] handed to the request-builder and
/// communication agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentStep {
    pub execution_order: i64,
    pub step_outcome: String,
    pub context: String,
    pub tool_name: String,
}

impl TryFrom<&PlanStep> for CurrentStep {
    type Error = SchemaError;

    fn try_from(step: &PlanStep) -> Result<Self, Self::Error> {
        if !matches!(
            step.intent,
            StepIntent::ToolExecution | StepIntent::Communicate
        ) {
            return Err(SchemaError::invalid(
                "intent",
                format!(
                    "current step requires tool_execution or communicate, got '{}'",
                    step.intent
                ),
            ));
        }
        let tool_name = step
            .tool_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| SchemaError::missing("toolName"))?;

        Ok(Self {
            execution_order: step.execution_order,
            step_outcome: step.step_outcome.clone(),
            context: step.context.clone(),
            tool_name: tool_name.to_string(),
        })
    }
}

/// Input document sent to a step agent (request builder or communicator).
///
/// Borrows the prior results so each step sees a read-only snapshot.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepAgentInput<'a> {
    pub current_step: &'a CurrentStep,
    pub previous_execution_results: &'a [StepExecutionResult],
    pub original_email: &'a EmailPayload,
}

/// Status reported by a step agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubAgentStatus {
    Success,
    Error,
    NeedsClarification,
}

impl SubAgentStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            "needs_clarification" => Some(Self::NeedsClarification),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::NeedsClarification => "needs_clarification",
        }
    }
}

/// Validated response from a step agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubAgentResponse {
    pub tool_name: String,
    pub status: SubAgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_payload: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of the request-builder agent.
pub type RequestBuilderResponse = SubAgentResponse;

/// Response of the communication agent.
pub type CommunicationResponse = SubAgentResponse;

// ── Results ─────────────────────────────────────────────────────────

/// Outcome of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Error,
}

/// Result of executing one [`PlanStep`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepExecutionResult {
    pub status: StepStatus,
    pub execution_order: i64,
    pub step_outcome: String,
    pub context: String,
    pub tool_name: String,
    pub tool_called: bool,
    pub tool_response: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl StepExecutionResult {
    /// Successful result. `tool_called` is set only for tool executions.
    pub fn success(step: &PlanStep, tool_response: Option<serde_json::Value>) -> Self {
        Self {
            status: StepStatus::Success,
            execution_order: step.execution_order,
            step_outcome: step.step_outcome.clone(),
            context: step.context.clone(),
            tool_name: step.tool_name.clone().unwrap_or_default(),
            tool_called: step.intent == StepIntent::ToolExecution,
            tool_response,
            error: None,
        }
    }

    /// Failed result carrying the error message.
    pub fn failure(step: &PlanStep, error: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Error,
            execution_order: step.execution_order,
            step_outcome: step.step_outcome.clone(),
            context: step.context.clone(),
            tool_name: step.tool_name.clone().unwrap_or_default(),
            tool_called: false,
            tool_response: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}

// ── Run summary ─────────────────────────────────────────────────────

/// Run status. A run that reaches the summary always completed; failures are
/// per-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
}

/// Aggregated outcome of a plan run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub goal: String,
    pub deliverable: String,
    pub total_steps: usize,
    pub successful_steps: usize,
    pub failed_steps: usize,
    pub execution_results: Vec<StepExecutionResult>,
}

impl RunSummary {
    pub fn new(plan: &ExecutionPlan, execution_results: Vec<StepExecutionResult>) -> Self {
        let successful_steps = execution_results.iter().filter(|r| r.is_success()).count();
        Self {
            status: RunStatus::Completed,
            goal: plan.goal.clone(),
            deliverable: plan.deliverable.clone(),
            total_steps: execution_results.len(),
            successful_steps,
            failed_steps: execution_results.len() - successful_steps,
            execution_results,
        }
    }
}
