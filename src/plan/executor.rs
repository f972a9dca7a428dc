//! Step executor: runs one plan step to a terminal state.
//!
//! `execute` never fails. Every error (including a panic inside the step) is
//! recorded on the returned [`StepExecutionResult`].

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::{Map, Value};

use crate::agents::SubAgent;
use crate::error::{SchemaError, StepError};
use crate::gateway::ToolGateway;
use crate::notify::{Notifier, OutboundEmail, extract_address, reply_subject};
use crate::plan::sanitize::parse_agent_json;
use crate::plan::schema::{validate_communication_response, validate_request_builder_response};
use crate::plan::state::StepLifecycle;
use crate::plan::types::{
    CurrentStep, EmailPayload, PlanStep, StepAgentInput, StepExecutionResult, StepIntent,
    SubAgentResponse, SubAgentStatus,
};

const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes individual plan steps against the sub-agents, the tool gateway
/// and the notifier.
pub struct StepExecutor {
    gateway: Arc<dyn ToolGateway>,
    request_builder: Arc<dyn SubAgent>,
    communicator: Arc<dyn SubAgent>,
    notifier: Arc<dyn Notifier>,
    agent_timeout: Duration,
    tool_timeout: Duration,
}

impl StepExecutor {
    pub fn new(
        gateway: Arc<dyn ToolGateway>,
        request_builder: Arc<dyn SubAgent>,
        communicator: Arc<dyn SubAgent>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            gateway,
            request_builder,
            communicator,
            notifier,
            agent_timeout: DEFAULT_AGENT_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, agent_timeout: Duration, tool_timeout: Duration) -> Self {
        self.agent_timeout = agent_timeout;
        self.tool_timeout = tool_timeout;
        self
    }

    /// Run `step` given the results of all earlier steps.
    pub async fn execute(
        &self,
        step: &PlanStep,
        prior: &[StepExecutionResult],
        email: &EmailPayload,
    ) -> StepExecutionResult {
        let mut lifecycle = StepLifecycle::new(step.execution_order);
        if let Err(e) = lifecycle.start() {
            tracing::warn!(step = step.execution_order, "{e}");
        }

        tracing::info!(
            step = step.execution_order,
            intent = %step.intent,
            tool = step.tool_name.as_deref().unwrap_or(""),
            "Executing step"
        );

        let outcome = match AssertUnwindSafe(self.dispatch(step, prior, email))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => Err(StepError::Panicked(panic_message(panic.as_ref()))),
        };

        match outcome {
            Ok(tool_response) => {
                if let Err(e) = lifecycle.succeed() {
                    tracing::warn!(step = step.execution_order, "{e}");
                }
                tracing::info!(
                    step = step.execution_order,
                    elapsed_ms = lifecycle.elapsed_ms().unwrap_or_default(),
                    "Step succeeded"
                );
                StepExecutionResult::success(step, tool_response)
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(transition) = lifecycle.fail(message.clone()) {
                    tracing::warn!(step = step.execution_order, "{transition}");
                }
                tracing::error!(
                    step = step.execution_order,
                    intent = %step.intent,
                    elapsed_ms = lifecycle.elapsed_ms().unwrap_or_default(),
                    error = %message,
                    "Step failed"
                );
                StepExecutionResult::failure(step, message)
            }
        }
    }

    async fn dispatch(
        &self,
        step: &PlanStep,
        prior: &[StepExecutionResult],
        email: &EmailPayload,
    ) -> Result<Option<Value>, StepError> {
        match &step.intent {
            StepIntent::ToolExecution => self.run_tool(step, prior, email).await.map(Some),
            StepIntent::Communicate => self.run_communicate(step, prior, email).await.map(Some),
            StepIntent::Replan => {
                // Planning is not re-entered.
                tracing::info!(step = step.execution_order, "Replan step acknowledged");
                Ok(Some(serde_json::json!({
                    "status": "success",
                    "message": "Replan acknowledged; no further planning performed",
                })))
            }
            StepIntent::Unrecognized(raw) => Err(StepError::UnknownIntent(raw.clone())),
        }
    }

    async fn run_tool(
        &self,
        step: &PlanStep,
        prior: &[StepExecutionResult],
        email: &EmailPayload,
    ) -> Result<Value, StepError> {
        let current = CurrentStep::try_from(step)?;
        let response = self
            .ask(
                self.request_builder.as_ref(),
                &current,
                prior,
                email,
                validate_request_builder_response,
            )
            .await?;
        let response = accepted(self.request_builder.as_ref(), response)?;

        if response.tool_name != current.tool_name {
            tracing::warn!(
                step = current.execution_order,
                planned = %current.tool_name,
                returned = %response.tool_name,
                "Request builder named a different tool, calling the planned one"
            );
        }

        let arguments = response.api_payload.unwrap_or_default();
        let logged_arguments = Value::Object(arguments.clone());
        tracing::debug!(
            tool = %current.tool_name,
            arguments = %logged_arguments,
            "Tool arguments built"
        );

        self.timed(
            format!("tool {}", current.tool_name),
            self.tool_timeout,
            self.gateway
                .call_tool(&current.tool_name, arguments, &email.agent_email),
        )
        .await?
        .map_err(StepError::from)
    }

    async fn run_communicate(
        &self,
        step: &PlanStep,
        prior: &[StepExecutionResult],
        email: &EmailPayload,
    ) -> Result<Value, StepError> {
        let current = CurrentStep::try_from(step)?;
        let response = self
            .ask(
                self.communicator.as_ref(),
                &current,
                prior,
                email,
                validate_communication_response,
            )
            .await?;
        let response = accepted(self.communicator.as_ref(), response)?;
        let payload = response.api_payload.unwrap_or_default();

        let body = payload
            .get("body")
            .and_then(Value::as_str)
            .filter(|body| !body.trim().is_empty())
            .ok_or_else(|| SchemaError::missing("apiPayload.body"))?;

        let outbound = OutboundEmail {
            from: email.agent_email.clone(),
            to: vec![extract_address(&email.from)],
            cc: cc_list(&payload),
            subject: reply_subject(&email.subject),
            body: body.to_string(),
        };

        let receipt = self
            .timed(
                "send email".to_string(),
                self.tool_timeout,
                self.notifier.send(outbound),
            )
            .await??;

        Ok(serde_json::json!({
            "status": "success",
            "messageId": receipt.message_id,
        }))
    }

    /// Invoke a step agent and validate its reply.
    async fn ask<F>(
        &self,
        agent: &dyn SubAgent,
        current: &CurrentStep,
        prior: &[StepExecutionResult],
        email: &EmailPayload,
        validate: F,
    ) -> Result<SubAgentResponse, StepError>
    where
        F: Fn(&Value) -> Result<SubAgentResponse, SchemaError>,
    {
        let input = StepAgentInput {
            current_step: current,
            previous_execution_results: prior,
            original_email: email,
        };
        let prompt = serde_json::to_string(&input).map_err(|e| SchemaError::InvalidJson {
            context: "step agent input".to_string(),
            reason: e.to_string(),
        })?;

        let role = agent.role();
        let reply = self
            .timed(role.to_string(), self.agent_timeout, agent.invoke(&prompt))
            .await??;
        tracing::debug!(agent = %role, reply = %preview(&reply.text), "Sub-agent reply");

        let value = parse_agent_json(&reply.text, role.label()).inspect_err(|e| {
            tracing::warn!(agent = %role, error = %e, "Unparsable sub-agent output");
        })?;
        Ok(validate(&value)?)
    }

    async fn timed<T>(
        &self,
        phase: String,
        after: Duration,
        fut: impl Future<Output = T>,
    ) -> Result<T, StepError> {
        tokio::time::timeout(after, fut)
            .await
            .map_err(|_| StepError::Timeout { phase, after })
    }
}

/// Reject `error` and `needs_clarification` responses.
fn accepted(agent: &dyn SubAgent, response: SubAgentResponse) -> Result<SubAgentResponse, StepError> {
    let fallback = match response.status {
        SubAgentStatus::Success => return Ok(response),
        SubAgentStatus::Error => "sub-agent reported an error",
        SubAgentStatus::NeedsClarification => "sub-agent needs clarification",
    };
    Err(StepError::Rejected {
        agent: agent.role().to_string(),
        status: response.status.label().to_string(),
        message: response
            .error
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string()),
    })
}

/// `cc` from a communication payload: a list of strings or a single string.
fn cc_list(payload: &Map<String, Value>) -> Vec<String> {
    match payload.get("cc") {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![extract_address(s)],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(extract_address)
            .collect(),
        _ => Vec::new(),
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
