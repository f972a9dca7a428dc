//! Engine entry point: trigger validation, planning, and plan execution.
//!
//! The access token, tool list, and system prompts are fetched once in
//! [`Engine::bootstrap`] and never change afterwards.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use futures::FutureExt;
use serde_json::Value;
use tokio::time::Instant;

use crate::agents::{AgentRole, LlmSubAgent, SubAgent, load_system_prompt};
use crate::config::EngineConfig;
use crate::error::{EngineError, Error};
use crate::gateway::{GatewayClient, ToolDescriptor, ToolGateway, fetch_access_token};
use crate::llm::{LlmProvider, create_provider};
use crate::notify::{DisabledNotifier, Notifier, SmtpNotifier};
use crate::plan::{
    EmailPayload, ExecutionPlan, PlanRunner, RunSummary, StepExecutor, parse_agent_json,
    validate_email_payload, validate_execution_plan,
};

/// Dotted path of the inbound authorization value.
pub const AUTH_BEARER_PATH: &str = "headers.X-Auth-Bearer";

/// Look up a nested value by dotted path, e.g. `headers.X-Auth-Bearer`.
pub fn json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, key| current.as_object()?.get(key))
}

pub struct Engine {
    planner: Arc<dyn SubAgent>,
    runner: PlanRunner,
    tools: Vec<ToolDescriptor>,
}

impl Engine {
    pub fn new(planner: Arc<dyn SubAgent>, runner: PlanRunner, tools: Vec<ToolDescriptor>) -> Self {
        Self {
            planner,
            runner,
            tools,
        }
    }

    /// Fetch the gateway token and tool list, then wire up agents and the runner.
    pub async fn bootstrap(config: &EngineConfig) -> Result<Arc<Self>, Error> {
        let token = fetch_access_token(
            &config.gateway.client_id,
            &config.gateway.client_secret,
            &config.gateway.token_url,
        )
        .await?;
        tracing::info!("Gateway access token fetched");

        let gateway = Arc::new(GatewayClient::new(
            config.gateway.url.clone(),
            token,
            config.tool_timeout,
        )?);
        let tools = gateway.list_tools().await?;

        let llm = create_provider(&config.llm)?;
        let notifier: Arc<dyn Notifier> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpNotifier::new(smtp.clone())),
            None => {
                tracing::warn!("SMTP_HOST not set, communicate steps will fail");
                Arc::new(DisabledNotifier)
            }
        };

        Ok(Arc::new(Self::assemble(
            config, llm, gateway, notifier, tools,
        )))
    }

    /// Build an engine from already-constructed collaborators.
    pub fn assemble(
        config: &EngineConfig,
        llm: Arc<dyn LlmProvider>,
        gateway: Arc<dyn ToolGateway>,
        notifier: Arc<dyn Notifier>,
        tools: Vec<ToolDescriptor>,
    ) -> Self {
        let agent = |role: AgentRole| -> Arc<dyn SubAgent> {
            let prompt = load_system_prompt(role, Some(&config.prompts_dir), &tools);
            Arc::new(LlmSubAgent::new(
                role,
                llm.clone(),
                prompt,
                config.agent_timeout,
            ))
        };

        let executor = StepExecutor::new(
            gateway,
            agent(AgentRole::RequestBuilder),
            agent(AgentRole::Communicator),
            notifier,
        )
        .with_timeouts(config.agent_timeout, config.tool_timeout);
        let runner = PlanRunner::new(executor).with_deadline(config.run_deadline);
        let planner = agent(AgentRole::Planner);

        Self::new(planner, runner, tools)
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Handle one trigger. Returns the run summary or `{"error": "..."}`.
    pub async fn invoke(&self, payload: Value) -> Value {
        let outcome = AssertUnwindSafe(self.handle(payload)).catch_unwind().await;

        let error = match outcome {
            Ok(Ok(summary)) => match serde_json::to_value(&summary) {
                Ok(value) => return value,
                Err(e) => format!("Failed to serialize run summary: {e}"),
            },
            Ok(Err(e)) => e.to_string(),
            Err(_) => "Unexpected error: run panicked".to_string(),
        };

        tracing::error!(error = %error, "Invocation failed");
        serde_json::json!({ "error": error })
    }

    async fn handle(&self, payload: Value) -> Result<RunSummary, EngineError> {
        if !payload.is_object() {
            return Err(EngineError::InputValidation(
                "payload must be a JSON object".to_string(),
            ));
        }

        let bearer = json_path(&payload, AUTH_BEARER_PATH)
            .and_then(Value::as_str)
            .filter(|token| !token.trim().is_empty());
        if bearer.is_none() {
            return Err(EngineError::InputValidation(format!(
                "missing authorization value at {AUTH_BEARER_PATH}"
            )));
        }

        let mut email = validate_email_payload(&payload)
            .map_err(|e| EngineError::InputValidation(e.to_string()))?;
        if email.today.is_none() {
            email.today = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        }

        tracing::info!(
            from = %email.from,
            subject = %email.subject,
            tools = self.tools.len(),
            "Received trigger"
        );

        // Planning and execution share one run deadline.
        let deadline = self.runner.deadline().map(|after| (Instant::now() + after, after));
        let plan = match deadline {
            Some((at, after)) => tokio::time::timeout_at(at, self.plan(&email))
                .await
                .map_err(|_| {
                    EngineError::Planning(format!("planner exceeded the run deadline of {after:?}"))
                })??,
            None => self.plan(&email).await?,
        };
        Ok(self
            .runner
            .run_until(&plan, &email, deadline.map(|(at, _)| at))
            .await)
    }

    async fn plan(&self, email: &EmailPayload) -> Result<ExecutionPlan, EngineError> {
        let prompt = serde_json::to_string(email)
            .map_err(|e| EngineError::Planning(format!("failed to encode email: {e}")))?;

        let reply = self
            .planner
            .invoke(&prompt)
            .await
            .map_err(|e| EngineError::Planning(e.to_string()))?;

        let value = parse_agent_json(&reply.text, AgentRole::Planner.label())?;
        let plan = validate_execution_plan(&value)?;

        tracing::info!(
            goal = %plan.goal,
            steps = plan.steps.len(),
            "Plan created"
        );
        Ok(plan)
    }
}
