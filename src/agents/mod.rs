//! LLM-backed sub-agents.
//!
//! A sub-agent is a prompt-in, `{text}`-out call. The engine owns three of
//! them (planner, request builder, communicator), each bound to its own
//! system prompt.

pub mod prompts;

pub use prompts::{AgentRole, load_system_prompt};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

/// Low temperature keeps JSON output stable.
const AGENT_TEMPERATURE: f32 = 0.2;
/// Output budget per sub-agent reply. Plans and request payloads stay small.
const AGENT_MAX_TOKENS: u32 = 2048;

/// Raw reply from a sub-agent. `text` is expected to hold JSON, possibly fenced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAgentReply {
    pub text: String,
}

impl SubAgentReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A role-bound agent that answers a single prompt.
#[async_trait]
pub trait SubAgent: Send + Sync {
    fn role(&self) -> AgentRole;

    async fn invoke(&self, prompt: &str) -> Result<SubAgentReply, LlmError>;
}

/// [`SubAgent`] backed by an [`LlmProvider`] and a fixed system prompt.
pub struct LlmSubAgent {
    role: AgentRole,
    llm: Arc<dyn LlmProvider>,
    system_prompt: String,
    timeout: Duration,
}

impl LlmSubAgent {
    pub fn new(
        role: AgentRole,
        llm: Arc<dyn LlmProvider>,
        system_prompt: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            role,
            llm,
            system_prompt: system_prompt.into(),
            timeout,
        }
    }
}

#[async_trait]
impl SubAgent for LlmSubAgent {
    fn role(&self) -> AgentRole {
        self.role
    }

    async fn invoke(&self, prompt: &str) -> Result<SubAgentReply, LlmError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(prompt),
        ])
        .with_temperature(AGENT_TEMPERATURE)
        .with_max_tokens(AGENT_MAX_TOKENS);

        let started = std::time::Instant::now();
        let response = tokio::time::timeout(self.timeout, self.llm.complete(request))
            .await
            .map_err(|_| LlmError::RequestFailed {
                provider: self.llm.model_name().to_string(),
                reason: format!("{} timed out after {:?}", self.role, self.timeout),
            })??;

        tracing::debug!(
            agent = %self.role,
            model = self.llm.model_name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = response.content.len(),
            "Sub-agent replied"
        );

        if response.content.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.llm.model_name().to_string(),
                reason: format!("{} returned an empty reply", self.role),
            });
        }

        Ok(SubAgentReply::new(response.content))
    }
}
