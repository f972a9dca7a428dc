//! System prompts for the planning, request-building and communication agents.
//!
//! A `<prompts_dir>/<file_stem>.txt` file overrides the built-in prompt.
//! `{tool_set}` and `{today}` placeholders are filled at load time.

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, warn};

use crate::gateway::ToolDescriptor;

/// The three LLM-backed roles in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Planner,
    RequestBuilder,
    Communicator,
}

impl AgentRole {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::RequestBuilder => "request_builder",
            Self::Communicator => "communicator",
        }
    }

    /// Prompt override file name, without extension.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::Planner => "planning_agent_prompt",
            Self::RequestBuilder => "requestbuilder_agent_prompt",
            Self::Communicator => "communication_agent_prompt",
        }
    }

    fn default_prompt(&self) -> &'static str {
        match self {
            Self::Planner => PLANNER_PROMPT,
            Self::RequestBuilder => REQUEST_BUILDER_PROMPT,
            Self::Communicator => COMMUNICATOR_PROMPT,
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

const PLANNER_PROMPT: &str = "You are the planning agent of an email assistant. \
You receive an email as JSON and produce an execution plan that satisfies the sender's request \
using the available tools.\n\n\
Today is {today}.\n\n\
Available tools:\n{tool_set}\n\n\
Respond with ONLY a JSON object:\n\
{\"goal\": \"...\", \"deliverable\": \"...\", \"steps\": [\
{\"executionOrder\": 1, \"intent\": \"tool_execution|communicate|replan\", \
\"stepOutcome\": \"...\", \"context\": \"...\", \"toolName\": \"...\"}]}\n\n\
Rules:\n\
- Number steps from 1 in the order they must run\n\
- Every tool_execution step must name one of the available tools in toolName\n\
- End with a communicate step that replies to the sender\n\
- Use replan only when the remaining work cannot be planned yet";

const REQUEST_BUILDER_PROMPT: &str = "You are the request builder of an email assistant. \
You receive the current plan step, the results of previous steps and the original email as JSON, \
and build the arguments for the step's tool.\n\n\
Today is {today}.\n\n\
Available tools:\n{tool_set}\n\n\
Respond with ONLY a JSON object:\n\
{\"toolName\": \"...\", \"status\": \"success|error|needs_clarification\", \
\"apiPayload\": {...}, \"error\": \"...\"}\n\n\
Rules:\n\
- apiPayload must match the tool's input schema\n\
- Use values from previous results when the step depends on them\n\
- Set status to error with an explanation when the arguments cannot be built";

const COMMUNICATOR_PROMPT: &str = "You are the communication agent of an email assistant. \
You receive the current plan step, the results of previous steps and the original email as JSON, \
and write the reply to the sender.\n\n\
Today is {today}.\n\n\
Respond with ONLY a JSON object:\n\
{\"toolName\": \"send_email\", \"status\": \"success|error|needs_clarification\", \
\"apiPayload\": {\"body\": \"...\", \"cc\": [\"...\"]}, \"error\": \"...\"}\n\n\
Rules:\n\
- Summarize what was done, based only on the previous results\n\
- Mention failed steps honestly\n\
- Keep the tone short and professional";

/// Load the system prompt for `role`, preferring an override in `prompts_dir`.
pub fn load_system_prompt(
    role: AgentRole,
    prompts_dir: Option<&Path>,
    tools: &[ToolDescriptor],
) -> String {
    let template = prompts_dir
        .and_then(|dir| read_override(&dir.join(format!("{}.txt", role.file_stem()))))
        .unwrap_or_else(|| role.default_prompt().to_string());

    render(&template, tools)
}

fn read_override(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(path = %path.display(), "Loaded prompt override");
            Some(content.trim().to_string())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read prompt override, using default");
            None
        }
    }
}

fn render(template: &str, tools: &[ToolDescriptor]) -> String {
    let tool_set = if tools.is_empty() {
        "[]".to_string()
    } else {
        serde_json::to_string_pretty(tools).unwrap_or_else(|_| "[]".to_string())
    };
    let today = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    template
        .replace("{tool_set}", &tool_set)
        .replace("{today}", &today)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: format!("{name} tool"),
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    #[test]
    fn default_prompt_fills_placeholders() {
        let prompt = load_system_prompt(AgentRole::Planner, None, &[tool("calendar")]);
        assert!(prompt.contains("\"calendar\""));
        assert!(!prompt.contains("{tool_set}"));
        assert!(!prompt.contains("{today}"));
        assert!(prompt.contains("executionOrder"));
    }

    #[test]
    fn empty_tool_set_renders_empty_array() {
        let prompt = load_system_prompt(AgentRole::RequestBuilder, None, &[]);
        assert!(prompt.contains("Available tools:\n[]"));
    }

    #[test]
    fn override_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("communication_agent_prompt.txt"),
            "  Custom prompt on {today} with {tool_set}\n",
        )
        .unwrap();

        let prompt = load_system_prompt(AgentRole::Communicator, Some(dir.path()), &[]);
        assert!(prompt.starts_with("Custom prompt on "));
        assert!(prompt.ends_with("with []"));
    }

    #[test]
    fn missing_override_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = load_system_prompt(AgentRole::Planner, Some(dir.path()), &[]);
        assert!(prompt.starts_with("You are the planning agent"));
    }

    #[test]
    fn role_labels() {
        assert_eq!(AgentRole::RequestBuilder.to_string(), "request_builder");
        assert_eq!(AgentRole::Planner.file_stem(), "planning_agent_prompt");
    }
}
