//! Schema validation: turns untrusted JSON into typed, invariant-checked records.
//!
//! Every validator takes an untyped value and either returns the record or a
//! [`SchemaError`] naming the offending field. There are no partial results:
//! one malformed step rejects the whole plan.

use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::plan::types::{
    COMMUNICATE_TOOL_NAME, CommunicationResponse, EmailPayload, ExecutionPlan, PlanStep,
    RequestBuilderResponse, StepIntent, SubAgentResponse, SubAgentStatus,
};

/// Validate the inbound email trigger.
///
/// `to` and `cc` given as a single string become one-element lists; an empty
/// string becomes an empty list.
pub fn validate_email_payload(value: &Value) -> Result<EmailPayload, SchemaError> {
    let obj = as_object(value, "email payload")?;

    Ok(EmailPayload {
        from: required_str(obj, "from")?,
        to: string_list(obj, "to")?,
        cc: string_list(obj, "cc")?,
        agent_email: required_str(obj, "agent_email")?,
        subject: required_str(obj, "subject")?,
        body: required_str(obj, "body")?,
        today: optional_str(obj, "today")?,
    })
}

/// Validate a planner response into an [`ExecutionPlan`].
pub fn validate_execution_plan(value: &Value) -> Result<ExecutionPlan, SchemaError> {
    let obj = as_object(value, "execution plan")?;

    let goal = required_str(obj, "goal")?;
    let deliverable = required_str(obj, "deliverable")?;

    let raw_steps = match obj.get("steps") {
        None | Some(Value::Null) => return Err(SchemaError::missing("steps")),
        Some(Value::Array(steps)) => steps,
        Some(_) => return Err(SchemaError::invalid("steps", "expected an array")),
    };
    if raw_steps.is_empty() {
        return Err(SchemaError::EmptySteps);
    }

    let steps = raw_steps
        .iter()
        .enumerate()
        .map(|(i, raw)| validate_plan_step(raw, i))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ExecutionPlan {
        goal,
        deliverable,
        steps,
    })
}

fn validate_plan_step(value: &Value, index: usize) -> Result<PlanStep, SchemaError> {
    let path = |field: &str| format!("steps[{index}].{field}");
    let obj = value
        .as_object()
        .ok_or_else(|| SchemaError::NotAnObject {
            context: format!("steps[{index}]"),
        })?;

    let execution_order = match obj.get("executionOrder") {
        None | Some(Value::Null) => return Err(SchemaError::missing(path("executionOrder"))),
        Some(raw) => as_integer(raw).ok_or_else(|| {
            SchemaError::invalid(path("executionOrder"), "expected an integer")
        })?,
    };

    let intent = StepIntent::parse(&prefixed_str(obj, "intent", &path)?);
    let step_outcome = prefixed_str(obj, "stepOutcome", &path)?;
    let context = prefixed_str(obj, "context", &path)?;

    let tool_name = obj
        .get("toolName")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from);

    let tool_name = match intent {
        StepIntent::ToolExecution if tool_name.is_none() => {
            return Err(SchemaError::missing(path("toolName")));
        }
        StepIntent::Communicate => {
            tool_name.or_else(|| Some(COMMUNICATE_TOOL_NAME.to_string()))
        }
        _ => tool_name,
    };

    Ok(PlanStep {
        execution_order,
        intent,
        step_outcome,
        context,
        tool_name,
    })
}

/// Validate a request-builder agent response.
pub fn validate_request_builder_response(
    value: &Value,
) -> Result<RequestBuilderResponse, SchemaError> {
    validate_sub_agent_response(value, "request builder response")
}

/// Validate a communication agent response.
pub fn validate_communication_response(
    value: &Value,
) -> Result<CommunicationResponse, SchemaError> {
    validate_sub_agent_response(value, "communication response")
}

fn validate_sub_agent_response(
    value: &Value,
    context: &str,
) -> Result<SubAgentResponse, SchemaError> {
    let obj = as_object(value, context)?;

    let tool_name = required_str(obj, "toolName")?;
    let raw_status = required_str(obj, "status")?;
    let status = SubAgentStatus::parse(&raw_status).ok_or_else(|| {
        SchemaError::invalid(
            "status",
            format!("expected success, error or needs_clarification, got '{raw_status}'"),
        )
    })?;

    let error = optional_str(obj, "error")?.filter(|e| !e.trim().is_empty());
    if status == SubAgentStatus::Error && error.is_none() {
        return Err(SchemaError::missing("error"));
    }

    let api_payload = match obj.get("apiPayload") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(_) => return Err(SchemaError::invalid("apiPayload", "expected an object")),
    };

    Ok(SubAgentResponse {
        tool_name,
        status,
        api_payload,
        error,
    })
}

// ── Field helpers ───────────────────────────────────────────────────

fn as_object<'a>(value: &'a Value, context: &str) -> Result<&'a Map<String, Value>, SchemaError> {
    value.as_object().ok_or_else(|| SchemaError::NotAnObject {
        context: context.to_string(),
    })
}

fn required_str(obj: &Map<String, Value>, field: &str) -> Result<String, SchemaError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(SchemaError::missing(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(SchemaError::invalid(field, "expected a string")),
    }
}

fn prefixed_str(
    obj: &Map<String, Value>,
    field: &str,
    path: &dyn Fn(&str) -> String,
) -> Result<String, SchemaError> {
    required_str(obj, field).map_err(|e| match e {
        SchemaError::MissingField { .. } => SchemaError::missing(path(field)),
        SchemaError::InvalidField { reason, .. } => SchemaError::invalid(path(field), reason),
        other => other,
    })
}

fn optional_str(obj: &Map<String, Value>, field: &str) -> Result<Option<String>, SchemaError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(SchemaError::invalid(field, "expected a string")),
    }
}

fn string_list(obj: &Map<String, Value>, field: &str) -> Result<Vec<String>, SchemaError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(SchemaError::missing(field)),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(String::from)
                    .ok_or_else(|| SchemaError::invalid(field, "expected a list of strings"))
            })
            .collect(),
        Some(_) => Err(SchemaError::invalid(field, "expected a string or list of strings")),
    }
}

/// Integers, integral floats and numeric strings are accepted; models emit all three.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
