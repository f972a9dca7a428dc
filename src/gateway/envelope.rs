//! JSON-RPC envelope handling for `tools/list` and `tools/call` responses.

use serde_json::Value;

use crate::error::GatewayError;
use crate::gateway::ToolDescriptor;

/// Build a JSON-RPC 2.0 request envelope.
pub fn request(id: &str, method: &str, params: Option<Value>) -> Value {
    let mut envelope = serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
    });
    if let Some(params) = params {
        envelope["params"] = params;
    }
    envelope
}

/// Extract `result.tools` from a `tools/list` response.
///
/// Returns `None` when the response has an unexpected shape. Entries that do
/// not decode as tool descriptors are skipped.
pub fn parse_tool_list(response: &Value) -> Option<Vec<ToolDescriptor>> {
    let tools = response.get("result")?.get("tools")?.as_array()?;

    let descriptors = tools
        .iter()
        .filter_map(|tool| match serde_json::from_value::<ToolDescriptor>(tool.clone()) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed tool descriptor");
                None
            }
        })
        .collect();
    Some(descriptors)
}

/// Unwrap a `tools/call` response into the tool's structured result.
///
/// - top-level `error` → [`GatewayError::ToolCall`] with the remote message
/// - `result.isError = true` → [`GatewayError::ToolCall`] with the message from
///   the first text item (its nested `error` field if it parses as JSON)
/// - otherwise the first text item is parsed as JSON and returned
pub fn unwrap_call_response(tool: &str, response: &Value) -> Result<Value, GatewayError> {
    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| error.to_string());
        return Err(GatewayError::ToolCall {
            tool: tool.to_string(),
            message,
        });
    }

    let Some(result) = response.get("result") else {
        return Err(GatewayError::Protocol(format!(
            "tools/call response has neither result nor error: {response}"
        )));
    };
    if !result.is_object() {
        return Err(GatewayError::Protocol(format!(
            "tools/call result is not an object: {result}"
        )));
    }

    let first_text = first_text_item(result);

    if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
        return Err(GatewayError::ToolCall {
            tool: tool.to_string(),
            message: error_message(first_text),
        });
    }

    let Some(text) = first_text else {
        return Err(GatewayError::Protocol(
            "tools/call result has no text content".to_string(),
        ));
    };

    serde_json::from_str(text).map_err(|e| GatewayError::InnerPayload {
        text: text.to_string(),
        reason: e.to_string(),
    })
}

fn first_text_item(result: &Value) -> Option<&str> {
    result
        .get("content")?
        .as_array()?
        .iter()
        .find(|item| item.get("type").and_then(Value::as_str) == Some("text"))
        .and_then(|item| item.get("text"))
        .and_then(Value::as_str)
}

fn error_message(text: Option<&str>) -> String {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return "tool reported an error without details".to_string();
    };

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => match map.get("error") {
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => text.to_string(),
        },
        _ => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_result(is_error: bool, text: &str) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": "call-tool-calendar",
            "result": {
                "isError": is_error,
                "content": [{"type": "text", "text": text}]
            }
        })
    }

    #[test]
    fn request_envelope_shape() {
        let env = request("list-tools-request", "tools/list", None);
        assert_eq!(env["jsonrpc"], "2.0");
        assert_eq!(env["id"], "list-tools-request");
        assert_eq!(env["method"], "tools/list");
        assert!(env.get("params").is_none());

        let env = request("call-tool-x", "tools/call", Some(json!({"name": "x"})));
        assert_eq!(env["params"]["name"], "x");
    }

    #[test]
    fn unwraps_text_json() {
        let value = unwrap_call_response("calendar", &text_result(false, "{\"a\":1}")).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn is_error_with_raw_text() {
        let err = unwrap_call_response("calendar", &text_result(true, "not found")).unwrap_err();
        match err {
            GatewayError::ToolCall { tool, message } => {
                assert_eq!(tool, "calendar");
                assert_eq!(message, "not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn is_error_with_nested_error_field() {
        let text = "{\"statusCode\":404,\"error\":\"User not found\"}";
        let err = unwrap_call_response("calendar", &text_result(true, text)).unwrap_err();
        assert!(err.is_tool_failure());
        assert!(err.to_string().contains("User not found"));
    }

    #[test]
    fn is_error_without_content() {
        let response = json!({"result": {"isError": true, "content": []}});
        let err = unwrap_call_response("calendar", &response).unwrap_err();
        assert!(err.to_string().contains("without details"));
    }

    #[test]
    fn top_level_rpc_error() {
        let response = json!({"jsonrpc": "2.0", "error": {"code": -32601, "message": "Unknown tool"}});
        let err = unwrap_call_response("nope", &response).unwrap_err();
        assert!(matches!(err, GatewayError::ToolCall { ref message, .. } if message == "Unknown tool"));
    }

    #[test]
    fn neither_result_nor_error_is_protocol_error() {
        let err = unwrap_call_response("calendar", &json!({"jsonrpc": "2.0"})).unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(_)));
    }

    #[test]
    fn missing_text_content_is_protocol_error() {
        let response = json!({"result": {"isError": false, "content": [{"type": "image"}]}});
        assert!(matches!(
            unwrap_call_response("calendar", &response),
            Err(GatewayError::Protocol(_))
        ));
    }

    #[test]
    fn non_json_text_is_inner_payload_error() {
        let err = unwrap_call_response("calendar", &text_result(false, "plain words")).unwrap_err();
        assert!(matches!(err, GatewayError::InnerPayload { ref text, .. } if text == "plain words"));
    }

    #[test]
    fn tool_list_extraction() {
        let response = json!({
            "result": {"tools": [
                {"name": "calendar", "description": "Calendar", "inputSchema": {"type": "object"}},
                {"description": "no name"}
            ]}
        });
        let tools = parse_tool_list(&response).unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "calendar");

        assert!(parse_tool_list(&json!({"result": {}})).is_none());
        assert!(parse_tool_list(&json!({"error": {"message": "x"}})).is_none());
    }
}
