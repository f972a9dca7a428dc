//! Response sanitizer: strips markdown fences from raw model output.
//!
//! Best-effort normalization: never fails. Parsing errors surface later in
//! [`parse_agent_json`].

use std::sync::LazyLock;

use regex::Regex;

use crate::error::SchemaError;

const FENCE: &str = "```";

/// Opening fence with an optional language tag (`json`, `JSON`, `js`, ...).
/// A tag must be followed by a line break, except the bare `json` tag which
/// models also emit inline (`` ```json {...} ``` ``).
static OPENING_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^```(?:[A-Za-z0-9_+\-]+[ \t]*\r?\n|(?i:json))?").expect("opening fence regex")
});

/// First fenced block anywhere in the text.
static EMBEDDED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:[A-Za-z0-9_+\-]+[ \t]*\r?\n|(?i:json))?(.*?)```")
        .expect("embedded block regex")
});

/// Remove a surrounding code fence and trim whitespace.
///
/// - Text starting with a fence loses the opening marker (and tag) and
///   everything from the last closing marker on.
/// - Text that already opens a JSON object or array is returned trimmed, even
///   when string values inside it contain fences.
/// - Text with a fenced block after some preamble yields the block interior.
/// - Anything else is returned trimmed.
pub fn sanitize(raw: &str) -> String {
    let trimmed = raw.trim();

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return trimmed.to_string();
    }

    if trimmed.starts_with(FENCE) {
        let inner = OPENING_FENCE.replace(trimmed, "");
        let inner = match inner.rfind(FENCE) {
            Some(end) => &inner[..end],
            None => &inner[..],
        };
        return inner.trim().to_string();
    }

    if let Some(caps) = EMBEDDED_BLOCK.captures(trimmed) {
        return caps[1].trim().to_string();
    }

    trimmed.to_string()
}

/// Sanitize a value that may already be structured. Only strings are touched.
pub fn sanitize_value(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::String(text) => serde_json::Value::String(sanitize(&text)),
        other => other,
    }
}

/// Sanitize raw agent output and decode it as JSON.
///
/// `context` names the producing phase in the error (e.g. "planner").
pub fn parse_agent_json(raw: &str, context: &str) -> Result<serde_json::Value, SchemaError> {
    let cleaned = sanitize(raw);
    serde_json::from_str(&cleaned).map_err(|e| SchemaError::InvalidJson {
        context: context.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_json_is_trimmed() {
        assert_eq!(sanitize("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn empty_input() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("   \n "), "");
    }

    #[test]
    fn fence_with_json_tag_and_newlines() {
        assert_eq!(sanitize("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn fence_without_tag() {
        assert_eq!(sanitize("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn fence_with_inline_json_tag() {
        assert_eq!(sanitize("```json  {\"a\": 1} ```"), "{\"a\": 1}");
    }

    #[test]
    fn fence_with_uppercase_and_other_tags() {
        assert_eq!(sanitize("```JSON\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(sanitize("```javascript\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn fence_with_surrounding_whitespace() {
        assert_eq!(sanitize("\n\n   ```json\n  {\"a\": 1}\n  ```  \n"), "{\"a\": 1}");
    }

    #[test]
    fn fence_with_trailing_commentary() {
        let raw = "```json\n{\"a\": 1}\n```\nLet me know if you need changes.";
        assert_eq!(sanitize(raw), "{\"a\": 1}");
    }

    #[test]
    fn unterminated_fence_strips_opening_only() {
        assert_eq!(sanitize("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn fenced_block_after_preamble() {
        let raw = "Here is the plan:\n```json\n{\"goal\": \"x\"}\n```";
        assert_eq!(sanitize(raw), "{\"goal\": \"x\"}");
    }

    #[test]
    fn unfenced_json_with_backticks_in_values_is_untouched() {
        let raw = r#"{"toolName":"send_email","status":"success","apiPayload":{"body":"Run ```ls -la``` to check"}}"#;
        assert_eq!(sanitize(&format!("  {raw}\n")), raw);

        let array = "[\"```json\\n1\\n```\"]";
        assert_eq!(sanitize(array), array);

        let decoded = parse_agent_json(raw, "communicator").unwrap();
        assert_eq!(decoded["apiPayload"]["body"], "Run ```ls -la``` to check");
    }

    #[test]
    fn non_matching_text_is_returned_trimmed() {
        assert_eq!(sanitize("  no json here  "), "no json here");
    }

    #[test]
    fn fenced_interior_decodes_like_the_bare_interior() {
        let interiors = [
            "{\"goal\": \"lunch\", \"steps\": [1, 2, 3]}",
            "{\n  \"a\": {\n    \"b\": \"multi\\nline\"\n  }\n}",
            "[\n\n{\"x\": true}\n\n]",
        ];
        let wrappers: [fn(&str) -> String; 5] = [
            |s| format!("```json\n{s}\n```"),
            |s| format!("```\n{s}\n```"),
            |s| format!("  ```json {s} ```  "),
            |s| format!("\n```JSON\r\n{s}\r\n```\n"),
            |s| format!("```{s}```"),
        ];
        for interior in interiors {
            let expected: serde_json::Value = serde_json::from_str(interior).unwrap();
            for wrap in wrappers {
                let wrapped = wrap(interior);
                let decoded: serde_json::Value = serde_json::from_str(&sanitize(&wrapped))
                    .unwrap_or_else(|e| panic!("failed on {wrapped:?}: {e}"));
                assert_eq!(decoded, expected, "wrapper output: {wrapped:?}");
            }
        }
    }

    #[test]
    fn structured_values_pass_through() {
        let value = json!({"a": "```json\n1\n```"});
        assert_eq!(sanitize_value(value.clone()), value);
        assert_eq!(sanitize_value(json!("```\n1\n```")), json!("1"));
    }

    #[test]
    fn parse_agent_json_reports_context() {
        let err = parse_agent_json("not json", "planner").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidJson { ref context, .. } if context == "planner"));
        assert_eq!(parse_agent_json("```json\n{\"a\":1}\n```", "x").unwrap(), json!({"a": 1}));
    }
}
