//! Integration tests for the tool gateway client.
//!
//! Each test spins up an Axum server on a random port that speaks the
//! gateway's JSON-RPC dialect, and drives the real `GatewayClient` over HTTP.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Form, Json, Router};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use superagent::error::GatewayError;
use superagent::gateway::{GatewayClient, ToolGateway, fetch_access_token};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// What the mock gateway saw.
#[derive(Clone, Default)]
struct Recorded {
    requests: Arc<Mutex<Vec<Value>>>,
    auth: Arc<Mutex<Vec<String>>>,
}

/// How the mock gateway answers `tools/call`.
#[derive(Clone)]
enum CallReply {
    Json(Value),
    Status(StatusCode),
    Slow(Duration),
}

#[derive(Clone)]
struct MockState {
    recorded: Recorded,
    tools: Value,
    call_reply: CallReply,
}

async fn rpc(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        state.recorded.auth.lock().unwrap().push(auth.to_string());
    }
    state.recorded.requests.lock().unwrap().push(body.clone());

    match body["method"].as_str() {
        Some("tools/list") => Json(state.tools.clone()).into_response(),
        Some("tools/call") => match state.call_reply {
            CallReply::Json(reply) => Json(reply).into_response(),
            CallReply::Status(status) => (status, "gateway exploded").into_response(),
            CallReply::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Json(json!({})).into_response()
            }
        },
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn token(Form(form): Form<Vec<(String, String)>>) -> axum::response::Response {
    let has = |k: &str, v: &str| form.iter().any(|(key, value)| key == k && value == v);
    if has("grant_type", "client_credentials") && has("client_id", "id") && has("client_secret", "secret")
    {
        Json(json!({"access_token": "tok-123", "token_type": "Bearer"})).into_response()
    } else if has("client_id", "no-token") {
        Json(json!({"token_type": "Bearer"})).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "bad credentials").into_response()
    }
}

/// Start the mock gateway, return (base_url, recorded).
async fn start_gateway(tools: Value, call_reply: CallReply) -> (String, Recorded) {
    let recorded = Recorded::default();
    let state = MockState {
        recorded: recorded.clone(),
        tools,
        call_reply,
    };
    let app = Router::new()
        .route("/mcp", post(rpc))
        .route("/oauth2/token", post(token))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}"), recorded)
}

fn client(base: &str, tool_timeout: Duration) -> GatewayClient {
    GatewayClient::new(
        format!("{base}/mcp"),
        SecretString::from("tok-123"),
        tool_timeout,
    )
    .unwrap()
}

fn text_result(is_error: bool, text: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": "call-tool-calendar",
        "result": {"isError": is_error, "content": [{"type": "text", "text": text}]}
    })
}

fn calendar_tools() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": "list-tools-request",
        "result": {"tools": [{
            "name": "calendar",
            "description": "Create calendar events",
            "inputSchema": {"type": "object", "properties": {"title": {"type": "string"}}}
        }]}
    })
}

// ── tools/list ───────────────────────────────────────────────────────

#[tokio::test]
async fn list_tools_returns_descriptors() {
    timeout(TEST_TIMEOUT, async {
        let (base, recorded) = start_gateway(calendar_tools(), CallReply::Json(json!({}))).await;

        let tools = client(&base, Duration::from_secs(2)).list_tools().await.unwrap();

        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "calendar");
        assert_eq!(tools[0].input_schema["type"], "object");

        let requests = recorded.requests.lock().unwrap();
        assert_eq!(requests[0]["jsonrpc"], "2.0");
        assert_eq!(requests[0]["id"], "list-tools-request");
        assert_eq!(requests[0]["method"], "tools/list");
        assert_eq!(recorded.auth.lock().unwrap()[0], "Bearer tok-123");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn list_tools_unexpected_shape_is_empty() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_gateway(json!({"jsonrpc": "2.0", "result": {}}), CallReply::Json(json!({}))).await;

        let tools = client(&base, Duration::from_secs(2)).list_tools().await.unwrap();
        assert!(tools.is_empty());
    })
    .await
    .expect("test timed out");
}

// ── tools/call ───────────────────────────────────────────────────────

#[tokio::test]
async fn call_tool_overwrites_auth_email_and_unwraps_result() {
    timeout(TEST_TIMEOUT, async {
        let (base, recorded) = start_gateway(calendar_tools(), CallReply::Json(text_result(false, "{\"a\":1}"))).await;

        let mut arguments = Map::new();
        arguments.insert("title".into(), json!("Lunch"));
        arguments.insert("auth_email".into(), json!("attacker@evil.com"));

        let result = client(&base, Duration::from_secs(2))
            .call_tool("calendar", arguments, "agent@superagent.diy")
            .await
            .unwrap();
        assert_eq!(result, json!({"a": 1}));

        let requests = recorded.requests.lock().unwrap();
        let sent = &requests[0];
        assert_eq!(sent["id"], "call-tool-calendar");
        assert_eq!(sent["method"], "tools/call");
        assert_eq!(sent["params"]["name"], "calendar");
        assert_eq!(sent["params"]["arguments"]["title"], "Lunch");
        assert_eq!(sent["params"]["arguments"]["auth_email"], "agent@superagent.diy");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn call_tool_is_error_surfaces_nested_message() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_gateway(
            calendar_tools(),
            CallReply::Json(text_result(true, "{\"error\":\"not found\"}")),
        )
        .await;

        let err = client(&base, Duration::from_secs(2))
            .call_tool("calendar", Map::new(), "agent@superagent.diy")
            .await
            .unwrap_err();
        match err {
            GatewayError::ToolCall { tool, message } => {
                assert_eq!(tool, "calendar");
                assert_eq!(message, "not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn call_tool_rpc_error_field() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_gateway(
            calendar_tools(),
            CallReply::Json(json!({"jsonrpc": "2.0", "error": {"code": -32602, "message": "bad params"}})),
        )
        .await;

        let err = client(&base, Duration::from_secs(2))
            .call_tool("calendar", Map::new(), "agent@superagent.diy")
            .await
            .unwrap_err();
        assert!(err.is_tool_failure());
        assert!(err.to_string().contains("bad params"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn call_tool_non_2xx_is_status_error() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_gateway(calendar_tools(), CallReply::Status(StatusCode::BAD_GATEWAY)).await;

        let err = client(&base, Duration::from_secs(2))
            .call_tool("calendar", Map::new(), "agent@superagent.diy")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Status { status: 502, ref body } if body == "gateway exploded"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn call_tool_times_out() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_gateway(calendar_tools(), CallReply::Slow(Duration::from_secs(3))).await;

        let err = client(&base, Duration::from_millis(200))
            .call_tool("calendar", Map::new(), "agent@superagent.diy")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Timeout(_)));
    })
    .await
    .expect("test timed out");
}

// ── token endpoint ───────────────────────────────────────────────────

#[tokio::test]
async fn fetches_access_token() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_gateway(calendar_tools(), CallReply::Json(json!({}))).await;
        let url = format!("{base}/oauth2/token");

        let token = fetch_access_token("id", &SecretString::from("secret"), &url)
            .await
            .unwrap();
        assert_eq!(token.expose_secret(), "tok-123");

        let err = fetch_access_token("id", &SecretString::from("wrong"), &url)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));

        let err = fetch_access_token("no-token", &SecretString::from("secret"), &url)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("access_token"));
    })
    .await
    .expect("test timed out");
}
