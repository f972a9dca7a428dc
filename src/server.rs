//! HTTP entry point.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;

use crate::engine::Engine;

/// POST /invocations
///
/// Always answers 200 with either the run summary or `{"error": ...}`.
async fn invoke(State(engine): State<Arc<Engine>>, body: Bytes) -> impl IntoResponse {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected non-JSON invocation body");
            return Json(serde_json::json!({ "error": format!("Invalid input: body is not JSON: {e}") }));
        }
    };
    Json(engine.invoke(payload).await)
}

/// GET /ping
async fn ping() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "Healthy" }))
}

/// Build the service routes.
pub fn routes(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/invocations", post(invoke))
        .route("/ping", get(ping))
        .with_state(engine)
}
