//! HTTP routes.
//!
//! - [`agent`]: conversation endpoints under `/api/agent`
//! - [`mcp`]: the JSON-RPC endpoint and its REST conveniences

pub mod agent;
pub mod mcp;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use crate::AppState;

/// All application routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/mcp", post(mcp::rpc))
        .route("/api/agent/mcp/tools", get(mcp::list_tools))
        .route("/api/agent/mcp/call", post(mcp::call_tool))
        .route("/api/agent/chat", post(agent::chat))
        .route("/api/agent/analyze-homework", post(agent::analyze_homework))
        .route(
            "/api/agent/daily-recommendation/{student_name}",
            get(agent::daily_recommendation),
        )
        .route(
            "/api/agent/chat-history/{student_name}",
            get(agent::chat_history).delete(agent::clear_history),
        )
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `400` with a `{ "error": ... }` body.
pub(crate) fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}
