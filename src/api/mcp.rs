//! Protocol endpoints.

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};

use serde::Deserialize;
use serde_json::{Map, Value};

use super::bad_request;
use crate::AppState;
use crate::mcp::{ListToolsResult, RpcResponse};

#[derive(Debug, Deserialize)]
pub struct ToolCallRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Map<String, Value>>,
}

/// POST /mcp
///
/// The body is taken as text so malformed JSON still gets a JSON-RPC
/// parse error rather than an HTTP rejection.
pub async fn rpc(State(state): State<AppState>, body: String) -> Json<RpcResponse> {
    Json(state.mcp.handle_raw(&body).await)
}

/// GET /api/agent/mcp/tools
pub async fn list_tools(State(state): State<AppState>) -> Json<ListToolsResult> {
    Json(ListToolsResult {
        tools: state.mcp.dispatcher().catalog().list().to_vec(),
    })
}

/// POST /api/agent/mcp/call
pub async fn call_tool(State(state): State<AppState>, Json(req): Json<ToolCallRequest>) -> Response {
    if req.name.trim().is_empty() {
        return bad_request("工具名稱不能為空");
    }

    Json(state.mcp.dispatcher().call(&req.name, req.arguments.as_ref()).await).into_response()
}
