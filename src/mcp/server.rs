//! Protocol front end: decodes envelopes, routes methods, re-wraps outcomes.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::Value;

use super::dispatcher::ToolDispatcher;
use super::protocol::{JSONRPC_VERSION, Method, RpcError, RpcRequest, RpcResponse};
use super::types::{CallToolParams, InitializeResult, ListToolsResult};
use crate::tools::panic_message;

/// Stateless JSON-RPC handler over a [`ToolDispatcher`].
#[derive(Debug, Clone)]
pub struct McpServer {
    dispatcher: ToolDispatcher,
}

impl McpServer {
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Handle a request body given as raw text.
    pub async fn handle_raw(&self, body: &str) -> RpcResponse {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => self.handle_value(value).await,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed protocol message");
                RpcResponse::failure(Value::Null, RpcError::parse_error(e))
            }
        }
    }

    /// Handle an already-parsed JSON value.
    pub async fn handle_value(&self, value: Value) -> RpcResponse {
        let Value::Object(object) = value else {
            return RpcResponse::failure(
                Value::Null,
                RpcError::invalid_request("expected a JSON object"),
            );
        };
        let id = object.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<RpcRequest>(Value::Object(object)) {
            Ok(request) => self.handle(request).await,
            Err(e) => RpcResponse::failure(id, RpcError::invalid_request(e)),
        }
    }

    /// Handle a decoded request. The response always echoes `request.id`.
    pub async fn handle(&self, request: RpcRequest) -> RpcResponse {
        let RpcRequest {
            jsonrpc,
            id,
            method,
            params,
        } = request;

        if jsonrpc != JSONRPC_VERSION {
            return RpcResponse::failure(
                id,
                RpcError::invalid_request(format!("unsupported jsonrpc version '{jsonrpc}'")),
            );
        }

        tracing::debug!(method = %method, id = %id, "Handling protocol message");

        let routed = AssertUnwindSafe(self.route(&method, params)).catch_unwind().await;
        let outcome = match routed {
            Ok(outcome) => outcome,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!(method = %method, error = %reason, "Protocol handler panicked");
                Err(RpcError::internal(reason))
            }
        };

        match outcome {
            Ok(result) => RpcResponse::success(id, result),
            Err(error) => RpcResponse::failure(id, error),
        }
    }

    async fn route(&self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        let Some(known) = Method::from_name(method) else {
            tracing::warn!(method = %method, "Unknown protocol method");
            return Err(RpcError::method_not_found(method));
        };

        match known {
            Method::Initialize => to_result(&InitializeResult::default()),
            Method::ToolsList => to_result(&ListToolsResult {
                tools: self.dispatcher.catalog().list().to_vec(),
            }),
            Method::ToolsCall => {
                let params: CallToolParams =
                    serde_json::from_value(params.unwrap_or(Value::Null))
                        .map_err(RpcError::invalid_params)?;
                let result = self.dispatcher.call(&params.name, params.arguments.as_ref()).await;
                to_result(&result)
            }
        }
    }
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(RpcError::internal)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::agent::ConversationOrchestrator;
    use crate::llm::ScriptedDriver;
    use crate::mcp::protocol::error_codes;
    use crate::school::{InMemorySchoolStore, SchoolToolbox};
    use crate::session::SessionStore;
    use serde_json::json;

    fn server() -> McpServer {
        let toolbox = SchoolToolbox::new(Arc::new(InMemorySchoolStore::seeded()));
        let agent = ConversationOrchestrator::new(
            Arc::new(ScriptedDriver::echo()),
            toolbox,
            SessionStore::new(),
        );
        McpServer::new(ToolDispatcher::new(Arc::new(agent)))
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let resp = server()
            .handle(RpcRequest::new(1, "initialize", None))
            .await;
        let result = resp.result().unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "TutorialSchool-AI-Agent");
        assert_eq!(result["capabilities"], json!({"tools": {}, "logging": {}}));
    }

    #[tokio::test]
    async fn tools_list_echoes_id() {
        let resp = server()
            .handle(RpcRequest::new("req-9", "tools/list", None))
            .await;
        assert_eq!(resp.id, json!("req-9"));
        assert_eq!(resp.result().unwrap()["tools"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn unknown_method() {
        let resp = server().handle(RpcRequest::new(2, "foo/bar", None)).await;
        let err = resp.error().unwrap();
        assert_eq!(err.code, error_codes::METHOD_NOT_FOUND);
        assert!(err.message.contains("foo/bar"));
    }

    #[tokio::test]
    async fn bad_call_params() {
        let resp = server()
            .handle(RpcRequest::new(3, "tools/call", Some(json!({"arguments": {}}))))
            .await;
        assert_eq!(resp.error().unwrap().code, error_codes::INVALID_PARAMS);
        assert_eq!(resp.id, json!(3));
    }

    #[tokio::test]
    async fn tool_errors_stay_in_result() {
        let resp = server()
            .handle(RpcRequest::new(
                4,
                "tools/call",
                Some(json!({"name": "nope", "arguments": {}})),
            ))
            .await;
        let result = resp.result().unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(result["content"][0]["text"], "unknown tool: nope");
    }

    #[tokio::test]
    async fn raw_entry_point_errors() {
        let s = server();
        let parse = s.handle_raw("{not json").await;
        assert_eq!(parse.error().unwrap().code, error_codes::PARSE_ERROR);
        assert_eq!(parse.id, Value::Null);

        let not_object = s.handle_raw("[1, 2]").await;
        assert_eq!(not_object.error().unwrap().code, error_codes::INVALID_REQUEST);

        let no_method = s.handle_raw(r#"{"jsonrpc":"2.0","id":5}"#).await;
        assert_eq!(no_method.error().unwrap().code, error_codes::INVALID_REQUEST);
        assert_eq!(no_method.id, json!(5));

        let old = s
            .handle_raw(r#"{"jsonrpc":"1.0","id":6,"method":"tools/list"}"#)
            .await;
        assert_eq!(old.error().unwrap().code, error_codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn non_object_arguments_are_invalid_params() {
        let s = server();
        for arguments in [json!("oops"), json!([1]), json!(3)] {
            let resp = s
                .handle_value(json!({
                    "jsonrpc": "2.0",
                    "id": 8,
                    "method": "tools/call",
                    "params": {"name": "list_courses", "arguments": arguments},
                }))
                .await;
            assert_eq!(resp.error().unwrap().code, error_codes::INVALID_PARAMS);
            assert_eq!(resp.id, json!(8));
        }

        let null_args = s
            .handle_value(json!({
                "jsonrpc": "2.0",
                "id": 9,
                "method": "tools/call",
                "params": {"name": "list_courses", "arguments": null},
            }))
            .await;
        assert_eq!(null_args.result().unwrap()["isError"], false);
    }

    #[tokio::test]
    async fn tools_list_is_stable() {
        let s = server();
        let expected = serde_json::to_value(s.dispatcher().catalog().list()).unwrap();
        let first = s.handle(RpcRequest::new(1, "tools/list", None)).await;
        let second = s.handle(RpcRequest::new(2, "tools/list", None)).await;
        assert_eq!(first.result().unwrap()["tools"], expected);
        assert_eq!(second.result().unwrap()["tools"], expected);
    }
}
