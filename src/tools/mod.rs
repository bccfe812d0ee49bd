//! Schema-described tools shared by the protocol server and the model loop.
//!
//! - [`schema`]: tool definitions and input schemas
//! - [`args`]: one-pass argument validation into typed values
//! - [`catalog`]: closed-enum tool registries

pub mod args;
pub mod catalog;
pub mod schema;

pub use args::{ArgValue, ArgumentError, ToolArguments};
pub use catalog::{CatalogError, ToolCatalog, ToolKind};
pub use schema::{InputSchema, ParamType, PropertySchema, ToolDefinition};

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde::{Deserialize, Serialize};

/// One block of tool output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
}

/// Uniform outcome of a tool call.
///
/// Failures are reported in-band with `is_error` set; nothing past this
/// boundary raises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    #[serde(rename = "isError", default)]
    pub is_error: bool,
    pub content: Vec<ContentBlock>,
}

impl ToolCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            is_error: false,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            content: vec![ContentBlock::Text {
                text: message.into(),
            }],
        }
    }

    /// All text blocks joined by newlines.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|ContentBlock::Text { text }| text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string())
}

/// Run a tool handler, folding errors and panics into an error result.
pub(crate) async fn run_guarded<F>(tool: &str, handler: F) -> ToolCallResult
where
    F: Future<Output = anyhow::Result<ToolCallResult>>,
{
    match AssertUnwindSafe(handler).catch_unwind().await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            tracing::warn!(tool_name = %tool, error = %e, "Tool handler failed");
            ToolCallResult::error(format!("tool '{tool}' failed: {e}"))
        }
        Err(panic) => {
            let reason = panic_message(panic.as_ref());
            tracing::error!(tool_name = %tool, error = %reason, "Tool handler panicked");
            ToolCallResult::error(format!("tool '{tool}' failed: {reason}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guarded_handler_folds_failures() {
        let ok = run_guarded("t", async { Ok(ToolCallResult::text("fine")) }).await;
        assert!(!ok.is_error);

        let err = run_guarded("t", async { Err(anyhow::anyhow!("db down")) }).await;
        assert!(err.is_error);
        assert_eq!(err.joined_text(), "tool 't' failed: db down");

        let panicked = run_guarded("t", async {
            if true {
                panic!("boom");
            }
            Ok(ToolCallResult::text("unreachable"))
        })
        .await;
        assert!(panicked.is_error);
        assert!(panicked.joined_text().contains("boom"));
    }

    #[test]
    fn result_wire_shape() {
        let v = serde_json::to_value(ToolCallResult::error("unknown tool: x")).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "isError": true,
                "content": [{"type": "text", "text": "unknown tool: x"}]
            })
        );
    }
}
