//! Model provider abstractions.
//!
//! The [`LlmDriver`] trait is the streaming seam every provider implements.
//! [`ToolLoop`] builds on a driver to run the tool-invocation loop.
//!
//! # Drivers
//!
//! - [`ChatCompletionsDriver`]: `OpenAI`-compatible Chat Completions API
//! - [`OfflineDriver`]: canned replies for running without credentials
//! - [`ScriptedDriver`]: deterministic replies for tests

pub mod chat_completions;
pub mod events;
pub mod mock;
pub mod offline;
pub mod provider;
pub mod tool_loop;

pub use chat_completions::ChatCompletionsDriver;
pub use events::NormalizedEvent;
pub use mock::{ScriptedDriver, ScriptedReply};
pub use offline::OfflineDriver;
pub use provider::Provider;
pub use tool_loop::{CompletionOptions, MAX_TOOL_ITERATIONS, ToolExecutor, ToolLoop};

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;

/// LLM connection and model settings.
#[derive(Clone)]
pub struct LlmSettings {
    /// Base URL for the API (e.g. `https://api.openai.com`).
    pub base_url: String,
    pub api_key: Option<String>,
    /// Model identifier (e.g. `gpt-4o-mini`).
    pub model: String,
    /// Provider type, detected from `base_url`.
    pub provider: Provider,
    /// Whether to request parallel tool calls (provider-dependent).
    pub parallel_tool_calls: Option<bool>,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("parallel_tool_calls", &self.parallel_tool_calls)
            .finish()
    }
}

/// A message in a model transcript.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// Tool call this message answers (tool role only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool calls requested by the assistant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    fn plain(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::Assistant, content)
    }
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call made by the assistant.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ToolCall {
    pub id: String,
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    /// Arguments as a JSON string.
    pub arguments: String,
}

/// Request to an LLM driver.
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    /// Conversation messages in `OpenAI` wire format.
    pub messages: Vec<serde_json::Value>,
    /// Available tools in `OpenAI` function schema format.
    pub tools: Vec<serde_json::Value>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Boxed stream of driver events.
pub type EventStream = Pin<Box<dyn Stream<Item = anyhow::Result<NormalizedEvent>> + Send>>;

/// Streaming access to a model provider.
#[async_trait::async_trait]
pub trait LlmDriver: Send + Sync {
    /// Stream a response for `req`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the connection is interrupted.
    async fn stream(&self, req: LlmRequest) -> anyhow::Result<EventStream>;
}

/// Failure talking to the model provider.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("model provider request failed: {0}")]
    Provider(#[source] anyhow::Error),

    #[error("model provider reported an error: {0}")]
    Stream(String),

    #[error("model provider did not respond within {0:?}")]
    Timeout(Duration),

    #[error("tool loop exceeded {0} iterations")]
    MaxIterations(usize),
}
