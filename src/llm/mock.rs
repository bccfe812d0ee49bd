//! Scripted driver for deterministic tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;

use super::{EventStream, LlmDriver, LlmRequest, NormalizedEvent};

/// One scripted model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedReply {
    /// Answer with text.
    Text(String),
    /// Request these tool calls as `(name, arguments)`.
    ToolCalls(Vec<(String, Value)>),
    /// Fail before streaming.
    Fail(String),
    /// Never produce an event.
    Hang,
    /// Answer `echo: <last user message>`.
    Echo,
}

impl ScriptedReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self::ToolCalls(vec![(name.into(), arguments)])
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }
}

/// Replays queued replies in order, then falls back to a fixed reply.
///
/// Every request is recorded for later inspection.
#[derive(Debug)]
pub struct ScriptedDriver {
    replies: Mutex<VecDeque<ScriptedReply>>,
    fallback: ScriptedReply,
    latency: Option<Duration>,
    requests: Mutex<Vec<LlmRequest>>,
    next_call_id: AtomicUsize,
}

impl ScriptedDriver {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            fallback: ScriptedReply::fail("script exhausted"),
            latency: None,
            requests: Mutex::new(Vec::new()),
            next_call_id: AtomicUsize::new(0),
        }
    }

    /// Driver that echoes the last user message forever.
    pub fn echo() -> Self {
        Self::new([]).with_fallback(ScriptedReply::Echo)
    }

    #[must_use]
    pub fn with_fallback(mut self, reply: ScriptedReply) -> Self {
        self.fallback = reply;
        self
    }

    /// Delay every reply by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push(&self, reply: ScriptedReply) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn last_user_message(req: &LlmRequest) -> String {
        req.messages
            .iter()
            .rev()
            .find(|m| m["role"] == "user")
            .and_then(|m| m["content"].as_str())
            .unwrap_or_default()
            .to_string()
    }
}

#[async_trait::async_trait]
impl LlmDriver for ScriptedDriver {
    async fn stream(&self, req: LlmRequest) -> anyhow::Result<EventStream> {
        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        let last_user = Self::last_user_message(&req);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(req);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let events = match reply {
            ScriptedReply::Text(text) => vec![NormalizedEvent::MessageDelta { text }],
            ScriptedReply::Echo => vec![NormalizedEvent::MessageDelta {
                text: format!("echo: {last_user}"),
            }],
            ScriptedReply::ToolCalls(calls) => calls
                .into_iter()
                .enumerate()
                .map(|(call_index, (name, arguments))| NormalizedEvent::ToolCallComplete {
                    call_index,
                    id: format!(
                        "call_{}",
                        self.next_call_id.fetch_add(1, Ordering::Relaxed)
                    ),
                    name,
                    arguments_json: arguments.to_string(),
                })
                .collect(),
            ScriptedReply::Fail(message) => anyhow::bail!(message),
            ScriptedReply::Hang => {
                return Ok(Box::pin(futures::stream::pending::<
                    anyhow::Result<NormalizedEvent>,
                >()));
            }
        };

        let events = events
            .into_iter()
            .chain([NormalizedEvent::Done])
            .map(Ok);
        Ok(Box::pin(futures::stream::iter(events)))
    }
}
