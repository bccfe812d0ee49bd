//! Tool-invocation loop over an [`LlmDriver`].
//!
//! One run of the loop:
//! 1. Send the transcript (plus tool schemas) to the driver
//! 2. Collect the streamed reply, assembling tool calls
//! 3. Execute requested tools through a [`ToolExecutor`]
//! 4. Feed results back and repeat until the model answers in text
//!
//! Tool traffic lives only in the request built here; callers get the final
//! text and decide what to keep.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{Value, json};
use uuid::Uuid;

use super::{LlmDriver, LlmError, LlmRequest, Message, NormalizedEvent, ToolCall, ToolCallFunction};
use crate::tools::ToolCallResult;

/// Maximum number of model turns per run.
pub const MAX_TOOL_ITERATIONS: usize = 10;

/// Default deadline for a single model turn.
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(60);

/// Sampling settings for one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Executes tools the model asks for.
#[async_trait::async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Tool schemas in `OpenAI` function format.
    fn tool_schemas(&self) -> Vec<Value>;

    /// Run one tool. Failures come back in-band.
    async fn execute(&self, name: &str, arguments: Value) -> ToolCallResult;
}

#[derive(Debug, Default, Clone)]
struct ToolCallAccumulator {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

#[derive(Debug, Default)]
struct AssistantTurn {
    text: String,
    tool_calls: Vec<ToolCall>,
}

/// Runs completions with optional tool execution.
#[derive(Clone)]
pub struct ToolLoop {
    driver: Arc<dyn LlmDriver>,
    turn_timeout: Duration,
}

impl std::fmt::Debug for ToolLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolLoop")
            .field("driver", &"LlmDriver")
            .field("turn_timeout", &self.turn_timeout)
            .finish()
    }
}

impl ToolLoop {
    pub fn new(driver: Arc<dyn LlmDriver>) -> Self {
        Self {
            driver,
            turn_timeout: DEFAULT_TURN_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    /// Single completion with no tools attached.
    pub async fn complete(
        &self,
        messages: &[Message],
        options: CompletionOptions,
    ) -> Result<String, LlmError> {
        self.run(messages, None, options).await
    }

    /// Run the loop until the model answers in text.
    pub async fn run(
        &self,
        messages: &[Message],
        tools: Option<&dyn ToolExecutor>,
        options: CompletionOptions,
    ) -> Result<String, LlmError> {
        let request_id = Uuid::new_v4().to_string();
        let schemas = tools.map(|t| t.tool_schemas()).unwrap_or_default();

        tracing::info!(
            request_id = %request_id,
            message_count = messages.len(),
            tool_count = schemas.len(),
            "Starting tool loop"
        );

        let mut message_json: Vec<Value> = messages
            .iter()
            .map(|m| serde_json::to_value(m).unwrap_or_default())
            .collect();

        for iteration in 1..=MAX_TOOL_ITERATIONS {
            let req = LlmRequest {
                messages: message_json.clone(),
                tools: schemas.clone(),
                temperature: Some(options.temperature),
                max_tokens: Some(options.max_tokens),
            };

            tracing::debug!(
                request_id = %request_id,
                iteration,
                message_count = req.messages.len(),
                "Sending request to driver"
            );

            let turn = tokio::time::timeout(self.turn_timeout, self.collect_turn(req, &request_id))
                .await
                .map_err(|_elapsed| LlmError::Timeout(self.turn_timeout))??;

            let executor = match tools {
                Some(executor) if !turn.tool_calls.is_empty() => executor,
                _ => {
                    tracing::info!(
                        request_id = %request_id,
                        iteration,
                        reply_length = turn.text.len(),
                        "Tool loop completed"
                    );
                    return Ok(turn.text);
                }
            };

            message_json.push(json!({
                "role": "assistant",
                "content": if turn.text.is_empty() { Value::Null } else { Value::String(turn.text.clone()) },
                "tool_calls": turn.tool_calls,
            }));

            for call in &turn.tool_calls {
                let content = Self::execute_call(executor, call, &request_id).await;
                message_json.push(json!({
                    "role": "tool",
                    "tool_call_id": call.id,
                    "content": content,
                }));
            }
        }

        tracing::error!(
            request_id = %request_id,
            max_iterations = MAX_TOOL_ITERATIONS,
            "Maximum tool loop iterations exceeded"
        );
        Err(LlmError::MaxIterations(MAX_TOOL_ITERATIONS))
    }

    async fn execute_call(executor: &dyn ToolExecutor, call: &ToolCall, request_id: &str) -> String {
        let name = &call.function.name;
        let raw = call.function.arguments.trim();
        let arguments = if raw.is_empty() {
            Ok(Value::Object(serde_json::Map::new()))
        } else {
            serde_json::from_str::<Value>(raw)
        };

        let arguments = match arguments {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    tool_id = %call.id,
                    tool_name = %name,
                    error = %e,
                    "Tool call arguments are not valid JSON"
                );
                return format!("Error: invalid JSON arguments: {e}");
            }
        };

        tracing::info!(
            request_id = %request_id,
            tool_id = %call.id,
            tool_name = %name,
            "Executing tool call"
        );

        let result = executor.execute(name, arguments).await;
        let text = result.joined_text();
        if result.is_error {
            tracing::warn!(
                request_id = %request_id,
                tool_id = %call.id,
                tool_name = %name,
                error = %text,
                "Tool call failed"
            );
            format!("Error: {text}")
        } else {
            tracing::debug!(
                request_id = %request_id,
                tool_id = %call.id,
                result_length = text.len(),
                "Tool call succeeded"
            );
            text
        }
    }

    async fn collect_turn(&self, req: LlmRequest, request_id: &str) -> Result<AssistantTurn, LlmError> {
        let mut stream = self.driver.stream(req).await.map_err(|e| {
            tracing::error!(request_id = %request_id, error = %e, "Failed to create driver stream");
            LlmError::Provider(e)
        })?;

        let mut text = String::new();
        let mut accumulators: BTreeMap<usize, ToolCallAccumulator> = BTreeMap::new();

        while let Some(event) = stream.next().await {
            match event.map_err(LlmError::Provider)? {
                NormalizedEvent::MessageDelta { text: delta } => text.push_str(&delta),
                NormalizedEvent::ToolCallDelta {
                    call_index,
                    id,
                    name,
                    arguments_delta,
                } => {
                    let acc = accumulators.entry(call_index).or_default();
                    if acc.id.is_none() {
                        acc.id = id;
                    }
                    if acc.name.is_none() {
                        acc.name = name;
                    }
                    if let Some(delta) = arguments_delta {
                        acc.arguments.push_str(&delta);
                    }
                }
                NormalizedEvent::ToolCallComplete {
                    call_index,
                    id,
                    name,
                    arguments_json,
                } => {
                    accumulators.insert(
                        call_index,
                        ToolCallAccumulator {
                            id: Some(id),
                            name: Some(name),
                            arguments: arguments_json,
                        },
                    );
                }
                NormalizedEvent::Error { message, code } => {
                    tracing::error!(request_id = %request_id, code = ?code, error = %message, "Driver stream error");
                    return Err(LlmError::Stream(message));
                }
                NormalizedEvent::Done => break,
            }
        }

        let tool_calls = accumulators
            .into_iter()
            .filter_map(|(idx, acc)| {
                let name = acc.name?;
                Some(ToolCall {
                    id: acc.id.unwrap_or_else(|| format!("call_{idx}")),
                    call_type: "function".to_string(),
                    function: ToolCallFunction {
                        name,
                        arguments: acc.arguments,
                    },
                })
            })
            .collect();

        Ok(AssistantTurn { text, tool_calls })
    }
}
