//! `OpenAI` Chat Completions API driver.
//!
//! Streams `/v1/chat/completions` responses and translates SSE frames into
//! [`NormalizedEvent`]s, including incremental tool calls.

use std::collections::BTreeMap;

use futures::StreamExt;
use serde_json::{Value, json};

use super::{EventStream, LlmDriver, LlmRequest, LlmSettings, NormalizedEvent};

/// Accumulated state for a streaming tool call.
#[derive(Debug, Default)]
struct ToolAccum {
    id: Option<String>,
    name: Option<String>,
    args: String,
}

/// Incremental SSE decoder for chat completion chunks.
#[derive(Debug, Default)]
struct SseDecoder {
    buf: Vec<u8>,
    tool_accum: BTreeMap<usize, ToolAccum>,
}

impl SseDecoder {
    /// Feed raw bytes; returns events for every complete frame.
    fn push(&mut self, chunk: &[u8]) -> anyhow::Result<Vec<NormalizedEvent>> {
        self.buf.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(pos) = find_double_newline(&self.buf) {
            let frame: Vec<u8> = self.buf.drain(..pos + 2).collect();
            self.decode_frame(&String::from_utf8_lossy(&frame), &mut events)?;
        }
        Ok(events)
    }

    /// Decode whatever is left once the body ends.
    fn finish(&mut self) -> anyhow::Result<Vec<NormalizedEvent>> {
        let rest = std::mem::take(&mut self.buf);
        let mut events = Vec::new();
        self.decode_frame(&String::from_utf8_lossy(&rest), &mut events)?;
        Ok(events)
    }

    fn decode_frame(&mut self, frame: &str, events: &mut Vec<NormalizedEvent>) -> anyhow::Result<()> {
        for line in frame.lines() {
            let Some(data) = line.trim().strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() {
                continue;
            }
            if data == "[DONE]" {
                events.push(NormalizedEvent::Done);
                continue;
            }
            self.decode_chunk(&serde_json::from_str(data)?, events);
        }
        Ok(())
    }

    fn decode_chunk(&mut self, v: &Value, events: &mut Vec<NormalizedEvent>) {
        if let Some(message) = v.pointer("/error/message").and_then(Value::as_str) {
            events.push(NormalizedEvent::Error {
                message: message.to_string(),
                code: v
                    .pointer("/error/code")
                    .map(|c| c.as_str().map_or_else(|| c.to_string(), ToString::to_string)),
            });
            return;
        }

        let choice = &v["choices"][0];
        let delta = &choice["delta"];

        if let Some(s) = delta.get("content").and_then(Value::as_str) {
            if !s.is_empty() {
                events.push(NormalizedEvent::MessageDelta {
                    text: s.to_string(),
                });
            }
        }

        if let Some(arr) = delta.get("tool_calls").and_then(Value::as_array) {
            for tc in arr {
                let idx = tc
                    .get("index")
                    .and_then(Value::as_u64)
                    .and_then(|i| usize::try_from(i).ok())
                    .unwrap_or(0);
                let id = tc.get("id").and_then(Value::as_str).map(ToString::to_string);
                let name = tc
                    .pointer("/function/name")
                    .and_then(Value::as_str)
                    .map(ToString::to_string);
                let args_delta = tc
                    .pointer("/function/arguments")
                    .and_then(Value::as_str)
                    .map(ToString::to_string);

                let entry = self.tool_accum.entry(idx).or_default();
                if entry.id.is_none() {
                    entry.id.clone_from(&id);
                }
                if entry.name.is_none() {
                    entry.name.clone_from(&name);
                }
                if let Some(ad) = &args_delta {
                    entry.args.push_str(ad);
                }

                events.push(NormalizedEvent::ToolCallDelta {
                    call_index: idx,
                    id,
                    name,
                    arguments_delta: args_delta,
                });
            }
        }

        if choice.get("finish_reason").and_then(Value::as_str) == Some("tool_calls") {
            for (idx, a) in std::mem::take(&mut self.tool_accum) {
                if let (Some(id), Some(name)) = (a.id, a.name) {
                    events.push(NormalizedEvent::ToolCallComplete {
                        call_index: idx,
                        id,
                        name,
                        arguments_json: a.args,
                    });
                }
            }
        }
    }
}

/// Driver for `OpenAI`-compatible Chat Completions endpoints.
#[derive(Clone)]
pub struct ChatCompletionsDriver {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ChatCompletionsDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsDriver")
            .field("settings", &self.settings)
            .finish()
    }
}

impl ChatCompletionsDriver {
    #[must_use]
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    fn request_body(&self, req: LlmRequest) -> Value {
        let mut body = json!({
            "model": self.settings.model,
            "stream": true,
            "messages": req.messages,
        });
        if !req.tools.is_empty() {
            body["tools"] = Value::Array(req.tools);
            body["tool_choice"] = json!("auto");
            if let Some(parallel) = self.settings.parallel_tool_calls {
                body["parallel_tool_calls"] = json!(parallel);
            }
        }
        if let Some(t) = req.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(m) = req.max_tokens {
            body["max_tokens"] = json!(m);
        }
        body
    }
}

#[async_trait::async_trait]
impl LlmDriver for ChatCompletionsDriver {
    async fn stream(&self, req: LlmRequest) -> anyhow::Result<EventStream> {
        let provider = &self.settings.provider;
        let url = provider.build_chat_url(&self.settings.base_url);
        let body = self.request_body(req);

        let mut rb = self.http.post(&url).json(&body);
        if let Some(k) = &self.settings.api_key {
            rb = if provider.uses_api_key_header() {
                rb.header("api-key", k)
            } else {
                rb.bearer_auth(k)
            };
        }

        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            anyhow::bail!("{status} from {url}: {detail}");
        }
        let byte_stream = resp.bytes_stream();

        let out = async_stream::try_stream! {
            let mut decoder = SseDecoder::default();

            futures::pin_mut!(byte_stream);
            while let Some(chunk) = byte_stream.next().await {
                for event in decoder.push(&chunk?)? {
                    yield event;
                }
            }
            for event in decoder.finish()? {
                yield event;
            }
        };

        Ok(Box::pin(out))
    }
}

/// Find the position of a double newline in the buffer.
fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Provider;

    fn frame(v: &Value) -> String {
        format!("data: {v}\n\n")
    }

    #[test]
    fn decodes_text_across_chunk_boundaries() {
        let mut d = SseDecoder::default();
        let f = frame(&json!({"choices": [{"delta": {"content": "你好"}}]}));
        let (a, b) = f.as_bytes().split_at(10);

        assert!(d.push(a).unwrap().is_empty());
        assert_eq!(
            d.push(b).unwrap(),
            vec![NormalizedEvent::MessageDelta {
                text: "你好".into()
            }]
        );
        assert_eq!(d.push(b"data: [DONE]\r\n\r\n").unwrap(), vec![NormalizedEvent::Done]);
    }

    #[test]
    fn assembles_tool_calls_on_finish_reason() {
        let mut d = SseDecoder::default();
        let mut input = String::new();
        input += &frame(&json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "id": "call_1", "function": {"name": "get_student_profile", "arguments": "{\"student_"}}
        ]}}]}));
        input += &frame(&json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": "name\":\"張小明\"}"}}
        ]}}]}));
        input += &frame(&json!({"choices": [{"delta": {}, "finish_reason": "tool_calls"}]}));

        let events = d.push(input.as_bytes()).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[2],
            NormalizedEvent::ToolCallComplete {
                call_index: 0,
                id: "call_1".into(),
                name: "get_student_profile".into(),
                arguments_json: "{\"student_name\":\"張小明\"}".into(),
            }
        );
    }

    #[test]
    fn surfaces_inline_errors() {
        let mut d = SseDecoder::default();
        let events = d
            .push(frame(&json!({"error": {"message": "rate limited", "code": 429}})).as_bytes())
            .unwrap();
        assert_eq!(
            events,
            vec![NormalizedEvent::Error {
                message: "rate limited".into(),
                code: Some("429".into())
            }]
        );
    }

    #[test]
    fn flushes_unterminated_tail() {
        let mut d = SseDecoder::default();
        assert!(d.push(b"data: [DONE]").unwrap().is_empty());
        assert_eq!(d.finish().unwrap(), vec![NormalizedEvent::Done]);
    }

    #[test]
    fn body_includes_sampling_and_tools() {
        let driver = ChatCompletionsDriver::new(LlmSettings {
            base_url: "https://api.openai.com".into(),
            api_key: None,
            model: "gpt-4o-mini".into(),
            provider: Provider::OpenAI,
            parallel_tool_calls: Some(false),
        });
        let body = driver.request_body(LlmRequest {
            messages: vec![json!({"role": "user", "content": "hi"})],
            tools: vec![json!({"type": "function"})],
            temperature: Some(0.5),
            max_tokens: Some(500),
        });
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["parallel_tool_calls"], false);

        let bare = driver.request_body(LlmRequest::default());
        assert!(bare.get("tools").is_none());
        assert!(bare.get("temperature").is_none());
    }
}
