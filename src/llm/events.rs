//! Provider-neutral streaming events.
//!
//! Every driver translates its wire format into [`NormalizedEvent`]s so the
//! tool loop never sees provider specifics.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum NormalizedEvent {
    /// Incremental assistant text.
    #[serde(rename = "message.delta")]
    MessageDelta { text: String },

    /// Fragment of a tool call being streamed.
    #[serde(rename = "tool_call.delta")]
    ToolCallDelta {
        call_index: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments_delta: Option<String>,
    },

    /// A tool call is fully assembled.
    ///
    /// Supersedes any deltas seen for the same `call_index`.
    #[serde(rename = "tool_call.complete")]
    ToolCallComplete {
        call_index: usize,
        id: String,
        name: String,
        arguments_json: String,
    },

    /// The provider reported an error mid-stream.
    #[serde(rename = "error")]
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    #[serde(rename = "done")]
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_serialization() {
        let json = serde_json::to_string(&NormalizedEvent::MessageDelta {
            text: "你好".into(),
        })
        .unwrap();
        assert!(json.contains("message.delta"));
        assert!(json.contains("你好"));

        let done: NormalizedEvent = serde_json::from_str(r#"{"type":"done"}"#).unwrap();
        assert_eq!(done, NormalizedEvent::Done);
    }
}
