//! The "responses" target envelope.
//!
//! Dual-envelope providers route reasoning-class models through a different
//! surface: the request carries an `input` sequence of typed items and an
//! `instructions` field instead of a messages array, responses carry
//! parallel `output` items, and streams use a typed event vocabulary
//! (`response.*`) instead of bare chunks with a `[DONE]` sentinel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for `POST .../responses`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesRequest {
    pub model: String,

    /// Flattened conversation: message, function_call and
    /// function_call_output items in order.
    pub input: Vec<InputItem>,

    /// System text, lifted out of the conversation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ResponsesTool>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ResponsesToolChoice>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// The gateway is stateless; never let the target store turns.
    pub store: bool,

    /// Reasoning knobs, set when the source request opted into thinking.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningConfig>,
}

/// Reasoning configuration on dual-envelope targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Ask the target to produce reasoning summaries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// One item of the `input` sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    /// A conversation message with typed parts.
    Message {
        /// `"user"`, `"assistant"` or `"system"`.
        role: String,
        content: Vec<InputPart>,
    },

    /// A prior tool invocation by the assistant.
    FunctionCall {
        /// Target-namespace call id (`fc_` prefixed).
        call_id: String,
        name: String,
        /// JSON-serialized arguments.
        arguments: String,
    },

    /// The output of a prior tool invocation.
    FunctionCallOutput {
        /// The `FunctionCall` this answers.
        call_id: String,
        output: String,
    },
}

/// A typed part of an input message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputPart {
    /// Text authored by the user or system.
    InputText { text: String },
    /// Text previously produced by the assistant.
    OutputText { text: String },
    /// Image input as a URL or `data:` URI.
    InputImage { image_url: String },
}

/// Tool definition in the responses shape: flat, not nested in `function`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesTool {
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub kind: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub parameters: Value,
}

/// Tool choice in the responses shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsesToolChoice {
    /// `"auto"`, `"required"` or `"none"`.
    Mode(String),
    /// Force one function; flat shape, no nested object.
    Function {
        #[serde(rename = "type")]
        kind: String,
        name: String,
    },
}

/// Buffered response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesResponse {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub model: String,

    /// `"completed"`, `"incomplete"`, `"failed"`, ...
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub output: Vec<OutputItem>,

    #[serde(default)]
    pub usage: Option<ResponsesUsage>,

    #[serde(default)]
    pub incomplete_details: Option<IncompleteDetails>,
}

/// Why a response ended `"incomplete"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncompleteDetails {
    #[serde(default)]
    pub reason: Option<String>,
}

/// One item of the `output` sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    /// Assistant message with typed parts.
    Message {
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        content: Vec<OutputPart>,
    },

    /// A tool invocation by the model.
    FunctionCall {
        #[serde(default)]
        id: Option<String>,
        call_id: String,
        name: String,
        #[serde(default)]
        arguments: String,
    },

    /// Reasoning item; the summary surfaces as thinking downstream.
    Reasoning {
        #[serde(default)]
        summary: Vec<SummaryPart>,
    },

    /// Item kinds this gateway does not interpret.
    #[serde(untagged)]
    Other(Value),
}

/// A typed part of an output message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputPart {
    OutputText {
        text: String,
    },
    Refusal {
        refusal: String,
    },
    /// Part kinds this gateway does not interpret.
    #[serde(untagged)]
    Other(Value),
}

/// One entry of a reasoning summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryPart {
    /// `"summary_text"`.
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub text: String,
}

/// Usage in the responses shape.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResponsesUsage {
    #[serde(default)]
    pub input_tokens: u32,

    #[serde(default)]
    pub output_tokens: u32,
}

/// Typed streaming events. Only the variants the translator interprets are
/// modeled; everything else lands in [`ResponsesStreamEvent::Other`] and is
/// skipped.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ResponsesStreamEvent {
    /// Stream opened.
    #[serde(rename = "response.created")]
    Created {
        #[serde(default)]
        response: Option<Value>,
    },

    /// A new output item exists; function_call items announce id and name.
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded { output_index: usize, item: OutputItem },

    /// Text appended to an output message.
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta { output_index: usize, delta: String },

    /// Argument fragment appended to a function_call item.
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta { output_index: usize, delta: String },

    /// Reasoning summary text appended.
    #[serde(rename = "response.reasoning_summary_text.delta")]
    ReasoningSummaryTextDelta { output_index: usize, delta: String },

    /// An output item is complete.
    #[serde(rename = "response.output_item.done")]
    OutputItemDone { output_index: usize, item: OutputItem },

    /// Terminal event with the full response envelope.
    #[serde(rename = "response.completed")]
    Completed { response: ResponsesResponse },

    /// Terminal event for a failed response.
    #[serde(rename = "response.failed")]
    Failed {
        #[serde(default)]
        response: Option<Value>,
    },

    /// Terminal event for an incomplete response.
    #[serde(rename = "response.incomplete")]
    Incomplete {
        #[serde(default)]
        response: Option<ResponsesResponse>,
    },

    /// Event kinds this gateway does not interpret.
    #[serde(untagged)]
    Other(Value),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serialize_request_items() {
        let request = ResponsesRequest {
            model: "o3".to_string(),
            input: vec![
                InputItem::Message {
                    role: "user".to_string(),
                    content: vec![InputPart::InputText {
                        text: "Weather in Paris?".to_string(),
                    }],
                },
                InputItem::FunctionCall {
                    call_id: "fc_0001".to_string(),
                    name: "get_weather".to_string(),
                    arguments: r#"{"city":"Paris"}"#.to_string(),
                },
                InputItem::FunctionCallOutput {
                    call_id: "fc_0001".to_string(),
                    output: "18C".to_string(),
                },
            ],
            instructions: Some("Be terse.".to_string()),
            max_output_tokens: Some(1024),
            temperature: None,
            tools: None,
            tool_choice: Some(ResponsesToolChoice::Mode("auto".to_string())),
            stream: None,
            store: false,
            reasoning: Some(ReasoningConfig {
                summary: Some("auto".to_string()),
            }),
        };

        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["input"][0]["type"], "message");
        assert_eq!(json["input"][0]["content"][0]["type"], "input_text");
        assert_eq!(json["input"][1]["type"], "function_call");
        assert_eq!(json["input"][1]["call_id"], "fc_0001");
        assert_eq!(json["input"][2]["type"], "function_call_output");
        assert_eq!(json["instructions"], "Be terse.");
        assert_eq!(json["store"], false);
        assert_eq!(json["reasoning"]["summary"], "auto");
    }

    #[test]
    fn deserialize_response_output() {
        let json = json!({
            "id": "resp_1",
            "status": "completed",
            "output": [
                {"type": "reasoning", "summary": [{"type": "summary_text", "text": "thinking..."}]},
                {"type": "message", "role": "assistant", "content": [
                    {"type": "output_text", "text": "It is sunny."}
                ]},
                {"type": "function_call", "call_id": "fc_7", "name": "get_weather", "arguments": "{}"}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 20}
        });

        let response: ResponsesResponse = serde_json::from_value(json).unwrap();

        assert_eq!(response.status.as_deref(), Some("completed"));
        assert_eq!(response.output.len(), 3);
        assert!(matches!(response.output[0], OutputItem::Reasoning { .. }));
        assert!(matches!(response.output[2], OutputItem::FunctionCall { .. }));
    }

    #[test]
    fn unknown_output_items_are_preserved() {
        let json = json!({
            "output": [{"type": "web_search_call", "id": "ws_1"}]
        });

        let response: ResponsesResponse = serde_json::from_value(json).unwrap();
        assert!(matches!(response.output[0], OutputItem::Other(_)));
    }

    #[test]
    fn deserialize_stream_events() {
        let event: ResponsesStreamEvent = serde_json::from_str(
            r#"{"type":"response.output_text.delta","output_index":0,"delta":"Hel"}"#,
        )
        .unwrap();
        assert!(matches!(
            event,
            ResponsesStreamEvent::OutputTextDelta { output_index: 0, ref delta } if delta == "Hel"
        ));

        let event: ResponsesStreamEvent =
            serde_json::from_str(r#"{"type":"response.output_text.done","output_index":0,"text":"Hello"}"#).unwrap();
        assert!(matches!(event, ResponsesStreamEvent::Other(_)));
    }
}
