//! The source dialect: Anthropic-shaped Messages API types.
//!
//! The client tool only ever speaks this dialect. Requests arrive in this
//! shape, and whatever upstream dialect actually served them, responses and
//! streams leave in this shape. The format differs from the chat family in
//! several ways: message content is an array of typed blocks, the system
//! prompt is separate from the messages array, and tool interactions use
//! `tool_use`/`tool_result` blocks instead of function-call arrays.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for `POST /v1/messages`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessagesRequest {
    /// The model to use for the completion.
    pub model: String,

    /// The conversation, alternating between `user` and `assistant` roles.
    pub messages: Vec<Message>,

    /// Maximum number of tokens to generate. Required in this dialect.
    pub max_tokens: u32,

    /// System prompt, either a plain string or a list of text blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPrompt>,

    /// Sampling temperature, 0.0 to 1.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling cutoff.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Top-K sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    /// Sequences that stop generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,

    /// When true, the response is delivered as Server-Sent Events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Extended-thinking opt-in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,

    /// Tools available to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,

    /// Controls how the model uses tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    /// Request metadata (user id for tracking).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl MessagesRequest {
    /// Whether extended thinking was requested.
    pub fn wants_thinking(&self) -> bool {
        matches!(&self.thinking, Some(t) if t.kind == "enabled")
    }
}

/// Extended-thinking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThinkingConfig {
    /// `"enabled"` or `"disabled"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Token budget for the thinking phase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_tokens: Option<u32>,
}

/// System prompt: a plain string or a sequence of text blocks.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    /// Plain string form.
    Text(String),
    /// Block-list form.
    Blocks(Vec<SystemBlock>),
}

impl SystemPrompt {
    /// Collapse either form into one string, blocks joined with newlines.
    pub fn flatten(&self) -> String {
        match self {
            SystemPrompt::Text(text) => text.clone(),
            SystemPrompt::Blocks(blocks) => blocks
                .iter()
                .map(|block| {
                    let SystemBlock::Text { text } = block;
                    text.as_str()
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A block inside the block-list form of the system prompt.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SystemBlock {
    /// Text block.
    Text {
        /// The text content.
        text: String,
    },
}

/// A single conversation message.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    /// Who sent it.
    pub role: Role,
    /// Plain string or an ordered sequence of typed blocks.
    pub content: MessageContent,
}

/// Message sender role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End-user input.
    User,
    /// Model output.
    Assistant,
}

/// Message content: the dialect accepts both a bare string and a block list.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Bare string shorthand for a single text block.
    Text(String),
    /// Ordered typed blocks.
    Blocks(Vec<ContentBlock>),
}

/// One element of a message's structured content.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },

    /// Image content.
    Image {
        /// Where the image bytes come from.
        source: ImageSource,
    },

    /// A tool invocation requested by the assistant.
    ToolUse {
        /// Identifier correlating the eventual result.
        id: String,
        /// Tool name.
        name: String,
        /// Arguments conforming to the tool's input schema.
        input: Value,
    },

    /// The result of a prior tool invocation, sent back by the user.
    ToolResult {
        /// The `ToolUse` id this answers.
        tool_use_id: String,
        /// Result payload.
        content: ToolResultContent,
        /// Whether the tool failed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },

    /// Model reasoning surfaced when extended thinking is enabled.
    Thinking {
        /// The reasoning text.
        thinking: String,
    },
}

/// Tool result payload: a bare string or a list of text blocks.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    /// Bare string result.
    Text(String),
    /// Block-list result.
    Blocks(Vec<ToolResultBlock>),
}

impl ToolResultContent {
    /// Stringify the result for targets that take tool output as one string.
    pub fn flatten(&self) -> String {
        match self {
            ToolResultContent::Text(text) => text.clone(),
            ToolResultContent::Blocks(blocks) => blocks
                .iter()
                .map(|block| {
                    let ToolResultBlock::Text { text } = block;
                    text.as_str()
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A block inside a block-list tool result.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultBlock {
    /// Text block.
    Text {
        /// The text content.
        text: String,
    },
}

/// Image source for image content blocks.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageSource {
    /// `"base64"` or `"url"`.
    #[serde(rename = "type")]
    pub source_type: String,

    /// MIME type, e.g. `"image/png"`. Meaningful for base64 sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    /// Base64 payload for base64 sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    /// Location for url sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Request metadata.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Metadata {
    /// Opaque user identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Tool definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tool {
    /// Unique tool name.
    pub name: String,

    /// What the tool does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the tool's arguments.
    pub input_schema: Value,
}

/// Tool choice configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    /// Let the model decide.
    Auto,
    /// Force use of some tool.
    Any,
    /// Force use of one specific tool.
    Tool {
        /// The tool to use.
        name: String,
    },
}

/// Response body for a buffered completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    /// Message identifier, `msg_` prefixed.
    pub id: String,

    /// Always `"message"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Always [`Role::Assistant`].
    pub role: Role,

    /// Response content blocks.
    pub content: Vec<ContentBlock>,

    /// The model that generated the response.
    pub model: String,

    /// Why generation stopped.
    pub stop_reason: Option<StopReason>,

    /// The matched stop sequence, if that is why generation stopped.
    pub stop_sequence: Option<String>,

    /// Token accounting.
    pub usage: Usage,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of the assistant's turn.
    EndTurn,
    /// The `max_tokens` budget was exhausted.
    MaxTokens,
    /// A configured stop sequence was generated.
    StopSequence,
    /// The model invoked a tool.
    ToolUse,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndTurn => write!(f, "end_turn"),
            StopReason::MaxTokens => write!(f, "max_tokens"),
            StopReason::StopSequence => write!(f, "stop_sequence"),
            StopReason::ToolUse => write!(f, "tool_use"),
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    pub input_tokens: u32,
    /// Tokens generated.
    pub output_tokens: u32,
}

/// Error envelope: every synthesized error on the source path has this body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Always `"error"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// The error itself.
    pub error: ErrorDetail,
}

impl ErrorBody {
    /// Build the standard envelope around a kind and message.
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: "error".to_string(),
            error: ErrorDetail {
                kind: error_type.into(),
                message: message.into(),
            },
        }
    }
}

/// Error detail inside the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Error kind, e.g. `invalid_request_error`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Human-readable message.
    pub message: String,
}

/// Model information for the listing surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// The model identifier usable in requests.
    pub id: String,

    /// Always `"model"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Display name.
    pub display_name: String,

    /// Unix timestamp of model creation, 0 when unknown.
    pub created_at: u64,
}

/// Response for `GET /v1/models`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    /// Available models across configured providers.
    pub data: Vec<ModelInfo>,

    /// Whether more pages exist. Always false here.
    pub has_more: bool,
}

/// Streaming event surface emitted on `POST /v1/messages` with `stream: true`.
///
/// Every stream begins with [`StreamEvent::MessageStart`] carrying a freshly
/// generated message id, emits one or more content block lifecycles
/// (`content_block_start` → `content_block_delta*` → `content_block_stop`),
/// then [`StreamEvent::MessageDelta`] with the final stop reason and usage,
/// and finishes with a terminal [`StreamEvent::MessageStop`], no matter
/// which upstream dialect produced the data, and even if the upstream
/// connection died mid-stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Announces the streamed message.
    MessageStart {
        /// Initial message metadata with empty content.
        message: MessageStart,
    },

    /// A content block begins. The same index is used by its deltas and stop.
    ContentBlockStart {
        /// Block index.
        index: u32,
        /// The block being started.
        content_block: ContentBlock,
    },

    /// Incremental update for an open block.
    ContentBlockDelta {
        /// Block index.
        index: u32,
        /// The delta payload.
        delta: ContentDelta,
    },

    /// No further deltas for the indexed block.
    ContentBlockStop {
        /// Block index.
        index: u32,
    },

    /// Top-level message changes: stop reason and cumulative usage.
    MessageDelta {
        /// Stop reason and stop sequence.
        delta: MessageDeltaBody,
        /// Cumulative usage.
        usage: Usage,
    },

    /// Terminal event.
    MessageStop,

    /// Keep-alive.
    Ping,

    /// Stream-level error, surfaced without tearing down the connection.
    Error {
        /// The error.
        error: ErrorDetail,
    },
}

impl StreamEvent {
    /// The SSE `event:` name for this payload.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::MessageStart { .. } => "message_start",
            StreamEvent::ContentBlockStart { .. } => "content_block_start",
            StreamEvent::ContentBlockDelta { .. } => "content_block_delta",
            StreamEvent::ContentBlockStop { .. } => "content_block_stop",
            StreamEvent::MessageDelta { .. } => "message_delta",
            StreamEvent::MessageStop => "message_stop",
            StreamEvent::Ping => "ping",
            StreamEvent::Error { .. } => "error",
        }
    }
}

/// Payload of the initial `message_start` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageStart {
    /// Freshly generated message id.
    pub id: String,

    /// Always `"message"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Always [`Role::Assistant`].
    pub role: Role,

    /// Empty at stream start.
    pub content: Vec<ContentBlock>,

    /// The model producing the stream.
    pub model: String,

    /// Placeholder usage, updated by the final `message_delta`.
    pub usage: Usage,
}

/// Delta payload inside `content_block_delta`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentDelta {
    /// Additional text for a text block.
    TextDelta {
        /// The appended text.
        text: String,
    },

    /// A raw fragment of the JSON arguments of a tool_use block. Fragments
    /// are forwarded verbatim; the consumer reassembles at block stop.
    InputJsonDelta {
        /// The JSON fragment.
        partial_json: String,
    },

    /// Additional reasoning text for a thinking block.
    ThinkingDelta {
        /// The appended reasoning.
        thinking: String,
    },
}

/// Payload of the `message_delta` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageDeltaBody {
    /// Final stop reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,

    /// Matched stop sequence, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
}
