//! Source Messages ↔ target chat-completions translation.

use serde_json::Value;

use crate::messages::{
    anthropic::{
        ContentBlock, ImageSource, MessageContent, MessagesRequest, MessagesResponse, Role, StopReason, ToolChoice,
        Usage,
    },
    openai::{
        ChatContent, ChatMessage, ChatRequest, ChatResponse, ChatRole, ContentPart, FinishReason, FunctionCall,
        FunctionDefinition, ImageUrl, StreamOptions, ToolCall, ToolChoice as ChatToolChoice, ToolDefinition,
    },
};

/// Placeholder substituted for images on targets without vision support.
const IMAGE_PLACEHOLDER: &str = "[image omitted]";

/// Translate a source request into the chat shape for `target_model`.
pub fn to_chat_request(request: &MessagesRequest, target_model: &str, stream: bool, supports_images: bool) -> ChatRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    // The separate system prompt collapses into one leading system message.
    if let Some(system) = &request.system {
        let text = system.flatten();
        if !text.is_empty() {
            messages.push(ChatMessage::text(ChatRole::System, text));
        }
    }

    for message in &request.messages {
        let role = match message.role {
            Role::User => ChatRole::User,
            Role::Assistant => ChatRole::Assistant,
        };

        match &message.content {
            MessageContent::Text(text) => messages.push(ChatMessage::text(role, text.clone())),
            MessageContent::Blocks(blocks) => convert_blocks(role, blocks, supports_images, &mut messages),
        }
    }

    ChatRequest {
        model: target_model.to_string(),
        messages,
        max_tokens: Some(request.max_tokens),
        temperature: request.temperature,
        top_p: request.top_p,
        stop: request.stop_sequences.clone(),
        stream: Some(stream),
        stream_options: stream.then_some(StreamOptions { include_usage: true }),
        tools: request.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|tool| ToolDefinition {
                    kind: "function".to_string(),
                    function: FunctionDefinition {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.input_schema.clone(),
                    },
                })
                .collect()
        }),
        tool_choice: request.tool_choice.as_ref().map(|choice| match choice {
            ToolChoice::Auto => ChatToolChoice::Mode("auto".to_string()),
            ToolChoice::Any => ChatToolChoice::Mode("required".to_string()),
            ToolChoice::Tool { name } => ChatToolChoice::function(name.clone()),
        }),
    }
}

/// Split one block-list message into its chat-shape messages.
///
/// Tool results become separate role-`tool` messages, emitted first so they
/// directly follow the assistant turn that invoked them. Successive text
/// blocks concatenate with newlines into a single content string; tool_use
/// blocks ride along as `tool_calls` on the same message.
fn convert_blocks(role: ChatRole, blocks: &[ContentBlock], supports_images: bool, out: &mut Vec<ChatMessage>) {
    let mut texts: Vec<&str> = Vec::new();
    let mut image_parts: Vec<ContentPart> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text { text } => texts.push(text),
            ContentBlock::Image { source } => {
                if supports_images {
                    if let Some(url) = image_part_url(source) {
                        image_parts.push(ContentPart::ImageUrl {
                            image_url: ImageUrl { url },
                        });
                    }
                } else {
                    texts.push(IMAGE_PLACEHOLDER);
                }
            }
            ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall {
                    id: id.clone(),
                    kind: "function".to_string(),
                    function: FunctionCall {
                        name: name.clone(),
                        arguments: serde_json::to_string(input).unwrap_or_else(|_| "{}".to_string()),
                    },
                });
            }
            ContentBlock::ToolResult {
                tool_use_id, content, ..
            } => {
                out.push(ChatMessage {
                    role: ChatRole::Tool,
                    content: Some(ChatContent::Text(content.flatten())),
                    tool_calls: None,
                    tool_call_id: Some(tool_use_id.clone()),
                });
            }
            // Reasoning is not replayed to chat targets.
            ContentBlock::Thinking { .. } => {}
        }
    }

    let content = if !image_parts.is_empty() {
        let mut parts = Vec::with_capacity(image_parts.len() + 1);
        if !texts.is_empty() {
            parts.push(ContentPart::Text {
                text: texts.join("\n"),
            });
        }
        parts.extend(image_parts);
        Some(ChatContent::Parts(parts))
    } else if !texts.is_empty() {
        Some(ChatContent::Text(texts.join("\n")))
    } else {
        None
    };

    if content.is_some() || !tool_calls.is_empty() {
        out.push(ChatMessage {
            role,
            content,
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            tool_call_id: None,
        });
    }
}

fn image_part_url(source: &ImageSource) -> Option<String> {
    match source.source_type.as_str() {
        "base64" => {
            let media_type = source.media_type.as_deref().unwrap_or("image/png");
            let data = source.data.as_deref()?;
            Some(format!("data:{media_type};base64,{data}"))
        }
        "url" => source.url.clone(),
        _ => None,
    }
}

/// Translate a buffered chat response back into the source shape.
///
/// Takes `choices[0]`. Text content, if non-empty, precedes tool-use
/// blocks.
pub fn from_chat_response(response: ChatResponse, fallback_model: &str) -> MessagesResponse {
    let model = if response.model.is_empty() {
        fallback_model.to_string()
    } else {
        response.model
    };

    let mut content = Vec::new();
    let mut has_tool_calls = false;
    let mut finish_reason = None;

    if let Some(choice) = response.choices.into_iter().next() {
        finish_reason = choice.finish_reason;

        if let Some(text) = choice.message.content
            && !text.is_empty()
        {
            content.push(ContentBlock::Text { text });
        }

        if let Some(calls) = choice.message.tool_calls {
            has_tool_calls = !calls.is_empty();

            content.extend(calls.into_iter().map(|call| ContentBlock::ToolUse {
                id: call.id,
                name: call.function.name,
                input: parse_tool_arguments(&call.function.arguments),
            }));
        }
    }

    let usage = response.usage.unwrap_or_default();

    MessagesResponse {
        id: super::new_message_id(),
        kind: "message".to_string(),
        role: Role::Assistant,
        content,
        model,
        stop_reason: Some(map_finish_reason(finish_reason.as_ref(), has_tool_calls)),
        stop_sequence: None,
        usage: Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        },
    }
}

/// Map the chat finish reason onto the source stop-reason vocabulary.
pub(crate) fn map_finish_reason(reason: Option<&FinishReason>, has_tool_calls: bool) -> StopReason {
    match reason {
        Some(FinishReason::Stop) => StopReason::EndTurn,
        Some(FinishReason::ToolCalls) => StopReason::ToolUse,
        Some(FinishReason::Length) => StopReason::MaxTokens,
        Some(FinishReason::ContentFilter) | Some(FinishReason::Other(_)) => StopReason::EndTurn,
        None if has_tool_calls => StopReason::ToolUse,
        None => StopReason::EndTurn,
    }
}

/// Parse tool-call arguments. Empty strings become an empty object; invalid
/// JSON is kept verbatim as a string so nothing is lost.
pub(crate) fn parse_tool_arguments(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Object(serde_json::Map::new());
    }

    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => Value::String(raw.to_string()),
    }
}
