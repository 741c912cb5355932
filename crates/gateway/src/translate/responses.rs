//! Source Messages ↔ target "responses" envelope translation.

use crate::messages::{
    anthropic::{
        ContentBlock, ImageSource, MessageContent, MessagesRequest, MessagesResponse, Role, StopReason, ToolChoice,
        Usage,
    },
    responses::{
        InputItem, InputPart, OutputItem, OutputPart, ReasoningConfig, ResponsesRequest, ResponsesResponse,
        ResponsesTool, ResponsesToolChoice,
    },
};

use super::{CallIdBridge, chat::parse_tool_arguments};

/// Prefix marking refusal parts when they are folded into text blocks.
const REFUSAL_MARKER: &str = "[refusal] ";

/// Translate a source request into the responses envelope for
/// `target_model`. Source tool-call ids are rewritten into the `fc_`
/// namespace through `bridge`; the same bridge must be used to reverse the
/// response.
pub fn to_responses_request(
    request: &MessagesRequest,
    target_model: &str,
    stream: bool,
    bridge: &mut CallIdBridge,
) -> ResponsesRequest {
    let mut input = Vec::with_capacity(request.messages.len());

    for message in &request.messages {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };

        match &message.content {
            MessageContent::Text(text) => {
                input.push(InputItem::Message {
                    role: role.to_string(),
                    content: vec![text_part(message.role, text.clone())],
                });
            }
            MessageContent::Blocks(blocks) => convert_blocks(message.role, role, blocks, bridge, &mut input),
        }
    }

    ResponsesRequest {
        model: target_model.to_string(),
        input,
        instructions: request.system.as_ref().map(|system| system.flatten()),
        max_output_tokens: Some(request.max_tokens),
        temperature: request.temperature,
        tools: request.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|tool| ResponsesTool {
                    kind: "function".to_string(),
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.input_schema.clone(),
                })
                .collect()
        }),
        tool_choice: request.tool_choice.as_ref().map(|choice| match choice {
            ToolChoice::Auto => ResponsesToolChoice::Mode("auto".to_string()),
            ToolChoice::Any => ResponsesToolChoice::Mode("required".to_string()),
            ToolChoice::Tool { name } => ResponsesToolChoice::Function {
                kind: "function".to_string(),
                name: name.clone(),
            },
        }),
        stream: Some(stream),
        store: false,
        reasoning: request.wants_thinking().then(|| ReasoningConfig {
            summary: Some("auto".to_string()),
        }),
    }
}

/// Flatten one block-list message into input items, preserving block order:
/// text and image runs group into message items, tool interactions become
/// standalone function_call / function_call_output items.
fn convert_blocks(
    role: Role,
    role_name: &str,
    blocks: &[ContentBlock],
    bridge: &mut CallIdBridge,
    input: &mut Vec<InputItem>,
) {
    let mut parts: Vec<InputPart> = Vec::new();

    macro_rules! flush_parts {
        () => {
            if !parts.is_empty() {
                input.push(InputItem::Message {
                    role: role_name.to_string(),
                    content: std::mem::take(&mut parts),
                });
            }
        };
    }

    for block in blocks {
        match block {
            ContentBlock::Text { text } => parts.push(text_part(role, text.clone())),
            ContentBlock::Image { source } => {
                if let Some(url) = image_url(source) {
                    parts.push(InputPart::InputImage { image_url: url });
                }
            }
            ContentBlock::ToolUse { id, name, input: args } => {
                flush_parts!();
                input.push(InputItem::FunctionCall {
                    call_id: bridge.target_id(id),
                    name: name.clone(),
                    arguments: serde_json::to_string(args).unwrap_or_else(|_| "{}".to_string()),
                });
            }
            ContentBlock::ToolResult {
                tool_use_id, content, ..
            } => {
                flush_parts!();
                input.push(InputItem::FunctionCallOutput {
                    call_id: bridge.target_id(tool_use_id),
                    output: content.flatten(),
                });
            }
            // Reasoning is not replayed upstream.
            ContentBlock::Thinking { .. } => {}
        }
    }

    flush_parts!();
}

fn text_part(role: Role, text: String) -> InputPart {
    match role {
        Role::User => InputPart::InputText { text },
        Role::Assistant => InputPart::OutputText { text },
    }
}

fn image_url(source: &ImageSource) -> Option<String> {
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

/// Translate a buffered responses envelope back into the source shape.
///
/// Output items are walked in order: message parts become text blocks
/// (refusals prefixed with a marker), function_call items become tool_use
/// blocks with ids translated back through `bridge`, and non-empty
/// reasoning summaries become thinking blocks.
pub fn from_responses_response(
    response: ResponsesResponse,
    fallback_model: &str,
    bridge: &CallIdBridge,
) -> MessagesResponse {
    let model = if response.model.is_empty() {
        fallback_model.to_string()
    } else {
        response.model
    };

    let mut content = Vec::new();
    let mut has_function_calls = false;

    for item in response.output {
        match item {
            OutputItem::Message { content: parts, .. } => {
                for part in parts {
                    match part {
                        OutputPart::OutputText { text } => content.push(ContentBlock::Text { text }),
                        OutputPart::Refusal { refusal } => content.push(ContentBlock::Text {
                            text: format!("{REFUSAL_MARKER}{refusal}"),
                        }),
                        OutputPart::Other(part) => {
                            log::debug!("skipping uninterpreted output part: {part}");
                        }
                    }
                }
            }
            OutputItem::FunctionCall {
                call_id, name, arguments, ..
            } => {
                has_function_calls = true;
                content.push(ContentBlock::ToolUse {
                    id: bridge.source_id(&call_id),
                    name,
                    input: parse_tool_arguments(&arguments),
                });
            }
            OutputItem::Reasoning { summary } => {
                let text = summary
                    .iter()
                    .map(|part| part.text.as_str())
                    .filter(|text| !text.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n");

                if !text.is_empty() {
                    content.push(ContentBlock::Thinking { thinking: text });
                }
            }
            OutputItem::Other(item) => {
                log::debug!("skipping uninterpreted output item: {item}");
            }
        }
    }

    let stop_reason = derive_stop_reason(
        has_function_calls,
        response.status.as_deref(),
        response
            .incomplete_details
            .as_ref()
            .and_then(|details| details.reason.as_deref()),
    );

    let usage = response.usage.unwrap_or_default();

    MessagesResponse {
        id: super::new_message_id(),
        kind: "message".to_string(),
        role: Role::Assistant,
        content,
        model,
        stop_reason: Some(stop_reason),
        stop_sequence: None,
        usage: Usage {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        },
    }
}

/// Stop reason from response status plus the presence of function calls.
pub(crate) fn derive_stop_reason(
    has_function_calls: bool,
    status: Option<&str>,
    incomplete_reason: Option<&str>,
) -> StopReason {
    if has_function_calls {
        StopReason::ToolUse
    } else if status == Some("incomplete") && incomplete_reason == Some("max_output_tokens") {
        StopReason::MaxTokens
    } else {
        StopReason::EndTurn
    }
}
