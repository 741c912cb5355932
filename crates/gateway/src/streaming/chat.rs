//! State machine translating a chat-completions SSE stream into the source
//! event vocabulary.
//!
//! The upstream is a sequence of `data: {json}` chunks terminated by a
//! `data: [DONE]` sentinel. Text and tool-call fragments arrive interleaved
//! in choice deltas; this machine opens a source content block the first
//! time it sees content for it, closes any still-open block before opening
//! one of a different kind, and forwards tool-argument JSON fragments
//! verbatim.

use crate::{
    messages::{
        anthropic::{ContentBlock, ContentDelta, MessageDeltaBody, MessageStart, Role, StopReason, StreamEvent, Usage},
        openai::{ChatChunk, ToolCallDelta},
    },
    translate::{self, chat::map_finish_reason},
};

use super::{Step, StreamTranslator};

/// The upstream chat stream terminator.
const DONE_SENTINEL: &str = "[DONE]";

/// Which block, if any, is currently open.
#[derive(Clone, Copy)]
enum Open {
    None,
    Text { index: u32 },
    Tool { index: u32, call_index: usize },
}

/// Per-stream translation state for chat-envelope upstreams.
pub(crate) struct ChatStreamTranslator {
    message_id: String,
    model: String,
    started: bool,
    finished: bool,
    next_index: u32,
    open: Open,
    saw_tool_calls: bool,
    usage: Usage,
    stop_reason: Option<StopReason>,
}

impl ChatStreamTranslator {
    pub(crate) fn new(model: impl Into<String>) -> Self {
        Self {
            message_id: translate::new_message_id(),
            model: model.into(),
            started: false,
            finished: false,
            next_index: 0,
            open: Open::None,
            saw_tool_calls: false,
            usage: Usage::default(),
            stop_reason: None,
        }
    }

    fn ensure_started(&mut self, events: &mut Vec<StreamEvent>) {
        if self.started {
            return;
        }

        self.started = true;
        events.push(StreamEvent::MessageStart {
            message: MessageStart {
                id: self.message_id.clone(),
                kind: "message".to_string(),
                role: Role::Assistant,
                content: vec![],
                model: self.model.clone(),
                usage: Usage::default(),
            },
        });
    }

    fn close_open(&mut self, events: &mut Vec<StreamEvent>) {
        match std::mem::replace(&mut self.open, Open::None) {
            Open::None => {}
            Open::Text { index } | Open::Tool { index, .. } => {
                events.push(StreamEvent::ContentBlockStop { index });
            }
        }
    }

    fn text_delta(&mut self, text: String, events: &mut Vec<StreamEvent>) {
        // A text fragment closes any open tool block.
        if matches!(self.open, Open::Tool { .. }) {
            self.close_open(events);
        }

        if matches!(self.open, Open::None) {
            let index = self.next_index;
            self.next_index += 1;

            events.push(StreamEvent::ContentBlockStart {
                index,
                content_block: ContentBlock::Text { text: String::new() },
            });
            self.open = Open::Text { index };
        }

        let Open::Text { index } = self.open else {
            return;
        };

        events.push(StreamEvent::ContentBlockDelta {
            index,
            delta: ContentDelta::TextDelta { text },
        });
    }

    fn tool_call_delta(&mut self, fragment: ToolCallDelta, events: &mut Vec<StreamEvent>) {
        let name = fragment.function.as_ref().and_then(|f| f.name.clone());
        let arguments = fragment.function.and_then(|f| f.arguments);

        let opens_new_call = fragment.id.is_some() || name.is_some();

        if opens_new_call {
            self.close_open(events);

            let index = self.next_index;
            self.next_index += 1;

            events.push(StreamEvent::ContentBlockStart {
                index,
                content_block: ContentBlock::ToolUse {
                    id: fragment.id.unwrap_or_else(translate::new_call_id),
                    name: name.unwrap_or_default(),
                    input: serde_json::Value::Object(serde_json::Map::new()),
                },
            });

            self.open = Open::Tool {
                index,
                call_index: fragment.index,
            };
            self.saw_tool_calls = true;
        }

        let Some(arguments) = arguments else {
            return;
        };
        if arguments.is_empty() {
            return;
        }

        match self.open {
            Open::Tool { index, call_index } if call_index == fragment.index => {
                events.push(StreamEvent::ContentBlockDelta {
                    index,
                    delta: ContentDelta::InputJsonDelta {
                        partial_json: arguments,
                    },
                });
            }
            _ => {
                log::debug!(
                    "dropping tool-call fragment for closed call index {}",
                    fragment.index
                );
            }
        }
    }
}

impl StreamTranslator for ChatStreamTranslator {
    fn handle(&mut self, data: &str) -> Step {
        if data.trim() == DONE_SENTINEL {
            return Step::done();
        }

        let chunk: ChatChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                log::warn!("skipping malformed chat stream chunk: {e}");
                return Step::none();
            }
        };

        let mut events = Vec::new();
        self.ensure_started(&mut events);

        if let Some(usage) = chunk.usage {
            self.usage = Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            };
        }

        for choice in chunk.choices {
            // Single-candidate streams only; anything else is ignored.
            if choice.index != 0 {
                continue;
            }

            if let Some(text) = choice.delta.content
                && !text.is_empty()
            {
                self.text_delta(text, &mut events);
            }

            if let Some(tool_calls) = choice.delta.tool_calls {
                for fragment in tool_calls {
                    self.tool_call_delta(fragment, &mut events);
                }
            }

            if let Some(reason) = choice.finish_reason {
                self.stop_reason = Some(map_finish_reason(Some(&reason), self.saw_tool_calls));
            }
        }

        Step::events(events)
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut events = Vec::new();

        // A stream that produced nothing still gets a well-formed envelope.
        self.ensure_started(&mut events);
        self.close_open(&mut events);

        let stop_reason = self.stop_reason.unwrap_or(if self.saw_tool_calls {
            StopReason::ToolUse
        } else {
            StopReason::EndTurn
        });

        events.push(StreamEvent::MessageDelta {
            delta: MessageDeltaBody {
                stop_reason: Some(stop_reason),
                stop_sequence: None,
            },
            usage: self.usage,
        });
        events.push(StreamEvent::MessageStop);

        events
    }

    fn usage(&self) -> Usage {
        self.usage
    }

    fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::{event_names, run_script};

    #[test]
    fn streaming_tool_call_produces_ordered_block_lifecycle() {
        // A text fragment, then a tool call streamed in two argument
        // fragments, then the finish marker.
        let (events, _) = run_script(
            ChatStreamTranslator::new("gpt-4o"),
            &[
                r#"{"id":"c1","choices":[{"index":0,"delta":{"role":"assistant","content":"Let me check. "}}]}"#,
                r#"{"id":"c1","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"get_weather","arguments":"{\"city\":\"Par"}}]}}]}"#,
                r#"{"id":"c1","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"is\"}"}}]},"finish_reason":"tool_calls"}]}"#,
                "[DONE]",
            ],
        );

        assert_eq!(
            event_names(&events),
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "content_block_start",
                "content_block_delta",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );

        // Text block at index 0.
        let StreamEvent::ContentBlockStart { index: 0, content_block } = &events[1] else {
            unreachable!("expected text block start at index 0");
        };
        assert!(matches!(content_block, ContentBlock::Text { .. }));

        // Tool block at index 1 carries id and name.
        let StreamEvent::ContentBlockStart { index: 1, content_block } = &events[4] else {
            unreachable!("expected tool block start at index 1");
        };
        let ContentBlock::ToolUse { id, name, .. } = content_block else {
            unreachable!("expected tool_use block");
        };
        assert_eq!(id, "call_1");
        assert_eq!(name, "get_weather");

        // Argument fragments are forwarded verbatim.
        let StreamEvent::ContentBlockDelta { index: 1, delta } = &events[5] else {
            unreachable!("expected input_json_delta");
        };
        assert!(matches!(
            delta,
            ContentDelta::InputJsonDelta { partial_json } if partial_json == "{\"city\":\"Par"
        ));

        // Final message_delta carries the mapped stop reason.
        let StreamEvent::MessageDelta { delta, .. } = &events[8] else {
            unreachable!("expected message_delta");
        };
        assert_eq!(delta.stop_reason, Some(StopReason::ToolUse));
    }

    #[test]
    fn plain_text_stream() {
        let (events, usage) = run_script(
            ChatStreamTranslator::new("gpt-4o"),
            &[
                r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"}}]}"#,
                r#"{"choices":[{"index":0,"delta":{"content":"lo"}}]}"#,
                r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}],"usage":{"prompt_tokens":5,"completion_tokens":2,"total_tokens":7}}"#,
                "[DONE]",
            ],
        );

        assert_eq!(
            event_names(&events),
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );
        assert_eq!(usage.input_tokens, 5);
        assert_eq!(usage.output_tokens, 2);
    }

    #[test]
    fn mid_stream_disconnect_still_closes_every_block() {
        // No [DONE], no finish_reason: upstream died. The tail must still
        // close the open block and terminate the message.
        let (events, _) = run_script(
            ChatStreamTranslator::new("gpt-4o"),
            &[r#"{"choices":[{"index":0,"delta":{"content":"Hel"}}]}"#],
        );

        assert_eq!(
            event_names(&events),
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );
    }

    #[test]
    fn empty_stream_still_emits_envelope() {
        let (events, _) = run_script(ChatStreamTranslator::new("gpt-4o"), &["[DONE]"]);

        assert_eq!(event_names(&events), vec!["message_start", "message_delta", "message_stop"]);

        let StreamEvent::MessageStart { message } = &events[0] else {
            unreachable!("expected message_start first");
        };
        assert!(message.id.starts_with("msg_"));
        assert_eq!(message.model, "gpt-4o");
    }

    #[test]
    fn malformed_chunks_are_skipped() {
        let (events, _) = run_script(
            ChatStreamTranslator::new("gpt-4o"),
            &[
                "not json at all",
                r#"{"choices":[{"index":0,"delta":{"content":"ok"}}]}"#,
                "[DONE]",
            ],
        );

        assert_eq!(
            event_names(&events),
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );
    }

    #[test]
    fn interleaved_text_reopens_a_fresh_block() {
        // Text after a tool call closes the tool block and opens a new text
        // block at the next index.
        let (events, _) = run_script(
            ChatStreamTranslator::new("gpt-4o"),
            &[
                r#"{"choices":[{"index":0,"delta":{"content":"a"}}]}"#,
                r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"f","arguments":"{}"}}]}}]}"#,
                r#"{"choices":[{"index":0,"delta":{"content":"b"}}]}"#,
                "[DONE]",
            ],
        );

        let starts: Vec<u32> = events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::ContentBlockStart { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        let stops: Vec<u32> = events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::ContentBlockStop { index } => Some(*index),
                _ => None,
            })
            .collect();

        assert_eq!(starts, vec![0, 1, 2]);
        // Every opened block is closed exactly once.
        let mut sorted = stops.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2]);
    }
}
