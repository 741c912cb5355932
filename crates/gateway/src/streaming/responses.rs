//! State machine translating a "responses"-envelope event stream into the
//! source event vocabulary.
//!
//! Unlike the chat family, these upstreams emit typed events
//! (`response.output_item.added`, `response.output_text.delta`, ...) with an
//! explicit terminal `response.completed`. Output items map onto source
//! content blocks: messages become text blocks, function calls become
//! tool_use blocks (ids translated back through the request's
//! [`CallIdBridge`]), reasoning summaries become thinking blocks.

use crate::{
    messages::{
        anthropic::{ContentBlock, ContentDelta, MessageDeltaBody, MessageStart, Role, StopReason, StreamEvent, Usage},
        responses::{OutputItem, ResponsesResponse, ResponsesStreamEvent},
    },
    translate::{CallIdBridge, responses::derive_stop_reason},
};

use super::{Step, StreamTranslator};

#[derive(Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Text,
    Tool,
    Thinking,
}

/// The currently open source block and the upstream output item feeding it.
struct OpenBlock {
    output_index: usize,
    block_index: u32,
    kind: BlockKind,
}

/// Per-stream translation state for responses-envelope upstreams.
pub(crate) struct ResponsesStreamTranslator {
    message_id: String,
    model: String,
    bridge: CallIdBridge,
    started: bool,
    finished: bool,
    next_index: u32,
    open: Option<OpenBlock>,
    saw_function_call: bool,
    usage: Usage,
    stop_reason: Option<StopReason>,
}

impl ResponsesStreamTranslator {
    pub(crate) fn new(model: impl Into<String>, bridge: CallIdBridge) -> Self {
        Self {
            message_id: crate::translate::new_message_id(),
            model: model.into(),
            bridge,
            started: false,
            finished: false,
            next_index: 0,
            open: None,
            saw_function_call: false,
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
        if let Some(open) = self.open.take() {
            events.push(StreamEvent::ContentBlockStop {
                index: open.block_index,
            });
        }
    }

    /// Make sure a block of `kind` fed by `output_index` is open, closing
    /// whatever else was open first.
    fn ensure_block(&mut self, output_index: usize, kind: BlockKind, events: &mut Vec<StreamEvent>) -> u32 {
        if let Some(open) = &self.open
            && open.output_index == output_index
            && open.kind == kind
        {
            return open.block_index;
        }

        self.close_open(events);

        let block_index = self.next_index;
        self.next_index += 1;

        let content_block = match kind {
            BlockKind::Text => ContentBlock::Text { text: String::new() },
            BlockKind::Thinking => ContentBlock::Thinking {
                thinking: String::new(),
            },
            // Tool blocks are opened explicitly in `item_added`, which has
            // the id and name; this path only covers text-like kinds.
            BlockKind::Tool => ContentBlock::Text { text: String::new() },
        };

        events.push(StreamEvent::ContentBlockStart {
            index: block_index,
            content_block,
        });

        self.open = Some(OpenBlock {
            output_index,
            block_index,
            kind,
        });

        block_index
    }

    fn item_added(&mut self, output_index: usize, item: OutputItem, events: &mut Vec<StreamEvent>) {
        // Only function calls open their block eagerly: the id and name are
        // known here and must ride on content_block_start. Message and
        // reasoning items wait for their first delta.
        let OutputItem::FunctionCall { call_id, name, .. } = item else {
            return;
        };

        self.close_open(events);
        self.saw_function_call = true;

        let block_index = self.next_index;
        self.next_index += 1;

        events.push(StreamEvent::ContentBlockStart {
            index: block_index,
            content_block: ContentBlock::ToolUse {
                id: self.bridge.source_id(&call_id),
                name,
                input: serde_json::Value::Object(serde_json::Map::new()),
            },
        });

        self.open = Some(OpenBlock {
            output_index,
            block_index,
            kind: BlockKind::Tool,
        });
    }

    fn complete(&mut self, response: ResponsesResponse) {
        if let Some(usage) = response.usage {
            self.usage = Usage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
            };
        }

        let has_calls = self.saw_function_call
            || response
                .output
                .iter()
                .any(|item| matches!(item, OutputItem::FunctionCall { .. }));

        self.stop_reason = Some(derive_stop_reason(
            has_calls,
            response.status.as_deref(),
            response
                .incomplete_details
                .as_ref()
                .and_then(|details| details.reason.as_deref()),
        ));
    }
}

impl StreamTranslator for ResponsesStreamTranslator {
    fn handle(&mut self, data: &str) -> Step {
        let event: ResponsesStreamEvent = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(e) => {
                log::warn!("skipping malformed responses stream event: {e}");
                return Step::none();
            }
        };

        let mut events = Vec::new();

        match event {
            ResponsesStreamEvent::Created { .. } => {
                self.ensure_started(&mut events);
            }
            ResponsesStreamEvent::OutputItemAdded { output_index, item } => {
                self.ensure_started(&mut events);
                self.item_added(output_index, item, &mut events);
            }
            ResponsesStreamEvent::OutputTextDelta { output_index, delta } => {
                self.ensure_started(&mut events);
                let index = self.ensure_block(output_index, BlockKind::Text, &mut events);
                events.push(StreamEvent::ContentBlockDelta {
                    index,
                    delta: ContentDelta::TextDelta { text: delta },
                });
            }
            ResponsesStreamEvent::ReasoningSummaryTextDelta { output_index, delta } => {
                self.ensure_started(&mut events);
                let index = self.ensure_block(output_index, BlockKind::Thinking, &mut events);
                events.push(StreamEvent::ContentBlockDelta {
                    index,
                    delta: ContentDelta::ThinkingDelta { thinking: delta },
                });
            }
            ResponsesStreamEvent::FunctionCallArgumentsDelta { output_index, delta } => {
                self.ensure_started(&mut events);

                match &self.open {
                    Some(open) if open.output_index == output_index && open.kind == BlockKind::Tool => {
                        events.push(StreamEvent::ContentBlockDelta {
                            index: open.block_index,
                            delta: ContentDelta::InputJsonDelta { partial_json: delta },
                        });
                    }
                    _ => {
                        log::debug!("dropping argument fragment for unopened function call {output_index}");
                    }
                }
            }
            ResponsesStreamEvent::OutputItemDone { output_index, .. } => {
                if self.open.as_ref().is_some_and(|open| open.output_index == output_index) {
                    self.close_open(&mut events);
                }
            }
            ResponsesStreamEvent::Completed { response } => {
                self.complete(response);
                return Step {
                    events,
                    done: true,
                };
            }
            ResponsesStreamEvent::Incomplete { response } => {
                if let Some(response) = response {
                    self.complete(response);
                }
                return Step {
                    events,
                    done: true,
                };
            }
            ResponsesStreamEvent::Failed { .. } => {
                log::warn!("upstream reported response failure mid-stream");
                return Step {
                    events,
                    done: true,
                };
            }
            ResponsesStreamEvent::Other(value) => {
                log::trace!("ignoring uninterpreted stream event: {}", value["type"]);
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

        self.ensure_started(&mut events);
        self.close_open(&mut events);

        let stop_reason = self.stop_reason.unwrap_or(if self.saw_function_call {
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
