//! Stream translation: upstream SSE in, source-dialect event stream out.
//!
//! Each upstream family has an explicit per-stream state machine
//! ([`chat::ChatStreamTranslator`], [`responses::ResponsesStreamTranslator`])
//! that consumes raw `data:` payloads and emits source-dialect events. The
//! [`pump`] wires a state machine to an upstream byte stream and a response
//! body: a task reads upstream events, feeds the machine, and pushes encoded
//! frames into a channel the body drains. When upstream ends, cleanly or
//! not, the machine's `finish` closes every open block and emits the
//! terminal `message_stop`, so the downstream parser never deadlocks.

pub mod chat;
pub mod responses;

use axum::body::Body;
use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::{StreamExt, stream};
use tokio::sync::mpsc;

use crate::messages::anthropic::{StopReason, StreamEvent, Usage};

/// One step of a stream state machine.
pub(crate) struct Step {
    /// Events to emit downstream, in order.
    pub events: Vec<StreamEvent>,
    /// Whether the upstream signalled its terminal event.
    pub done: bool,
}

impl Step {
    pub(crate) fn events(events: Vec<StreamEvent>) -> Self {
        Self { events, done: false }
    }

    pub(crate) fn none() -> Self {
        Self {
            events: Vec::new(),
            done: false,
        }
    }

    pub(crate) fn done() -> Self {
        Self {
            events: Vec::new(),
            done: true,
        }
    }
}

/// A per-stream translation state machine.
pub(crate) trait StreamTranslator: Send + 'static {
    /// Consume one upstream `data:` payload.
    fn handle(&mut self, data: &str) -> Step;

    /// Close every open block and emit the terminal events. Idempotent.
    fn finish(&mut self) -> Vec<StreamEvent>;

    /// Usage observed so far, for cost recording at stream close.
    fn usage(&self) -> Usage;

    /// Final stop reason, once known.
    fn stop_reason(&self) -> Option<StopReason>;
}

/// Encode one source-dialect event as an SSE frame.
pub(crate) fn sse_frame(event: &StreamEvent) -> Bytes {
    let data = serde_json::to_string(event).unwrap_or_else(|e| {
        log::error!("failed to serialize stream event: {e}");
        "{}".to_string()
    });

    Bytes::from(format!("event: {}\ndata: {}\n\n", event.name(), data))
}

/// Invoked once when the translated stream completes, with the final usage
/// and stop reason.
pub(crate) type CompletionHook = Box<dyn FnOnce(Usage, Option<StopReason>) + Send>;

/// Drive `translator` over the upstream response and return the downstream
/// body.
///
/// Parse errors on individual upstream lines are logged and skipped; an
/// upstream transport error or early close falls through to `finish`, which
/// still produces a well-formed event tail.
pub(crate) fn pump<T>(upstream: reqwest::Response, mut translator: T, on_complete: CompletionHook) -> Body
where
    T: StreamTranslator,
{
    let mut events = Box::pin(upstream.bytes_stream().eventsource());
    let (tx, rx) = mpsc::channel::<Bytes>(32);

    tokio::spawn(async move {
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    let step = translator.handle(&event.data);

                    for event in &step.events {
                        if tx.send(sse_frame(event)).await.is_err() {
                            // Client went away; nothing left to translate for.
                            return;
                        }
                    }

                    if step.done {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("upstream stream error, closing downstream cleanly: {e}");
                    break;
                }
            }
        }

        for event in translator.finish() {
            if tx.send(sse_frame(&event)).await.is_err() {
                return;
            }
        }

        on_complete(translator.usage(), translator.stop_reason());
    });

    body_from_receiver(rx)
}

/// Copy upstream SSE bytes to the client unmodified (passthrough mode).
pub(crate) fn passthrough_body(upstream: reqwest::Response) -> Body {
    let stream = upstream.bytes_stream().map(|chunk| match chunk {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            log::warn!("passthrough stream error: {e}");
            Err(std::io::Error::other(e))
        }
    });

    Body::from_stream(stream)
}

fn body_from_receiver(rx: mpsc::Receiver<Bytes>) -> Body {
    let stream = stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|bytes| (Ok::<_, std::convert::Infallible>(bytes), rx))
    });

    Body::from_stream(stream)
}

/// Collect a translator's full output for a scripted upstream, test-side.
#[cfg(test)]
pub(crate) fn run_script<T: StreamTranslator>(mut translator: T, lines: &[&str]) -> (Vec<StreamEvent>, Usage) {
    let mut out = Vec::new();

    for line in lines {
        let step = translator.handle(line);
        out.extend(step.events);
        if step.done {
            break;
        }
    }

    out.extend(translator.finish());
    let usage = translator.usage();

    (out, usage)
}

#[cfg(test)]
pub(crate) fn event_names(events: &[StreamEvent]) -> Vec<&'static str> {
    events.iter().map(StreamEvent::name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::anthropic::ContentDelta;

    #[test]
    fn sse_frame_carries_event_name_and_data() {
        let frame = sse_frame(&StreamEvent::ContentBlockDelta {
            index: 0,
            delta: ContentDelta::TextDelta {
                text: "Hi".to_string(),
            },
        });

        let text = String::from_utf8(frame.to_vec()).unwrap();
        assert!(text.starts_with("event: content_block_delta\ndata: "));
        assert!(text.ends_with("\n\n"));
        assert!(text.contains(r#""text":"Hi""#));
    }

    #[test]
    fn message_stop_frame() {
        let text = String::from_utf8(sse_frame(&StreamEvent::MessageStop).to_vec()).unwrap();
        assert_eq!(text, "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n");
    }
}
