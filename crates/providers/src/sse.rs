//! Stream aggregation: raw SSE bytes in, normalized [`StreamEvent`]s out.
//!
//! Both provider variants deliver `data: <json>` frames separated by a blank
//! line. Frames are cut at the byte level before decoding, so a multibyte
//! character split across two network chunks is reassembled before it is
//! ever turned into text. Each complete `data:` payload is then handed to a
//! format-specific parser that keeps just enough state to produce
//! `Start`, `Delta`, and exactly one terminal event.

use std::time::Duration;

use bytes::{Buf, BytesMut};
use futures_util::{Stream, StreamExt};
use pw_domain::error::{Error, FailureClass};
use pw_domain::stream::{BoxStream, StreamEvent, Usage};
use serde_json::Value;

/// Wire format of the frames being aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// Anthropic Messages API events (`message_start`, `content_block_delta`, ...).
    Direct,
    /// OpenAI-style chunks terminated by `data: [DONE]`.
    ///
    /// `prompt_chars` is the character length of the system prompt plus every
    /// message, used to estimate input tokens when the relay omits usage.
    Relay { prompt_chars: usize },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Frame splitting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Extract complete `data:` payloads from an SSE byte buffer.
///
/// SSE events are delimited by `\n\n`. Each event block may contain
/// `event:`, `data:`, `id:`, or `retry:` lines; only `data:` lines are kept.
///
/// The buffer is drained in place: consumed bytes are removed and any
/// trailing partial event (including a partial UTF-8 sequence) remains for
/// the next call.
pub(crate) fn drain_data_lines(buffer: &mut BytesMut) -> Vec<String> {
    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.windows(2).position(|w| w == b"\n\n") {
        let block = buffer.split_to(pos);
        buffer.advance(2);

        let block = String::from_utf8_lossy(&block);
        for line in block.lines() {
            let line = line.trim();
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    data_lines.push(data.to_string());
                }
            }
        }
    }

    data_lines
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Frame parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-stream parsing state shared by both formats.
struct Aggregator {
    format: FrameFormat,
    provider: String,
    model: String,
    started: bool,
    finished: bool,
    output_chars: usize,
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

impl Aggregator {
    fn new(format: FrameFormat, provider: &str, requested_model: &str) -> Self {
        Self {
            format,
            provider: provider.to_string(),
            model: requested_model.to_string(),
            started: false,
            finished: false,
            output_chars: 0,
            input_tokens: None,
            output_tokens: None,
        }
    }

    /// Feed one `data:` payload. Malformed JSON yields nothing.
    fn on_data(&mut self, data: &str) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        let mut events = Vec::new();
        match self.format {
            FrameFormat::Direct => self.on_direct(data, &mut events),
            FrameFormat::Relay { prompt_chars } => self.on_relay(data, prompt_chars, &mut events),
        }
        if events.iter().any(StreamEvent::is_terminal) {
            self.finished = true;
        }
        events
    }

    fn on_direct(&mut self, data: &str, events: &mut Vec<StreamEvent>) {
        let Ok(v) = serde_json::from_str::<Value>(data) else {
            tracing::debug!(provider = %self.provider, "skipping malformed frame");
            return;
        };

        match v.get("type").and_then(Value::as_str).unwrap_or("") {
            "message_start" => {
                if let Some(msg) = v.get("message") {
                    if let Some(model) = msg.get("model").and_then(Value::as_str) {
                        self.model = model.to_string();
                    }
                    if let Some(usage) = msg.get("usage") {
                        self.input_tokens = token_field(usage, "input_tokens");
                        self.output_tokens = token_field(usage, "output_tokens");
                    }
                }
                self.ensure_started(events);
            }
            "content_block_delta" => {
                let text = v
                    .get("delta")
                    .filter(|d| d.get("type").and_then(Value::as_str) == Some("text_delta"))
                    .and_then(|d| d.get("text"))
                    .and_then(Value::as_str);
                if let Some(text) = text {
                    self.push_delta(text, events);
                }
            }
            "message_delta" => {
                if let Some(output) = v.get("usage").and_then(|u| token_field(u, "output_tokens")) {
                    self.output_tokens = Some(output);
                }
            }
            "message_stop" => {
                self.ensure_started(events);
                let usage = Usage::exact(
                    self.input_tokens.unwrap_or(0),
                    self.output_tokens.unwrap_or(0),
                );
                events.push(StreamEvent::Complete { usage });
            }
            "error" => {
                let msg = v
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error");
                events.push(self.provider_error(msg));
            }
            // ping, content_block_start/stop and future event types
            _ => {}
        }
    }

    fn on_relay(&mut self, data: &str, prompt_chars: usize, events: &mut Vec<StreamEvent>) {
        if data == "[DONE]" {
            self.ensure_started(events);
            let usage = match (self.input_tokens, self.output_tokens) {
                (Some(input), Some(output)) => Usage::exact(input, output),
                _ => Usage::estimate(prompt_chars, self.output_chars),
            };
            events.push(StreamEvent::Complete { usage });
            return;
        }

        let Ok(v) = serde_json::from_str::<Value>(data) else {
            tracing::debug!(provider = %self.provider, "skipping malformed frame");
            return;
        };

        if let Some(err) = v.get("error") {
            let msg = err
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            events.push(self.provider_error(&msg));
            return;
        }

        if !self.started {
            if let Some(model) = v.get("model").and_then(Value::as_str) {
                self.model = model.to_string();
            }
            self.ensure_started(events);
        }

        if let Some(usage) = v.get("usage").filter(|u| u.is_object()) {
            self.input_tokens = token_field(usage, "prompt_tokens");
            self.output_tokens = token_field(usage, "completion_tokens");
        }

        let text = v
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("delta"))
            .and_then(|d| d.get("content"))
            .and_then(Value::as_str);
        if let Some(text) = text {
            self.push_delta(text, events);
        }
    }

    /// The source ended. Returns the terminal event if none was produced.
    fn on_close(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        self.finished = true;
        Some(StreamEvent::Error {
            message: "transport: stream closed before completion".into(),
            class: FailureClass::Transport,
        })
    }

    fn ensure_started(&mut self, events: &mut Vec<StreamEvent>) {
        if !self.started {
            self.started = true;
            events.push(StreamEvent::Start {
                model: self.model.clone(),
            });
        }
    }

    fn push_delta(&mut self, text: &str, events: &mut Vec<StreamEvent>) {
        if text.is_empty() {
            return;
        }
        self.ensure_started(events);
        self.output_chars += text.chars().count();
        events.push(StreamEvent::Delta {
            content: text.to_string(),
        });
    }

    fn provider_error(&self, message: &str) -> StreamEvent {
        StreamEvent::from_error(&Error::Provider {
            provider: self.provider.clone(),
            message: message.to_string(),
        })
    }
}

fn token_field(usage: &Value, key: &str) -> Option<u32> {
    usage
        .get(key)
        .and_then(Value::as_u64)
        .map(|n| n.min(u32::MAX as u64) as u32)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stream assembly
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Turn a source of raw byte chunks into normalized stream events.
///
/// The returned stream is forward-only and ends right after its first
/// terminal event. A chunk error, a gap longer than `idle_timeout`, or the
/// source closing before the format's terminal frame each produce a
/// transport-class `Error`.
pub fn aggregate<S, B>(
    source: S,
    format: FrameFormat,
    provider: &str,
    requested_model: &str,
    idle_timeout: Duration,
) -> BoxStream<'static, StreamEvent>
where
    S: Stream<Item = Result<B, Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let mut state = Aggregator::new(format, provider, requested_model);

    let stream = async_stream::stream! {
        let mut source = Box::pin(source);
        let mut buffer = BytesMut::new();

        'read: loop {
            let next = match tokio::time::timeout(idle_timeout, source.next()).await {
                Ok(next) => next,
                Err(_) => {
                    let err = Error::Transport(format!(
                        "no data from provider for {}s",
                        idle_timeout.as_secs()
                    ));
                    yield StreamEvent::from_error(&err);
                    break;
                }
            };

            match next {
                Some(Ok(chunk)) => {
                    buffer.extend_from_slice(chunk.as_ref());
                    for data in drain_data_lines(&mut buffer) {
                        for event in state.on_data(&data) {
                            let terminal = event.is_terminal();
                            yield event;
                            if terminal {
                                break 'read;
                            }
                        }
                    }
                }
                Some(Err(err)) => {
                    yield StreamEvent::from_error(&err);
                    break;
                }
                None => {
                    // Flush a final event that lacked its trailing blank line.
                    if !buffer.iter().all(u8::is_ascii_whitespace) {
                        buffer.extend_from_slice(b"\n\n");
                        for data in drain_data_lines(&mut buffer) {
                            for event in state.on_data(&data) {
                                let terminal = event.is_terminal();
                                yield event;
                                if terminal {
                                    break 'read;
                                }
                            }
                        }
                    }
                    if let Some(event) = state.on_close() {
                        yield event;
                    }
                    break;
                }
            }
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
