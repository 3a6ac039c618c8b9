use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::FailureClass;

/// A boxed async stream, used for LLM streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Normalized events produced by the stream aggregator (provider-agnostic).
///
/// A well-formed sequence is `Start`, zero or more `Delta`, then exactly one
/// terminal event (`Complete` or `Error`). Nothing follows a terminal event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// The provider accepted the request; carries the resolved model name.
    Start { model: String },

    /// An incremental text fragment. Fragments concatenate in emission order.
    Delta { content: String },

    /// The completion finished.
    Complete { usage: Usage },

    /// The stream failed. Always terminal.
    Error {
        #[serde(rename = "error")]
        message: String,
        class: FailureClass,
    },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }

    /// Build a terminal error event from a domain error.
    pub fn from_error(err: &crate::error::Error) -> Self {
        StreamEvent::Error {
            message: err.to_string(),
            class: err.failure_class(),
        }
    }
}

/// Token usage for one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// `true` when the counts are a characters/4 approximation rather than
    /// figures reported by the provider.
    #[serde(default)]
    pub estimated: bool,
}

impl Usage {
    pub fn exact(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            estimated: false,
        }
    }

    /// Approximate token counts from character lengths (chars / 4, rounded up).
    pub fn estimate(input_chars: usize, output_chars: usize) -> Self {
        Self {
            input_tokens: estimate_tokens(input_chars),
            output_tokens: estimate_tokens(output_chars),
            estimated: true,
        }
    }

    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(chars: usize) -> u32 {
    chars.div_ceil(4).min(u32::MAX as usize) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_tokens(0), 0);
        assert_eq!(estimate_tokens(1), 1);
        assert_eq!(estimate_tokens(4), 1);
        assert_eq!(estimate_tokens(5), 2);
        let u = Usage::estimate(9, 8);
        assert_eq!(u.input_tokens, 3);
        assert_eq!(u.output_tokens, 2);
        assert!(u.estimated);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(StreamEvent::Delta {
            content: "hi".into(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "delta", "content": "hi"}));

        let json = serde_json::to_value(StreamEvent::Error {
            message: "boom".into(),
            class: FailureClass::Transport,
        })
        .unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["error"], "boom");
        assert_eq!(json["class"], "transport");
    }

    #[test]
    fn only_complete_and_error_are_terminal() {
        assert!(!StreamEvent::Start { model: "m".into() }.is_terminal());
        assert!(!StreamEvent::Delta { content: "x".into() }.is_terminal());
        assert!(StreamEvent::Complete {
            usage: Usage::default()
        }
        .is_terminal());
    }
}
