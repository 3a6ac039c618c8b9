use pw_domain::cost::ModelTier;
use pw_domain::message::ChatMessage;
use pw_domain::stream::{BoxStream, StreamEvent};
use serde::Serialize;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic streamed completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Resolved model name (see [`LlmProvider::model_for`]).
    pub model: String,
    /// System prompt, passed separately from the message history.
    pub system: String,
    /// Ordered user/assistant history.
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Characters in the system prompt and every message.
    pub fn prompt_chars(&self) -> usize {
        self.system.chars().count()
            + self
                .messages
                .iter()
                .map(|m| m.content.chars().count())
                .sum::<usize>()
    }
}

/// Which provider variant is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Direct,
    Relay,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every completion adapter implements.
///
/// `stream` never fails out of band: configuration, HTTP and transport
/// failures all arrive as a terminal [`StreamEvent::Error`]. Dropping the
/// returned stream aborts the underlying request.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Open one streamed completion.
    async fn stream(&self, req: CompletionRequest) -> BoxStream<'static, StreamEvent>;

    /// Model name requested for a tier.
    fn model_for(&self, tier: ModelTier) -> String;

    fn kind(&self) -> ProviderKind;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_chars_counts_system_and_messages() {
        let req = CompletionRequest {
            model: "m".into(),
            system: "abcd".into(),
            messages: vec![ChatMessage::user("héllo"), ChatMessage::assistant("ok")],
            max_tokens: 10,
        };
        assert_eq!(req.prompt_chars(), 11);
    }
}
