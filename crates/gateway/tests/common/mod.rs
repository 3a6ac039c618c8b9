//! A provider that replays canned replies, in order, one per call.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures_util::stream::{self, StreamExt};

use pw_domain::cost::ModelTier;
use pw_domain::error::FailureClass;
use pw_domain::stream::{BoxStream, StreamEvent, Usage};
use pw_providers::{CompletionRequest, LlmProvider, ProviderKind};

pub enum Script {
    /// Stream the text in small deltas, then complete.
    Reply(String),
    /// Fail before any text arrives.
    Fail(FailureClass, &'static str),
    /// Send one delta, then never finish.
    Hang(&'static str),
}

#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::default(),
        })
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.scripts.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn stream(&self, req: CompletionRequest) -> BoxStream<'static, StreamEvent> {
        let model = req.model.clone();
        self.requests.lock().unwrap().push(req);
        let script = self.scripts.lock().unwrap().pop_front();

        let start = StreamEvent::Start { model };
        match script {
            Some(Script::Reply(text)) => {
                let mut events = vec![start];
                let chars: Vec<char> = text.chars().collect();
                for chunk in chars.chunks(24) {
                    events.push(StreamEvent::Delta {
                        content: chunk.iter().collect(),
                    });
                }
                events.push(StreamEvent::Complete {
                    usage: Usage::exact(100, 50),
                });
                stream::iter(events).boxed()
            }
            Some(Script::Fail(class, message)) => stream::iter(vec![
                start,
                StreamEvent::Error {
                    message: message.into(),
                    class,
                },
            ])
            .boxed(),
            Some(Script::Hang(partial)) => stream::iter(vec![
                start,
                StreamEvent::Delta {
                    content: partial.into(),
                },
            ])
            .chain(stream::pending())
            .boxed(),
            None => stream::iter(vec![StreamEvent::Error {
                message: "no scripted reply left".into(),
                class: FailureClass::Provider,
            }])
            .boxed(),
        }
    }

    fn model_for(&self, tier: ModelTier) -> String {
        match tier {
            ModelTier::Standard => "test-standard".into(),
            ModelTier::Premium => "test-premium".into(),
        }
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Direct
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

// ── Canned replies ────────────────────────────────────────────────────

pub const QUESTION: &str = "Happy to help! Who are your customers, and what should visitors do first?";

pub fn outline() -> String {
    "Here's a plan for your page.\n\n```json\n{\"title\":\"Crumb Bakery\",\"description\":\"Neighbourhood bakery\",\"sections\":[{\"type\":\"hero\",\"title\":\"Welcome\",\"order\":1},{\"type\":\"cta\",\"title\":\"Visit us\",\"order\":2}]}\n```\n".into()
}

pub fn hero_copy() -> String {
    "```json\n{\"headline\":\"Bread worth waking up for\",\"subheadline\":\"Baked at dawn, every day\"}\n```".into()
}

pub fn cta_copy(headline: &str) -> String {
    format!("```json\n{{\"headline\":\"{headline}\",\"body\":\"Open 7am to 3pm\"}}\n```")
}

pub fn code(marker: &str) -> String {
    format!("Here is the component.\n\n```tsx\nexport default function Page() {{ return <main>{marker}</main>; }}\n```\n")
}
