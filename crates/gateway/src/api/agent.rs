//! Stateless streaming endpoint used by the browser UI.
//!
//! - `POST /api/agent`: one provider call per request; the normalized
//!   events are re-streamed as `data: {"type": ...}` frames and closed
//!   with `data: [DONE]`.

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures_util::stream::Stream;
use futures_util::StreamExt;
use serde::Deserialize;

use pw_domain::context::BusinessContext;
use pw_domain::cost::{CostEstimate, ModelTier};
use pw_domain::error::Error;
use pw_domain::message::{ChatMessage, Role};
use pw_domain::page::{PageStructure, SectionContent, SectionCopyDraft, SectionKind};
use pw_domain::stream::{BoxStream, StreamEvent};
use pw_prompts::RefinementCommand;
use pw_providers::CompletionRequest;

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentAction {
    Chat,
    Understand,
    Structure,
    Copy,
    Code,
    Refine,
}

/// A message as the UI sends it; system entries are dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub action: AgentAction,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub context: BusinessContext,
    #[serde(default)]
    pub model_tier: ModelTier,
    #[serde(default)]
    pub page_structure: Option<PageStructure>,
    /// Copy per section id, in the loose shape the model produced.
    #[serde(default)]
    pub section_contents: BTreeMap<String, SectionCopyDraft>,
    #[serde(default)]
    pub section_type: Option<String>,
    #[serde(default)]
    pub section_title: Option<String>,
    #[serde(default)]
    pub current_code: Option<String>,
    #[serde(default)]
    pub refinement_command: Option<String>,
    #[serde(default)]
    pub target_section: Option<String>,
    #[serde(default)]
    pub preferences: Option<String>,
}

/// System prompt and message list for one action.
#[derive(Debug)]
pub struct PlannedCall {
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

/// Check the fields `action` needs and build its prompt.
pub fn plan(body: &AgentRequest) -> Result<PlannedCall, Error> {
    let history = || -> Vec<ChatMessage> {
        body.messages
            .iter()
            .filter(|m| !m.content.trim().is_empty())
            .filter_map(|m| match m.role {
                Role::User => Some(ChatMessage::user(m.content.clone())),
                Role::Assistant => Some(ChatMessage::assistant(m.content.clone())),
                Role::System => None,
            })
            .collect()
    };
    let message = || {
        body.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    };
    let single = |prompt: pw_prompts::Prompt| PlannedCall {
        system: prompt.system,
        messages: vec![ChatMessage::user(prompt.user)],
    };

    match body.action {
        AgentAction::Chat => {
            let mut messages = history();
            if let Some(m) = message() {
                messages.push(ChatMessage::user(m));
            }
            if messages.is_empty() {
                return Err(Error::Validation(
                    "chat requires `message` or `messages`".into(),
                ));
            }
            Ok(PlannedCall {
                system: pw_prompts::conversation(&body.context),
                messages,
            })
        }
        AgentAction::Understand => {
            let m = message()
                .ok_or_else(|| Error::Validation("understand requires `message`".into()))?;
            let prompt = pw_prompts::understanding(m, &body.context);
            let mut messages = history();
            messages.push(ChatMessage::user(prompt.user));
            Ok(PlannedCall {
                system: prompt.system,
                messages,
            })
        }
        AgentAction::Structure => Ok(single(pw_prompts::structure(
            &body.context,
            body.preferences.as_deref(),
        ))),
        AgentAction::Copy => {
            let raw = body
                .section_type
                .as_deref()
                .ok_or_else(|| Error::Validation("copy requires `sectionType`".into()))?;
            let kind = SectionKind::parse(raw)
                .ok_or_else(|| Error::Validation(format!("unknown sectionType: {raw}")))?;
            let structure = require_structure(body, "copy")?;
            let title = body
                .section_title
                .clone()
                .unwrap_or_else(|| kind.as_str().to_string());
            Ok(single(pw_prompts::section_copy(
                kind,
                &title,
                &body.context,
                structure,
            )))
        }
        AgentAction::Code => {
            let structure = require_structure(body, "code")?;
            let contents = typed_contents(structure, &body.section_contents)?;
            Ok(single(pw_prompts::code_generation(
                structure,
                &contents,
                &body.context,
            )))
        }
        AgentAction::Refine => {
            let code = body
                .current_code
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| Error::Validation("refine requires `currentCode`".into()))?;
            let raw = body.refinement_command.as_deref().ok_or_else(|| {
                Error::Validation("refine requires `refinementCommand`".into())
            })?;
            let command = RefinementCommand::parse(raw)
                .ok_or_else(|| Error::Validation(format!("unknown refinementCommand: {raw}")))?;
            Ok(single(pw_prompts::refinement(
                command,
                code,
                body.target_section.as_deref(),
            )))
        }
    }
}

fn require_structure<'a>(body: &'a AgentRequest, action: &str) -> Result<&'a PageStructure, Error> {
    let structure = body
        .page_structure
        .as_ref()
        .ok_or_else(|| Error::Validation(format!("{action} requires `pageStructure`")))?;
    if structure.sections.is_empty() {
        return Err(Error::Validation("`pageStructure` has no sections".into()));
    }
    Ok(structure)
}

/// Type the loose per-section copy using each section's kind.
fn typed_contents(
    structure: &PageStructure,
    drafts: &BTreeMap<String, SectionCopyDraft>,
) -> Result<BTreeMap<String, SectionContent>, Error> {
    let mut out = BTreeMap::new();
    for (id, draft) in drafts {
        let section = structure
            .section(id)
            .ok_or_else(|| Error::Validation(format!("sectionContents has unknown id: {id}")))?;
        let content = SectionContent::from_draft(section.kind, draft.clone())
            .map_err(|e| Error::Validation(format!("sectionContents[{id}]: {e}")))?;
        out.insert(id.clone(), content);
    }
    Ok(out)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/agent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn agent(
    State(state): State<AppState>,
    body: Result<Json<AgentRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let planned = match plan(&body) {
        Ok(p) => p,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let provider = match state.require_provider() {
        Ok(p) => p.clone(),
        Err(message) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, message),
    };

    let tier = body.model_tier;
    let req = CompletionRequest {
        model: provider.model_for(tier),
        system: planned.system,
        messages: planned.messages,
        max_tokens: state.config.llm.max_tokens,
    };
    tracing::debug!(
        action = ?body.action,
        model = %req.model,
        messages = req.messages.len(),
        "agent request"
    );

    let pricing = state.config.llm.pricing.for_tier(tier);
    let requested = req.model.clone();
    let events = provider.stream(req).await;

    Sse::new(reemit(events, move |usage, model| {
        CostEstimate::for_call(usage, pricing, model.unwrap_or(&requested))
    }))
    .keep_alive(KeepAlive::default())
    .into_response()
}

/// Re-emit provider events as `data:` frames, adding the call's cost to
/// `complete`, then the `[DONE]` sentinel.
fn reemit<F>(
    mut events: BoxStream<'static, StreamEvent>,
    price: F,
) -> impl Stream<Item = Result<Event, Infallible>>
where
    F: Fn(&pw_domain::stream::Usage, Option<&str>) -> CostEstimate + Send + 'static,
{
    async_stream::stream! {
        let mut model: Option<String> = None;
        while let Some(event) = events.next().await {
            let mut frame = serde_json::to_value(&event).unwrap_or_default();
            match &event {
                StreamEvent::Start { model: m } => model = Some(m.clone()),
                StreamEvent::Complete { usage } => {
                    let cost = price(usage, model.as_deref());
                    if let (Some(obj), Ok(cost)) = (frame.as_object_mut(), serde_json::to_value(cost)) {
                        obj.insert("cost".into(), cost);
                    }
                }
                _ => {}
            }
            yield Ok(Event::default().data(frame.to_string()));
            if event.is_terminal() {
                break;
            }
        }
        yield Ok(Event::default().data("[DONE]"));
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> AgentRequest {
        serde_json::from_value(json).unwrap()
    }

    fn outline() -> serde_json::Value {
        serde_json::json!({
            "title": "T",
            "description": "D",
            "sections": [
                {"id": "section-1", "type": "hero", "title": "Hero", "order": 1},
                {"id": "section-2", "type": "cta", "title": "CTA", "order": 2}
            ]
        })
    }

    #[test]
    fn copy_without_section_type_is_rejected() {
        let body = request(serde_json::json!({"action": "copy", "pageStructure": outline()}));
        let err = plan(&body).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("sectionType"));
    }

    #[test]
    fn copy_with_section_type_builds_one_turn() {
        let body = request(serde_json::json!({
            "action": "copy",
            "sectionType": "Hero",
            "sectionTitle": "Welcome",
            "pageStructure": outline()
        }));
        let planned = plan(&body).unwrap();
        assert_eq!(planned.messages.len(), 1);
        assert!(planned.system.contains("Section guidance (hero)"));
        assert!(planned.messages[0].content.contains("\"Welcome\""));
    }

    #[test]
    fn chat_drops_system_messages() {
        let body = request(serde_json::json!({
            "action": "chat",
            "messages": [
                {"role": "system", "content": "ignored"},
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"}
            ],
            "message": "make it blue"
        }));
        let planned = plan(&body).unwrap();
        assert_eq!(planned.messages.len(), 3);
        assert_eq!(planned.messages[2].content, "make it blue");
    }

    #[test]
    fn chat_needs_some_input() {
        let body = request(serde_json::json!({"action": "chat"}));
        assert!(matches!(plan(&body), Err(Error::Validation(_))));
    }

    #[test]
    fn refine_validates_command() {
        let body = request(serde_json::json!({
            "action": "refine",
            "currentCode": "export default function Page() {}",
            "refinementCommand": "make_it_pop"
        }));
        assert!(plan(&body).unwrap_err().to_string().contains("make_it_pop"));

        let body = request(serde_json::json!({
            "action": "refine",
            "currentCode": "export default function Page() {}",
            "refinementCommand": "ADD_URGENCY"
        }));
        assert!(plan(&body).is_ok());
    }

    #[test]
    fn code_rejects_copy_for_unknown_sections() {
        let body = request(serde_json::json!({
            "action": "code",
            "pageStructure": outline(),
            "sectionContents": {"section-9": {"headline": "x"}}
        }));
        assert!(plan(&body).unwrap_err().to_string().contains("section-9"));
    }

    #[tokio::test]
    async fn reemit_adds_cost_and_sentinel() {
        use pw_domain::cost::PriceTable;
        use pw_domain::stream::Usage;

        let events: BoxStream<'static, StreamEvent> = Box::pin(futures_util::stream::iter(vec![
            StreamEvent::Start { model: "m".into() },
            StreamEvent::Delta { content: "hi".into() },
            StreamEvent::Complete {
                usage: Usage::exact(1_000_000, 0),
            },
        ]));
        let pricing = PriceTable::default().standard;
        let frames: Vec<_> = reemit(events, move |u, m| {
            CostEstimate::for_call(u, pricing, m.unwrap_or("?"))
        })
        .collect()
        .await;
        assert_eq!(frames.len(), 4);
    }
}
