//! Session-scoped workflow API.
//!
//! Each session owns one generation conversation. Commands that call the
//! provider answer with an SSE stream of [`WorkflowEvent`]s; the rest are
//! plain JSON.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures_util::stream::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;

use pw_domain::context::BusinessContext;
use pw_domain::cost::ModelTier;
use pw_prompts::RefinementCommand;
use pw_sessions::Session;

use crate::runtime::{WorkflowCommand, WorkflowEvent};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Lifecycle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionBody {
    #[serde(default)]
    pub model_tier: ModelTier,
}

pub async fn create_session(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionBody>>,
) -> impl IntoResponse {
    let tier = body.map(|Json(b)| b.model_tier).unwrap_or_default();
    let session = state.sessions.create(tier);
    flush(&state);
    (StatusCode::CREATED, Json(session.snapshot()))
}

pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.sessions.list();
    Json(serde_json::json!({
        "sessions": sessions,
        "count": sessions.len(),
    }))
}

pub async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.sessions.get(&id) {
        Some(session) => Json(session.snapshot()).into_response(),
        None => not_found(&id),
    }
}

pub async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if state.sessions.remove(&id) {
        if let Some(orchestrator) = &state.orchestrator {
            orchestrator.forget(&id);
        }
        flush(&state);
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_found(&id)
    }
}

/// Clear the session back to idle, cancelling any open stream.
pub async fn reset_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(session) = state.sessions.get(&id) else {
        return not_found(&id);
    };
    session.reset();
    flush(&state);
    Json(session.snapshot()).into_response()
}

/// Abort the in-flight stream. Text already received is kept.
pub async fn stop_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(session) = state.sessions.get(&id) else {
        return not_found(&id);
    };
    let kept = session.cancel_stream();
    Json(serde_json::json!({
        "stopped": kept.is_some(),
        "partialChars": kept.unwrap_or(0),
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierBody {
    pub model_tier: ModelTier,
}

/// Change the tier; the next provider call uses it.
pub async fn set_tier(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TierBody>,
) -> Response {
    let Some(session) = state.sessions.get(&id) else {
        return not_found(&id);
    };
    session.set_model_tier(body.model_tier);
    flush(&state);
    Json(session.snapshot()).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workflow commands (SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub message: String,
    #[serde(default)]
    pub context: Option<BusinessContext>,
}

pub async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MessageBody>,
) -> Response {
    if body.message.trim().is_empty() {
        return error(StatusCode::BAD_REQUEST, "message must not be empty".into());
    }
    run_command(
        &state,
        &id,
        WorkflowCommand::Message {
            text: body.message,
            context: body.context,
        },
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct StageBody {
    #[serde(default)]
    pub preferences: Option<String>,
}

/// `stage` is one of `structure`, `copy` or `code`.
pub async fn run_stage(
    State(state): State<AppState>,
    Path((id, stage)): Path<(String, String)>,
    body: Option<Json<StageBody>>,
) -> Response {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let command = match stage.as_str() {
        "structure" => WorkflowCommand::GenerateStructure {
            preferences: body.preferences,
        },
        "copy" => WorkflowCommand::GenerateCopy,
        "code" => WorkflowCommand::GenerateCode,
        other => {
            return error(
                StatusCode::BAD_REQUEST,
                format!("unknown stage `{other}` (expected structure, copy or code)"),
            )
        }
    };
    run_command(&state, &id, command)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineBody {
    pub command: String,
    #[serde(default)]
    pub target_section: Option<String>,
}

pub async fn refine(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RefineBody>,
) -> Response {
    let Some(command) = RefinementCommand::parse(&body.command) else {
        return error(
            StatusCode::BAD_REQUEST,
            format!("unknown refinement command: {}", body.command),
        );
    };
    run_command(
        &state,
        &id,
        WorkflowCommand::Refine {
            command,
            target_section: body.target_section,
        },
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateBody {
    #[serde(default)]
    pub section_id: Option<String>,
}

pub async fn regenerate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<RegenerateBody>>,
) -> Response {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    run_command(
        &state,
        &id,
        WorkflowCommand::Regenerate {
            section_id: body.section_id,
        },
    )
}

fn run_command(state: &AppState, id: &str, command: WorkflowCommand) -> Response {
    let orchestrator = match state.require_orchestrator() {
        Ok(o) => o.clone(),
        Err(message) => return error(StatusCode::INTERNAL_SERVER_ERROR, message),
    };
    let Some(session): Option<Arc<Session>> = state.sessions.get(id) else {
        return not_found(id);
    };

    let rx = orchestrator.spawn(session, command);
    Sse::new(make_sse_stream(rx))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn make_sse_stream(
    mut rx: mpsc::Receiver<WorkflowEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let event_type = match &event {
                WorkflowEvent::Stage { .. } => "stage",
                WorkflowEvent::Delta { .. } => "delta",
                WorkflowEvent::Section { .. } => "section",
                WorkflowEvent::Progress { .. } => "progress",
                WorkflowEvent::Usage { .. } => "usage",
                WorkflowEvent::Error { .. } => "error",
                WorkflowEvent::Cancelled { .. } => "cancelled",
                WorkflowEvent::Done { .. } => "done",
            };
            let data = serde_json::to_string(&event).unwrap_or_default();
            yield Ok(Event::default().event(event_type).data(data));
        }
        yield Ok(Event::default().data("[DONE]"));
    }
}

// ── helpers ─────────────────────────────────────────────────────────

fn flush(state: &AppState) {
    if let Err(e) = state.sessions.flush() {
        tracing::warn!(error = %e, "session store flush failed");
    }
}

fn not_found(id: &str) -> Response {
    error(StatusCode::NOT_FOUND, format!("session not found: {id}"))
}

fn error(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
