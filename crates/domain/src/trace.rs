use serde::Serialize;

/// Structured trace events emitted across the pagewright crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    StageEntered {
        session_id: String,
        stage: String,
        progress: u8,
    },
    StageFailed {
        session_id: String,
        stage: String,
        class: String,
        message: String,
    },
    LlmRequest {
        provider: String,
        model: String,
        stage: String,
        duration_ms: u64,
        input_tokens: Option<u32>,
        output_tokens: Option<u32>,
        estimated: bool,
    },
    SectionSkipped {
        session_id: String,
        section_id: String,
        reason: String,
    },
    SessionReset {
        session_id: String,
        had_stream: bool,
    },
    StreamCancelled {
        session_id: String,
        stage: String,
        partial_chars: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "pw_event");
    }
}
