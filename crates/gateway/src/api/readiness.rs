use axum::extract::State;
use axum::response::{IntoResponse, Json};

use pw_domain::cost::ModelTier;

use crate::state::AppState;

/// `GET /v1/readiness`: which provider variant is in use, or why none is.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    match state.require_provider() {
        Ok(provider) => Json(serde_json::json!({
            "ready": true,
            "provider": provider.kind(),
            "provider_id": provider.provider_id(),
            "models": {
                "standard": provider.model_for(ModelTier::Standard),
                "premium": provider.model_for(ModelTier::Premium),
            },
            "sessions": state.sessions.len(),
        })),
        Err(error) => Json(serde_json::json!({
            "ready": false,
            "error": error,
            "sessions": state.sessions.len(),
        })),
    }
}
