pub mod agent;
pub mod readiness;
pub mod sessions;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Stateless streaming endpoint for the browser UI
        .route("/api/agent", post(agent::agent))
        // Provider readiness (used by health checks)
        .route("/v1/readiness", get(readiness::readiness))
        // Sessions
        .route(
            "/v1/sessions",
            get(sessions::list_sessions).post(sessions::create_session),
        )
        .route(
            "/v1/sessions/:id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/v1/sessions/:id/messages", post(sessions::post_message))
        .route("/v1/sessions/:id/stages/:stage", post(sessions::run_stage))
        .route("/v1/sessions/:id/refine", post(sessions::refine))
        .route("/v1/sessions/:id/regenerate", post(sessions::regenerate))
        .route("/v1/sessions/:id/stop", post(sessions::stop_session))
        .route("/v1/sessions/:id/reset", post(sessions::reset_session))
        .route("/v1/sessions/:id/tier", put(sessions::set_tier))
        .layer(TraceLayer::new_for_http())
}
