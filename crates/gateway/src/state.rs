use std::sync::Arc;

use pw_domain::config::Config;
use pw_providers::LlmProvider;
use pw_sessions::SessionStore;

use crate::runtime::Orchestrator;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    /// The provider chosen at startup. `None` when no credential was usable;
    /// `provider_error` then says why.
    pub provider: Option<Arc<dyn LlmProvider>>,
    pub provider_error: Option<String>,

    // ── Sessions & workflow ───────────────────────────────────────────
    pub sessions: Arc<SessionStore>,
    /// Present whenever `provider` is.
    pub orchestrator: Option<Arc<Orchestrator>>,
}

impl AppState {
    /// The provider, or the configuration error explaining its absence.
    pub fn require_provider(&self) -> Result<&Arc<dyn LlmProvider>, String> {
        self.provider.as_ref().ok_or_else(|| {
            self.provider_error
                .clone()
                .unwrap_or_else(|| "no LLM provider configured".into())
        })
    }

    pub fn require_orchestrator(&self) -> Result<&Arc<Orchestrator>, String> {
        self.require_provider()?;
        self.orchestrator
            .as_ref()
            .ok_or_else(|| "workflow orchestrator unavailable".into())
    }
}
