//! AppState construction shared by `serve` and `generate`.

use std::sync::Arc;

use anyhow::Context;

use pw_domain::config::{Config, ConfigSeverity};
use pw_providers::LlmProvider;
use pw_sessions::SessionStore;

use crate::runtime::Orchestrator;
use crate::state::AppState;

/// Validate config, select the provider and open the session store.
///
/// A missing credential is not fatal here: the server still starts and
/// reports the problem through readiness and as HTTP 500 on LLM routes.
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Sessions ─────────────────────────────────────────────────────
    let sessions = Arc::new(
        SessionStore::open(config.sessions.state_path.as_deref())
            .context("opening session store")?,
    );
    tracing::info!(
        sessions = sessions.len(),
        persistent = config.sessions.state_path.is_some(),
        "session store ready"
    );

    // ── LLM provider ─────────────────────────────────────────────────
    let (provider, provider_error) = match pw_providers::select_provider(&config.llm) {
        Ok(p) => (Some(p), None),
        Err(e) => {
            tracing::warn!(error = %e, "no LLM provider, generation endpoints will fail");
            (None, Some(e.to_string()))
        }
    };

    Ok(with_provider(config, provider, provider_error, sessions))
}

/// Assemble state around an already chosen provider.
pub fn with_provider(
    config: Arc<Config>,
    provider: Option<Arc<dyn LlmProvider>>,
    provider_error: Option<String>,
    sessions: Arc<SessionStore>,
) -> AppState {
    let orchestrator = provider.as_ref().map(|p| {
        Arc::new(
            Orchestrator::new(p.clone(), &config.llm, config.workflow.clone())
                .with_store(sessions.clone()),
        )
    });

    AppState {
        config,
        provider,
        provider_error,
        sessions,
        orchestrator,
    }
}
