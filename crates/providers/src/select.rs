//! One-time choice of provider variant at startup.

use std::sync::Arc;

use pw_domain::config::{LlmConfig, ProviderPreference};
use pw_domain::error::{Error, Result};

use crate::anthropic::AnthropicProvider;
use crate::openrouter::OpenRouterProvider;
use crate::traits::{LlmProvider, ProviderKind};
use crate::util::read_credential;

/// Decide which variant to build from the preference and which credentials
/// are present. Returns the chosen kind and its key.
pub fn choose(
    prefer: ProviderPreference,
    direct_key: Option<String>,
    relay_key: Option<String>,
    cfg: &LlmConfig,
) -> Result<(ProviderKind, String)> {
    match (prefer, direct_key, relay_key) {
        (ProviderPreference::Auto, _, Some(key)) => Ok((ProviderKind::Relay, key)),
        (ProviderPreference::Auto, Some(key), None) => Ok((ProviderKind::Direct, key)),
        (ProviderPreference::Auto, None, None) => Err(Error::Config(format!(
            "no LLM credential: set {} or {}",
            cfg.relay.api_key_env, cfg.direct.api_key_env
        ))),
        (ProviderPreference::Direct, Some(key), _) => Ok((ProviderKind::Direct, key)),
        (ProviderPreference::Direct, None, _) => Err(Error::Config(format!(
            "llm.prefer = \"direct\" but {} is not set",
            cfg.direct.api_key_env
        ))),
        (ProviderPreference::Relay, _, Some(key)) => Ok((ProviderKind::Relay, key)),
        (ProviderPreference::Relay, _, None) => Err(Error::Config(format!(
            "llm.prefer = \"relay\" but {} is not set",
            cfg.relay.api_key_env
        ))),
    }
}

/// Read both credentials once and build the selected adapter.
pub fn select_provider(cfg: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    let (kind, key) = choose(
        cfg.prefer,
        read_credential(&cfg.direct.api_key_env),
        read_credential(&cfg.relay.api_key_env),
        cfg,
    )?;

    let provider: Arc<dyn LlmProvider> = match kind {
        ProviderKind::Direct => Arc::new(AnthropicProvider::from_config(cfg, key)?),
        ProviderKind::Relay => Arc::new(OpenRouterProvider::from_config(cfg, key)?),
    };
    tracing::info!(
        provider = provider.provider_id(),
        kind = ?kind,
        "LLM provider selected"
    );
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn auto_prefers_relay_when_both_present() {
        let cfg = LlmConfig::default();
        let (kind, k) = choose(ProviderPreference::Auto, key("d"), key("r"), &cfg).unwrap();
        assert_eq!(kind, ProviderKind::Relay);
        assert_eq!(k, "r");
    }

    #[test]
    fn auto_falls_back_to_direct() {
        let cfg = LlmConfig::default();
        let (kind, _) = choose(ProviderPreference::Auto, key("d"), None, &cfg).unwrap();
        assert_eq!(kind, ProviderKind::Direct);
    }

    #[test]
    fn no_credentials_is_config_error() {
        let cfg = LlmConfig::default();
        let err = choose(ProviderPreference::Auto, None, None, &cfg).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("OPENROUTER_API_KEY"));
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn forced_preference_needs_its_own_key() {
        let cfg = LlmConfig::default();
        let err = choose(ProviderPreference::Direct, None, key("r"), &cfg).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let (kind, _) = choose(ProviderPreference::Direct, key("d"), key("r"), &cfg).unwrap();
        assert_eq!(kind, ProviderKind::Direct);
    }

    #[test]
    fn select_builds_from_named_env_vars() {
        let mut cfg = LlmConfig::default();
        cfg.direct.api_key_env = "PW_TEST_SELECT_DIRECT_9131".into();
        cfg.relay.api_key_env = "PW_TEST_SELECT_RELAY_9131".into();
        std::env::set_var(&cfg.direct.api_key_env, "sk-direct");

        let provider = select_provider(&cfg).unwrap();
        assert_eq!(provider.kind(), ProviderKind::Direct);
        assert_eq!(provider.provider_id(), "anthropic");

        std::env::remove_var(&cfg.direct.api_key_env);
        assert!(select_provider(&cfg).is_err());
    }
}
