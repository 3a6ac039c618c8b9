use serde::{Deserialize, Serialize};

use crate::cost::{ModelTier, PriceTable};

/// Hard ceiling for `llm.max_tokens`.
pub const MAX_TOKENS_CEILING: u32 = 64_000;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Which provider variant to use when both credentials could apply.
    #[serde(default)]
    pub prefer: ProviderPreference,
    #[serde(default = "d_8192")]
    pub max_tokens: u32,
    #[serde(default = "d_10")]
    pub connect_timeout_secs: u64,
    /// Time allowed until the response head arrives.
    #[serde(default = "d_60")]
    pub request_timeout_secs: u64,
    /// Maximum gap between two body chunks of a streamed response.
    #[serde(default = "d_90")]
    pub stream_idle_timeout_secs: u64,
    #[serde(default = "EndpointConfig::direct")]
    pub direct: EndpointConfig,
    #[serde(default = "EndpointConfig::relay")]
    pub relay: EndpointConfig,
    #[serde(default)]
    pub pricing: PriceTable,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            prefer: ProviderPreference::Auto,
            max_tokens: 8192,
            connect_timeout_secs: 10,
            request_timeout_secs: 60,
            stream_idle_timeout_secs: 90,
            direct: EndpointConfig::direct(),
            relay: EndpointConfig::relay(),
            pricing: PriceTable::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderPreference {
    /// Relay when its credential is present, otherwise direct.
    #[default]
    Auto,
    Direct,
    Relay,
}

/// Connection settings for one provider variant.
///
/// An overriding TOML table must spell out the URL, key variable and both
/// model names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub standard_model: String,
    pub premium_model: String,
    /// Sent as `HTTP-Referer` (relay only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    /// Sent as `X-Title` (relay only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl EndpointConfig {
    pub fn direct() -> Self {
        Self {
            base_url: "https://api.anthropic.com".into(),
            api_key_env: "ANTHROPIC_API_KEY".into(),
            standard_model: "claude-sonnet-4-20250514".into(),
            premium_model: "claude-opus-4-20250514".into(),
            referer: None,
            title: None,
        }
    }

    pub fn relay() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".into(),
            api_key_env: "OPENROUTER_API_KEY".into(),
            standard_model: "anthropic/claude-sonnet-4".into(),
            premium_model: "anthropic/claude-opus-4".into(),
            referer: Some("http://localhost:3210".into()),
            title: Some("Pagewright".into()),
        }
    }

    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Standard => &self.standard_model,
            ModelTier::Premium => &self.premium_model,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_8192() -> u32 {
    8192
}
fn d_10() -> u64 {
    10
}
fn d_60() -> u64 {
    60
}
fn d_90() -> u64 {
    90
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_config_defaults_from_empty_toml() {
        let cfg: LlmConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.prefer, ProviderPreference::Auto);
        assert_eq!(cfg.max_tokens, 8192);
        assert_eq!(cfg.direct.api_key_env, "ANTHROPIC_API_KEY");
        assert_eq!(cfg.relay.base_url, "https://openrouter.ai/api/v1");
        assert!((cfg.pricing.premium.output_per_1m - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn relay_table_overrides_models() {
        let toml_str = r#"
            prefer = "relay"

            [relay]
            base_url = "https://relay.example/api/v1"
            api_key_env = "RELAY_KEY"
            standard_model = "vendor/small"
            premium_model = "vendor/large"
        "#;
        let cfg: LlmConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.prefer, ProviderPreference::Relay);
        assert_eq!(cfg.relay.model_for(ModelTier::Premium), "vendor/large");
        assert!(cfg.relay.referer.is_none());
    }

    #[test]
    fn pricing_table_parses() {
        let toml_str = r#"
            [pricing.standard]
            input_per_1m = 1.0
            output_per_1m = 5.0
        "#;
        let cfg: LlmConfig = toml::from_str(toml_str).unwrap();
        assert!((cfg.pricing.standard.output_per_1m - 5.0).abs() < f64::EPSILON);
        // premium keeps its default
        assert!((cfg.pricing.premium.input_per_1m - 15.0).abs() < f64::EPSILON);
    }
}
