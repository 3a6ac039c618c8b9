mod llm;
mod server;
mod sessions;
mod workflow;

pub use llm::*;
pub use server::*;
pub use sessions::*;
pub use workflow::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good. Credentials are not
    /// checked here; provider selection reports those at startup.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigIssue::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            issues.push(ConfigIssue::error("server.host", "host must not be empty"));
        }
        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            issues.push(ConfigIssue::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        if self.llm.max_tokens == 0 || self.llm.max_tokens > MAX_TOKENS_CEILING {
            issues.push(ConfigIssue::error(
                "llm.max_tokens",
                format!("max_tokens must be between 1 and {MAX_TOKENS_CEILING}"),
            ));
        }
        if self.llm.request_timeout_secs == 0 || self.llm.stream_idle_timeout_secs == 0 {
            issues.push(ConfigIssue::error(
                "llm.*_timeout_secs",
                "timeouts must be greater than 0",
            ));
        }
        for (field, endpoint) in [("llm.direct", &self.llm.direct), ("llm.relay", &self.llm.relay)] {
            if endpoint.base_url.is_empty() {
                issues.push(ConfigIssue::error(
                    format!("{field}.base_url"),
                    "base_url must not be empty",
                ));
            }
            if endpoint.api_key_env.is_empty() {
                issues.push(ConfigIssue::error(
                    format!("{field}.api_key_env"),
                    "api_key_env must name an environment variable",
                ));
            }
        }
        if self.llm.prefer != ProviderPreference::Direct {
            let relay = &self.llm.relay;
            for (field, value) in [("referer", &relay.referer), ("title", &relay.title)] {
                if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                    issues.push(ConfigIssue::error(
                        format!("llm.relay.{field}"),
                        "the relay requires the application attribution headers",
                    ));
                }
            }
        }
        for (tier, pricing) in [
            ("standard", self.llm.pricing.standard),
            ("premium", self.llm.pricing.premium),
        ] {
            if pricing.input_per_1m < 0.0 || pricing.output_per_1m < 0.0 {
                issues.push(ConfigIssue::error(
                    format!("llm.pricing.{tier}"),
                    "prices must not be negative",
                ));
            }
        }

        if self.workflow.transport_retries > 5 {
            issues.push(ConfigIssue::warning(
                "workflow.transport_retries",
                "more than 5 retries per call is unusual",
            ));
        }
        if self.workflow.required_context_keys.is_empty() {
            issues.push(ConfigIssue::warning(
                "workflow.required_context_keys",
                "empty: the understanding stage will always wait for an outline from the model",
            ));
        }

        issues
    }
}
