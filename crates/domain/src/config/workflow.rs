use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workflow
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Extra attempts for a provider call that failed with a transport
    /// error. `0` disables retries.
    #[serde(default)]
    pub transport_retries: u32,
    /// Delay before the first retry; doubled for each further attempt.
    #[serde(default = "d_500")]
    pub retry_backoff_ms: u64,
    /// Context keys (camelCase) that must all be present for the
    /// understanding stage to skip clarifying questions.
    #[serde(default = "d_required_keys")]
    pub required_context_keys: Vec<String>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            transport_retries: 0,
            retry_backoff_ms: 500,
            required_context_keys: d_required_keys(),
        }
    }
}

fn d_500() -> u64 {
    500
}

fn d_required_keys() -> Vec<String> {
    vec![
        "businessName".into(),
        "industry".into(),
        "targetAudience".into(),
    ]
}
