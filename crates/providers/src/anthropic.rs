//! Direct adapter for the Anthropic Messages API.
//!
//! The system prompt goes in the top-level `system` field; the history is
//! sent as plain-text `user`/`assistant` messages.

use std::time::Duration;

use futures_util::TryStreamExt;
use pw_domain::config::{EndpointConfig, LlmConfig};
use pw_domain::cost::ModelTier;
use pw_domain::error::Result;
use pw_domain::stream::{BoxStream, StreamEvent};
use serde_json::Value;

use crate::sse::{aggregate, FrameFormat};
use crate::traits::{CompletionRequest, LlmProvider, ProviderKind};
use crate::util::{build_client, error_stream, from_reqwest, send_with_timeout, status_error};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Constants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER_ID: &str = "anthropic";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    endpoint: EndpointConfig,
    request_timeout: Duration,
    idle_timeout: Duration,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create the adapter. `api_key` has already been read from the
    /// environment by provider selection.
    pub fn from_config(cfg: &LlmConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            base_url: cfg.direct.base_url.trim_end_matches('/').to_string(),
            api_key,
            endpoint: cfg.direct.clone(),
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.stream_idle_timeout_secs),
            client: build_client(cfg)?,
        })
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }

    async fn open(&self, req: &CompletionRequest) -> Result<reqwest::Response> {
        let url = format!("{}/v1/messages", self.base_url);
        tracing::debug!(provider = PROVIDER_ID, url = %url, model = %req.model, "stream request");

        let resp = send_with_timeout(
            self.authed_post(&url).json(&build_body(req)),
            self.request_timeout,
        )
        .await?;
        if !resp.status().is_success() {
            return Err(status_error(PROVIDER_ID, resp).await);
        }
        Ok(resp)
    }
}

fn build_body(req: &CompletionRequest) -> Value {
    let messages: Vec<Value> = req
        .messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "role": m.role.as_str(),
                "content": m.content,
            })
        })
        .collect();

    serde_json::json!({
        "model": req.model,
        "max_tokens": req.max_tokens,
        "system": req.system,
        "messages": messages,
        "stream": true,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LlmProvider implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn stream(&self, req: CompletionRequest) -> BoxStream<'static, StreamEvent> {
        match self.open(&req).await {
            Ok(resp) => aggregate(
                resp.bytes_stream().map_err(from_reqwest),
                FrameFormat::Direct,
                PROVIDER_ID,
                &req.model,
                self.idle_timeout,
            ),
            Err(e) => error_stream(e),
        }
    }

    fn model_for(&self, tier: ModelTier) -> String {
        self.endpoint.model_for(tier).to_string()
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Direct
    }

    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }
}
