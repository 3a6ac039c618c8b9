//! Relay adapter for OpenRouter's OpenAI-compatible chat completions.
//!
//! The system prompt travels as the first message with role `system`.

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

const PROVIDER_ID: &str = "openrouter";

pub struct OpenRouterProvider {
    base_url: String,
    api_key: String,
    endpoint: EndpointConfig,
    request_timeout: Duration,
    idle_timeout: Duration,
    client: reqwest::Client,
}

impl OpenRouterProvider {
    pub fn from_config(cfg: &LlmConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            base_url: cfg.relay.base_url.trim_end_matches('/').to_string(),
            api_key,
            endpoint: cfg.relay.clone(),
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.stream_idle_timeout_secs),
            client: build_client(cfg)?,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut rb = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if let Some(referer) = &self.endpoint.referer {
            rb = rb.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.endpoint.title {
            rb = rb.header("X-Title", title);
        }
        rb
    }

    async fn open(&self, req: &CompletionRequest) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
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
    let mut messages = Vec::with_capacity(req.messages.len() + 1);
    messages.push(serde_json::json!({"role": "system", "content": req.system}));
    messages.extend(req.messages.iter().map(|m| {
        serde_json::json!({
            "role": m.role.as_str(),
            "content": m.content,
        })
    }));

    serde_json::json!({
        "model": req.model,
        "max_tokens": req.max_tokens,
        "stream": true,
        "messages": messages,
    })
}

#[async_trait::async_trait]
impl LlmProvider for OpenRouterProvider {
    async fn stream(&self, req: CompletionRequest) -> BoxStream<'static, StreamEvent> {
        match self.open(&req).await {
            Ok(resp) => aggregate(
                resp.bytes_stream().map_err(from_reqwest),
                FrameFormat::Relay {
                    prompt_chars: req.prompt_chars(),
                },
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
        ProviderKind::Relay
    }

    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }
}
