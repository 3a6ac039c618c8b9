//! Shared utility functions for provider adapters.

use std::time::Duration;

use pw_domain::config::LlmConfig;
use pw_domain::error::{Error, Result};
use pw_domain::stream::{BoxStream, StreamEvent};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Every client-side failure (connect, timeout, body read) is a transport
/// failure; HTTP status errors are handled separately by the adapters.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Transport(format!("timed out: {e}"))
    } else {
        Error::Transport(e.to_string())
    }
}

/// Read a credential from the named environment variable.
///
/// Unset, non-UTF-8 and blank values all count as absent.
pub fn read_credential(env_var: &str) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Build the HTTP client shared by one adapter.
///
/// Only the connect phase is bounded here. The time to the response head is
/// bounded per request and body gaps by the aggregator, so a long but live
/// stream is never cut off.
pub(crate) fn build_client(cfg: &LlmConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
        .build()
        .map_err(from_reqwest)
}

/// Send a request, bounding the wait for the response head.
pub(crate) async fn send_with_timeout(
    req: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<reqwest::Response> {
    match tokio::time::timeout(timeout, req.send()).await {
        Ok(resp) => resp.map_err(from_reqwest),
        Err(_) => Err(Error::Transport(format!(
            "no response from provider within {}s",
            timeout.as_secs()
        ))),
    }
}

/// Read a non-success response into a provider error carrying the body.
pub(crate) async fn status_error(provider: &str, resp: reqwest::Response) -> Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Error::Provider {
        provider: provider.to_string(),
        message: format!("HTTP {} - {}", status.as_u16(), body),
    }
}

/// A stream consisting of a single terminal error event.
pub(crate) fn error_stream(err: Error) -> BoxStream<'static, StreamEvent> {
    tracing::warn!(error = %err, "provider request failed before streaming");
    Box::pin(futures_util::stream::iter([StreamEvent::from_error(&err)]))
}
