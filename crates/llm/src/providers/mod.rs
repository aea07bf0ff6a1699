//! Concrete LLM providers.

pub mod gemini;
pub mod ollama;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

use docent_core::{AppError, AppResult};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Send a prepared JSON request and decode the body.
///
/// Transport failures, non-2xx statuses and undecodable bodies all surface as
/// `AppError::Generation` tagged with `provider`.
pub(crate) async fn send_json<R: DeserializeOwned>(
    provider: &str,
    builder: reqwest::RequestBuilder,
    timeout: Option<Duration>,
) -> AppResult<R> {
    let builder = match timeout {
        Some(timeout) => builder.timeout(timeout),
        None => builder,
    };

    let response = builder.send().await.map_err(|e| {
        let reason = if e.is_timeout() { "timed out" } else { "unreachable" };
        AppError::Generation(format!("{} {}: {}", provider, reason, e))
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Generation(format!(
            "{} returned {}: {}",
            provider,
            status,
            body.trim()
        )));
    }

    response
        .json::<R>()
        .await
        .map_err(|e| AppError::Generation(format!("{} sent an unreadable reply: {}", provider, e)))
}
