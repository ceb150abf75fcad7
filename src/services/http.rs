// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared HTTP plumbing: a retrying client and response classification.

use crate::error::SyncError;
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const USER_AGENT: &str = concat!("strava-komoot-sync/", env!("CARGO_PKG_VERSION"));

/// Build an HTTP client that retries timeouts, 5xx, 408 and 429 with
/// exponential backoff, at most `max_retries` times.
pub fn build_client(max_retries: u32) -> Result<ClientWithMiddleware, SyncError> {
    let inner = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| SyncError::Internal(anyhow::anyhow!("Failed to build HTTP client: {e}")))?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);

    Ok(ClientBuilder::new(inner)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// How a non-success response should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Credentials rejected; stop the run
    Auth,
    /// Worth another attempt in a later run
    Transient,
    /// The request itself is wrong for this resource
    Permanent,
}

/// Classify a final (post-retry) non-success status.
pub fn classify_status(status: StatusCode) -> FailureClass {
    match status.as_u16() {
        401 | 403 => FailureClass::Auth,
        408 | 429 => FailureClass::Transient,
        s if s >= 500 => FailureClass::Transient,
        _ => FailureClass::Permanent,
    }
}

/// Connection-level failures (DNS, TLS, timeouts after retries) are transient.
pub fn network_error(service: &str, err: reqwest_middleware::Error) -> SyncError {
    SyncError::Transient(format!("{service} request failed: {err}"))
}

/// Map a failed response to an error, using `permanent` for 4xx rejections.
pub async fn status_error<F>(
    service: &str,
    response: reqwest::Response,
    permanent: F,
) -> SyncError
where
    F: FnOnce(String) -> SyncError,
{
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body = truncate(&body, 200);

    match classify_status(status) {
        FailureClass::Auth => SyncError::Auth(format!("{service} returned HTTP {status}")),
        FailureClass::Transient => {
            if status == StatusCode::TOO_MANY_REQUESTS {
                tracing::warn!(service, "Rate limit hit (429) after retries");
            }
            SyncError::Transient(format!("{service} returned HTTP {status}: {body}"))
        }
        FailureClass::Permanent => permanent(format!("HTTP {status}: {body}")),
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
