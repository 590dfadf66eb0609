//! JSON-over-HTTP plumbing shared by the model providers.
//!
//! Retry strategy:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use reqwest::RequestBuilder;

/// Why a model service call failed after all attempts.
#[derive(Debug)]
pub(crate) enum HttpFailure {
    Network { reason: String, timed_out: bool },
    Status { status: u16, body: String },
    Decode(String),
}

/// Build an HTTP client whose every request is bounded by `timeout`.
pub(crate) fn client_with_timeout(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Send the request produced by `build` and decode the JSON response,
/// retrying transient failures up to `max_retries` times.
pub(crate) async fn send_json_with_retry<F>(
    build: F,
    max_retries: u32,
) -> Result<serde_json::Value, HttpFailure>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::warn!(attempt, ?delay, error = ?last_err, "retrying model call");
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| HttpFailure::Decode(e.to_string()));
                }

                let body = response.text().await.unwrap_or_default();
                let failure = HttpFailure::Status {
                    status: status.as_u16(),
                    body,
                };
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(failure);
                    continue;
                }
                return Err(failure);
            }
            Err(e) => {
                last_err = Some(HttpFailure::Network {
                    timed_out: e.is_timeout(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Err(last_err.unwrap_or_else(|| HttpFailure::Network {
        reason: "no attempt was made".to_string(),
        timed_out: false,
    }))
}

/// Trim a base URL so paths can be appended with a single `/`.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
