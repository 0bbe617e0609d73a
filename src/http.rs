//! Shared HTTP send helper with bounded retry.
//!
//! Both API clients (model gateway, hosting platform) send through here.
//! Retries cover only transport-level hiccups and transient server statuses;
//! they are the client's own policy, the pipeline itself never re-runs a
//! failed stage.

use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use reqwest::StatusCode;
use tokio::time::sleep;
use tracing::debug;

/// Two retries with exponential backoff from 500ms, plus up to 25% jitter.
const MAX_RETRIES: usize = 2;
const BASE_DELAY_MS: u64 = 500;

fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_transient_send_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body()
}

fn backoff_delay(attempt: usize) -> Duration {
    let base = BASE_DELAY_MS.saturating_mul(1u64 << attempt.min(16) as u32);
    let jitter = rand::thread_rng().gen_range(0..=base / 4);
    Duration::from_millis(base + jitter)
}

/// Send a request, retrying transient failures, and fail on any non-success
/// status. Returns the successful response for the caller to deserialize.
pub(crate) async fn send_checked(
    mut make_request: impl FnMut() -> reqwest::RequestBuilder,
    what: &str,
) -> Result<reqwest::Response> {
    for attempt in 0..=MAX_RETRIES {
        match make_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                if is_transient_status(status) && attempt < MAX_RETRIES {
                    let delay = backoff_delay(attempt);
                    debug!(
                        "{} returned {}; retrying in {:?} (attempt {}/{})",
                        what,
                        status,
                        delay,
                        attempt + 1,
                        MAX_RETRIES + 1
                    );
                    let _ = response.bytes().await;
                    sleep(delay).await;
                    continue;
                }

                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("{} failed with status {}: {}", what, status, body);
            }
            Err(err) => {
                if is_transient_send_error(&err) && attempt < MAX_RETRIES {
                    let delay = backoff_delay(attempt);
                    debug!(
                        "{} transport error: {}; retrying in {:?} (attempt {}/{})",
                        what,
                        err,
                        delay,
                        attempt + 1,
                        MAX_RETRIES + 1
                    );
                    sleep(delay).await;
                    continue;
                }

                return Err(anyhow::Error::new(err)).with_context(|| format!("{} failed", what));
            }
        }
    }

    unreachable!("send_checked returns within the retry loop")
}
