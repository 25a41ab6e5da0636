use std::time::Duration;

use log::warn;
use tokio::time::timeout;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success { content: String },
    SuccessEmpty, // HTTP 304
    Failed { message: String },
}

/// Fetches one ICS feed over HTTP with a bounded timeout, retrying
/// transient failures with exponential backoff. Classifies 4xx (except
/// 401/403, which would indicate bad credentials rather than a bad
/// request) as fail-fast, 5xx and network errors as retryable, and 304 as
/// success-with-empty-content. Never panics the caller — failures are
/// returned, not propagated, so the refresh pipeline can continue with
/// other sources.
pub async fn fetch_ics(client: &reqwest::Client, name: &str, url: &str) -> FetchOutcome {
    let mut attempt = 0u32;
    loop {
        let request = timeout(
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            client.get(url).send(),
        )
        .await;

        match request {
            Err(_) => {
                if attempt >= MAX_RETRIES {
                    return FetchOutcome::Failed {
                        message: format!("{name}: timed out after {} attempts", attempt + 1),
                    };
                }
            }
            Ok(Err(err)) => {
                if attempt >= MAX_RETRIES {
                    return FetchOutcome::Failed {
                        message: format!("{name}: network error: {err}"),
                    };
                }
            }
            Ok(Ok(response)) => {
                let status = response.status();
                if status.as_u16() == 304 {
                    return FetchOutcome::SuccessEmpty;
                }
                if status.is_success() {
                    return match response.text().await {
                        Ok(content) => FetchOutcome::Success { content },
                        Err(err) => FetchOutcome::Failed {
                            message: format!("{name}: failed to read body: {err}"),
                        },
                    };
                }
                if status.is_client_error() {
                    return FetchOutcome::Failed {
                        message: format!("{name}: client error {status}"),
                    };
                }
                // 5xx: retryable.
                if attempt >= MAX_RETRIES {
                    return FetchOutcome::Failed {
                        message: format!("{name}: server error {status} after {} attempts", attempt + 1),
                    };
                }
            }
        }

        let backoff_secs = RETRY_BACKOFF_FACTOR.powi(attempt as i32);
        warn!("{name}: fetch attempt {attempt} failed, retrying in {backoff_secs:.1}s");
        tokio::time::sleep(Duration::from_secs_f64(backoff_secs)).await;
        attempt += 1;
    }
}
