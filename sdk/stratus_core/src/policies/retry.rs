//! Retry with exponential backoff and jitter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;

use crate::error::{StratusError, StratusResult};
use crate::pipeline::{self, blocking, PipelineRequest, PipelineResponse};
use crate::response::RawResponse;

/// Determines if an HTTP status code represents a retriable error.
///
/// Retriable errors are transient server-side issues that may succeed on
/// retry:
/// - 429 Too Many Requests (rate limiting)
/// - 500 Internal Server Error
/// - 502 Bad Gateway
/// - 503 Service Unavailable
/// - 504 Gateway Timeout
#[inline]
pub fn is_retriable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Determines if an error is worth retrying.
///
/// Only transport-level failures qualify; a policy or configuration
/// failure would fail identically on every attempt.
#[inline]
pub fn is_retriable_error(error: &StratusError) -> bool {
    matches!(error, StratusError::Transport(_) | StratusError::Request(_))
}

/// Chaining policy that retries transient failures.
///
/// Calls the rest of the chain up to `max_retries + 1` times. Transport
/// errors and retriable statuses are retried with exponential backoff
/// (`initial_backoff * 2^attempt`, ±25% jitter), honoring a numeric
/// `Retry-After` header when the server sends one. When attempts are
/// exhausted, the last transport error is surfaced verbatim; a final
/// retriable *status* is returned as a response, not an error.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not counting the initial request).
    pub max_retries: u32,
    /// Initial backoff duration before the first retry.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
        }
    }

    /// Backoff before retry number `attempt`, preferring the server's
    /// `Retry-After` when present.
    fn backoff(&self, attempt: u32, response: Option<&RawResponse>) -> Duration {
        if let Some(delay) = response.and_then(retry_after) {
            return delay;
        }
        let base = self
            .initial_backoff
            .saturating_mul(2_u32.saturating_pow(attempt.min(10)));
        let jitter = 0.75 + fastrand::f64() * 0.5; // 0.75 to 1.25
        base.mul_f64(jitter)
    }
}

/// Parse a numeric (delta-seconds) `Retry-After` header.
fn retry_after(response: &RawResponse) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl pipeline::ChainPolicy for RetryPolicy {
    async fn send<'a>(
        &self,
        request: &mut PipelineRequest,
        next: pipeline::Next<'a>,
    ) -> StratusResult<PipelineResponse> {
        let mut attempt = 0;
        loop {
            match next.send(request).await {
                Ok(response) => {
                    let status = response.response.status().as_u16();
                    if is_retriable_status(status) && attempt < self.max_retries {
                        let delay = self.backoff(attempt, Some(&response.response));
                        tracing::debug!(
                            status,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "retrying after retriable status"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(response);
                }
                Err(error) if is_retriable_error(&error) && attempt < self.max_retries => {
                    let delay = self.backoff(attempt, None);
                    tracing::warn!(error = %error, attempt, "retrying after transport error");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

impl blocking::ChainPolicy for RetryPolicy {
    fn send(
        &self,
        request: &mut PipelineRequest,
        next: blocking::Next<'_>,
    ) -> StratusResult<PipelineResponse> {
        let mut attempt = 0;
        loop {
            match next.send(request) {
                Ok(response) => {
                    let status = response.response.status().as_u16();
                    if is_retriable_status(status) && attempt < self.max_retries {
                        let delay = self.backoff(attempt, Some(&response.response));
                        tracing::debug!(
                            status,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "retrying after retriable status"
                        );
                        std::thread::sleep(delay);
                        attempt += 1;
                        continue;
                    }
                    return Ok(response);
                }
                Err(error) if is_retriable_error(&error) && attempt < self.max_retries => {
                    let delay = self.backoff(attempt, None);
                    tracing::warn!(error = %error, attempt, "retrying after transport error");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
