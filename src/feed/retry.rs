use anyhow::{anyhow, Result};
use rand::Rng;
use serde_json::json;
use std::fmt;
use std::future::Future;
use tokio::time::{sleep, Duration};

use crate::logging::{log, obj, v_str, Domain, Level};

/// Retry configuration
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        // Bounded tightly: the whole fan-out must settle well inside one
        // 5-second refresh period.
        Self {
            max_retries: 2,
            base_delay_ms: 100,
            max_delay_ms: 1000,
            jitter_factor: 0.3,
        }
    }
}

impl RetryConfig {
    /// Calculate delay with exponential backoff and jitter
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms as f64 * 2.0_f64.powi(attempt as i32);
        let clamped = base.min(self.max_delay_ms as f64);

        // Jitter: ±jitter_factor of the delay
        let jitter_range = clamped * self.jitter_factor;
        let jitter: f64 = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let final_delay = (clamped + jitter).max(0.0);

        Duration::from_millis(final_delay as u64)
    }
}

/// Non-2xx response status, kept typed so retry decisions can inspect it.
#[derive(Debug)]
pub struct HttpStatusError {
    pub status: u16,
    pub endpoint: String,
}

impl fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} returned status {}", self.endpoint, self.status)
    }
}

impl std::error::Error for HttpStatusError {}

/// Retry a fallible async operation with exponential backoff. Errors
/// classified as non-retryable short-circuit immediately.
pub async fn retry_async<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error: Option<anyhow::Error> = None;

    for attempt in 0..=config.max_retries {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !is_retryable(&e) {
                    return Err(e);
                }
                if attempt < config.max_retries {
                    let delay = config.delay_for_attempt(attempt);
                    log(
                        Level::Debug,
                        Domain::Feed,
                        "retry",
                        obj(&[
                            ("source", v_str(operation_name)),
                            ("attempt", json!(attempt + 1)),
                            ("max_attempts", json!(config.max_retries + 1)),
                            ("error", v_str(&e.to_string())),
                            ("delay_ms", json!(delay.as_millis() as u64)),
                        ]),
                    );
                    sleep(delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("retry_async exhausted without error")))
}

/// Classify an error chain for retry decisions. Unknown error kinds default
/// to retryable; a decode failure or a client-error status does not.
pub fn is_retryable(err: &anyhow::Error) -> bool {
    if let Some(status) = err.downcast_ref::<HttpStatusError>() {
        return is_retryable_http_error(status.status);
    }
    if let Some(req) = err.downcast_ref::<reqwest::Error>() {
        return is_retryable_network_error(req);
    }
    true
}

pub fn is_retryable_http_error(status: u16) -> bool {
    matches!(status,
        408 |   // Request Timeout
        429 |   // Too Many Requests
        500 |   // Internal Server Error
        502 |   // Bad Gateway
        503 |   // Service Unavailable
        504     // Gateway Timeout
    )
}

pub fn is_retryable_network_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
