//! Retry logic for transient upstream failures. The page-fetch pacing
//! sleep is distinct from retry backoff, so this module keeps
//! `base_delay` fixed (no exponential growth) by default — retrying the
//! same page up to 5 times is a plain bounded retry, not a backoff
//! schedule.

use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryConfig {
    /// Five total retries after the first attempt; the caller aborts the
    /// page once these are exhausted.
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(500),
            jitter: false,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RetryResult<T> {
    pub result: Result<T, String>,
    pub attempts: u32,
    pub total_duration: Duration,
    pub succeeded: bool,
}

impl<T> RetryResult<T> {
    pub fn into_result(self) -> Result<T, String> {
        self.result
    }
}

pub async fn execute_with_retry_async<T, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
) -> RetryResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let start = std::time::Instant::now();
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        match operation(attempt).await {
            Ok(value) => {
                return RetryResult {
                    result: Ok(value),
                    attempts: attempt + 1,
                    total_duration: start.elapsed(),
                    succeeded: true,
                };
            }
            Err(error) => {
                last_error = Some(error);
                if attempt < config.max_retries {
                    let delay = calculate_delay(config, attempt);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    RetryResult {
        result: Err(last_error.unwrap_or_else(|| "all retries failed".to_string())),
        attempts: config.max_retries + 1,
        total_duration: start.elapsed(),
        succeeded: false,
    }
}

fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let base = config.base_delay.as_millis() as u64;
    let exponential = base.saturating_mul(2u64.saturating_pow(attempt));
    let delay = exponential.min(config.max_delay.as_millis() as u64);

    if config.jitter {
        let jitter = fastrand::u64(0..=delay / 2);
        Duration::from_millis(delay + jitter)
    } else {
        Duration::from_millis(delay)
    }
}

/// Classify an HTTP status / transport error as retryable: 5xx, network
/// failures, and malformed JSON are transient; everything else is not.
pub fn is_retryable_error(status: Option<reqwest::StatusCode>, is_network_error: bool) -> bool {
    if is_network_error {
        return true;
    }
    match status {
        Some(code) => code.is_server_error() || code.as_u16() == 429,
        None => true,
    }
}
