//! Retry-with-backoff and deadline helpers for backend calls.

use std::future::Future;
use std::time::Duration;

use log::warn;

use crate::error::ClientError;

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(attempt as i32);
        self.base_delay.mul_f64(factor).min(self.max_delay)
    }
}

/// Runs `op` until it succeeds or `max_retries` additional attempts have
/// failed. Only transport failures (`BackendUnreachable`) are retried;
/// anything else is returned immediately.
pub async fn with_retry<T, F, Fut>(
    op_name: &str,
    config: &RetryConfig,
    mut op: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e @ ClientError::BackendUnreachable(_)) if attempt < config.max_retries => {
                let delay = config.delay_for_attempt(attempt);
                attempt += 1;
                warn!(
                    "{op_name} failed (attempt {attempt}/{}), retrying in {delay:?}: {e}",
                    config.max_retries
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Races `future` against a deadline. The underlying call is abandoned on
/// timeout, not cancelled; its eventual result is discarded.
pub async fn with_timeout<T>(
    future: impl Future<Output = Result<T, ClientError>>,
    deadline: Duration,
    label: &str,
) -> Result<T, ClientError> {
    match tokio::time::timeout(deadline, future).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::BackendUnreachable(format!(
            "{label} timed out after {deadline:?}"
        ))),
    }
}
