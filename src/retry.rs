use std::{future::Future, time::Duration};

use tracing::warn;

use crate::error::BenchError;

/// Decides whether a failed store call is attempted again.
pub trait RetryStrategy: Send + Sync {
    /// Delay before the next attempt after `failed_attempts` failures,
    /// or `None` to give up.
    fn backoff(&self, failed_attempts: u32) -> Option<Duration>;
}

/// Give up on the first failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailFast;

impl RetryStrategy for FailFast {
    fn backoff(&self, _failed_attempts: u32) -> Option<Duration> {
        None
    }
}

/// Retry up to `max_retries` times, waiting `delay` between attempts.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryStrategy for FixedBackoff {
    fn backoff(&self, failed_attempts: u32) -> Option<Duration> {
        if failed_attempts <= self.max_retries {
            Some(self.delay)
        } else {
            None
        }
    }
}

/// Run `op` until it succeeds or `strategy` gives up, returning the last error.
pub async fn retry<T, F, Fut>(
    strategy: &dyn RetryStrategy,
    label: &str,
    mut op: F,
) -> Result<T, BenchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BenchError>>,
{
    let mut failed_attempts = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                failed_attempts += 1;
                match strategy.backoff(failed_attempts) {
                    Some(delay) => {
                        warn!(
                            "{} failed (attempt {}): {}, retrying in {:?}",
                            label, failed_attempts, err, delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(err),
                }
            }
        }
    }
}
