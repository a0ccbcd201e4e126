use std::{future::Future, time::Duration};

use anyhow::Result;
use tokio::time::sleep;

use crate::UpstreamError;

/// Transport-level retry for transient upstream failures (500, 502, 504).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self { Self { retries: 3, base_delay: Duration::from_millis(300) } }
}

impl RetryPolicy {
    pub const fn none() -> Self { Self { retries: 0, base_delay: Duration::ZERO } }

    /// Delay before retry number `attempt` (zero-based), doubling each time.
    pub fn delay(&self, attempt: u32) -> Duration { self.base_delay * 2u32.saturating_pow(attempt) }

    /// Run `f` until it succeeds, fails permanently, or retries are exhausted.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.retries && is_transient(&e) => {
                    let delay = self.delay(attempt);
                    attempt += 1;
                    tracing::warn!(
                        "{} failed, retrying in {}ms (attempt {}/{}): {}",
                        operation,
                        delay.as_millis(),
                        attempt,
                        self.retries,
                        e
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

pub fn is_transient(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.downcast_ref::<UpstreamError>().is_some_and(|e| e.is_transient()))
}
