//! Bounded retries for chain-source calls

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use rpc_core::RpcError;

use crate::error::{IndexerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Delay before the second attempt; each later attempt waits one more step
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, backoff: Duration::from_millis(500) }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self { attempts: attempts.max(1), backoff }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }

    /// Run `call` until it succeeds, a non-transient error comes back, or the
    /// attempts run out. Exhaustion yields [`IndexerError::RetriesExhausted`].
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, RpcError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if !is_transient(&e) => return Err(e.into()),
                Err(e) if attempt >= self.attempts => {
                    return Err(IndexerError::RetriesExhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!("{} failed (attempt {}/{}): {}", operation, attempt, self.attempts, e);
                    tokio::time::sleep(self.delay(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn is_transient(error: &RpcError) -> bool {
    matches!(error, RpcError::Network(_) | RpcError::Internal(_))
}
