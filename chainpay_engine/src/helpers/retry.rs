use std::{future::Future, time::Duration};

use log::*;

use crate::traits::OrderStoreError;

/// Bounded retry with exponential backoff for idempotent reads.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, initial_backoff: Duration::from_millis(50) }
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or the attempts in `policy` are used up.
///
/// Only use this for reads. Writes are never retried here, since the caller has to decide whether a partially
/// observed failure is safe to repeat.
pub async fn retry_read<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, OrderStoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OrderStoreError>>,
{
    let attempts = policy.attempts.max(1);
    let mut backoff = policy.initial_backoff;
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!("🗃️ {label} failed on attempt {attempt}/{attempts}. Retrying in {backoff:?}. {e}");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            },
            result => return result,
        }
    }
}
