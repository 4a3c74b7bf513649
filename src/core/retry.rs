use std::future::Future;
use std::time::Duration;
use rand::Rng;
use tracing::warn;
use crate::core::domain::Configuration;
use crate::core::library::LibraryResult;

// RetryPolicy bounds how often an operation that lost an optimistic-concurrency
// race is re-run from a fresh read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_millis: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_millis: u64) -> Self {
        Self { max_retries, backoff_millis }
    }

    pub fn from_config(config: &Configuration) -> Self {
        Self::new(config.max_conflict_retries, config.retry_backoff_millis)
    }

    // exponential backoff with up to 50% random jitter
    fn delay(&self, attempt: u32) -> Duration {
        let base = self.backoff_millis.saturating_mul(1u64 << attempt.min(10));
        let jitter = if base > 1 { rand::thread_rng().gen_range(0..=base / 2) } else { 0 };
        Duration::from_millis(base + jitter)
    }

    // Runs `op` until it succeeds, fails with an error other than ConcurrencyConflict,
    // or the retry budget is exhausted. Every attempt must re-read its own state.
    pub async fn run<T, F, Fut>(&self, name: &str, mut op: F) -> LibraryResult<T>
        where F: FnMut() -> Fut,
              Fut: Future<Output=LibraryResult<T>> {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(err) if err.is_conflict() && attempt < self.max_retries => {
                    warn!("{} lost a concurrent update (attempt {}), retrying: {}", name, attempt + 1, err);
                    tokio::time::sleep(self.delay(attempt)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use crate::core::library::LibraryError;
    use crate::core::retry::RetryPolicy;

    #[tokio::test]
    async fn test_should_retry_conflicts_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let res = RetryPolicy::new(3, 1).run("test", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(LibraryError::concurrency_conflict("stale"))
            } else {
                Ok(7)
            }
        }).await;
        assert_eq!(Ok(7), res);
        assert_eq!(3, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_should_surface_conflict_after_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let res: Result<(), LibraryError> = RetryPolicy::new(2, 1).run("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LibraryError::concurrency_conflict("stale"))
        }).await;
        assert!(matches!(res, Err(LibraryError::ConcurrencyConflict { .. })));
        assert_eq!(3, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_should_not_retry_business_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let res: Result<(), LibraryError> = RetryPolicy::new(5, 1).run("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LibraryError::expired("too late"))
        }).await;
        assert!(matches!(res, Err(LibraryError::Expired { .. })));
        assert_eq!(1, calls.load(Ordering::SeqCst));
    }
}
