//! Exponential backoff shared by the HTTP model clients

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{Error, Result};

/// Longest pause between two attempts
const MAX_BACKOFF_SECS: u64 = 60;

/// Delay before retrying after failed attempt `attempt` (zero-based)
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS))
}

/// Run `operation` up to `max_retries + 1` times, sleeping `2^attempt`
/// seconds (capped at one minute) between attempts. With `max_retries == 0`
/// the first error is returned as is.
pub(crate) async fn retry_request<F, Fut, T>(max_retries: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..=max_retries {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt < max_retries {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        "Request failed (attempt {}/{}): {}, retrying in {:?}",
                        attempt + 1,
                        max_retries + 1,
                        e,
                        delay
                    );
                    sleep(delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::internal("Retry loop ended without a result")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_no_retries_returns_first_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_request(0, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::generation_unavailable("down")) }
        })
        .await;

        assert!(matches!(result, Err(Error::GenerationUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
        assert_eq!(backoff_delay(6), Duration::from_secs(60));
        assert_eq!(backoff_delay(70), Duration::from_secs(60));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_large_retry_budget_does_not_overflow() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_request(70, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::generation_unavailable("down")) }
        })
        .await;

        assert!(matches!(result, Err(Error::GenerationUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 71);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_request(2, || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(Error::generation_unavailable("flaky"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
