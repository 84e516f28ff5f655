//! Retry with exponential backoff for store requests.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::error::{RemoteError, RemoteResult};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt
    pub max_retries: u32,
    /// Base delay before the first retry
    pub base_delay_ms: u64,
    /// Upper bound on any single delay
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based), with full jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay_ms.saturating_mul(1u64 << attempt.min(16));
        let capped = exp.min(self.max_delay_ms);
        Duration::from_millis(jitter(capped))
    }
}

/// Full jitter in [cap/2, cap] without pulling in a RNG.
fn jitter(cap_ms: u64) -> u64 {
    if cap_ms == 0 {
        return 0;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    cap_ms / 2 + nanos % (cap_ms / 2 + 1)
}

/// Run `op`, retrying on transient failures (rate limits, 5xx, network).
///
/// A rate-limit response carrying a `Retry-After` hint overrides the
/// backoff schedule for that attempt.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, mut op: F) -> RemoteResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RemoteResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                let delay = retry_after_hint(&e).unwrap_or_else(|| config.delay_for(attempt));
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient store failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Extract a server-provided delay from a rate-limit response.
fn retry_after_hint(error: &RemoteError) -> Option<Duration> {
    match error {
        RemoteError::RateLimited {
            retry_after_secs: Some(secs),
        } => Some(Duration::from_secs(*secs)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_bounds() {
        let config = RetryConfig::default();
        for attempt in 1..=5 {
            let d = config.delay_for(attempt);
            assert!(d.as_millis() as u64 <= config.max_delay_ms);
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
        };
        let calls = AtomicU32::new(0);
        let result = with_retry(&config, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(RemoteError::StatusError {
                        status: 503,
                        body: "unavailable".to_string(),
                    })
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;
        assert_eq!(result.ok(), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let config = RetryConfig::default();
        let calls = AtomicU32::new(0);
        let result: RemoteResult<()> = with_retry(&config, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(RemoteError::StatusError {
                    status: 404,
                    body: "missing".to_string(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retry_after_hint() {
        let e = RemoteError::RateLimited {
            retry_after_secs: Some(7),
        };
        assert_eq!(retry_after_hint(&e), Some(Duration::from_secs(7)));
        let e = RemoteError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(retry_after_hint(&e), None);
    }
}
