//! Bounded retry policy for admin API calls.
//!
//! The default policy performs no retries: a failed request is reported to the
//! caller on the first error. Raising `max_retries` enables exponential
//! backoff for errors that `AdminError::is_retryable` accepts.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::admin_api::AdminError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure (0 = fail fast).
    pub max_retries: u32,
    pub base_delay_ms: f64,
    pub max_delay_ms: f64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 500.0,
            max_delay_ms: 10_000.0,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `attempt` (0-based): exponential growth up to
    /// `max_delay_ms`, scaled by a factor in `[0.95, 1.05)` and never above
    /// the cap.
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let capped = (self.base_delay_ms * self.backoff_multiplier.powi(exponent))
            .min(self.max_delay_ms);
        let spread = 0.95 + rand::random::<f64>() * 0.1;
        let ms = (capped * spread).clamp(0.0, self.max_delay_ms.max(0.0));
        Duration::try_from_secs_f64(ms / 1000.0).unwrap_or_default()
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's retry budget is spent.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, AdminError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdminError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let wait = policy.backoff(attempt);
                attempt += 1;
                tracing::warn!(
                    request = label,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    error = %e,
                    "retrying admin request"
                );
                tokio::time::sleep(wait).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(base: f64, max: f64) -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay_ms: base,
            max_delay_ms: max,
            backoff_multiplier: 2.0,
        }
    }

    fn ms(d: Duration) -> f64 {
        d.as_secs_f64() * 1000.0
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let p = policy(1000.0, 30_000.0);
        for (attempt, nominal) in [(0, 1000.0), (1, 2000.0), (3, 8000.0)] {
            let got = ms(p.backoff(attempt));
            assert!(
                got >= nominal * 0.95 - 1e-6 && got < nominal * 1.05 + 1e-6,
                "attempt {attempt}: got {got}"
            );
        }
    }

    #[test]
    fn backoff_never_exceeds_cap() {
        let p = policy(1000.0, 5000.0);
        assert!(ms(p.backoff(5)) <= 5000.0 + 1e-6);
        assert!(ms(p.backoff(u32::MAX)) <= 5000.0 + 1e-6);
    }

    #[test]
    fn default_policy_never_retries() {
        assert_eq!(RetryPolicy::default().max_retries, 0);
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay_ms: 1.0,
            max_delay_ms: 2.0,
            backoff_multiplier: 1.0,
        }
    }

    #[tokio::test]
    async fn default_policy_fails_on_first_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&RetryPolicy::default(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AdminError::Network("connection refused".into())) }
        })
        .await;
        assert!(matches!(result, Err(AdminError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AdminError::Http { status: 503, body: String::new() })
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_budget_is_spent() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(2), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AdminError::Network("timeout".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_unauthorized() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(5), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AdminError::Unauthorized) }
        })
        .await;
        assert!(matches!(result, Err(AdminError::Unauthorized)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
