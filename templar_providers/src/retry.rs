use std::fmt::Display;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Delays between attempts of a retried operation.
///
/// The operation runs once, then once more after each delay in
/// `base_delays`, then `final_retries` more times spaced by `final_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delays: Vec<Duration>,
    pub final_delay: Duration,
    pub final_retries: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delays: vec![Duration::from_secs(1), Duration::from_secs(2)],
            final_delay: Duration::from_secs(4),
            final_retries: 1,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            base_delays: Vec::new(),
            final_delay: Duration::ZERO,
            final_retries: 0,
        }
    }

    /// Total number of attempts this policy allows.
    #[must_use]
    pub fn attempts(&self) -> usize {
        1 + self.base_delays.len() + self.final_retries
    }

    fn delay_before(&self, attempt: usize) -> Option<Duration> {
        // `attempt` is the 1-based attempt that just failed.
        if attempt >= self.attempts() {
            return None;
        }
        Some(
            self.base_delays
                .get(attempt - 1)
                .copied()
                .unwrap_or(self.final_delay),
        )
    }
}

/// Retry an async operation following `policy`.
///
/// Errors for which `is_retryable` returns false are returned at once.
/// Otherwise returns the first success, or the error of the last attempt.
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    mut operation: F,
    policy: &RetryPolicy,
    is_retryable: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
    R: Fn(&E) -> bool,
{
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !is_retryable(&e) {
                    return Err(e);
                }
                let Some(delay) = policy.delay_before(attempt) else {
                    return Err(e);
                };
                warn!(
                    "Request failed (attempt {attempt}/{}): {e}. Retrying after {}ms...",
                    policy.attempts(),
                    delay.as_millis()
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn instant_policy(base: usize, final_retries: usize) -> RetryPolicy {
        RetryPolicy {
            base_delays: vec![Duration::ZERO; base],
            final_delay: Duration::ZERO,
            final_retries,
        }
    }

    #[tokio::test]
    async fn retry_succeeds_on_first_attempt() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result = retry_with_backoff(
            || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), String>(())
                }
            },
            &instant_policy(2, 2),
            |_| true,
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_succeeds_after_failures() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result: std::result::Result<(), String> = retry_with_backoff(
            || {
                let attempts = attempts.clone();
                async move {
                    let count = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if count < 3 {
                        Err(String::from("fail"))
                    } else {
                        Ok(())
                    }
                }
            },
            &instant_policy(2, 2),
            |_| true,
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_fails_after_all_attempts() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result: std::result::Result<(), String> = retry_with_backoff(
            || {
                let attempts = attempts.clone();
                async move {
                    let count = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    Err(format!("fail {count}"))
                }
            },
            &instant_policy(2, 2),
            |_| true,
        )
        .await;
        assert_eq!(result, Err("fail 5".to_string()));
        assert_eq!(attempts.load(Ordering::SeqCst), 5); // 1 + 2 base + 2 final
    }

    #[tokio::test]
    async fn none_policy_makes_one_attempt() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result: std::result::Result<(), String> = retry_with_backoff(
            || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(String::from("fail"))
                }
            },
            &RetryPolicy::none(),
            |_| true,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result: std::result::Result<(), String> = retry_with_backoff(
            || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(String::from("400 bad request"))
                }
            },
            &instant_policy(2, 2),
            |e: &String| !e.starts_with('4'),
        )
        .await;
        assert_eq!(result, Err("400 bad request".to_string()));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delays_follow_base_then_final() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts(), 4);
        assert_eq!(policy.delay_before(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_before(2), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_before(3), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_before(4), None);
    }
}
