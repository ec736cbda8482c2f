//! Retry policy with exponential backoff
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | Timeout / network error | Retry with backoff |
//! | HTTP 5xx | Retry with backoff |
//! | HTTP 429 | Retry after `Retry-After`, else backoff |
//! | Other 4xx | Terminal |
//! | Payload too large | Terminal |
//!
//! Backoff doubles from `base_delay` per attempt and never exceeds `max_delay`;
//! a server-supplied `Retry-After` is capped the same way.

use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Classifies an error as worth retrying
pub trait Transient {
    /// Returns true if the same request might succeed later
    fn is_transient(&self) -> bool;

    /// Server-requested delay before the next attempt
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Attempt ceiling and backoff shape for one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Builds a policy from a retry count (attempts after the first)
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_retries.saturating_add(1),
            base_delay,
            max_delay,
        }
    }

    /// Backoff delay after the given failed attempt (1-based)
    ///
    /// # Example
    ///
    /// ```
    /// use newsletter_relocator::fetch::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(350));
    /// assert_eq!(policy.delay_for(1), Duration::from_millis(100));
    /// assert_eq!(policy.delay_for(2), Duration::from_millis(200));
    /// assert_eq!(policy.delay_for(3), Duration::from_millis(350));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Delay before retrying after `error` failed the given attempt
    fn delay_after<E: Transient>(&self, error: &E, attempt: u32) -> Duration {
        match error.retry_after() {
            Some(requested) => requested.min(self.max_delay),
            None => self.delay_for(attempt),
        }
    }
}

/// Parses a `Retry-After` header value
///
/// Accepts delta-seconds (`120`) or an HTTP-date
/// (`Wed, 21 Oct 2015 07:28:00 GMT`). Dates in the past yield a zero delay.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = at.with_timezone(&Utc) - now;
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}

/// Runs `operation` until it succeeds, fails terminally, or runs out of attempts
///
/// The operation receives the 1-based attempt number. Cancellation during a
/// backoff sleep abandons the remaining attempts and returns the last error, so
/// no new request is issued after the token fires.
///
/// # Returns
///
/// The final result and the number of attempts made
pub async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut operation: F,
) -> (Result<T, E>, u32)
where
    E: Transient + Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return (Ok(value), attempt),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(&e, attempt);
                tracing::debug!(
                    "{} attempt {}/{} failed: {}; retrying in {:?}",
                    label,
                    attempt,
                    policy.max_attempts,
                    e,
                    delay
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::debug!("{} abandoned after cancellation", label);
                        return (Err(e), attempt);
                    }
                    _ = tokio::time::sleep(delay) => {}
                }

                attempt += 1;
            }
            Err(e) => return (Err(e), attempt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::cell::Cell;

    #[derive(Debug)]
    struct TestError {
        transient: bool,
        wait: Option<Duration>,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error")
        }
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            self.transient
        }

        fn retry_after(&self) -> Option<Duration> {
            self.wait
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1), Duration::from_millis(5))
    }

    #[test]
    fn test_attempt_ceiling() {
        assert_eq!(fast_policy(0).max_attempts, 1);
        assert_eq!(fast_policy(2).max_attempts, 3);
        assert_eq!(RetryPolicy::default().max_attempts, 3);
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(8));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for(40), Duration::from_secs(8));
    }

    #[test]
    fn test_retry_after_is_capped() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(10));
        let error = TestError {
            transient: true,
            wait: Some(Duration::from_secs(3600)),
        };
        assert_eq!(policy.delay_after(&error, 1), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_retry_after() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap();
        assert_eq!(parse_retry_after("120", now), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after(" 0 ", now), Some(Duration::ZERO));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after("soon", now), None);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let cancel = CancellationToken::new();
        let calls = Cell::new(0);
        let (result, attempts) = run_with_retry(&fast_policy(2), &cancel, "test", |attempt| {
            calls.set(calls.get() + 1);
            async move {
                if attempt < 3 {
                    Err(TestError {
                        transient: true,
                        wait: None,
                    })
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts, 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_at_ceiling() {
        let cancel = CancellationToken::new();
        let (result, attempts) = run_with_retry(&fast_policy(2), &cancel, "test", |_| async {
            Err::<(), _>(TestError {
                transient: true,
                wait: Some(Duration::from_millis(1)),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_terminal_error_is_not_retried() {
        let cancel = CancellationToken::new();
        let (result, attempts) = run_with_retry(&fast_policy(5), &cancel, "test", |_| async {
            Err::<(), _>(TestError {
                transient: false,
                wait: None,
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_retries() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (result, attempts) = run_with_retry(&fast_policy(5), &cancel, "test", |_| async {
            Err::<(), _>(TestError {
                transient: true,
                wait: None,
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }
}
