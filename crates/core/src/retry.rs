//! Bounded retries with exponential backoff for upstream fetches.
//!
//! The upstream resource server runs on an elastic backend that cold
//! starts after idle periods: the first call routinely times out or is
//! refused, and a warm retry within a few seconds succeeds. The backoff
//! schedule bounds the worst case while giving the backend time to
//! finish initializing.

use std::collections::BTreeSet;
use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::time::Duration;

use reqwest::RequestBuilder;
use tokio::time::{sleep, timeout};

/// Tuning knobs for one logical fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after every retryable outcome.
    pub backoff_factor: u32,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// HTTP statuses treated as retryable.
    pub retryable_statuses: BTreeSet<u16>,
}

impl Default for RetryPolicy {
    /// 3 retries, 1 s base delay, factor 2 (so 1 s, 2 s, 4 s), 30 s
    /// per-attempt timeout, and the usual transient status set.
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            backoff_factor: 2,
            timeout: Duration::from_millis(30_000),
            retryable_statuses: [408, 429, 500, 502, 503, 504].into(),
        }
    }
}

impl RetryPolicy {
    /// The delay to wait after the given 1-based attempt fails.
    #[inline]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * self.backoff_factor.pow(attempt.saturating_sub(1))
    }

    /// Whether the status is in the retryable set.
    #[inline]
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

/// The kind of fetch failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// No response within the per-attempt timeout.
    Timeout,
    /// A transport-level failure: DNS, refused connection, aborted
    /// request, unreadable reply body.
    Connection,
}

/// A network-level fetch failure.
///
/// Non-2xx replies are not errors at this layer: the response is handed
/// back to the caller, which knows how to read the upstream's error
/// envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
}

impl FetchError {
    /// Creates a new error.
    #[inline]
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    /// Returns the failure description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for FetchError {}

/// The classified outcome of one attempt.
pub enum AttemptOutcome<T, E> {
    /// Final outcome; no further attempts.
    Done(Result<T, E>),
    /// Retryable failure. The carried result becomes final if the retry
    /// budget is exhausted.
    Retry(Result<T, E>),
}

/// Runs `op` under `policy`, retrying retryable outcomes with
/// exponential backoff.
///
/// `op` receives the 1-based attempt number and classifies its own
/// outcome. At most `max_retries + 1` attempts are made. One log event
/// is emitted per retry; the events are diagnostic only.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = AttemptOutcome<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            AttemptOutcome::Done(result) => {
                if let Err(err) = &result {
                    debug!(attempt, "fetch failed terminally: {err}");
                }
                return result;
            }
            AttemptOutcome::Retry(result) => {
                if attempt > policy.max_retries {
                    warn!(attempt, "fetch failed after exhausting retries");
                    return result;
                }
                let delay = policy.delay_after(attempt);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retryable fetch failure, backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Sends an HTTP request with bounded retries.
///
/// `build` constructs a fresh request for every attempt. Timeouts and
/// transport-level errors are retryable; so is any reply whose status is
/// in the policy's retryable set. Every other reply, 2xx or not, is
/// returned to the caller as-is.
pub async fn send_with_retry<F>(
    policy: &RetryPolicy,
    mut build: F,
) -> Result<reqwest::Response, FetchError>
where
    F: FnMut() -> RequestBuilder,
{
    let per_attempt_timeout = policy.timeout;
    retry_with_backoff(policy, |_attempt| {
        let fut = timeout(per_attempt_timeout, build().send());
        async move {
            match fut.await {
                Err(_elapsed) => {
                    AttemptOutcome::Retry(Err(FetchError::new(
                        FetchErrorKind::Timeout,
                        format!(
                            "no response within {} ms",
                            per_attempt_timeout.as_millis()
                        ),
                    )))
                }
                Ok(Err(err)) => {
                    let fetch_err = FetchError::new(
                        FetchErrorKind::Connection,
                        format!("{err}"),
                    );
                    if is_transport_error(&err) {
                        AttemptOutcome::Retry(Err(fetch_err))
                    } else {
                        AttemptOutcome::Done(Err(fetch_err))
                    }
                }
                Ok(Ok(resp)) => {
                    let status = resp.status().as_u16();
                    if policy.is_retryable_status(status) {
                        AttemptOutcome::Retry(Ok(resp))
                    } else {
                        AttemptOutcome::Done(Ok(resp))
                    }
                }
            }
        }
    })
    .await
}

/// Whether a `reqwest` error is a transport failure worth retrying, as
/// opposed to a programming error (malformed request, decode failure).
fn is_transport_error(err: &reqwest::Error) -> bool {
    if err.is_builder() || err.is_decode() || err.is_redirect() {
        return false;
    }
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::future::ready;

    use tokio::time::Instant;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct TestError(&'static str);

    impl Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_and_schedule() {
        let policy = RetryPolicy::default();
        let attempts = Cell::new(0u32);

        let started = Instant::now();
        let result: Result<(), TestError> =
            retry_with_backoff(&policy, |attempt| {
                attempts.set(attempts.get() + 1);
                assert_eq!(attempt, attempts.get());
                ready(AttemptOutcome::Retry(Err(TestError("always fails"))))
            })
            .await;

        assert_eq!(result, Err(TestError("always fails")));
        // The initial attempt plus `max_retries` retries.
        assert_eq!(attempts.get(), policy.max_retries + 1);
        // Backoff schedule 1 s, 2 s, 4 s under a paused clock.
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_short_circuit() {
        let policy = RetryPolicy::default();
        let attempts = Cell::new(0u32);

        let started = Instant::now();
        let result: Result<(), TestError> =
            retry_with_backoff(&policy, |_| {
                attempts.set(attempts.get() + 1);
                ready(AttemptOutcome::Done(Err(TestError("not found"))))
            })
            .await;

        assert_eq!(result, Err(TestError("not found")));
        assert_eq!(attempts.get(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retryable_failures() {
        let policy = RetryPolicy::default();
        let attempts = Cell::new(0u32);

        let result: Result<u32, TestError> =
            retry_with_backoff(&policy, |attempt| {
                attempts.set(attempts.get() + 1);
                if attempt < 3 {
                    ready(AttemptOutcome::Retry(Err(TestError("cold start"))))
                } else {
                    ready(AttemptOutcome::Done(Ok(attempt)))
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_value_becomes_final_on_exhaustion() {
        let policy = RetryPolicy {
            max_retries: 1,
            ..Default::default()
        };

        // A retryable status keeps carrying the reply; the last one wins.
        let result: Result<u16, TestError> =
            retry_with_backoff(&policy, |attempt| {
                ready(AttemptOutcome::Retry(Ok(500 + attempt as u16)))
            })
            .await;
        assert_eq!(result, Ok(502));
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
    }

    #[test]
    fn test_status_classification() {
        let policy = RetryPolicy::default();
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(policy.is_retryable_status(status), "{status}");
        }
        for status in [200, 201, 301, 400, 401, 403, 404, 422, 501] {
            assert!(!policy.is_retryable_status(status), "{status}");
        }
    }
}
