//! Retrying HTTP fetch built on the [`Http`] capability.
//!
//! [`fetch_attempts`] reports every attempt as an emission, so a caller can
//! show progress while a flaky endpoint is retried. [`fetch_with_retry`] is
//! the same computation reduced to its final outcome.
//!
//! Each attempt works as follows:
//!
//! 1. If the cancel token is already signaled, emit a non-retryable
//!    cancellation failure and stop without calling the capability.
//! 2. Call [`Http::fetch`]. A 2xx response is emitted as the final success.
//!    A capability error or any other status is a failed attempt. Signaling
//!    the token while the call is in flight drops it and ends the stream
//!    with a cancellation failure.
//! 3. Ask the policy for the next delay. If it refuses, because the retry
//!    count is used up or the accumulated wait would pass `max_elapsed`,
//!    emit a final failure flagged retryable and stop.
//! 4. Otherwise emit the failed attempt, wait, and go again. Signaling the
//!    token during the wait ends it at once with a cancellation failure.
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//! use undertow::capability::{CapabilityError, HttpRequest, HttpResponse};
//! use undertow::fetch::fetch_with_retry;
//! use undertow::testing::ScriptedHttp;
//! use undertow::RetryPolicy;
//!
//! # tokio_test::block_on(async {
//! let http = ScriptedHttp::new()
//!     .fail(CapabilityError::failed("connection reset"))
//!     .respond(HttpResponse::new(200, "pong"));
//!
//! let policy = RetryPolicy::exponential(Duration::from_millis(1))
//!     .with_max_elapsed(Duration::from_secs(1));
//!
//! let ping = fetch_with_retry(HttpRequest::get("https://example.test/ping"), policy);
//! let response = ping.run(&http, None).await.unwrap();
//!
//! assert_eq!(response.text(), "pong");
//! assert_eq!(http.calls(), 2);
//! # });
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::cancel::{self, Wait};
use crate::capability::{Http, HttpRequest, HttpResponse};
use crate::failure::Failure;
use crate::progress::Progress;
use crate::retry::RetryPolicy;
use crate::stream::Stream;
use crate::task::Task;

/// Exponential backoff from 200ms, doubling, capped at 5s per wait and 30s overall.
pub fn default_policy() -> RetryPolicy {
    RetryPolicy::exponential(Duration::from_millis(200))
        .with_max_delay(Duration::from_secs(5))
        .with_max_elapsed(Duration::from_secs(30))
}

/// Fetch `request`, emitting one result per attempt.
///
/// Failed attempts are retryable failures tagged `Progress { current: n }`.
/// The stream ends with a success, a retryable failure once `policy` gives
/// up, or a non-retryable cancellation failure.
pub fn fetch_attempts<C>(request: HttpRequest, policy: RetryPolicy) -> Stream<HttpResponse, Failure, C>
where
    C: Http + 'static,
{
    let request = Arc::new(request);
    let policy = Arc::new(policy);

    Stream::channel(move |http: &C, cancel, mut emitter| {
        let request = Arc::clone(&request);
        let policy = Arc::clone(&policy);

        Box::pin(async move {
            let mut waited = Duration::ZERO;
            let mut attempt = 0u32;

            loop {
                let number = u64::from(attempt) + 1;

                if let Some(token) = cancel.filter(|token| token.is_cancelled()) {
                    tracing::debug!(url = %request.url, "fetch cancelled before attempt");
                    let _ = emitter
                        .failure(Failure::cancelled(token.reason()), Progress::at(number))
                        .await;
                    return;
                }

                let in_flight = http.fetch(HttpRequest::clone(&request));
                let Some(outcome) = cancel::or_cancelled(in_flight, cancel).await else {
                    tracing::debug!(url = %request.url, attempt = number, "fetch cancelled in flight");
                    let reason = cancel.and_then(|token| token.reason());
                    let _ = emitter
                        .failure(Failure::cancelled(reason), Progress::at(number))
                        .await;
                    return;
                };

                let failure = match outcome {
                    Ok(response) if response.is_success() => {
                        tracing::debug!(url = %request.url, attempt = number, status = response.status, "fetch succeeded");
                        let _ = emitter.success(response, Progress::at(number)).await;
                        return;
                    }
                    Ok(response) => Failure::retryable(format!(
                        "{} {} returned status {}",
                        request.method, request.url, response.status
                    )),
                    Err(error) => Failure::retryable(format!(
                        "{} {} failed: {}",
                        request.method, request.url, error
                    )),
                };

                let Some(delay) = policy.next_delay(attempt, waited) else {
                    tracing::warn!(url = %request.url, attempts = number, error = %failure.message, "fetch retries exhausted");
                    let exhausted = Failure::retryable(format!(
                        "gave up after {} attempts: {}",
                        number, failure.message
                    ));
                    let _ = emitter.failure(exhausted, Progress::at(number)).await;
                    return;
                };

                tracing::debug!(url = %request.url, attempt = number, ?delay, error = %failure.message, "fetch failed, backing off");
                if emitter.failure(failure, Progress::at(number)).await.is_err() {
                    return;
                }

                if cancel::sleep(delay, cancel).await == Wait::Cancelled {
                    tracing::debug!(url = %request.url, "fetch cancelled during backoff");
                    let reason = cancel.and_then(|token| token.reason());
                    let _ = emitter
                        .failure(Failure::cancelled(reason), Progress::at(number))
                        .await;
                    return;
                }

                waited = waited.saturating_add(delay);
                attempt += 1;
            }
        })
    })
}

/// Fetch `request`, retrying per `policy`, and resolve to the final outcome.
///
/// This is [`fetch_attempts`] reduced with [`Stream::to_task`].
pub fn fetch_with_retry<C>(request: HttpRequest, policy: RetryPolicy) -> Task<HttpResponse, Failure, C>
where
    C: Http + 'static,
{
    fetch_attempts(request, policy).to_task()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::capability::CapabilityError;
    use crate::progress::Emission;
    use crate::testing::ScriptedHttp;
    use tracing_test::traced_test;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy::exponential(Duration::from_millis(100))
            .with_max_elapsed(Duration::from_millis(350))
    }

    fn request() -> HttpRequest {
        HttpRequest::get("https://example.test/data")
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_succeeds() {
        let http = ScriptedHttp::new().respond(HttpResponse::new(200, "ok"));

        let emissions = fetch_attempts(request(), quick_policy())
            .collect(&http, None)
            .await;

        assert_eq!(
            emissions,
            vec![Emission::success(HttpResponse::new(200, "ok"), Progress::at(1))]
        );
        assert_eq!(http.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_attempts_are_emitted_before_success() {
        let http = ScriptedHttp::new()
            .fail(CapabilityError::failed("reset"))
            .respond(HttpResponse::new(503, "busy"))
            .respond(HttpResponse::new(200, "ok"));

        let emissions = fetch_attempts(request(), quick_policy())
            .collect(&http, None)
            .await;

        assert_eq!(emissions.len(), 3);
        assert!(emissions[..2].iter().all(|e| e.is_failure()));
        assert!(emissions[..2]
            .iter()
            .all(|e| e.result.as_ref().is_err_and(|f| f.retryable)));
        assert!(emissions[1]
            .result
            .as_ref()
            .is_err_and(|f| f.message.contains("status 503")));
        assert_eq!(emissions[2].result.as_ref().map(|r| r.status), Ok(200));
        let positions: Vec<_> = emissions.iter().map(|e| e.progress.current).collect();
        assert_eq!(positions, vec![Some(1), Some(2), Some(3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_at_ceiling_with_retryable_failure() {
        let http = ScriptedHttp::new().fail(CapabilityError::failed("down"));

        let started = tokio::time::Instant::now();
        let result = fetch_with_retry(request(), quick_policy())
            .run(&http, None)
            .await;

        let failure = result.unwrap_err();
        assert!(failure.retryable);
        assert!(failure.message.starts_with("gave up after 3 attempts"));
        assert_eq!(http.calls(), 3);
        // 100ms + 200ms; the 400ms wait would pass the 350ms ceiling
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(400));
    }

    #[test]
    fn test_default_policy_is_bounded() {
        let policy = default_policy();
        assert!(policy.validate().is_ok());
        assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for_attempt(10), Some(Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_retries_also_bounds_attempts() {
        let http = ScriptedHttp::new().respond(HttpResponse::new(500, "oops"));
        let policy = RetryPolicy::constant(Duration::from_millis(5)).with_max_retries(1);

        let emissions = fetch_attempts(request(), policy).collect(&http, None).await;

        assert_eq!(emissions.len(), 2);
        assert_eq!(http.calls(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_capability() {
        let http = ScriptedHttp::new().respond(HttpResponse::new(200, "ok"));
        let token = CancelToken::new();
        token.cancel_with("navigated away");

        let result = fetch_with_retry(request(), quick_policy())
            .run(&http, Some(&token))
            .await;

        assert_eq!(result, Err(Failure::cancelled(Some("navigated away"))));
        assert!(!Failure::cancelled(None).retryable);
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_ends_immediately() {
        let http = ScriptedHttp::new().fail(CapabilityError::failed("down"));
        let token = CancelToken::new();
        let canceller = token.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let policy = RetryPolicy::constant(Duration::from_secs(60)).with_max_retries(3);
        let started = tokio::time::Instant::now();
        let emissions = fetch_attempts(request(), policy)
            .collect(&http, Some(&token))
            .await;

        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(http.calls(), 1);
        let last = emissions.last().map(|e| e.result.clone());
        assert_eq!(last, Some(Err(Failure::cancelled(None))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_request_in_flight() {
        let http = ScriptedHttp::new()
            .respond(HttpResponse::new(200, "late"))
            .with_latency(Duration::from_secs(30));
        let token = CancelToken::new();
        let canceller = token.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel_with("page closed");
        });

        let started = tokio::time::Instant::now();
        let emissions = fetch_attempts(request(), quick_policy())
            .collect(&http, Some(&token))
            .await;

        assert!(started.elapsed() < Duration::from_secs(30));
        assert_eq!(http.calls(), 1);
        assert_eq!(
            emissions,
            vec![Emission::failure(
                Failure::cancelled(Some("page closed")),
                Progress::at(1)
            )]
        );
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_logs_backoff_and_exhaustion() {
        let http = ScriptedHttp::new().fail(CapabilityError::failed("down"));

        let _ = fetch_with_retry(request(), quick_policy())
            .run(&http, None)
            .await;

        assert!(logs_contain("fetch failed, backing off"));
        assert!(logs_contain("fetch retries exhausted"));
    }
}
