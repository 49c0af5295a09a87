//! Retry and timeout combinators for [`Task`].

use std::sync::Arc;
use std::time::Duration;

use crate::cancel::{self, Wait};
use crate::retry::{RetryError, RetryExhausted, RetryPolicy, TimeoutError};
use crate::task::Task;

impl<T, E, Caps> Task<T, E, Caps>
where
    T: Send + 'static,
    E: Send + 'static,
    Caps: Sync + 'static,
{
    /// Re-run this task on failure according to `policy`.
    ///
    /// Every attempt is a fresh run of the same task with the same
    /// capabilities and token. Waits between attempts end early if the token
    /// is signaled.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::atomic::{AtomicU32, Ordering};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    /// use undertow::{RetryPolicy, Task};
    ///
    /// # tokio_test::block_on(async {
    /// let calls = Arc::new(AtomicU32::new(0));
    /// let counter = Arc::clone(&calls);
    ///
    /// let flaky = Task::<_, String, ()>::create(move |_, _| {
    ///     let n = counter.fetch_add(1, Ordering::SeqCst);
    ///     Box::pin(async move {
    ///         if n < 2 { Err("not yet".to_string()) } else { Ok(n) }
    ///     })
    /// });
    ///
    /// let task = flaky.retry(RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(5));
    /// assert_eq!(task.run(&(), None).await, Ok(2));
    /// # });
    /// ```
    pub fn retry(self, policy: RetryPolicy) -> Task<T, RetryError<E>, Caps> {
        self.retry_if(policy, |_| true)
    }

    /// Re-run this task on failures for which `should_retry` returns true.
    ///
    /// An error the predicate rejects ends the run with [`RetryError::Aborted`].
    pub fn retry_if<P>(self, policy: RetryPolicy, should_retry: P) -> Task<T, RetryError<E>, Caps>
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let policy = Arc::new(policy);
        let should_retry = Arc::new(should_retry);
        Task::<T, RetryError<E>, Caps>::create(move |caps, cancel| {
            let task = self.clone();
            let policy = Arc::clone(&policy);
            let should_retry = Arc::clone(&should_retry);
            Box::pin(async move {
                let start = tokio::time::Instant::now();
                let mut waited = Duration::ZERO;
                let mut attempt = 0u32;

                loop {
                    let error = match task.run(caps, cancel).await {
                        Ok(value) => {
                            if attempt > 0 {
                                tracing::debug!(attempts = attempt + 1, "retry succeeded");
                            }
                            return Ok(value);
                        }
                        Err(error) => error,
                    };
                    let attempts = attempt + 1;

                    if !should_retry(&error) {
                        tracing::debug!(attempts, "error rejected by retry predicate");
                        return Err(RetryError::Aborted(error));
                    }

                    let Some(delay) = policy.next_delay(attempt, waited) else {
                        tracing::warn!(attempts, elapsed = ?start.elapsed(), "retries exhausted");
                        return Err(RetryError::Exhausted(RetryExhausted::new(
                            error,
                            attempts,
                            start.elapsed(),
                        )));
                    };

                    tracing::debug!(attempt = attempts, ?delay, "attempt failed, backing off");
                    if cancel::sleep(delay, cancel).await == Wait::Cancelled {
                        tracing::debug!(attempts, "retry cancelled during backoff");
                        return Err(RetryError::Cancelled {
                            last_error: error,
                            attempts,
                        });
                    }

                    waited = waited.saturating_add(delay);
                    attempt += 1;
                }
            })
        })
    }

    /// Fail with [`TimeoutError::Timeout`] if a run takes longer than `duration`.
    ///
    /// The pending run is dropped when the deadline passes.
    pub fn timeout(self, duration: Duration) -> Task<T, TimeoutError<E>, Caps> {
        Task::<T, TimeoutError<E>, Caps>::create(move |caps, cancel| {
            let pending = self.run(caps, cancel);
            Box::pin(async move {
                match tokio::time::timeout(duration, pending).await {
                    Ok(result) => result.map_err(TimeoutError::Inner),
                    Err(_) => {
                        tracing::warn!(?duration, "task timed out");
                        Err(TimeoutError::timeout(duration))
                    }
                }
            })
        })
    }
}
