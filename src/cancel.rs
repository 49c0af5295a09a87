//! Cooperative cancellation.
//!
//! A [`CancelToken`] is a shared flag with an optional reason. Running a
//! [`Task`](crate::Task) or [`Stream`](crate::Stream) lends the token to every
//! step of the computation, but only leaves look at it: combinators forward it
//! untouched. Cancellation is advisory, so a leaf that never checks the token
//! runs to completion.
//!
//! # Examples
//!
//! ```
//! use undertow::CancelToken;
//!
//! let token = CancelToken::new();
//! let observer = token.clone();
//!
//! token.cancel_with("user closed the tab");
//!
//! assert!(observer.is_cancelled());
//! assert_eq!(observer.reason(), Some("user closed the tab"));
//! ```

use std::future::Future;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::Notify;

/// A clonable, shared cancellation signal.
///
/// Clones observe the same state. Once signaled, a token stays signaled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    reason: OnceLock<String>,
    notify: Notify,
}

impl CancelToken {
    /// Create a token that has not been signaled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation without a reason.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            tracing::debug!("cancellation requested");
        }
        self.inner.notify.notify_waiters();
    }

    /// Signal cancellation with a reason.
    ///
    /// The first reason recorded wins; later reasons are ignored.
    pub fn cancel_with(&self, reason: impl Into<String>) {
        let _ = self.inner.reason.set(reason.into());
        self.cancel();
    }

    /// Returns true once the token has been signaled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// The reason given when the token was signaled, if any.
    pub fn reason(&self) -> Option<&str> {
        self.inner.reason.get().map(String::as_str)
    }

    /// Wait until the token is signaled.
    ///
    /// Resolves immediately if it already is.
    pub async fn cancelled(&self) {
        loop {
            let mut notified = pin!(self.inner.notify.notified());
            // Register before checking the flag so a concurrent `cancel` is not lost.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// How an interruptible wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// The full duration elapsed.
    Elapsed,
    /// The token was signaled first.
    Cancelled,
}

/// Sleep for `duration`, abandoning the wait as soon as `cancel` is signaled.
///
/// Without a token this is a plain sleep.
pub async fn sleep(duration: Duration, cancel: Option<&CancelToken>) -> Wait {
    match cancel {
        None => {
            tokio::time::sleep(duration).await;
            Wait::Elapsed
        }
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Wait::Cancelled,
                _ = tokio::time::sleep(duration) => Wait::Elapsed,
            }
        }
    }
}

/// Run `future` unless `cancel` is signaled first.
///
/// Returns `None` if the token won the race; the future is dropped.
pub async fn or_cancelled<F>(future: F, cancel: Option<&CancelToken>) -> Option<F::Output>
where
    F: Future,
{
    match cancel {
        None => Some(future.await),
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => None,
                output = future => Some(output),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_is_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.reason(), None);
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_first_reason_wins() {
        let token = CancelToken::new();
        token.cancel_with("first");
        token.cancel_with("second");
        assert_eq!(token.reason(), Some("first"));
    }

    #[tokio::test]
    async fn test_cancelled_resolves_when_already_signaled() {
        let token = CancelToken::new();
        token.cancel();
        token.cancelled().await;
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        tokio::task::yield_now().await;
        token.cancel();

        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_elapses_without_cancel() {
        let token = CancelToken::new();
        let outcome = sleep(Duration::from_secs(5), Some(&token)).await;
        assert_eq!(outcome, Wait::Elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_abandoned_on_cancel() {
        let token = CancelToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let started = tokio::time::Instant::now();
        let outcome = sleep(Duration::from_secs(60), Some(&token)).await;

        assert_eq!(outcome, Wait::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_or_cancelled_runs_future() {
        assert_eq!(or_cancelled(async { 7 }, None).await, Some(7));
    }

    #[tokio::test]
    async fn test_or_cancelled_drops_future_when_signaled() {
        let token = CancelToken::new();
        token.cancel();
        let outcome = or_cancelled(std::future::pending::<()>(), Some(&token)).await;
        assert_eq!(outcome, None);
    }
}
