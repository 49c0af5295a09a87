//! Task type for lazy, single-result async computations
//!
//! A `Task<T, E, Caps>` describes a computation that:
//! - Produces a value of type `T` on success
//! - Fails with an error of type `E`
//! - Needs a capability value of type `Caps` to run
//! - May observe a [`CancelToken`] while it runs
//!
//! Tasks are values. Building or composing one performs no work; running it
//! does. A Task holds no per-run state, so the same value can be run any number
//! of times, including concurrently, and every run is independent.
//!
//! # Examples
//!
//! ## Composing tasks
//!
//! ```
//! use undertow::Task;
//!
//! # tokio_test::block_on(async {
//! let task = Task::<_, String, ()>::of(5)
//!     .map(|x| x * 2)
//!     .flat_map(|x| Task::of(x + 10));
//!
//! assert_eq!(task.run(&(), None).await, Ok(20));
//! # });
//! ```
//!
//! ## Recovering from failure
//!
//! ```
//! use undertow::Task;
//!
//! # tokio_test::block_on(async {
//! let task = Task::<i32, _, ()>::reject("offline")
//!     .or_else_map(|_| 0);
//!
//! assert_eq!(task.run(&(), None).await, Ok(0));
//! # });
//! ```
//!
//! ## Leaves
//!
//! `Task::create` is the escape hatch for computations that touch their
//! capabilities directly. The initializer borrows the capability value and the
//! token for the duration of one run:
//!
//! ```
//! use undertow::{CancelToken, Task};
//!
//! struct Clock {
//!     now: u64,
//! }
//!
//! let read_clock = Task::<u64, &str, Clock>::create(|clock, cancel: Option<&CancelToken>| {
//!     Box::pin(async move {
//!         match cancel {
//!             Some(token) if token.is_cancelled() => Err("cancelled"),
//!             _ => Ok(clock.now),
//!         }
//!     })
//! });
//!
//! # tokio_test::block_on(async {
//! assert_eq!(read_clock.run(&Clock { now: 1_700 }, None).await, Ok(1_700));
//! # });
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use futures::StreamExt;
use tracing::Instrument as _;

use crate::cancel::CancelToken;
use crate::progress::{Emission, Progress};
use crate::stream::Stream;
use crate::BoxFuture;

/// Initializer shared by every run of a task.
type TaskFn<T, E, Caps> = dyn for<'a> Fn(&'a Caps, Option<&'a CancelToken>) -> BoxFuture<'a, Result<T, E>>
    + Send
    + Sync;

/// A lazy, re-runnable, single-result async computation.
///
/// # Type Parameters
///
/// * `T` - The type of the success value
/// * `E` - The type of the error value (defaults to `std::convert::Infallible`)
/// * `Caps` - The capability value the task needs (defaults to `()`)
///
/// Cloning a task is cheap: clones share the same initializer.
pub struct Task<T, E = Infallible, Caps = ()> {
    init: Arc<TaskFn<T, E, Caps>>,
}

impl<T, E, Caps> Clone for Task<T, E, Caps> {
    fn clone(&self) -> Self {
        Task {
            init: Arc::clone(&self.init),
        }
    }
}

// Manual Debug implementation since the initializer is not Debug
impl<T, E, Caps> std::fmt::Debug for Task<T, E, Caps> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("init", &"<function>").finish()
    }
}

impl<T, E, Caps> Task<T, E, Caps>
where
    T: Send + 'static,
    E: Send + 'static,
    Caps: Sync + 'static,
{
    /// Wrap an async initializer.
    ///
    /// The initializer runs once per [`run`](Task::run) and receives the
    /// capability value and the optional cancel token for that run.
    pub fn create<F>(init: F) -> Self
    where
        F: for<'a> Fn(&'a Caps, Option<&'a CancelToken>) -> BoxFuture<'a, Result<T, E>>
            + Send
            + Sync
            + 'static,
    {
        Task {
            init: Arc::new(init),
        }
    }

    /// A task that always succeeds with `value` and needs no capabilities.
    ///
    /// # Examples
    ///
    /// ```
    /// use undertow::Task;
    ///
    /// # tokio_test::block_on(async {
    /// let task = Task::<_, String, ()>::of(42);
    /// assert_eq!(task.run(&(), None).await, Ok(42));
    /// # });
    /// ```
    pub fn of(value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::create(move |_, _| {
            let value = value.clone();
            Box::pin(async move { Ok(value) })
        })
    }

    /// A task that always fails with `error` and needs no capabilities.
    ///
    /// # Examples
    ///
    /// ```
    /// use undertow::Task;
    ///
    /// # tokio_test::block_on(async {
    /// let task = Task::<i32, _, ()>::reject("error");
    /// assert_eq!(task.run(&(), None).await, Err("error"));
    /// # });
    /// ```
    pub fn reject(error: E) -> Self
    where
        E: Clone + Sync,
    {
        Self::create(move |_, _| {
            let error = error.clone();
            Box::pin(async move { Err(error) })
        })
    }

    /// Lift a `Result` into a task.
    pub fn from_result(result: Result<T, E>) -> Self
    where
        T: Clone + Sync,
        E: Clone + Sync,
    {
        Self::create(move |_, _| {
            let result = result.clone();
            Box::pin(async move { result })
        })
    }

    /// Create from a synchronous function of the capability value.
    ///
    /// # Examples
    ///
    /// ```
    /// use undertow::Task;
    ///
    /// struct Config {
    ///     retries: u32,
    /// }
    ///
    /// # tokio_test::block_on(async {
    /// let task = Task::from_fn(|config: &Config| Ok::<_, String>(config.retries * 2));
    /// assert_eq!(task.run(&Config { retries: 3 }, None).await, Ok(6));
    /// # });
    /// ```
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Caps) -> Result<T, E> + Send + Sync + 'static,
    {
        Self::create(move |caps, _| {
            let result = f(caps);
            Box::pin(async move { result })
        })
    }

    /// Run the task.
    ///
    /// The returned future borrows `caps` and `cancel` and nothing else; the
    /// task itself can be dropped or run again while it is pending.
    pub fn run<'a>(
        &self,
        caps: &'a Caps,
        cancel: Option<&'a CancelToken>,
    ) -> BoxFuture<'a, Result<T, E>> {
        (self.init)(caps, cancel)
    }

    /// Transform the success value.
    ///
    /// Failures pass through untouched and `f` is not called for them.
    ///
    /// # Examples
    ///
    /// ```
    /// use undertow::Task;
    ///
    /// # tokio_test::block_on(async {
    /// let task = Task::<_, String, ()>::of(5).map(|x| x * 2);
    /// assert_eq!(task.run(&(), None).await, Ok(10));
    /// # });
    /// ```
    pub fn map<U, F>(self, f: F) -> Task<U, E, Caps>
    where
        F: Fn(T) -> U + Send + Sync + 'static,
        U: Send + 'static,
    {
        let inner = self.init;
        let f = Arc::new(f);
        Task::<U, E, Caps>::create(move |caps, cancel| {
            let pending = inner(caps, cancel);
            let f = Arc::clone(&f);
            Box::pin(async move { pending.await.map(|value| f(value)) })
        })
    }

    /// Chain a dependent task.
    ///
    /// On success, `f` builds the next task, which runs with the same
    /// capabilities and token. On failure, `f` is skipped and the error is
    /// returned unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use undertow::Task;
    ///
    /// # tokio_test::block_on(async {
    /// let task = Task::<_, String, ()>::of(5).flat_map(|x| Task::of(x * 2));
    /// assert_eq!(task.run(&(), None).await, Ok(10));
    ///
    /// let task = Task::<i32, _, ()>::reject("error".to_string())
    ///     .flat_map(|x| Task::of(x * 2));
    /// assert_eq!(task.run(&(), None).await, Err("error".to_string()));
    /// # });
    /// ```
    pub fn flat_map<U, F>(self, f: F) -> Task<U, E, Caps>
    where
        F: Fn(T) -> Task<U, E, Caps> + Send + Sync + 'static,
        U: Send + 'static,
    {
        let inner = self.init;
        let f = Arc::new(f);
        Task::<U, E, Caps>::create(move |caps, cancel| {
            let pending = inner(caps, cancel);
            let f = Arc::clone(&f);
            Box::pin(async move {
                match pending.await {
                    Ok(value) => f(value).run(caps, cancel).await,
                    Err(error) => Err(error),
                }
            })
        })
    }

    /// Chain a dependent task whose error converts into this task's error.
    ///
    /// This is `flat_map` with the next task's error passed through `From`,
    /// so either branch's failure surfaces as `E`.
    ///
    /// # Examples
    ///
    /// ```
    /// use undertow::Task;
    ///
    /// #[derive(Debug, Clone, PartialEq)]
    /// struct ParseError;
    ///
    /// #[derive(Debug, Clone, PartialEq)]
    /// enum AppError {
    ///     Parse(ParseError),
    /// }
    ///
    /// impl From<ParseError> for AppError {
    ///     fn from(e: ParseError) -> Self {
    ///         AppError::Parse(e)
    ///     }
    /// }
    ///
    /// # tokio_test::block_on(async {
    /// let task = Task::<_, AppError, ()>::of("x")
    ///     .flat_map_into(|_| Task::<i32, _, ()>::reject(ParseError));
    ///
    /// assert_eq!(task.run(&(), None).await, Err(AppError::Parse(ParseError)));
    /// # });
    /// ```
    pub fn flat_map_into<U, E2, F>(self, f: F) -> Task<U, E, Caps>
    where
        F: Fn(T) -> Task<U, E2, Caps> + Send + Sync + 'static,
        U: Send + 'static,
        E2: Send + 'static,
        E: From<E2>,
    {
        self.flat_map(move |value| f(value).map_err(E::from))
    }

    /// Transform the error value.
    ///
    /// Successes pass through untouched.
    pub fn map_err<E2, F>(self, f: F) -> Task<T, E2, Caps>
    where
        F: Fn(E) -> E2 + Send + Sync + 'static,
        E2: Send + 'static,
    {
        let inner = self.init;
        let f = Arc::new(f);
        Task::<T, E2, Caps>::create(move |caps, cancel| {
            let pending = inner(caps, cancel);
            let f = Arc::clone(&f);
            Box::pin(async move { pending.await.map_err(|error| f(error)) })
        })
    }

    /// Recover from a failure with another task.
    ///
    /// On failure, `f` builds a recovery task which runs with the same
    /// capabilities and token. On success, the value passes through.
    ///
    /// # Examples
    ///
    /// ```
    /// use undertow::Task;
    ///
    /// # tokio_test::block_on(async {
    /// let task = Task::<i32, _, ()>::reject("error").or_else(|_| Task::<_, String, ()>::of(42));
    /// assert_eq!(task.run(&(), None).await, Ok(42));
    ///
    /// let task = Task::<_, &str, ()>::of(100).or_else(|_| Task::<_, String, ()>::of(42));
    /// assert_eq!(task.run(&(), None).await, Ok(100));
    /// # });
    /// ```
    pub fn or_else<E2, F>(self, f: F) -> Task<T, E2, Caps>
    where
        F: Fn(E) -> Task<T, E2, Caps> + Send + Sync + 'static,
        E2: Send + 'static,
    {
        let inner = self.init;
        let f = Arc::new(f);
        Task::<T, E2, Caps>::create(move |caps, cancel| {
            let pending = inner(caps, cancel);
            let f = Arc::clone(&f);
            Box::pin(async move {
                match pending.await {
                    Ok(value) => Ok(value),
                    Err(error) => f(error).run(caps, cancel).await,
                }
            })
        })
    }

    /// Convert any failure into a success value.
    ///
    /// The resulting task cannot fail.
    pub fn or_else_map<F>(self, f: F) -> Task<T, Infallible, Caps>
    where
        F: Fn(E) -> T + Send + Sync + 'static,
    {
        let inner = self.init;
        let f = Arc::new(f);
        Task::<T, Infallible, Caps>::create(move |caps, cancel| {
            let pending = inner(caps, cancel);
            let f = Arc::clone(&f);
            Box::pin(async move {
                match pending.await {
                    Ok(value) => Ok(value),
                    Err(error) => Ok(f(error)),
                }
            })
        })
    }

    /// Observe the success value without changing it.
    ///
    /// Useful for logging or metrics.
    #[inline]
    pub fn tap<F>(self, f: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.map(move |value| {
            f(&value);
            value
        })
    }

    /// Run this task inside a larger capability value.
    ///
    /// `project` picks the part of `Full` this task needs.
    ///
    /// # Examples
    ///
    /// ```
    /// use undertow::Task;
    ///
    /// struct Database {
    ///     rows: usize,
    /// }
    ///
    /// struct App {
    ///     db: Database,
    ///     name: &'static str,
    /// }
    ///
    /// let count = Task::from_fn(|db: &Database| Ok::<_, String>(db.rows));
    /// let task = count.with_caps(|app: &App| &app.db);
    ///
    /// # tokio_test::block_on(async {
    /// let app = App { db: Database { rows: 3 }, name: "demo" };
    /// assert_eq!(task.run(&app, None).await, Ok(3));
    /// # });
    /// ```
    pub fn with_caps<Full, P>(self, project: P) -> Task<T, E, Full>
    where
        P: for<'a> Fn(&'a Full) -> &'a Caps + Send + Sync + 'static,
        Full: Sync + 'static,
    {
        let inner = self.init;
        Task::<T, E, Full>::create(move |full, cancel| inner(project(full), cancel))
    }

    /// Wrap every run of this task in a tracing span.
    ///
    /// # Examples
    ///
    /// ```
    /// use undertow::Task;
    ///
    /// # tokio_test::block_on(async {
    /// let task = Task::<_, String, ()>::of(42)
    ///     .instrument(tracing::info_span!("load_answer"));
    /// assert_eq!(task.run(&(), None).await, Ok(42));
    /// # });
    /// ```
    pub fn instrument(self, span: tracing::Span) -> Self {
        let inner = self.init;
        Self::create(move |caps, cancel| {
            let pending = inner(caps, cancel);
            Box::pin(pending.instrument(span.clone()))
        })
    }

    /// Turn this task into a stream with exactly one emission.
    ///
    /// The emission is tagged `{ current: 1, total: 1 }`.
    pub fn to_stream(self) -> Stream<T, E, Caps> {
        let inner = self.init;
        Stream::<T, E, Caps>::create(move |caps, cancel| {
            let pending = inner(caps, cancel);
            futures::stream::once(async move { Emission::new(pending.await, Progress::single()) })
                .boxed()
        })
    }
}

impl<T, Caps> Task<T, Infallible, Caps>
where
    T: Send + 'static,
    Caps: Sync + 'static,
{
    /// Give an infallible task any error type.
    ///
    /// Lets a task produced by [`or_else_map`](Task::or_else_map) be chained
    /// with fallible tasks.
    pub fn widen_err<E>(self) -> Task<T, E, Caps>
    where
        E: Send + 'static,
    {
        self.map_err(|never| match never {})
    }
}
