//! Stream type for lazy, multi-result async computations
//!
//! A `Stream<T, E, Caps>` is the many-results sibling of [`Task`]: running it
//! yields an ordered sequence of [`Emission`]s, each a `Result<T, E>` tagged
//! with [`Progress`]. It shares the task contract: lazy, re-runnable, borrows
//! its capabilities and cancel token for one run only.
//!
//! # Failure Is Not Termination
//!
//! A producer may emit a failure and keep going. A consumer that drives the
//! stream directly sees every emission, failures included:
//!
//! ```
//! use undertow::{Emission, Progress, Stream};
//!
//! # tokio_test::block_on(async {
//! let stream = Stream::<_, _, ()>::from_emissions(vec![
//!     Emission::success("first", Progress::none()),
//!     Emission::failure("middle", Progress::none()),
//!     Emission::success("last", Progress::none()),
//! ]);
//!
//! let emissions = stream.collect(&(), None).await;
//! assert_eq!(emissions.len(), 3);
//! # });
//! ```
//!
//! `flat_map` and `or_else` are the exception: each stops pulling its source at
//! the first failure it observes.
//!
//! # Producing Emissions
//!
//! [`Stream::create`] takes any `futures::Stream`. [`Stream::channel`] is the
//! imperative alternative: the producer pushes emissions through an
//! [`Emitter`] and is suspended while the consumer is behind.
//!
//! ```
//! use undertow::{Progress, Stream};
//!
//! # tokio_test::block_on(async {
//! let countdown = Stream::<u32, String, ()>::channel(|_, _, mut emitter| {
//!     Box::pin(async move {
//!         for n in (1..=3).rev() {
//!             if emitter.success(n, Progress::new(4 - n as u64, 3)).await.is_err() {
//!                 return;
//!             }
//!         }
//!     })
//! });
//!
//! assert_eq!(countdown.to_task().run(&(), None).await, Ok(1));
//! # });
//! ```

mod channel;

use std::convert::Infallible;
use std::sync::Arc;

use futures::StreamExt;

use crate::cancel::CancelToken;
use crate::progress::{Emission, Progress};
use crate::task::Task;
use crate::{BoxFuture, BoxStream};

pub use channel::{Emitter, EmitterClosed};

/// Initializer shared by every run of a stream.
type StreamFn<T, E, Caps> = dyn for<'a> Fn(&'a Caps, Option<&'a CancelToken>) -> BoxStream<'a, Emission<T, E>>
    + Send
    + Sync;

/// A lazy, re-runnable, multi-result async computation.
///
/// # Type Parameters
///
/// * `T` - The type of each success value
/// * `E` - The type of each error value (defaults to `std::convert::Infallible`)
/// * `Caps` - The capability value the stream needs (defaults to `()`)
pub struct Stream<T, E = Infallible, Caps = ()> {
    init: Arc<StreamFn<T, E, Caps>>,
}

impl<T, E, Caps> Clone for Stream<T, E, Caps> {
    fn clone(&self) -> Self {
        Stream {
            init: Arc::clone(&self.init),
        }
    }
}

impl<T, E, Caps> std::fmt::Debug for Stream<T, E, Caps> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("init", &"<function>")
            .finish()
    }
}

impl<T, E, Caps> Stream<T, E, Caps>
where
    T: Send + 'static,
    E: Send + 'static,
    Caps: Sync + 'static,
{
    /// Wrap an initializer that produces a `futures::Stream` of emissions.
    pub fn create<F>(init: F) -> Self
    where
        F: for<'a> Fn(&'a Caps, Option<&'a CancelToken>) -> BoxStream<'a, Emission<T, E>>
            + Send
            + Sync
            + 'static,
    {
        Stream {
            init: Arc::new(init),
        }
    }

    /// A stream with one successful emission tagged `{ current: 1, total: 1 }`.
    pub fn constant(value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::create(move |_, _| {
            let emission = Emission::success(value.clone(), Progress::single());
            futures::stream::once(futures::future::ready(emission)).boxed()
        })
    }

    /// A stream with one failed emission tagged `{ current: 1, total: 1 }`.
    pub fn never(error: E) -> Self
    where
        E: Clone + Sync,
    {
        Self::create(move |_, _| {
            let emission = Emission::failure(error.clone(), Progress::single());
            futures::stream::once(futures::future::ready(emission)).boxed()
        })
    }

    /// A stream replaying a fixed list of emissions.
    pub fn from_emissions(emissions: Vec<Emission<T, E>>) -> Self
    where
        T: Clone + Sync,
        E: Clone + Sync,
    {
        Self::create(move |_, _| futures::stream::iter(emissions.clone()).boxed())
    }

    /// Build a stream from a producer that pushes into an [`Emitter`].
    ///
    /// The emitter is backed by a bounded channel, so `emit` waits while the
    /// consumer is behind. Emissions reach the consumer in the order they were
    /// sent. The run ends when the producer future completes; dropping the
    /// consumer drops the producer.
    pub fn channel<P>(producer: P) -> Self
    where
        P: for<'a> Fn(&'a Caps, Option<&'a CancelToken>, Emitter<T, E>) -> BoxFuture<'a, ()>
            + Send
            + Sync
            + 'static,
    {
        Self::create(move |caps, cancel| {
            let (emitter, receiver) = channel::bounded();
            let driver = producer(caps, cancel, emitter);
            channel::drive(driver, receiver)
        })
    }

    /// Run the stream.
    ///
    /// Emissions are produced lazily as the returned stream is polled.
    /// Dropping it before exhaustion stops the run.
    pub fn run<'a>(
        &self,
        caps: &'a Caps,
        cancel: Option<&'a CancelToken>,
    ) -> BoxStream<'a, Emission<T, E>> {
        (self.init)(caps, cancel)
    }

    /// Run the stream to exhaustion and collect every emission.
    pub async fn collect(&self, caps: &Caps, cancel: Option<&CancelToken>) -> Vec<Emission<T, E>> {
        self.run(caps, cancel).collect().await
    }

    /// Transform each success value.
    ///
    /// Progress tags and failures pass through untouched.
    pub fn map<U, F>(self, f: F) -> Stream<U, E, Caps>
    where
        F: Fn(T) -> U + Send + Sync + 'static,
        U: Send + 'static,
    {
        let inner = self.init;
        let f = Arc::new(f);
        Stream::<U, E, Caps>::create(move |caps, cancel| {
            let f = Arc::clone(&f);
            inner(caps, cancel)
                .map(move |emission| emission.map(|value| f(value)))
                .boxed()
        })
    }

    /// Transform each error value.
    ///
    /// Progress tags and successes pass through untouched.
    pub fn map_err<E2, F>(self, f: F) -> Stream<T, E2, Caps>
    where
        F: Fn(E) -> E2 + Send + Sync + 'static,
        E2: Send + 'static,
    {
        let inner = self.init;
        let f = Arc::new(f);
        Stream::<T, E2, Caps>::create(move |caps, cancel| {
            let f = Arc::clone(&f);
            inner(caps, cancel)
                .map(move |emission| emission.map_err(|error| f(error)))
                .boxed()
        })
    }

    /// Splice a sub-stream in place of each success.
    ///
    /// For every successful emission, `f` builds a stream which is drained in
    /// full before the next source emission is pulled. The first failed
    /// source emission is passed on once, with its progress tag, and the
    /// source is not pulled again; `f` is never called for a failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use undertow::{Emission, Progress, Stream};
    ///
    /// # tokio_test::block_on(async {
    /// let pages = Stream::<_, String, ()>::from_emissions(vec![
    ///     Emission::success(1, Progress::new(1, 2)),
    ///     Emission::success(2, Progress::new(2, 2)),
    /// ]);
    ///
    /// let rows = pages.flat_map(|page| {
    ///     Stream::from_emissions(vec![
    ///         Emission::success(page * 10, Progress::none()),
    ///         Emission::success(page * 10 + 1, Progress::none()),
    ///     ])
    /// });
    ///
    /// let values: Vec<_> = rows
    ///     .collect(&(), None)
    ///     .await
    ///     .into_iter()
    ///     .map(|e| e.result)
    ///     .collect();
    /// assert_eq!(values, vec![Ok(10), Ok(11), Ok(20), Ok(21)]);
    /// # });
    /// ```
    pub fn flat_map<U, F>(self, f: F) -> Stream<U, E, Caps>
    where
        F: Fn(T) -> Stream<U, E, Caps> + Send + Sync + 'static,
        U: Send + 'static,
    {
        let inner = self.init;
        let f = Arc::new(f);
        Stream::<U, E, Caps>::create(move |caps, cancel| {
            let f = Arc::clone(&f);
            let current: Option<BoxStream<'_, Emission<U, E>>> = None;
            let state = (Some(inner(caps, cancel)), current);

            futures::stream::unfold(state, move |(mut source, mut current)| {
                let f = Arc::clone(&f);
                async move {
                    loop {
                        if let Some(sub) = current.as_mut() {
                            match sub.next().await {
                                Some(emission) => return Some((emission, (source, current))),
                                None => current = None,
                            }
                        }

                        let upstream = source.as_mut()?;
                        match upstream.next().await? {
                            Emission {
                                result: Ok(value), ..
                            } => current = Some(f(value).run(caps, cancel)),
                            Emission {
                                result: Err(error),
                                progress,
                            } => {
                                return Some((Emission::failure(error, progress), (None, None)));
                            }
                        }
                    }
                }
            })
            .boxed()
        })
    }

    /// Recover from the first failure with another stream.
    ///
    /// Successes before the first failure pass through. At the first failure,
    /// `f` builds a recovery stream whose emissions are spliced in, and the
    /// source is not pulled again.
    pub fn or_else<E2, F>(self, f: F) -> Stream<T, E2, Caps>
    where
        F: Fn(E) -> Stream<T, E2, Caps> + Send + Sync + 'static,
        E2: Send + 'static,
    {
        let inner = self.init;
        let f = Arc::new(f);
        Stream::<T, E2, Caps>::create(move |caps, cancel| {
            let f = Arc::clone(&f);
            let recovery: Option<BoxStream<'_, Emission<T, E2>>> = None;
            let state = (Some(inner(caps, cancel)), recovery);

            futures::stream::unfold(state, move |(mut source, mut recovery)| {
                let f = Arc::clone(&f);
                async move {
                    if let Some(rest) = recovery.as_mut() {
                        let emission = rest.next().await?;
                        return Some((emission, (None, recovery)));
                    }

                    let upstream = source.as_mut()?;
                    match upstream.next().await? {
                        Emission {
                            result: Ok(value),
                            progress,
                        } => Some((Emission::success(value, progress), (source, None))),
                        Emission {
                            result: Err(error), ..
                        } => {
                            let mut rest = f(error).run(caps, cancel);
                            let emission = rest.next().await?;
                            Some((emission, (None, Some(rest))))
                        }
                    }
                }
            })
            .boxed()
        })
    }

    /// Convert each failure into a success in place, keeping its progress tag.
    ///
    /// The resulting stream cannot emit failures.
    pub fn or_else_map<F>(self, f: F) -> Stream<T, Infallible, Caps>
    where
        F: Fn(E) -> T + Send + Sync + 'static,
    {
        let inner = self.init;
        let f = Arc::new(f);
        Stream::<T, Infallible, Caps>::create(move |caps, cancel| {
            let f = Arc::clone(&f);
            inner(caps, cancel)
                .map(move |Emission { result, progress }| {
                    let value = match result {
                        Ok(value) => value,
                        Err(error) => f(error),
                    };
                    Emission::success(value, progress)
                })
                .boxed()
        })
    }

    /// Run this stream inside a larger capability value.
    ///
    /// `project` picks the part of `Full` this stream needs.
    pub fn with_caps<Full, P>(self, project: P) -> Stream<T, E, Full>
    where
        P: for<'a> Fn(&'a Full) -> &'a Caps + Send + Sync + 'static,
        Full: Sync + 'static,
    {
        let inner = self.init;
        Stream::<T, E, Full>::create(move |full, cancel| inner(project(full), cancel))
    }

    /// Drain the stream and resolve to its last emission's result.
    ///
    /// # Panics
    ///
    /// Running the returned task panics if the stream ends without emitting
    /// anything. An empty stream breaks the producer's contract; it is not an
    /// `E`.
    pub fn to_task(self) -> Task<T, E, Caps> {
        let inner = self.init;
        Task::<T, E, Caps>::create(move |caps, cancel| {
            let emissions = inner(caps, cancel);
            Box::pin(async move {
                let last = emissions
                    .fold(None, |_, emission| futures::future::ready(Some(emission)))
                    .await;
                match last {
                    Some(emission) => emission.result,
                    None => {
                        tracing::error!("stream converted to task completed without emitting");
                        panic!("stream completed without emitting a result");
                    }
                }
            })
        })
    }
}

impl<T, Caps> Stream<T, Infallible, Caps>
where
    T: Send + 'static,
    Caps: Sync + 'static,
{
    /// Give an infallible stream any error type.
    pub fn widen_err<E>(self) -> Stream<T, E, Caps>
    where
        E: Send + 'static,
    {
        self.map_err(|never| match never {})
    }
}

#[cfg(test)]
mod tests;
