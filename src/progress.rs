//! Progress metadata and the progress-tagged results a [`Stream`](crate::Stream) yields.
//!
//! `Progress` is advisory. Nothing checks that `current` grows between
//! emissions or stays below `total`; producers decide what the numbers mean.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Optional `{ current, total }` position attached to an emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Progress {
    /// How far the producer has come.
    pub current: Option<u64>,
    /// How far the producer expects to go.
    pub total: Option<u64>,
}

impl Progress {
    /// No progress information.
    pub const fn none() -> Self {
        Self {
            current: None,
            total: None,
        }
    }

    /// Both position and expected length.
    pub const fn new(current: u64, total: u64) -> Self {
        Self {
            current: Some(current),
            total: Some(total),
        }
    }

    /// Position only, length unknown.
    pub const fn at(current: u64) -> Self {
        Self {
            current: Some(current),
            total: None,
        }
    }

    /// `{ current: 1, total: 1 }`, the tag of a single-shot emission.
    pub const fn single() -> Self {
        Self::new(1, 1)
    }
}

/// A result tagged with the progress at which it was produced.
///
/// # Examples
///
/// ```
/// use undertow::{Emission, Progress};
///
/// let emission = Emission::<_, String>::success(10, Progress::new(1, 4));
/// let doubled = emission.map(|x| x * 2);
///
/// assert_eq!(doubled.result, Ok(20));
/// assert_eq!(doubled.progress, Progress::new(1, 4));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Emission<T, E> {
    /// The outcome carried by this emission.
    pub result: Result<T, E>,
    /// Where the producer was when it emitted.
    pub progress: Progress,
}

impl<T, E> Emission<T, E> {
    /// Tag an outcome with progress.
    pub fn new(result: Result<T, E>, progress: Progress) -> Self {
        Self { result, progress }
    }

    /// A successful emission.
    pub fn success(value: T, progress: Progress) -> Self {
        Self::new(Ok(value), progress)
    }

    /// A failed emission.
    pub fn failure(error: E, progress: Progress) -> Self {
        Self::new(Err(error), progress)
    }

    /// Returns true if this emission carries a failure.
    pub fn is_failure(&self) -> bool {
        self.result.is_err()
    }

    /// Transform a success value, keeping the progress tag.
    pub fn map<U, F>(self, f: F) -> Emission<U, E>
    where
        F: FnOnce(T) -> U,
    {
        Emission {
            result: self.result.map(f),
            progress: self.progress,
        }
    }

    /// Transform a failure, keeping the progress tag.
    pub fn map_err<E2, F>(self, f: F) -> Emission<T, E2>
    where
        F: FnOnce(E) -> E2,
    {
        Emission {
            result: self.result.map_err(f),
            progress: self.progress,
        }
    }

    /// Drop the progress tag.
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}
