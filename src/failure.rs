//! The domain failure reported by capability-consuming leaves.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A failure message plus whether trying again could help.
///
/// # Examples
///
/// ```
/// use undertow::{Failure, Task};
///
/// # tokio_test::block_on(async {
/// let task = Task::<String, _, ()>::reject(Failure::retryable("e"))
///     .or_else(|_| Task::<_, Failure, ()>::of("recovered".to_string()));
///
/// assert_eq!(task.run(&(), None).await, Ok("recovered".to_string()));
/// # });
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Failure {
    /// Human readable description.
    pub message: String,
    /// Whether the same operation may succeed if attempted again.
    pub retryable: bool,
}

impl Failure {
    /// Create a failure with an explicit retry flag.
    pub fn new(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            message: message.into(),
            retryable,
        }
    }

    /// A transient failure.
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::new(message, true)
    }

    /// A permanent failure.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(message, false)
    }

    /// The failure reported when work is abandoned because of a cancel token.
    ///
    /// Never retryable.
    pub fn cancelled(reason: Option<&str>) -> Self {
        match reason {
            Some(reason) => Self::fatal(format!("operation cancelled: {}", reason)),
            None => Self::fatal("operation cancelled"),
        }
    }

    /// Returns true if this failure describes a cancellation.
    pub fn is_cancellation(&self) -> bool {
        !self.retryable && self.message.starts_with("operation cancelled")
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.retryable {
            write!(f, "{} (retryable)", self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for Failure {}
