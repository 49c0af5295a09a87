//! Retry policy types and configuration.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A retry policy describing how to retry failed operations.
///
/// Policies are pure data. They describe the delay schedule and its bounds; the
/// executors in this module and in [`fetch`](crate::fetch) decide what to do
/// with them.
///
/// # Bounds
///
/// - `max_retries`: retries allowed after the first attempt
/// - `max_elapsed`: ceiling on the total time spent waiting between attempts
/// - `max_delay`: cap on any single delay
///
/// A policy with neither `max_retries` nor `max_elapsed` retries until the
/// operation succeeds or the run is cancelled; [`validate`](RetryPolicy::validate)
/// reports that case.
///
/// # Examples
///
/// ```rust
/// use undertow::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::exponential(Duration::from_millis(100))
///     .with_factor(3.0)
///     .with_max_delay(Duration::from_secs(1))
///     .with_max_elapsed(Duration::from_secs(2));
///
/// assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_millis(100)));
/// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(300)));
/// assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(900)));
/// assert_eq!(policy.delay_for_attempt(3), Some(Duration::from_secs(1)));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RetryPolicy {
    strategy: RetryStrategy,
    max_retries: Option<u32>,
    max_delay: Option<Duration>,
    max_elapsed: Option<Duration>,
    jitter: JitterStrategy,
}

/// The backoff strategy for retry delays.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RetryStrategy {
    /// Fixed delay between attempts.
    Constant(Duration),
    /// Delay increases linearly: base * (attempt + 1).
    Linear {
        /// Base delay duration.
        base: Duration,
    },
    /// Delay grows geometrically: base * factor^attempt.
    Exponential {
        /// Base delay duration.
        base: Duration,
        /// Growth factor between consecutive delays.
        factor: f64,
    },
}

/// Strategy for adding randomness to delays.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JitterStrategy {
    /// No jitter applied.
    #[default]
    None,
    /// Add ±percentage randomness to delay.
    Proportional(f64),
    /// Random delay between 0 and calculated delay.
    Full,
}

impl RetryPolicy {
    fn with_strategy(strategy: RetryStrategy) -> Self {
        Self {
            strategy,
            max_retries: None,
            max_delay: None,
            max_elapsed: None,
            jitter: JitterStrategy::None,
        }
    }

    /// Create a policy with constant delay between retries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use undertow::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::constant(Duration::from_millis(500))
    ///     .with_max_retries(2);
    ///
    /// assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_millis(500)));
    /// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(500)));
    /// assert_eq!(policy.delay_for_attempt(2), None);
    /// ```
    pub fn constant(delay: Duration) -> Self {
        Self::with_strategy(RetryStrategy::Constant(delay))
    }

    /// Create a policy with linearly increasing delay.
    ///
    /// Delay = base * (attempt + 1)
    pub fn linear(base: Duration) -> Self {
        Self::with_strategy(RetryStrategy::Linear { base })
    }

    /// Create a policy with exponentially increasing delay.
    ///
    /// Delay = base * 2^attempt until changed with [`with_factor`](RetryPolicy::with_factor).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use undertow::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential(Duration::from_millis(100))
    ///     .with_max_retries(5);
    ///
    /// assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_millis(100)));
    /// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(200)));
    /// assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(400)));
    /// ```
    pub fn exponential(base: Duration) -> Self {
        Self::with_strategy(RetryStrategy::Exponential { base, factor: 2.0 })
    }

    /// Set the growth factor of an exponential policy.
    ///
    /// Has no effect on constant or linear policies. Negative and NaN factors
    /// are treated as zero.
    pub fn with_factor(mut self, factor: f64) -> Self {
        if let RetryStrategy::Exponential { factor: current, .. } = &mut self.strategy {
            *current = factor.max(0.0);
        }
        self
    }

    /// Set the maximum number of retry attempts.
    ///
    /// This does not include the initial attempt. For example, `with_max_retries(3)`
    /// means up to 4 total attempts (1 initial + 3 retries).
    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Set the maximum delay cap.
    ///
    /// Delays will never exceed this value, regardless of the backoff strategy.
    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = Some(d);
        self
    }

    /// Set the ceiling on accumulated waiting.
    ///
    /// Retrying stops once the time already spent waiting plus the next delay
    /// would exceed `ceiling`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use undertow::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::constant(Duration::from_millis(400))
    ///     .with_max_elapsed(Duration::from_secs(1));
    ///
    /// assert_eq!(policy.next_delay(0, Duration::ZERO), Some(Duration::from_millis(400)));
    /// assert_eq!(policy.next_delay(1, Duration::from_millis(400)), Some(Duration::from_millis(400)));
    /// assert_eq!(policy.next_delay(2, Duration::from_millis(800)), None);
    /// ```
    pub fn with_max_elapsed(mut self, ceiling: Duration) -> Self {
        self.max_elapsed = Some(ceiling);
        self
    }

    /// Add proportional jitter to delays.
    ///
    /// The factor determines the range of randomness. For example, `0.25` means
    /// the actual delay will be ±25% of the calculated delay.
    ///
    /// **Note**: Requires the `jitter` feature. Without it, this method does nothing.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter = JitterStrategy::Proportional(factor.clamp(0.0, 1.0));
        self
    }

    /// Use full jitter: a random delay between 0 and the calculated delay.
    ///
    /// **Note**: Requires the `jitter` feature. Without it, this method does nothing.
    pub fn with_full_jitter(mut self) -> Self {
        self.jitter = JitterStrategy::Full;
        self
    }

    /// Get the maximum number of retries.
    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    /// Get the maximum delay cap.
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// Get the ceiling on accumulated waiting.
    pub fn max_elapsed(&self) -> Option<Duration> {
        self.max_elapsed
    }

    /// Get the jitter strategy.
    pub fn jitter(&self) -> &JitterStrategy {
        &self.jitter
    }

    /// Get the retry strategy.
    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }

    /// Calculate the delay before retry N (0-indexed), without jitter.
    ///
    /// Returns None once `max_retries` is reached. The elapsed ceiling is not
    /// consulted here; see [`next_delay`](RetryPolicy::next_delay).
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_retries {
            if attempt >= max {
                return None;
            }
        }

        let base_delay = match &self.strategy {
            RetryStrategy::Constant(d) => *d,
            RetryStrategy::Linear { base } => base.saturating_mul(attempt.saturating_add(1)),
            RetryStrategy::Exponential { base, factor } => scale(*base, *factor, attempt),
        };

        Some(match self.max_delay {
            Some(max) => base_delay.min(max),
            None => base_delay,
        })
    }

    /// The delay to wait before retry N, given how long has already been spent waiting.
    ///
    /// Applies jitter, then the elapsed ceiling. Returns None when no further
    /// retry should be made.
    pub fn next_delay(&self, attempt: u32, waited: Duration) -> Option<Duration> {
        let delay = self.delay_for_attempt(attempt)?;
        let delay = self.jitter.apply(delay, self.max_delay);

        match self.max_elapsed {
            Some(ceiling) if waited.saturating_add(delay) > ceiling => None,
            _ => Some(delay),
        }
    }

    /// Validate that the policy bounds the number of retries.
    ///
    /// Returns an error message if neither `max_retries` nor `max_elapsed` is set.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_retries.is_none() && self.max_elapsed.is_none() {
            Err("RetryPolicy must have at least one bound (max_retries or max_elapsed)")
        } else {
            Ok(())
        }
    }
}

impl JitterStrategy {
    /// Apply jitter to a base delay, then cap it at `max_delay`.
    pub fn apply(&self, base_delay: Duration, max_delay: Option<Duration>) -> Duration {
        let jittered = match self {
            JitterStrategy::None => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Proportional(factor) => {
                use rand::Rng;
                let base_millis = base_delay.as_millis() as f64;
                let jitter_range = base_millis * factor;
                let min = (base_millis - jitter_range).max(0.0);
                let max = base_millis + jitter_range;
                Duration::from_millis(rand::rng().random_range(min..=max) as u64)
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Proportional(_) => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Full => {
                use rand::Rng;
                let max_millis = base_delay.as_millis() as u64;
                if max_millis == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_millis(rand::rng().random_range(0..=max_millis))
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Full => base_delay,
        };

        match max_delay {
            Some(max) => jittered.min(max),
            None => jittered,
        }
    }
}

/// `base * factor^attempt`, saturating at `Duration::MAX`.
fn scale(base: Duration, factor: f64, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let nanos = (base.as_nanos() as f64 * factor.powi(exponent)).round();
    if nanos >= u64::MAX as f64 {
        Duration::MAX
    } else {
        // NaN casts to zero
        Duration::from_nanos(nanos as u64)
    }
}
