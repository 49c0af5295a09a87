//! Retry and timeout consumers for re-runnable tasks.
//!
//! Because a [`Task`](crate::Task) holds no per-run state, retrying one is
//! simply running it again. This module keeps that loop out of the core:
//!
//! - **Policy as data**: `RetryPolicy` describes the delay schedule and its
//!   bounds, with no side effects
//! - **Executors as combinators**: `Task::retry`, `Task::retry_if` and
//!   `Task::timeout` wrap a task in a new one
//!
//! # Quick Start
//!
//! ```rust
//! use undertow::{RetryPolicy, Task};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let policy = RetryPolicy::exponential(Duration::from_millis(100))
//!     .with_max_retries(3);
//!
//! let task = Task::<_, String, ()>::of(42).retry(policy);
//!
//! assert_eq!(task.run(&(), None).await, Ok(42));
//! # });
//! ```
//!
//! # Retry Strategies
//!
//! - **Constant**: Fixed delay between retries
//! - **Linear**: Delay increases linearly (100ms, 200ms, 300ms, ...)
//! - **Exponential**: Delay grows by a factor each retry (100ms, 200ms, 400ms, ...)
//!
//! # Jitter Support
//!
//! Enable the `jitter` feature to randomize delays:
//!
//! ```toml
//! undertow = { version = "...", features = ["jitter"] }
//! ```
//!
//! # Error Types
//!
//! - [`RetryError`]: Why a retried task gave up
//! - [`RetryExhausted`]: The final error and metadata when the policy ran out
//! - [`TimeoutError`]: Returned when a task times out

mod error;
mod executor;
mod policy;

pub use error::{RetryError, RetryExhausted, TimeoutError};
pub use policy::{JitterStrategy, RetryPolicy, RetryStrategy};
