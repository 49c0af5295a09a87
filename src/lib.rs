//! # Undertow
//!
//! > *"What moves beneath the surface"*
//!
//! Lazy, cancellable async computations that declare the capabilities they need.
//!
//! ## Philosophy
//!
//! **Undertow** follows **pure core, imperative shell**:
//! - A [`Task`] or [`Stream`] is plain data. Building and composing one performs no I/O.
//! - Side effects happen only when the computation is run with a concrete
//!   capability value, and only through the capability traits it asked for.
//!
//! ## Quick Example
//!
//! ```rust
//! use undertow::Task;
//!
//! # tokio_test::block_on(async {
//! let task = Task::<_, String, ()>::of(5)
//!     .map(|x| x * 2)
//!     .flat_map(|x| Task::of(x + 5))
//!     .map(|x| x / 5);
//!
//! assert_eq!(task.run(&(), None).await, Ok(3));
//! # });
//! ```
//!
//! ## Capabilities
//!
//! A computation states its requirements as trait bounds on its capability type:
//!
//! ```rust
//! use undertow::capability::{self, ReadFile};
//! use undertow::testing::MemoryFiles;
//! use undertow::Task;
//!
//! fn config_size<C: ReadFile + 'static>() -> Task<usize, String, C> {
//!     capability::read_file("app.toml")
//!         .map(|bytes| bytes.len())
//!         .map_err(|e| e.to_string())
//! }
//!
//! # tokio_test::block_on(async {
//! let files = MemoryFiles::new().with_file("app.toml", b"debug = true".to_vec());
//! assert_eq!(config_size().run(&files, None).await, Ok(12));
//! # });
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod cancel;
pub mod capability;
pub mod failure;
pub mod fetch;
pub mod progress;
pub mod result;
pub mod retry;
pub mod stream;
pub mod task;
pub mod testing;

// Re-exports
pub use cancel::CancelToken;
pub use capability::{Base64, CapabilityError, Http, ReadFile, Utf8, WriteFile};
pub use failure::Failure;
pub use progress::{Emission, Progress};
pub use result::{fail, is_failure, ok};
pub use retry::{RetryError, RetryExhausted, RetryPolicy, TimeoutError};
pub use stream::{Emitter, Stream};
pub use task::Task;

/// A boxed future that is Send
pub type BoxFuture<'a, T> = futures::future::BoxFuture<'a, T>;

/// A boxed stream that is Send
pub type BoxStream<'a, T> = futures::stream::BoxStream<'a, T>;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancel::CancelToken;
    pub use crate::capability::{Base64, CapabilityError, Http, ReadFile, Utf8, WriteFile};
    pub use crate::failure::Failure;
    pub use crate::progress::{Emission, Progress};
    pub use crate::result::{fail, is_failure, ok};
    pub use crate::retry::{RetryError, RetryPolicy};
    pub use crate::stream::Stream;
    pub use crate::task::Task;
}
