//! Testing utilities and helpers for Undertow
//!
//! This module provides in-memory capability providers and assertion macros
//! for testing code built from tasks and streams. Nothing here touches the
//! network or the filesystem.
//!
//! # Examples
//!
//! ## Scripted HTTP
//!
//! ```rust
//! use undertow::capability::{self, CapabilityError, HttpRequest, HttpResponse};
//! use undertow::testing::ScriptedHttp;
//!
//! # tokio_test::block_on(async {
//! let http = ScriptedHttp::new()
//!     .fail(CapabilityError::failed("connection reset"))
//!     .respond(HttpResponse::new(200, "ok"));
//!
//! let task = capability::fetch(HttpRequest::get("https://example.test"));
//! assert!(task.run(&http, None).await.is_err());
//! assert_eq!(task.run(&http, None).await.unwrap().status, 200);
//! assert_eq!(http.calls(), 2);
//! # });
//! ```
//!
//! ## Assertion Macros
//!
//! ```rust
//! use undertow::{assert_fail, assert_ok};
//!
//! let value = assert_ok!(Ok::<_, String>(42));
//! assert_eq!(value, 42);
//!
//! let error = assert_fail!(Err::<i32, _>("boom"));
//! assert_eq!(error, "boom");
//! ```

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::capability::{
    Base64, CapabilityError, Http, HttpRequest, HttpResponse, ReadFile, Utf8, WriteFile,
};
use crate::BoxFuture;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An [`Http`] provider that replays a script of outcomes.
///
/// Each call takes the next scripted outcome. The last one repeats once the
/// script runs out, so a single `fail` describes a server that is always down.
/// Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedHttp {
    script: Mutex<VecDeque<Result<HttpResponse, CapabilityError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    latency: Option<Duration>,
}

impl ScriptedHttp {
    /// Create a provider with an empty script.
    ///
    /// Calls fail until outcomes are added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a response to the script.
    pub fn respond(self, response: HttpResponse) -> Self {
        lock(&self.script).push_back(Ok(response));
        self
    }

    /// Append a capability error to the script.
    pub fn fail(self, error: CapabilityError) -> Self {
        lock(&self.script).push_back(Err(error));
        self
    }

    /// Make every call take `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    fn next_outcome(&self) -> Result<HttpResponse, CapabilityError> {
        let mut script = lock(&self.script);
        let outcome = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        outcome.unwrap_or_else(|| Err(CapabilityError::failed("no scripted response")))
    }
}

impl Http for ScriptedHttp {
    fn fetch(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, CapabilityError>> {
        Box::pin(async move {
            tracing::trace!(method = %request.method, url = %request.url, "scripted request");
            lock(&self.requests).push(request);
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            self.next_outcome()
        })
    }
}

/// [`ReadFile`] and [`WriteFile`] over an in-memory map.
#[derive(Debug, Default)]
pub struct MemoryFiles {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryFiles {
    /// Create an empty file map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file.
    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        lock(&self.files).insert(path.into(), contents.into());
        self
    }

    /// Current contents of a file, if it exists.
    pub fn contents(&self, path: impl Into<PathBuf>) -> Option<Vec<u8>> {
        lock(&self.files).get(&path.into()).cloned()
    }
}

impl ReadFile for MemoryFiles {
    fn read_file(&self, path: PathBuf) -> BoxFuture<'_, Result<Vec<u8>, CapabilityError>> {
        Box::pin(async move {
            let found = lock(&self.files).get(&path).cloned();
            found.ok_or_else(|| CapabilityError::not_found(path.display().to_string()))
        })
    }
}

impl WriteFile for MemoryFiles {
    fn write_file(
        &self,
        path: PathBuf,
        contents: Vec<u8>,
    ) -> BoxFuture<'_, Result<(), CapabilityError>> {
        Box::pin(async move {
            lock(&self.files).insert(path, contents);
            Ok(())
        })
    }
}

/// [`Utf8`] and [`Base64`] backed by the standard library and the `base64` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdCodecs;

impl Utf8 for StdCodecs {
    fn encode_utf8(&self, text: String) -> BoxFuture<'_, Result<Vec<u8>, CapabilityError>> {
        Box::pin(async move { Ok(text.into_bytes()) })
    }

    fn decode_utf8(&self, bytes: Vec<u8>) -> BoxFuture<'_, Result<String, CapabilityError>> {
        Box::pin(async move {
            String::from_utf8(bytes).map_err(|e| CapabilityError::invalid_input(e.to_string()))
        })
    }
}

impl Base64 for StdCodecs {
    fn encode_base64(&self, bytes: Vec<u8>) -> BoxFuture<'_, Result<String, CapabilityError>> {
        Box::pin(async move { Ok(STANDARD.encode(bytes)) })
    }

    fn decode_base64(&self, text: String) -> BoxFuture<'_, Result<Vec<u8>, CapabilityError>> {
        Box::pin(async move {
            STANDARD
                .decode(text)
                .map_err(|e| CapabilityError::invalid_input(e.to_string()))
        })
    }
}

/// Assert that a result is `Ok` and evaluate to its value.
///
/// This macro will panic if the result is an `Err`.
///
/// # Example
///
/// ```rust
/// use undertow::assert_ok;
///
/// let value = assert_ok!("7".parse::<i32>());
/// assert_eq!(value, 7);
/// ```
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => {
                panic!("Expected Ok, got Err: {:?}", e);
            }
        }
    };
}

/// Assert that a result is `Err` and evaluate to its error.
///
/// This macro will panic if the result is `Ok`.
///
/// # Example
///
/// ```rust
/// use undertow::assert_fail;
///
/// let error = assert_fail!("x".parse::<i32>());
/// assert!(!error.to_string().is_empty());
/// ```
#[macro_export]
macro_rules! assert_fail {
    ($result:expr) => {
        match $result {
            Err(error) => error,
            Ok(v) => {
                panic!("Expected Err, got Ok: {:?}", v);
            }
        }
    };
}
