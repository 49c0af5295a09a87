//! Capabilities: the named async operations a computation may ask for.
//!
//! Each capability is a trait with one or two methods, and every method
//! returns a boxed future. That gives all effects the same suspension point
//! and keeps the traits object safe.
//!
//! # Requesting a subset
//!
//! A computation names the capabilities it needs as bounds on its capability
//! type parameter. Any host value implementing at least those traits can run
//! it. Bounds compose, so chaining a computation that needs `Http` with one
//! that needs `ReadFile` yields one that needs `Http + ReadFile`:
//!
//! ```
//! use undertow::capability::{self, Http, HttpRequest, ReadFile};
//! use undertow::Task;
//!
//! fn upload<C>(path: &'static str) -> Task<u16, String, C>
//! where
//!     C: Http + ReadFile + 'static,
//! {
//!     capability::read_file(path)
//!         .map_err(|e| e.to_string())
//!         .flat_map(|body| {
//!             capability::fetch(HttpRequest::post("https://example.test/upload", body))
//!                 .map(|response| response.status)
//!                 .map_err(|e| e.to_string())
//!         })
//! }
//! ```
//!
//! The check happens entirely at compile time. At run time the leaf simply
//! calls the trait method on the borrowed capability value.

use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::task::Task;
use crate::BoxFuture;

/// The kind of error a capability provider reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CapabilityErrorKind {
    /// The operation was attempted and failed.
    Failed,
    /// The requested resource does not exist.
    NotFound,
    /// The input could not be processed (e.g. malformed encoding).
    InvalidInput,
    /// The operation was not attempted because the token was signaled.
    Cancelled,
}

/// An error raised by a capability provider.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CapabilityError {
    kind: CapabilityErrorKind,
    message: String,
}

impl CapabilityError {
    /// Create an error of the given kind.
    pub fn new(kind: CapabilityErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The operation failed.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(CapabilityErrorKind::Failed, message)
    }

    /// The resource does not exist.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(CapabilityErrorKind::NotFound, message)
    }

    /// The input was rejected.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(CapabilityErrorKind::InvalidInput, message)
    }

    /// The operation was skipped because of cancellation.
    pub fn cancelled(reason: Option<&str>) -> Self {
        match reason {
            Some(reason) => Self::new(
                CapabilityErrorKind::Cancelled,
                format!("cancelled: {}", reason),
            ),
            None => Self::new(CapabilityErrorKind::Cancelled, "cancelled"),
        }
    }

    /// The error kind.
    pub fn kind(&self) -> CapabilityErrorKind {
        self.kind
    }

    /// The provider's message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CapabilityError {}

/// An outgoing HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HttpRequest {
    /// Request method, upper case.
    pub method: String,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs in insertion order.
    pub headers: Vec<(String, String)>,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// A request with the given method and no body.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// A `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// A `POST` request carrying `body`.
    pub fn post(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self::new("POST", url).with_body(body)
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

/// A received HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A response with no headers.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Network fetch.
pub trait Http: Send + Sync {
    /// Perform one request.
    fn fetch(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, CapabilityError>>;
}

/// Reading whole files.
pub trait ReadFile: Send + Sync {
    /// Read the full contents at `path`.
    fn read_file(&self, path: PathBuf) -> BoxFuture<'_, Result<Vec<u8>, CapabilityError>>;
}

/// Writing whole files.
pub trait WriteFile: Send + Sync {
    /// Replace the contents at `path`.
    fn write_file(
        &self,
        path: PathBuf,
        contents: Vec<u8>,
    ) -> BoxFuture<'_, Result<(), CapabilityError>>;
}

/// UTF-8 text codec.
pub trait Utf8: Send + Sync {
    /// Encode text to bytes.
    fn encode_utf8(&self, text: String) -> BoxFuture<'_, Result<Vec<u8>, CapabilityError>>;

    /// Decode bytes to text.
    fn decode_utf8(&self, bytes: Vec<u8>) -> BoxFuture<'_, Result<String, CapabilityError>>;
}

/// Base64 codec.
pub trait Base64: Send + Sync {
    /// Encode bytes to base64 text.
    fn encode_base64(&self, bytes: Vec<u8>) -> BoxFuture<'_, Result<String, CapabilityError>>;

    /// Decode base64 text to bytes.
    fn decode_base64(&self, text: String) -> BoxFuture<'_, Result<Vec<u8>, CapabilityError>>;
}

fn check_cancel(cancel: Option<&CancelToken>) -> Result<(), CapabilityError> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(CapabilityError::cancelled(token.reason())),
        _ => Ok(()),
    }
}

/// A single request through the [`Http`] capability.
pub fn fetch<C>(request: HttpRequest) -> Task<HttpResponse, CapabilityError, C>
where
    C: Http + 'static,
{
    Task::create(move |caps: &C, cancel| {
        let request = request.clone();
        Box::pin(async move {
            check_cancel(cancel)?;
            caps.fetch(request).await
        })
    })
}

/// Read a file through the [`ReadFile`] capability.
pub fn read_file<C>(path: impl Into<PathBuf>) -> Task<Vec<u8>, CapabilityError, C>
where
    C: ReadFile + 'static,
{
    let path = path.into();
    Task::create(move |caps: &C, cancel| {
        let path = path.clone();
        Box::pin(async move {
            check_cancel(cancel)?;
            caps.read_file(path).await
        })
    })
}

/// Write a file through the [`WriteFile`] capability.
pub fn write_file<C>(path: impl Into<PathBuf>, contents: Vec<u8>) -> Task<(), CapabilityError, C>
where
    C: WriteFile + 'static,
{
    let path = path.into();
    Task::create(move |caps: &C, cancel| {
        let path = path.clone();
        let contents = contents.clone();
        Box::pin(async move {
            check_cancel(cancel)?;
            caps.write_file(path, contents).await
        })
    })
}

/// Encode text through the [`Utf8`] capability.
pub fn encode_utf8<C>(text: impl Into<String>) -> Task<Vec<u8>, CapabilityError, C>
where
    C: Utf8 + 'static,
{
    let text = text.into();
    Task::create(move |caps: &C, cancel| {
        let text = text.clone();
        Box::pin(async move {
            check_cancel(cancel)?;
            caps.encode_utf8(text).await
        })
    })
}

/// Decode bytes through the [`Utf8`] capability.
pub fn decode_utf8<C>(bytes: Vec<u8>) -> Task<String, CapabilityError, C>
where
    C: Utf8 + 'static,
{
    Task::create(move |caps: &C, cancel| {
        let bytes = bytes.clone();
        Box::pin(async move {
            check_cancel(cancel)?;
            caps.decode_utf8(bytes).await
        })
    })
}

/// Encode bytes through the [`Base64`] capability.
pub fn encode_base64<C>(bytes: Vec<u8>) -> Task<String, CapabilityError, C>
where
    C: Base64 + 'static,
{
    Task::create(move |caps: &C, cancel| {
        let bytes = bytes.clone();
        Box::pin(async move {
            check_cancel(cancel)?;
            caps.encode_base64(bytes).await
        })
    })
}

/// Decode base64 text through the [`Base64`] capability.
pub fn decode_base64<C>(text: impl Into<String>) -> Task<Vec<u8>, CapabilityError, C>
where
    C: Base64 + 'static,
{
    let text = text.into();
    Task::create(move |caps: &C, cancel| {
        let text = text.clone();
        Box::pin(async move {
            check_cancel(cancel)?;
            caps.decode_base64(text).await
        })
    })
}
