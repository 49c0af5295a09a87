//! Integration tests for capability-bound computations.
//!
//! These tests compose leaves needing different capabilities and run them
//! against a single host value that provides all of them.

use std::path::PathBuf;
use std::time::Duration;

use undertow::capability::{
    self, Base64, CapabilityError, Http, HttpRequest, HttpResponse, ReadFile, Utf8, WriteFile,
};
use undertow::fetch::{default_policy, fetch_attempts, fetch_with_retry};
use undertow::testing::{MemoryFiles, ScriptedHttp, StdCodecs};
use undertow::{BoxFuture, CancelToken, Failure, RetryPolicy, Task};

/// A host providing every capability.
#[derive(Debug, Default)]
struct Host {
    http: ScriptedHttp,
    files: MemoryFiles,
    codecs: StdCodecs,
}

impl Http for Host {
    fn fetch(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, CapabilityError>> {
        self.http.fetch(request)
    }
}

impl ReadFile for Host {
    fn read_file(&self, path: PathBuf) -> BoxFuture<'_, Result<Vec<u8>, CapabilityError>> {
        self.files.read_file(path)
    }
}

impl WriteFile for Host {
    fn write_file(
        &self,
        path: PathBuf,
        contents: Vec<u8>,
    ) -> BoxFuture<'_, Result<(), CapabilityError>> {
        self.files.write_file(path, contents)
    }
}

impl Utf8 for Host {
    fn encode_utf8(&self, text: String) -> BoxFuture<'_, Result<Vec<u8>, CapabilityError>> {
        self.codecs.encode_utf8(text)
    }

    fn decode_utf8(&self, bytes: Vec<u8>) -> BoxFuture<'_, Result<String, CapabilityError>> {
        self.codecs.decode_utf8(bytes)
    }
}

impl Base64 for Host {
    fn encode_base64(&self, bytes: Vec<u8>) -> BoxFuture<'_, Result<String, CapabilityError>> {
        self.codecs.encode_base64(bytes)
    }

    fn decode_base64(&self, text: String) -> BoxFuture<'_, Result<Vec<u8>, CapabilityError>> {
        self.codecs.decode_base64(text)
    }
}

/// Needs only file reading and the two codecs.
fn load_secret<C>(path: &'static str) -> Task<Vec<u8>, CapabilityError, C>
where
    C: ReadFile + Utf8 + Base64 + 'static,
{
    capability::read_file(path)
        .flat_map(capability::decode_utf8)
        .flat_map(capability::decode_base64)
}

#[tokio::test]
async fn subset_runs_against_full_host() {
    let host = Host {
        files: MemoryFiles::new().with_file("secret.b64", b"c2VjcmV0".to_vec()),
        ..Host::default()
    };

    assert_eq!(
        load_secret("secret.b64").run(&host, None).await,
        Ok(b"secret".to_vec())
    );
}

#[tokio::test]
async fn download_and_store() {
    let host = Host {
        http: ScriptedHttp::new().respond(HttpResponse::new(200, "payload")),
        ..Host::default()
    };

    let task = capability::fetch::<Host>(HttpRequest::get("https://example.test/file"))
        .map_err(|e| Failure::fatal(e.to_string()))
        .flat_map(|response| {
            capability::encode_base64(response.body)
                .flat_map(|encoded| capability::write_file("download.b64", encoded.into_bytes()))
                .map_err(|e| Failure::fatal(e.to_string()))
        });

    assert_eq!(task.run(&host, None).await, Ok(()));
    assert_eq!(
        host.files.contents("download.b64"),
        Some(b"cGF5bG9hZA==".to_vec())
    );
}

#[tokio::test(start_paused = true)]
async fn retrying_fetch_through_host() {
    let host = Host {
        http: ScriptedHttp::new()
            .fail(CapabilityError::failed("connection refused"))
            .respond(HttpResponse::new(502, "bad gateway"))
            .respond(HttpResponse::new(200, "{\"ok\":true}")),
        ..Host::default()
    };
    let policy = RetryPolicy::exponential(Duration::from_millis(50))
        .with_max_elapsed(Duration::from_secs(1));

    let task = fetch_with_retry(HttpRequest::get("https://example.test/api"), policy)
        .map(|response| response.text());

    assert_eq!(task.run(&host, None).await, Ok("{\"ok\":true}".to_string()));
    assert_eq!(host.http.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn fetch_progress_is_observable() {
    let http = ScriptedHttp::new()
        .fail(CapabilityError::failed("timeout"))
        .respond(HttpResponse::new(200, "done"));
    let policy = RetryPolicy::constant(Duration::from_millis(10)).with_max_retries(3);

    let attempts: Vec<_> = fetch_attempts(HttpRequest::get("https://example.test"), policy)
        .map(|response| response.status)
        .collect(&http, None)
        .await
        .into_iter()
        .map(|emission| (emission.progress.current, emission.result.is_ok()))
        .collect();

    assert_eq!(attempts, vec![(Some(1), false), (Some(2), true)]);
}

#[tokio::test]
async fn cancelled_fetch_reports_non_retryable_failure() {
    let host = Host {
        http: ScriptedHttp::new().respond(HttpResponse::new(200, "ok")),
        ..Host::default()
    };
    let token = CancelToken::new();
    token.cancel_with("shutdown");

    let result = fetch_with_retry(
        HttpRequest::get("https://example.test"),
        RetryPolicy::constant(Duration::from_millis(10)).with_max_retries(2),
    )
    .run(&host, Some(&token))
    .await;

    let failure = result.unwrap_err();
    assert!(!failure.retryable);
    assert!(failure.is_cancellation());
    assert_eq!(host.http.calls(), 0);
}

#[tokio::test]
async fn retry_combinator_over_capability_leaf() {
    let http = ScriptedHttp::new()
        .fail(CapabilityError::failed("flaky"))
        .respond(HttpResponse::new(200, "fine"));

    let task = capability::fetch(HttpRequest::get("https://example.test"))
        .retry(RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(2));

    let response = task.run(&http, None).await.unwrap();
    assert_eq!(response.text(), "fine");
    assert_eq!(http.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_request_yields_to_cancellation() {
    let host = Host {
        http: ScriptedHttp::new()
            .respond(HttpResponse::new(200, "too late"))
            .with_latency(Duration::from_secs(10)),
        ..Host::default()
    };
    let token = CancelToken::new();
    let started = tokio::time::Instant::now();

    let task = fetch_with_retry(HttpRequest::get("https://example.test/slow"), default_policy());
    let (result, ()) = tokio::join!(task.run(&host, Some(&token)), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel_with("navigated away");
    });

    let failure = result.unwrap_err();
    assert!(failure.is_cancellation());
    assert!(failure.message.contains("navigated away"));
    assert_eq!(host.http.calls(), 1);
    assert!(started.elapsed() < Duration::from_secs(1));
}
