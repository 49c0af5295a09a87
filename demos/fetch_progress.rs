//! Demonstrates a retrying fetch reporting progress, with tracing output
//!
//! Run with: cargo run --example fetch_progress

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures::StreamExt;
use undertow::capability::{CapabilityError, Http, HttpRequest, HttpResponse};
use undertow::fetch::fetch_attempts;
use undertow::{BoxFuture, CancelToken, RetryPolicy};

/// An endpoint that fails a fixed number of times before answering.
struct FlakyEndpoint {
    failures_left: AtomicU32,
}

impl Http for FlakyEndpoint {
    fn fetch(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, CapabilityError>> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let remaining = self.failures_left.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
                Err(CapabilityError::failed(format!(
                    "{} unreachable",
                    request.url
                )))
            } else {
                Ok(HttpResponse::new(200, "{\"status\":\"ready\"}"))
            }
        })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let endpoint = FlakyEndpoint {
        failures_left: AtomicU32::new(3),
    };
    let policy = RetryPolicy::exponential(Duration::from_millis(50))
        .with_max_delay(Duration::from_millis(400))
        .with_max_elapsed(Duration::from_secs(2));

    let attempts = fetch_attempts(HttpRequest::get("https://status.example.test"), policy);

    tracing::info!("Fetching with progress");
    let mut emissions = attempts.run(&endpoint, None);
    while let Some(emission) = emissions.next().await {
        let attempt = emission.progress.current.unwrap_or_default();
        match emission.result {
            Ok(response) => tracing::info!(attempt, body = %response.text(), "fetched"),
            Err(failure) => tracing::info!(attempt, %failure, "attempt failed"),
        }
    }
    drop(emissions);

    tracing::info!("Fetching with a token cancelled mid-backoff");
    endpoint.failures_left.store(10, Ordering::SeqCst);
    let token = CancelToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        canceller.cancel_with("user gave up");
    });

    let outcome = attempts.to_task().run(&endpoint, Some(&token)).await;
    match outcome {
        Ok(response) => tracing::info!(status = response.status, "unexpected success"),
        Err(failure) => tracing::warn!(%failure, "fetch ended"),
    }
}
