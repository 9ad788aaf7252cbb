// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Wraps a flaky HTTP endpoint in the full policy pipeline: circuit breaker, timeout, backup
//! request and retry. The endpoint sometimes throttles with `503` and a `Retry-After` header,
//! which the retry policy honors.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use airbag::backup::Backup;
use airbag::breaker::Breaker;
use airbag::delay::DelayFunction;
use airbag::retry::Retry;
use airbag::timeout::Timeout;
use airbag::{Error, Orchestrator, PolicyContext, Recovery, RecoveryInfo};
use http::header::RETRY_AFTER;
use http::{HeaderValue, Method, Request, Response, StatusCode};
use layered::Service;
use ohno::AppError;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_stdout::MetricExporter;
use tick::Clock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type Out = Result<Response<String>, Error>;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let meter_provider = configure_telemetry();

    let clock = Clock::new_tokio();
    let context = PolicyContext::<Request<String>, Out>::new(&clock)
        .name("inventory_client")
        .enable_logs()
        .enable_metrics(&meter_provider);

    let orchestrator = Orchestrator::builder(&context)
        .circuit_breaker(
            Breaker::layer("breaker", &context)
                .recovery_with(|out, _args| classify(out))
                .rejected_circuit_open()
                .failure_threshold(5, 10)
                .break_duration(Duration::from_secs(2))
                .delay_function(DelayFunction::default()),
        )
        .timeout(Timeout::layer("timeout", &context).timeout(Duration::from_secs(5)).timeout_exceeded())
        .backup(
            Backup::layer("backup", &context)
                .clone_input_with(airbag::try_clone_request)
                .delay(Duration::from_millis(300)),
        )
        .retry(
            Retry::layer("retry", &context)
                .clone_input_with(|request, _args| airbag::try_clone_request(request))
                .recovery_with(|out, _args| classify(out))
                .base_delay(Duration::from_millis(100))
                .max_retries(4)
                // Honor Retry-After and X-RateLimit-Reset before falling back to backoff
                .delay_function(DelayFunction::default())
                .on_retry(|request, _out, args| {
                    println!("retrying {} after {:?} (attempt {})", request.uri(), args.retry_delay(), args.attempt());
                }),
        )
        .build(Endpoint::default());

    for index in 0..10 {
        let request = Request::builder()
            .method(Method::GET)
            .uri(format!("https://inventory.example.com/items/{index}"))
            .body(String::new())?;

        match orchestrator.execute(request).await {
            Ok(response) => println!("{index}: {} {}", response.status(), response.body()),
            Err(error) => println!("{index}: {error}"),
        }
    }

    // Flush metrics to stdout before exiting
    meter_provider.force_flush()?;

    Ok(())
}

fn classify(out: &Out) -> RecoveryInfo {
    match out {
        Ok(response) if response.status() == StatusCode::SERVICE_UNAVAILABLE => RecoveryInfo::retry(),
        Ok(_) => RecoveryInfo::never(),
        Err(error) => error.recovery(),
    }
}

/// Simulated endpoint: throttles every third call, drops the connection now and then and is
/// occasionally slow.
#[derive(Debug, Default, Clone)]
struct Endpoint {
    calls: Arc<AtomicU32>,
}

impl Service<Request<String>> for Endpoint {
    type Out = Out;

    async fn execute(&self, request: Request<String>) -> Self::Out {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);

        if fastrand::u8(0..10) == 0 {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        if fastrand::u8(0..10) < 2 {
            return Err(Error::transient("connection reset by peer"));
        }

        let mut response = Response::new(format!("{} (call {call})", request.uri().path()));
        if call % 3 == 2 {
            *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
            response.headers_mut().insert(RETRY_AFTER, HeaderValue::from_static("1"));
        }

        Ok(response)
    }
}

fn configure_telemetry() -> SdkMeterProvider {
    // Set up tracing subscriber for logs to console
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    SdkMeterProvider::builder()
        .with_periodic_exporter(MetricExporter::default())
        .build()
}
