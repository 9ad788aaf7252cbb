// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(missing_docs, reason = "This is a test module")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use airbag::backup::Backup;
use airbag::breaker::{Breaker, CircuitState};
use airbag::retry::Retry;
use airbag::timeout::Timeout;
use airbag::{Error, IdempotencyPredicate, Orchestrator, PolicyContext, Recovery, RecoveryInfo, RequestPolicy};
use futures::FutureExt;
use http::{HeaderValue, Method, Request, Response, StatusCode};
use layered::{Execute, Service};
use tick::{Clock, ClockControl};

type Req = Request<String>;
type Out = Result<Response<String>, Error>;

const DEPTH: &str = "x-depth";

fn classify(out: &Out) -> RecoveryInfo {
    match out {
        Ok(response) if response.status().is_server_error() => RecoveryInfo::retry(),
        Ok(_) => RecoveryInfo::never(),
        Err(error) => error.recovery(),
    }
}

fn request(method: Method) -> Req {
    Request::builder().method(method).uri("https://example.com/orders").body(String::new()).unwrap()
}

/// A complete pipeline around `service`.
fn pipeline(
    clock: &Clock,
    service: impl Service<Req, Out = Out> + 'static,
) -> (Orchestrator<Req, Out>, airbag::breaker::BreakerHandle) {
    let context = PolicyContext::<Req, Out>::new(clock).name("orders_client");

    let breaker = Breaker::layer("breaker", &context)
        .recovery_with(|out, _| classify(out))
        .rejected_circuit_open()
        .failure_threshold(2, 4)
        .success_threshold(1, 1)
        .break_duration(Duration::from_secs(30));
    let handle = breaker.state_handle();

    let orchestrator = Orchestrator::builder(&context)
        .circuit_breaker(breaker)
        .timeout(Timeout::layer("timeout", &context).timeout(Duration::from_secs(10)).timeout_exceeded())
        .backup(
            Backup::layer("backup", &context)
                .clone_input_with(airbag::try_clone_request)
                .delay(Duration::from_secs(2)),
        )
        .retry(
            Retry::layer("retry_transient", &context)
                .clone_input_with(|request, _args| airbag::try_clone_request(request))
                .recovery_with(|out, _| classify(out))
                .base_delay(Duration::ZERO)
                .max_retries(3)
                .when(IdempotencyPredicate::default()),
        )
        .build(service);

    (orchestrator, handle)
}

/// Fails the first `failures` calls with a transient fault.
fn flaky(calls: &Arc<AtomicU32>, failures: u32) -> impl Service<Req, Out = Out> + use<> {
    let calls = Arc::clone(calls);
    Execute::new(move |_request: Req| {
        let index = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if index < failures {
                Err(Error::transient("connection reset"))
            } else {
                Ok(Response::new(format!("attempt {index}")))
            }
        }
    })
}

#[tokio::test]
async fn pipeline_recovers_from_transient_faults() {
    let clock = ClockControl::new().to_clock();
    let calls = Arc::new(AtomicU32::new(0));
    let (orchestrator, handle) = pipeline(&clock, flaky(&calls, 2));

    let response = orchestrator.execute(request(Method::GET)).await.unwrap();

    assert_eq!(response.body(), "attempt 2");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(handle.state(), CircuitState::Closed);
    assert_eq!(orchestrator.name(), "orders_client");
}

#[tokio::test]
async fn non_idempotent_request_is_not_retried() {
    let clock = ClockControl::new().to_clock();
    let calls = Arc::new(AtomicU32::new(0));
    let (orchestrator, _) = pipeline(&clock, flaky(&calls, 2));

    let error = orchestrator.execute(request(Method::POST)).await.unwrap_err();

    assert!(matches!(error, Error::TransientNetworkFault { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exhausted_retries_open_the_circuit() {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let calls = Arc::new(AtomicU32::new(0));
    let (orchestrator, handle) = pipeline(&clock, flaky(&calls, 8));

    orchestrator.execute(request(Method::GET)).await.unwrap_err();
    orchestrator.execute(request(Method::GET)).await.unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 8);
    assert_eq!(handle.state(), CircuitState::Open);

    let clone = orchestrator.clone();
    assert!(clone.execute(request(Method::GET)).await.unwrap_err().is_circuit_open());
    assert_eq!(calls.load(Ordering::SeqCst), 8);

    control.advance(Duration::from_secs(30));
    assert_eq!(orchestrator.execute(request(Method::GET)).await.unwrap().body(), "attempt 8");
    assert_eq!(handle.state(), CircuitState::Closed);
}

#[tokio::test]
async fn timeout_bounds_hanging_service() {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let service_clock = clock.clone();
    let (orchestrator, _) = pipeline(
        &clock,
        Execute::new(move |_request: Req| {
            let clock = service_clock.clone();
            async move {
                clock.delay(Duration::from_secs(3600)).await;
                Ok::<_, Error>(Response::new(String::new()))
            }
        }),
    );

    let mut future = Box::pin(orchestrator.execute(request(Method::POST)));
    assert!((&mut future).now_or_never().is_none());
    control.advance(Duration::from_secs(10));

    assert!(future.now_or_never().unwrap().unwrap_err().is_timeout());
}

/// Counts calls that started and have not been dropped yet.
struct Live(Arc<AtomicU32>);

impl Drop for Live {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn dropping_the_request_cancels_both_legs() {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let live = Arc::new(AtomicU32::new(0));
    let service_live = Arc::clone(&live);
    let service_clock = clock.clone();
    let (orchestrator, _) = pipeline(
        &clock,
        Execute::new(move |_request: Req| {
            service_live.fetch_add(1, Ordering::SeqCst);
            let live = Live(Arc::clone(&service_live));
            let clock = service_clock.clone();
            async move {
                let _live = live;
                clock.delay(Duration::from_secs(60)).await;
                Ok::<_, Error>(Response::new(String::new()))
            }
        }),
    );

    let mut future = Box::pin(orchestrator.execute(request(Method::GET)));
    assert!((&mut future).now_or_never().is_none());
    assert_eq!(live.load(Ordering::SeqCst), 1);

    control.advance(Duration::from_secs(2));
    assert!((&mut future).now_or_never().is_none());
    assert_eq!(live.load(Ordering::SeqCst), 2);

    drop(future);
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn attempt_can_call_back_into_same_orchestrator() {
    let clock = ClockControl::new().to_clock();
    let cell: Arc<OnceLock<Orchestrator<Req, Out>>> = Arc::new(OnceLock::new());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let service_cell = Arc::clone(&cell);
    let service_seen = Arc::clone(&seen);
    let service = Execute::new(move |request: Req| {
        let cell = Arc::clone(&service_cell);
        let seen = Arc::clone(&service_seen);
        async move {
            let depth: u32 = request
                .headers()
                .get(DEPTH)
                .and_then(|value| value.to_str().ok()?.parse().ok())
                .unwrap_or_default();
            seen.lock().unwrap().push(depth);

            if depth < 2 {
                let mut nested = request;
                nested
                    .headers_mut()
                    .insert(DEPTH, HeaderValue::from_str(&(depth + 1).to_string()).unwrap());
                let orchestrator = cell.get().cloned().ok_or_else(|| Error::non_retryable("not wired"))?;
                let inner = orchestrator.execute(nested).await?;
                return Ok::<_, Error>(Response::new(format!("{depth}/{}", inner.body())));
            }

            let mut response = Response::new(depth.to_string());
            *response.status_mut() = StatusCode::OK;
            Ok(response)
        }
    });

    let (orchestrator, _) = pipeline(&clock, service);
    cell.set(orchestrator.clone()).unwrap();

    let response = orchestrator.execute(request(Method::GET)).await.unwrap();

    assert_eq!(response.body(), "0/1/2");
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
}

#[tokio::test]
async fn panicking_listener_does_not_change_outcome() {
    let clock = ClockControl::new().to_clock();
    let context = PolicyContext::<Req, Out>::new(&clock);
    let calls = Arc::new(AtomicU32::new(0));

    let orchestrator = Orchestrator::builder(&context)
        .retry(
            Retry::layer("retry", &context)
                .clone_input_with(|request, _args| airbag::try_clone_request(request))
                .recovery_with(|out, _| classify(out))
                .base_delay(Duration::ZERO)
                .on_retry(|_, _, _| panic!("listener failure")),
        )
        .build(flaky(&calls, 1));

    assert_eq!(orchestrator.execute(request(Method::GET)).await.unwrap().body(), "attempt 1");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn chained_retries_handle_different_faults() {
    let clock = ClockControl::new().to_clock();
    let context = PolicyContext::<Req, Out>::new(&clock);
    let calls = Arc::new(AtomicU32::new(0));
    let service_calls = Arc::clone(&calls);

    let only = |kind: fn(&Error) -> bool| {
        move |out: &Out, _args: airbag::retry::RecoveryArgs<'_>| match out {
            Err(error) if kind(error) => RecoveryInfo::retry(),
            _ => RecoveryInfo::never(),
        }
    };

    let orchestrator = Orchestrator::builder(&context)
        .retry(
            Retry::layer("retry_requested", &context)
                .clone_input_with(|request, _args| airbag::try_clone_request(request))
                .recovery_with(only(|error| matches!(error, Error::ApplicationRequestedRetry { .. })))
                .base_delay(Duration::ZERO)
                .max_retries(1),
        )
        .retry(
            Retry::layer("retry_transient", &context)
                .clone_input_with(|request, _args| airbag::try_clone_request(request))
                .recovery_with(only(|error| matches!(error, Error::TransientNetworkFault { .. })))
                .base_delay(Duration::ZERO)
                .max_retries(1),
        )
        .build(Execute::new(move |_request: Req| {
            let index = service_calls.fetch_add(1, Ordering::SeqCst);
            async move {
                match index {
                    0 => Err(Error::transient("reset")),
                    1 => Err(Error::retry_requested("stale token")),
                    _ => Ok(Response::new(String::new())),
                }
            }
        }));

    orchestrator.execute(request(Method::GET)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
