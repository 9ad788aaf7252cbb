// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::time::Duration;

use layered::Service;
use tick::{Clock, FutureExt};

use super::{OnTimeout, OnTimeoutArgs, TimeoutOutput, TimeoutOutputArgs, TimeoutOverride, TimeoutOverrideArgs};
use crate::utils::{EnableIf, TelemetryHelper, invoke_listener};
use crate::{NotSet, PolicyContext};

/// Bounds the execution time of the inner service.
///
/// When the deadline passes the inner future is dropped and the configured timeout output is
/// returned. Configure it with [`Timeout::layer`] and [`TimeoutLayer`][super::TimeoutLayer].
#[derive(Debug)]
pub struct Timeout<In, Out, S> {
    pub(super) shared: Arc<TimeoutShared<In, Out>>,
    pub(super) inner: S,
}

#[derive(Debug)]
pub(crate) struct TimeoutShared<In, Out> {
    pub(crate) clock: Clock,
    pub(crate) timeout: Duration,
    pub(crate) timeout_output: TimeoutOutput<Out>,
    pub(crate) timeout_override: Option<TimeoutOverride<In>>,
    pub(crate) on_timeout: Option<OnTimeout<Out>>,
    pub(crate) enable_if: EnableIf<In>,
    pub(crate) telemetry: TelemetryHelper,
}

impl<In, Out, S: Clone> Clone for Timeout<In, Out, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
        }
    }
}

impl<In, Out> Timeout<In, Out, ()> {
    /// Starts configuring a timeout layer named `name`.
    pub fn layer(
        name: impl Into<std::borrow::Cow<'static, str>>,
        context: &PolicyContext<In, Out>,
    ) -> super::TimeoutLayer<In, Out, NotSet, NotSet> {
        super::TimeoutLayer::new(name.into(), context)
    }
}

impl<In, Out, S> Service<In> for Timeout<In, Out, S>
where
    In: Send,
    S: Service<In, Out = Out>,
{
    type Out = Out;

    #[cfg_attr(test, mutants::skip)] // causes test timeouts
    async fn execute(&self, input: In) -> Self::Out {
        if !self.shared.enable_if.call(&input) {
            return self.inner.execute(input).await;
        }

        let timeout = self.shared.timeout_for(&input);

        match self.inner.execute(input).timeout(&self.shared.clock, timeout).await {
            Ok(out) => out,
            Err(_elapsed) => self.shared.on_elapsed(timeout),
        }
    }
}

impl<In, Out> TimeoutShared<In, Out> {
    fn timeout_for(&self, input: &In) -> Duration {
        self.timeout_override
            .as_ref()
            .and_then(|timeout_override| {
                timeout_override.call(
                    input,
                    TimeoutOverrideArgs {
                        default_timeout: self.timeout,
                    },
                )
            })
            .unwrap_or(self.timeout)
    }

    fn on_elapsed(&self, timeout: Duration) -> Out {
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "airbag.timeout",
                tracing::Level::WARN,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                resilience.timeout = timeout.as_secs_f32(),
            );
        }

        #[cfg(feature = "metrics")]
        self.telemetry.report_metrics(crate::telemetry::events::TIMEOUT, &[]);

        let out = self.timeout_output.call(TimeoutOutputArgs { timeout });

        if let Some(on_timeout) = &self.on_timeout {
            invoke_listener(&self.telemetry, "on_timeout", || on_timeout.call(&out, OnTimeoutArgs { timeout }));
        }

        out
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use futures::FutureExt as _;
    use layered::Execute;
    use tick::ClockControl;

    use super::*;
    use crate::testing::{DropFlag, LogCapture};
    use crate::{Error, Layer};

    type Out = Result<String, Error>;

    static_assertions::assert_impl_all!(Timeout<String, String, ()>: Send, Sync, Clone);

    fn slow_service(clock: Clock, latency: Duration) -> impl Service<String, Out = Out> {
        Execute::new(move |input: String| {
            let clock = clock.clone();
            async move {
                clock.delay(latency).await;
                Ok::<_, Error>(input)
            }
        })
    }

    #[tokio::test]
    async fn fast_inner_passes_through() {
        let clock = ClockControl::default().auto_advance_timers(true).to_clock();
        let context = PolicyContext::<String, Out>::new(&clock);

        let service = Timeout::layer("timeout", &context)
            .timeout(Duration::from_secs(5))
            .timeout_exceeded()
            .layer(slow_service(clock.clone(), Duration::from_secs(1)));

        assert_eq!(service.execute("ok".to_string()).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn slow_inner_is_dropped() {
        let control = ClockControl::new();
        let clock = control.to_clock();
        let context = PolicyContext::<String, Out>::new(&clock);
        let dropped = DropFlag::new();
        let inner_flag = dropped.clone();
        let inner_clock = clock.clone();

        let service = Timeout::layer("timeout", &context)
            .timeout(Duration::from_secs(2))
            .timeout_exceeded()
            .layer(Execute::new(move |input: String| {
                let clock = inner_clock.clone();
                let guard = inner_flag.guard();
                async move {
                    let _guard = guard;
                    clock.delay(Duration::from_secs(60)).await;
                    Ok::<_, Error>(input)
                }
            }));

        let mut future = Box::pin(service.execute("slow".to_string()));
        assert!((&mut future).now_or_never().is_none());

        control.advance(Duration::from_secs(2));
        let error = future.now_or_never().unwrap().unwrap_err();

        assert!(matches!(error, Error::TimeoutExceeded { timeout } if timeout == Duration::from_secs(2)));
        assert!(dropped.is_dropped());
    }

    #[tokio::test]
    async fn override_and_listener() {
        let control = ClockControl::new();
        let clock = control.to_clock();
        let context = PolicyContext::<String, Out>::new(&clock);
        let observed = Arc::new(Mutex::new(None));
        let observed_clone = Arc::clone(&observed);

        let service = Timeout::layer("timeout", &context)
            .timeout(Duration::from_secs(10))
            .timeout_exceeded()
            .timeout_override(|input: &String, args| (input == "short").then(|| args.default_timeout() / 10))
            .on_timeout(move |out, args| {
                *observed_clone.lock().unwrap() = Some((out.is_err(), args.timeout()));
            })
            .layer(slow_service(clock.clone(), Duration::from_secs(5)));

        let mut future = Box::pin(service.execute("short".to_string()));
        assert!((&mut future).now_or_never().is_none());
        control.advance(Duration::from_secs(1));
        assert!(future.now_or_never().unwrap().is_err());

        assert_eq!(*observed.lock().unwrap(), Some((true, Duration::from_secs(1))));
    }

    #[tokio::test]
    async fn disabled_never_times_out() {
        let clock = ClockControl::default().auto_advance_timers(true).to_clock();
        let context = PolicyContext::<String, Out>::new(&clock);

        let service = Timeout::layer("timeout", &context)
            .timeout(Duration::from_millis(1))
            .timeout_exceeded()
            .disable()
            .layer(slow_service(clock.clone(), Duration::from_secs(10)));

        assert!(service.execute("x".to_string()).await.is_ok());
    }

    #[tokio::test]
    async fn panicking_listener_keeps_timeout_outcome() {
        let control = ClockControl::new();
        let clock = control.to_clock();
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = Arc::clone(&called);
        let context = PolicyContext::<String, Out>::new(&clock).enable_logs();

        let capture = LogCapture::new();
        let _guard = capture.set_default();

        let service = Timeout::layer("timeout_strategy", &context)
            .timeout(Duration::from_secs(1))
            .timeout_exceeded()
            .on_timeout(move |_, _| {
                called_clone.store(true, Ordering::SeqCst);
                panic!("listener failure");
            })
            .layer(slow_service(clock.clone(), Duration::from_secs(5)));

        let mut future = Box::pin(service.execute("x".to_string()));
        assert!((&mut future).now_or_never().is_none());
        control.advance(Duration::from_secs(1));

        assert!(future.now_or_never().unwrap().unwrap_err().is_timeout());
        assert!(called.load(Ordering::SeqCst));
        capture.assert_contains("airbag.timeout");
        capture.assert_contains("timeout_strategy");
        capture.assert_contains("airbag.listener.panicked");
    }
}
