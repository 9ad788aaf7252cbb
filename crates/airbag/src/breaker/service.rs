// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::time::Duration;

use layered::Service;
use tick::Clock;

use super::engine::{Engine, EnterResult, ExecutionMode, ExecutionResult, Transition};
use super::{
    BreakDuration, BreakDurationArgs, OnClose, OnCloseArgs, OnHalfOpen, OnHalfOpenArgs, OnOpen, OnOpenArgs, RecoveryArgs, RejectedArgs,
    RejectedOutput, ShouldRecover,
};
use crate::utils::{EnableIf, TelemetryHelper, invoke_listener};
use crate::{NotSet, PolicyContext, RecoveryKind};

/// Fails fast while the inner service keeps failing.
///
/// Configure it with [`Breaker::layer`] and the builder methods of
/// [`BreakerLayer`][super::BreakerLayer].
#[derive(Debug)]
pub struct Breaker<In, Out, S> {
    pub(super) shared: Arc<BreakerShared<In, Out>>,
    pub(super) inner: S,
}

#[derive(Debug)]
pub(crate) struct BreakerShared<In, Out> {
    pub(crate) clock: Clock,
    pub(crate) engine: Arc<Engine>,
    pub(crate) recovery: ShouldRecover<Out>,
    pub(crate) rejected_output: RejectedOutput<In, Out>,
    pub(crate) break_duration: Duration,
    pub(crate) break_duration_fn: Option<BreakDuration<Out>>,
    pub(crate) on_open: Option<OnOpen>,
    pub(crate) on_half_open: Option<OnHalfOpen>,
    pub(crate) on_close: Option<OnClose>,
    pub(crate) enable_if: EnableIf<In>,
    pub(crate) telemetry: TelemetryHelper,
}

impl<In, Out, S: Clone> Clone for Breaker<In, Out, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
        }
    }
}

impl<In, Out> Breaker<In, Out, ()> {
    /// Starts configuring a circuit breaker layer named `name`.
    pub fn layer(
        name: impl Into<std::borrow::Cow<'static, str>>,
        context: &PolicyContext<In, Out>,
    ) -> super::BreakerLayer<In, Out, NotSet, NotSet> {
        super::BreakerLayer::new(name.into(), context)
    }
}

impl<In, Out, S> Service<In> for Breaker<In, Out, S>
where
    In: Send,
    Out: Send,
    S: Service<In, Out = Out>,
{
    type Out = Out;

    async fn execute(&self, input: In) -> Self::Out {
        if !self.shared.enable_if.call(&input) {
            return self.inner.execute(input).await;
        }

        let mode = match self.shared.engine.enter(self.shared.clock.instant()) {
            EnterResult::Rejected { retry_after } => {
                self.shared.emit_rejected(retry_after);
                return self.shared.rejected_output.call(input, RejectedArgs { retry_after });
            }
            EnterResult::Accepted { mode, half_opened } => {
                if let Some(open_duration) = half_opened {
                    self.shared.emit_half_opened(open_duration);
                }
                mode
            }
        };

        let guard = ProbeGuard::new(&self.shared.engine, mode);
        let out = self.inner.execute(input).await;
        guard.disarm();

        self.shared.record(&out, mode);
        out
    }
}

impl<In, Out> BreakerShared<In, Out> {
    fn record(&self, out: &Out, mode: ExecutionMode) {
        let recovery = self.recovery.call(out, RecoveryArgs { clock: &self.clock });

        let result = match recovery.kind() {
            RecoveryKind::Retry | RecoveryKind::Unavailable => ExecutionResult::Failure,
            RecoveryKind::Never | RecoveryKind::Unknown | _ => ExecutionResult::Success,
        };

        // Computed outside the engine lock, user code runs here.
        let break_duration = match result {
            ExecutionResult::Failure => self.compute_break_duration(out),
            ExecutionResult::Success => self.break_duration,
        };

        match self.engine.exit(result, mode, self.clock.instant(), break_duration) {
            Transition::Unchanged => {}
            Transition::Opened { open_for } => self.emit_opened(open_for),
            Transition::Closed { open_duration } => self.emit_closed(open_duration),
        }
    }

    fn compute_break_duration(&self, out: &Out) -> Duration {
        self.break_duration_fn
            .as_ref()
            .and_then(|compute| {
                compute.call(
                    out,
                    BreakDurationArgs {
                        clock: &self.clock,
                        default: self.break_duration,
                    },
                )
            })
            .unwrap_or(self.break_duration)
    }

    fn emit_rejected(&self, retry_after: Option<Duration>) {
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "airbag.breaker.rejected",
                tracing::Level::DEBUG,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                resilience.breaker.retry_after = retry_after.map(|d| d.as_secs_f32()),
            );
        }

        #[cfg(feature = "metrics")]
        self.telemetry.report_metrics(crate::telemetry::events::CIRCUIT_REJECTED, &[]);
    }

    fn emit_opened(&self, open_for: Duration) {
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "airbag.breaker.opened",
                tracing::Level::WARN,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                resilience.breaker.open_for = open_for.as_secs_f32(),
            );
        }

        #[cfg(feature = "metrics")]
        self.telemetry.report_metrics(crate::telemetry::events::CIRCUIT_OPENED, &[]);

        if let Some(on_open) = &self.on_open {
            invoke_listener(&self.telemetry, "on_open", || on_open.call(OnOpenArgs { open_for }));
        }
    }

    fn emit_half_opened(&self, open_duration: Duration) {
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "airbag.breaker.half_opened",
                tracing::Level::INFO,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                resilience.breaker.open_duration = open_duration.as_secs_f32(),
            );
        }

        #[cfg(feature = "metrics")]
        self.telemetry.report_metrics(crate::telemetry::events::CIRCUIT_HALF_OPENED, &[]);

        if let Some(on_half_open) = &self.on_half_open {
            invoke_listener(&self.telemetry, "on_half_open", || on_half_open.call(OnHalfOpenArgs { open_duration }));
        }
    }

    fn emit_closed(&self, open_duration: Duration) {
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "airbag.breaker.closed",
                tracing::Level::INFO,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                resilience.breaker.open_duration = open_duration.as_secs_f32(),
            );
        }

        #[cfg(feature = "metrics")]
        self.telemetry.report_metrics(crate::telemetry::events::CIRCUIT_CLOSED, &[]);

        if let Some(on_close) = &self.on_close {
            invoke_listener(&self.telemetry, "on_close", || on_close.call(OnCloseArgs { open_duration }));
        }
    }
}

/// Returns the probe slot to the engine when the probe future is dropped before completing.
struct ProbeGuard<'a> {
    engine: &'a Engine,
    generation: Option<u64>,
}

impl<'a> ProbeGuard<'a> {
    fn new(engine: &'a Engine, mode: ExecutionMode) -> Self {
        let generation = match mode {
            ExecutionMode::Probe(generation) => Some(generation),
            ExecutionMode::Normal(_) => None,
        };

        Self { engine, generation }
    }

    fn disarm(mut self) {
        self.generation = None;
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if let Some(generation) = self.generation {
            self.engine.release_probe(generation);
        }
    }
}
