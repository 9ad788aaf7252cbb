// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tick::Clock;

use super::constants::{
    DEFAULT_BREAK_DURATION, DEFAULT_FAILURE_COUNT, DEFAULT_FAILURE_WINDOW, DEFAULT_SUCCESS_COUNT, DEFAULT_SUCCESS_WINDOW,
};
use super::engine::{Engine, Threshold};
use super::{
    BreakDuration, BreakDurationArgs, Breaker, BreakerHandle, BreakerShared, OnClose, OnCloseArgs, OnHalfOpen, OnHalfOpenArgs, OnOpen,
    OnOpenArgs, RecoveryArgs, RejectedArgs, RejectedOutput, ShouldRecover,
};
use crate::delay::{DelayFunction, HeaderSource};
use crate::utils::{EnableIf, TelemetryHelper};
use crate::{Applies, Error, Layer, NotSet, PolicyContext, Recovery, RecoveryInfo, RequestPolicy, Set};

/// Builder for the [`Breaker`] middleware.
///
/// Created by [`Breaker::layer`]. Before the layer can wrap a service it needs:
///
/// - [`recovery_with`][BreakerLayer::recovery_with] or [`recovery`][BreakerLayer::recovery] to
///   tell failures from successes,
/// - [`rejected_output`][BreakerLayer::rejected_output] (or one of its `Result` shortcuts) to
///   produce the outcome of a rejected call.
///
/// All services built from one layer, and their clones, share a single circuit.
#[derive(Debug)]
pub struct BreakerLayer<In, Out, RecoveryState = Set, RejectedState = Set> {
    clock: Clock,
    engine: Arc<Engine>,
    recovery: Option<ShouldRecover<Out>>,
    rejected_output: Option<RejectedOutput<In, Out>>,
    break_duration: Duration,
    break_duration_fn: Option<BreakDuration<Out>>,
    on_open: Option<OnOpen>,
    on_half_open: Option<OnHalfOpen>,
    on_close: Option<OnClose>,
    enable_if: EnableIf<In>,
    telemetry: TelemetryHelper,
    _state: PhantomData<fn(In, RecoveryState, RejectedState) -> Out>,
}

impl<In, Out> BreakerLayer<In, Out, NotSet, NotSet> {
    pub(crate) fn new(name: Cow<'static, str>, context: &PolicyContext<In, Out>) -> Self {
        Self {
            clock: context.clock().clone(),
            engine: Arc::new(Engine::new(
                Threshold::new(DEFAULT_FAILURE_COUNT, DEFAULT_FAILURE_WINDOW),
                Threshold::new(DEFAULT_SUCCESS_COUNT, DEFAULT_SUCCESS_WINDOW),
            )),
            recovery: None,
            rejected_output: None,
            break_duration: DEFAULT_BREAK_DURATION,
            break_duration_fn: None,
            on_open: None,
            on_half_open: None,
            on_close: None,
            enable_if: EnableIf::always(),
            telemetry: context.create_telemetry(name),
            _state: PhantomData,
        }
    }
}

impl<In, Res, E, RecoveryState, RejectedState> BreakerLayer<In, Result<Res, E>, RecoveryState, RejectedState> {
    /// Rejects calls with `Err(error_fn(input, args))`.
    #[must_use]
    pub fn rejected_error(
        self,
        error_fn: impl Fn(In, RejectedArgs) -> E + Send + Sync + 'static,
    ) -> BreakerLayer<In, Result<Res, E>, RecoveryState, Set> {
        self.rejected_output(move |input, args| Err(error_fn(input, args)))
    }
}

impl<In, Res, RecoveryState, RejectedState> BreakerLayer<In, Result<Res, Error>, RecoveryState, RejectedState> {
    /// Rejects calls with [`Error::CircuitOpen`].
    #[must_use]
    pub fn rejected_circuit_open(self) -> BreakerLayer<In, Result<Res, Error>, RecoveryState, Set> {
        self.rejected_error(|_input, args| Error::circuit_open(args.retry_after()))
    }
}

impl<In, Out, RecoveryState, RejectedState> BreakerLayer<In, Out, RecoveryState, RejectedState> {
    /// Classifies outcomes. [`RecoveryKind::Retry`][crate::RecoveryKind::Retry] and
    /// [`RecoveryKind::Unavailable`][crate::RecoveryKind::Unavailable] count as failures,
    /// anything else as success.
    #[must_use]
    pub fn recovery_with(
        mut self,
        recover_fn: impl Fn(&Out, RecoveryArgs<'_>) -> RecoveryInfo + Send + Sync + 'static,
    ) -> BreakerLayer<In, Out, Set, RejectedState> {
        self.recovery = Some(ShouldRecover::new(recover_fn));
        self.into_state::<Set, RejectedState>()
    }

    /// Classifies outcomes with their [`Recovery`] implementation.
    #[must_use]
    pub fn recovery(self) -> BreakerLayer<In, Out, Set, RejectedState>
    where
        Out: Recovery,
    {
        self.recovery_with(|out, _args| out.recovery())
    }

    /// Produces the outcome of a call rejected by an open circuit. The input is handed back.
    #[must_use]
    pub fn rejected_output(
        mut self,
        output_fn: impl Fn(In, RejectedArgs) -> Out + Send + Sync + 'static,
    ) -> BreakerLayer<In, Out, RecoveryState, Set> {
        self.rejected_output = Some(RejectedOutput::new(output_fn));
        self.into_state::<RecoveryState, Set>()
    }

    /// Opens the circuit once `count` of the last `window` calls failed.
    ///
    /// `count` is at least 1 and `window` at least `count`.
    ///
    /// **Default**: 5 of 10
    #[must_use]
    pub fn failure_threshold(mut self, count: u32, window: u32) -> Self {
        self.engine = Arc::new(Engine::new(Threshold::new(count, window), self.engine.success_threshold()));
        self
    }

    /// Closes a half-open circuit after `count` successful probes, running at most `window`
    /// probes at a time.
    ///
    /// **Default**: 3 of 3
    #[must_use]
    pub fn success_threshold(mut self, count: u32, window: u32) -> Self {
        self.engine = Arc::new(Engine::new(self.engine.failure_threshold(), Threshold::new(count, window)));
        self
    }

    /// How long the circuit stays open before probing.
    ///
    /// **Default**: 5 seconds
    #[must_use]
    pub fn break_duration(mut self, duration: Duration) -> Self {
        self.break_duration = duration;
        self
    }

    /// Computes the break duration from the outcome that opened the circuit.
    ///
    /// `None` falls back to [`break_duration`][BreakerLayer::break_duration].
    #[must_use]
    pub fn break_duration_with(
        mut self,
        duration_fn: impl Fn(&Out, BreakDurationArgs<'_>) -> Option<Duration> + Send + Sync + 'static,
    ) -> Self {
        self.break_duration_fn = Some(BreakDuration::new(duration_fn));
        self
    }

    /// Reads the break duration from the headers of the outcome that opened the circuit.
    #[must_use]
    pub fn delay_function(self, function: DelayFunction) -> Self
    where
        Out: HeaderSource,
    {
        self.break_duration_with(move |out, args| function.compute(out, args.clock().system_time()))
    }

    /// Registers a listener invoked when the circuit opens.
    #[must_use]
    pub fn on_open(mut self, open_fn: impl Fn(OnOpenArgs) + Send + Sync + 'static) -> Self {
        self.on_open = Some(OnOpen::new(open_fn));
        self
    }

    /// Registers a listener invoked when the circuit starts probing.
    #[must_use]
    pub fn on_half_open(mut self, half_open_fn: impl Fn(OnHalfOpenArgs) + Send + Sync + 'static) -> Self {
        self.on_half_open = Some(OnHalfOpen::new(half_open_fn));
        self
    }

    /// Registers a listener invoked when the circuit closes.
    #[must_use]
    pub fn on_close(mut self, close_fn: impl Fn(OnCloseArgs) + Send + Sync + 'static) -> Self {
        self.on_close = Some(OnClose::new(close_fn));
        self
    }

    /// Applies the circuit only to inputs for which `is_enabled` returns `true`. Other inputs
    /// neither count toward the circuit nor get rejected by it.
    #[must_use]
    pub fn enable_if(mut self, is_enabled: impl Fn(&In) -> bool + Send + Sync + 'static) -> Self {
        self.enable_if = EnableIf::new(is_enabled);
        self
    }

    /// Applies the circuit to every input. This is the default.
    #[must_use]
    pub fn enable_always(mut self) -> Self {
        self.enable_if = EnableIf::always();
        self
    }

    /// Passes every input straight to the inner service.
    #[must_use]
    pub fn disable(mut self) -> Self {
        self.enable_if = EnableIf::never();
        self
    }

    /// Returns a handle that observes the circuit shared by services built from this layer.
    ///
    /// Thresholds rebuild the circuit, so take the handle after configuring them.
    #[must_use]
    pub fn state_handle(&self) -> BreakerHandle {
        BreakerHandle {
            engine: Arc::clone(&self.engine),
        }
    }

    /// Applies serializable options on top of the current configuration.
    #[cfg(feature = "serde")]
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    #[must_use]
    pub fn options(self, options: &crate::options::BreakerOptions) -> Self {
        let layer = self
            .failure_threshold(options.failure_count, options.failure_window)
            .success_threshold(options.success_count, options.success_window)
            .break_duration(options.break_duration);

        if options.enabled { layer } else { layer.disable() }
    }

    fn into_state<R, J>(self) -> BreakerLayer<In, Out, R, J> {
        BreakerLayer {
            clock: self.clock,
            engine: self.engine,
            recovery: self.recovery,
            rejected_output: self.rejected_output,
            break_duration: self.break_duration,
            break_duration_fn: self.break_duration_fn,
            on_open: self.on_open,
            on_half_open: self.on_half_open,
            on_close: self.on_close,
            enable_if: self.enable_if,
            telemetry: self.telemetry,
            _state: PhantomData,
        }
    }
}

impl<In: 'static, Out, RecoveryState, RejectedState> RequestPolicy<In> for BreakerLayer<In, Out, RecoveryState, RejectedState> {
    fn applies(&self, input: &In) -> bool {
        self.enable_if.call(input)
    }

    fn when(mut self, predicate: impl Applies<In>) -> Self {
        self.enable_if = self.enable_if.and(predicate);
        self
    }
}

impl<In, Out, S> Layer<S> for BreakerLayer<In, Out, Set, Set> {
    type Service = Breaker<In, Out, S>;

    fn layer(&self, inner: S) -> Self::Service {
        let shared = BreakerShared {
            clock: self.clock.clone(),
            engine: Arc::clone(&self.engine),
            recovery: self.recovery.clone().expect("recovery must be set in Ready state"),
            rejected_output: self.rejected_output.clone().expect("rejected_output must be set in Ready state"),
            break_duration: self.break_duration,
            break_duration_fn: self.break_duration_fn.clone(),
            on_open: self.on_open.clone(),
            on_half_open: self.on_half_open.clone(),
            on_close: self.on_close.clone(),
            enable_if: self.enable_if.clone(),
            telemetry: self.telemetry.clone(),
        };

        Breaker {
            shared: Arc::new(shared),
            inner,
        }
    }
}
