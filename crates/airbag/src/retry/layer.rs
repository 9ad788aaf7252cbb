// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tick::Clock;

use super::backoff::BackoffOptions;
use super::constants::DEFAULT_MAX_RETRIES;
use super::{
    Backoff, CloneArgs, CloneInput, ComputeDelay, DelayArgs, Jitter, OnRetry, OnRetryArgs, RecoveryArgs, RestoreInput,
    RestoreInputArgs, Retry, RetryShared, ShouldRecover,
};
use crate::attempt::MaxAttempts;
use crate::delay::{DelayFunction, HeaderSource};
use crate::utils::{EnableIf, TelemetryHelper};
use crate::{Applies, Layer, NotSet, PolicyContext, Recovery, RecoveryInfo, RequestPolicy, Set};

/// Builder for the [`Retry`] middleware.
///
/// Created by [`Retry::layer`]. The type-state parameters make sure the two required callbacks
/// are configured before the layer can wrap a service:
///
/// - [`clone_input_with`][RetryLayer::clone_input_with] or [`clone_input`][RetryLayer::clone_input]
/// - [`recovery_with`][RetryLayer::recovery_with] or [`recovery`][RetryLayer::recovery]
#[derive(Debug)]
pub struct RetryLayer<In, Out, CloneInputState = Set, RecoveryState = Set> {
    clock: Clock,
    max_attempts: MaxAttempts,
    max_duration: Option<Duration>,
    backoff: BackoffOptions,
    clone_input: Option<CloneInput<In>>,
    should_recover: Option<ShouldRecover<Out>>,
    compute_delay: Option<ComputeDelay<Out>>,
    on_retry: Option<OnRetry<In, Out>>,
    enable_if: EnableIf<In>,
    telemetry: TelemetryHelper,
    restore_input: Option<RestoreInput<In, Out>>,
    handle_unavailable: bool,
    _state: PhantomData<fn(In, CloneInputState, RecoveryState) -> Out>,
}

impl<In, Out> RetryLayer<In, Out, NotSet, NotSet> {
    pub(crate) fn new(name: Cow<'static, str>, context: &PolicyContext<In, Out>) -> Self {
        Self {
            clock: context.clock().clone(),
            max_attempts: MaxAttempts::from_retries(DEFAULT_MAX_RETRIES),
            max_duration: None,
            backoff: BackoffOptions::default(),
            clone_input: None,
            should_recover: None,
            compute_delay: None,
            on_retry: None,
            enable_if: EnableIf::always(),
            telemetry: context.create_telemetry(name),
            restore_input: None,
            handle_unavailable: false,
            _state: PhantomData,
        }
    }
}

impl<In, Out, CloneInputState, RecoveryState> RetryLayer<In, Out, CloneInputState, RecoveryState> {
    /// Sets the maximum number of retries, not counting the original call.
    ///
    /// With `3`, the inner service is called at most 4 times.
    ///
    /// **Default**: 3
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_attempts = MaxAttempts::from_retries(max_retries);
        self
    }

    /// Retries until the outcome is not recoverable.
    ///
    /// Pair it with [`max_duration`][RetryLayer::max_duration] or an outer timeout.
    #[must_use]
    pub fn infinite_retries(mut self) -> Self {
        self.max_attempts = MaxAttempts::Infinite;
        self
    }

    /// Bounds the whole retry sequence.
    ///
    /// A retry is not scheduled if the time elapsed since the original call plus the retry delay
    /// would exceed `max_duration`. An attempt that is already running is not interrupted.
    ///
    /// **Default**: None (no limit)
    #[must_use]
    pub fn max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    /// Sets the backoff strategy.
    ///
    /// **Default**: [`Backoff::Exponential`]
    #[must_use]
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff.backoff_type = backoff;
        self
    }

    /// Sets the delay before the first retry, which the backoff strategy grows from.
    ///
    /// **Default**: 2 seconds
    #[must_use]
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.backoff.base_delay = delay;
        self
    }

    /// Caps the backoff delay, jitter included.
    ///
    /// **Default**: None (no limit)
    #[must_use]
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.backoff.max_delay = Some(max_delay);
        self
    }

    /// Sets the growth factor of [`Backoff::Exponential`]. Values below `1.0` are raised to `1.0`.
    ///
    /// **Default**: 2.0
    #[must_use]
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.backoff.multiplier = if multiplier.is_nan() { 1.0 } else { multiplier.max(1.0) };
        self
    }

    /// Sets the randomization applied to backoff delays.
    ///
    /// **Default**: [`Jitter::Factor(0.25)`][Jitter::Factor]
    #[must_use]
    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.backoff.jitter = jitter;
        self
    }

    /// Sets how the input is cloned before each attempt.
    ///
    /// Return `None` to run the attempt with the original input and give up retrying afterwards
    /// (unless [`restore_input`][RetryLayer::restore_input] recovers it).
    #[must_use]
    pub fn clone_input_with(
        mut self,
        clone_fn: impl Fn(&mut In, CloneArgs) -> Option<In> + Send + Sync + 'static,
    ) -> RetryLayer<In, Out, Set, RecoveryState> {
        self.clone_input = Some(CloneInput::new(clone_fn));
        self.into_state::<Set, RecoveryState>()
    }

    /// Clones the input with [`Clone`].
    #[must_use]
    pub fn clone_input(self) -> RetryLayer<In, Out, Set, RecoveryState>
    where
        In: Clone,
    {
        self.clone_input_with(|input, _args| Some(input.clone()))
    }

    /// Sets how outcomes are classified.
    ///
    /// [`RecoveryKind::Retry`][crate::RecoveryKind::Retry] outcomes are retried,
    /// [`RecoveryKind::Unavailable`][crate::RecoveryKind::Unavailable] ones only with
    /// [`handle_unavailable`][RetryLayer::handle_unavailable]. Everything else is returned as is.
    #[must_use]
    pub fn recovery_with(
        mut self,
        recover_fn: impl Fn(&Out, RecoveryArgs<'_>) -> RecoveryInfo + Send + Sync + 'static,
    ) -> RetryLayer<In, Out, CloneInputState, Set> {
        self.should_recover = Some(ShouldRecover::new(recover_fn));
        self.into_state::<CloneInputState, Set>()
    }

    /// Classifies outcomes with their [`Recovery`] implementation.
    #[must_use]
    pub fn recovery(self) -> RetryLayer<In, Out, CloneInputState, Set>
    where
        Out: Recovery,
    {
        self.recovery_with(|out, _args| out.recovery())
    }

    /// Computes the retry delay from the outcome, typically from server hints.
    ///
    /// When the callback returns `Some`, its value replaces the backoff delay for this retry.
    /// `None` falls back to the backoff strategy. The value is not capped by
    /// [`max_delay`][RetryLayer::max_delay].
    #[must_use]
    pub fn delay_with(mut self, delay_fn: impl Fn(&Out, DelayArgs<'_>) -> Option<Duration> + Send + Sync + 'static) -> Self {
        self.compute_delay = Some(ComputeDelay::new(delay_fn));
        self
    }

    /// Reads the retry delay from the headers of the outcome.
    ///
    /// ```rust
    /// # use airbag::delay::DelayFunction;
    /// # use airbag::retry::Retry;
    /// # use airbag::{Error, PolicyContext};
    /// # use http::{Request, Response};
    /// # use tick::Clock;
    /// # let context = PolicyContext::<Request<()>, Result<Response<()>, Error>>::new(Clock::new_frozen());
    /// let layer = Retry::layer("retry", &context).delay_function(DelayFunction::default());
    /// # let _ = layer;
    /// ```
    #[must_use]
    pub fn delay_function(self, function: DelayFunction) -> Self
    where
        Out: HeaderSource,
    {
        self.delay_with(move |out, args| function.compute(out, args.clock().system_time()))
    }

    /// Registers a listener invoked before each retry.
    ///
    /// The listener receives the input of the next attempt, the outcome that triggered the retry
    /// and [`OnRetryArgs`]. A panicking listener is logged and ignored.
    #[must_use]
    pub fn on_retry(mut self, retry_fn: impl Fn(&In, &Out, OnRetryArgs) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(OnRetry::new(retry_fn));
        self
    }

    /// Applies the policy only to inputs for which `is_enabled` returns `true`.
    ///
    /// Replaces any previous condition.
    #[must_use]
    pub fn enable_if(mut self, is_enabled: impl Fn(&In) -> bool + Send + Sync + 'static) -> Self {
        self.enable_if = EnableIf::new(is_enabled);
        self
    }

    /// Applies the policy to every input. This is the default.
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

    /// Retries outcomes classified as [`RecoveryInfo::unavailable`].
    ///
    /// **Default**: false
    #[must_use]
    pub fn handle_unavailable(mut self, enable: bool) -> Self {
        self.handle_unavailable = enable;
        self
    }

    /// Recovers the input from the outcome when it could not be cloned.
    ///
    /// Called only after [`clone_input_with`][RetryLayer::clone_input_with] returned `None`.
    /// Return `Some(input)` to continue retrying, or `None` to stop and return the outcome.
    #[must_use]
    pub fn restore_input(mut self, restore_fn: impl Fn(&mut Out, RestoreInputArgs) -> Option<In> + Send + Sync + 'static) -> Self {
        self.restore_input = Some(RestoreInput::new(restore_fn));
        self
    }

    /// Applies serializable options on top of the current configuration.
    #[cfg(feature = "serde")]
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    #[must_use]
    pub fn options(mut self, options: &crate::options::RetryOptions) -> Self {
        self.max_attempts = match options.max_retries {
            Some(max_retries) => MaxAttempts::from_retries(max_retries),
            None => MaxAttempts::Infinite,
        };
        self.max_duration = options.max_duration;
        self.backoff.backoff_type = options.backoff;
        self.backoff.base_delay = options.base_delay;
        self.backoff.max_delay = options.max_delay;
        self.backoff.jitter = options.jitter;
        self.handle_unavailable = options.handle_unavailable;
        let layer = self.multiplier(options.multiplier);

        if options.enabled { layer } else { layer.disable() }
    }

    fn into_state<C, R>(self) -> RetryLayer<In, Out, C, R> {
        RetryLayer {
            clock: self.clock,
            max_attempts: self.max_attempts,
            max_duration: self.max_duration,
            backoff: self.backoff,
            clone_input: self.clone_input,
            should_recover: self.should_recover,
            compute_delay: self.compute_delay,
            on_retry: self.on_retry,
            enable_if: self.enable_if,
            telemetry: self.telemetry,
            restore_input: self.restore_input,
            handle_unavailable: self.handle_unavailable,
            _state: PhantomData,
        }
    }
}

impl<In: 'static, Out, CloneInputState, RecoveryState> RequestPolicy<In> for RetryLayer<In, Out, CloneInputState, RecoveryState> {
    fn applies(&self, input: &In) -> bool {
        self.enable_if.call(input)
    }

    fn when(mut self, predicate: impl Applies<In>) -> Self {
        self.enable_if = self.enable_if.and(predicate);
        self
    }
}

impl<In, Out, S> Layer<S> for RetryLayer<In, Out, Set, Set> {
    type Service = Retry<In, Out, S>;

    fn layer(&self, inner: S) -> Self::Service {
        let shared = RetryShared {
            clock: self.clock.clone(),
            max_attempts: self.max_attempts,
            max_duration: self.max_duration,
            backoff: self.backoff.clone().into(),
            clone_input: self.clone_input.clone().expect("clone_input must be set in Ready state"),
            should_recover: self.should_recover.clone().expect("should_recover must be set in Ready state"),
            compute_delay: self.compute_delay.clone(),
            on_retry: self.on_retry.clone(),
            enable_if: self.enable_if.clone(),
            telemetry: self.telemetry.clone(),
            restore_input: self.restore_input.clone(),
            handle_unavailable: self.handle_unavailable,
        };

        Retry {
            shared: Arc::new(shared),
            inner,
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use layered::Execute;

    use super::*;
    use crate::rnd::Rnd;

    type Ready = RetryLayer<String, String, Set, Set>;

    fn context() -> PolicyContext<String, String> {
        PolicyContext::new(Clock::new_frozen()).name("test_pipeline")
    }

    fn ready(context: &PolicyContext<String, String>) -> Ready {
        Retry::layer("test_retry", context)
            .clone_input()
            .recovery_with(|_, _| RecoveryInfo::never())
    }

    #[test]
    fn defaults() {
        let layer = ready(&context());

        assert_eq!(layer.max_attempts, MaxAttempts::Finite(4));
        assert_eq!(layer.max_duration, None);
        assert_eq!(layer.backoff.backoff_type, Backoff::Exponential);
        assert_eq!(layer.backoff.base_delay, Duration::from_secs(2));
        assert_eq!(layer.backoff.jitter, Jitter::Factor(0.25));
        assert!(layer.compute_delay.is_none());
        assert!(layer.on_retry.is_none());
        assert!(layer.restore_input.is_none());
        assert!(!layer.handle_unavailable);
        assert!(layer.applies(&"anything".to_string()));
        assert_eq!(layer.telemetry.strategy_name, "test_retry");
    }

    #[test]
    fn setters() {
        let layer = ready(&context())
            .max_retries(7)
            .max_duration(Duration::from_secs(30))
            .backoff(Backoff::Linear)
            .base_delay(Duration::from_millis(50))
            .max_delay(Duration::from_secs(1))
            .multiplier(0.5)
            .jitter(Jitter::None)
            .handle_unavailable(true);

        assert_eq!(layer.max_attempts, MaxAttempts::Finite(8));
        assert_eq!(layer.max_duration, Some(Duration::from_secs(30)));
        assert_eq!(layer.backoff.backoff_type, Backoff::Linear);
        assert_eq!(layer.backoff.base_delay, Duration::from_millis(50));
        assert_eq!(layer.backoff.max_delay, Some(Duration::from_secs(1)));
        assert!((layer.backoff.multiplier - 1.0).abs() < f64::EPSILON);
        assert_eq!(layer.backoff.jitter, Jitter::None);
        assert!(layer.handle_unavailable);

        assert_eq!(layer.infinite_retries().max_attempts, MaxAttempts::Infinite);
    }

    #[test]
    fn enable_disable_and_when() {
        let layer = ready(&context()).enable_if(|input: &String| input.len() > 2);
        assert!(layer.applies(&"long".to_string()));
        assert!(!layer.applies(&"no".to_string()));

        let layer = layer.when(|input: &String| input.starts_with('l'));
        assert!(layer.applies(&"long".to_string()));
        assert!(!layer.applies(&"wide".to_string()));

        let layer = layer.disable();
        assert!(!layer.applies(&"long".to_string()));
        assert!(layer.enable_always().applies(&"no".to_string()));
    }

    #[test]
    fn layer_builds_service() {
        let mut layer = ready(&context()).max_retries(1).on_retry(|_, _, _| {});
        layer.backoff.rnd = Rnd::new_fixed(0.5);

        let service = layer.layer(Execute::new(|input: String| async move { input }));

        assert_eq!(service.shared.max_attempts, MaxAttempts::Finite(2));
        assert!(service.shared.on_retry.is_some());
        assert_eq!(service.shared.telemetry.pipeline_name, "test_pipeline");
    }
}
