// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tick::Clock;

use super::{OnTimeout, OnTimeoutArgs, Timeout, TimeoutOutput, TimeoutOutputArgs, TimeoutOverride, TimeoutOverrideArgs, TimeoutShared};
use crate::utils::{EnableIf, TelemetryHelper};
use crate::{Applies, Error, Layer, NotSet, PolicyContext, RequestPolicy, Set};

/// Builder for the [`Timeout`] middleware.
///
/// Both [`timeout`][TimeoutLayer::timeout] and
/// [`timeout_output`][TimeoutLayer::timeout_output] (or one of its `Result` shortcuts) must be set
/// before the layer can wrap a service.
#[derive(Debug)]
pub struct TimeoutLayer<In, Out, TimeoutState = Set, OutputState = Set> {
    clock: Clock,
    timeout: Option<Duration>,
    timeout_output: Option<TimeoutOutput<Out>>,
    timeout_override: Option<TimeoutOverride<In>>,
    on_timeout: Option<OnTimeout<Out>>,
    enable_if: EnableIf<In>,
    telemetry: TelemetryHelper,
    _state: PhantomData<fn(In, TimeoutState, OutputState) -> Out>,
}

impl<In, Out> TimeoutLayer<In, Out, NotSet, NotSet> {
    pub(crate) fn new(name: Cow<'static, str>, context: &PolicyContext<In, Out>) -> Self {
        Self {
            clock: context.clock().clone(),
            timeout: None,
            timeout_output: None,
            timeout_override: None,
            on_timeout: None,
            enable_if: EnableIf::always(),
            telemetry: context.create_telemetry(name),
            _state: PhantomData,
        }
    }
}

impl<In, Res, E, TimeoutState, OutputState> TimeoutLayer<In, Result<Res, E>, TimeoutState, OutputState> {
    /// Returns `Err(error_fn(args))` when the deadline is exceeded.
    #[must_use]
    pub fn timeout_error(
        self,
        error_fn: impl Fn(TimeoutOutputArgs) -> E + Send + Sync + 'static,
    ) -> TimeoutLayer<In, Result<Res, E>, TimeoutState, Set> {
        self.timeout_output(move |args| Err(error_fn(args)))
    }
}

impl<In, Res, TimeoutState, OutputState> TimeoutLayer<In, Result<Res, Error>, TimeoutState, OutputState> {
    /// Returns [`Error::TimeoutExceeded`] when the deadline is exceeded.
    #[must_use]
    pub fn timeout_exceeded(self) -> TimeoutLayer<In, Result<Res, Error>, TimeoutState, Set> {
        self.timeout_error(|args| Error::timeout(args.timeout()))
    }
}

impl<In, Out, TimeoutState, OutputState> TimeoutLayer<In, Out, TimeoutState, OutputState> {
    /// Sets the deadline of every call.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> TimeoutLayer<In, Out, Set, OutputState> {
        self.timeout = Some(timeout);
        self.into_state::<Set, OutputState>()
    }

    /// Produces the outcome returned when the deadline is exceeded.
    #[must_use]
    pub fn timeout_output(
        mut self,
        output_fn: impl Fn(TimeoutOutputArgs) -> Out + Send + Sync + 'static,
    ) -> TimeoutLayer<In, Out, TimeoutState, Set> {
        self.timeout_output = Some(TimeoutOutput::new(output_fn));
        self.into_state::<TimeoutState, Set>()
    }

    /// Computes the deadline per input. `None` keeps the configured one.
    #[must_use]
    pub fn timeout_override(
        mut self,
        override_fn: impl Fn(&In, TimeoutOverrideArgs) -> Option<Duration> + Send + Sync + 'static,
    ) -> Self {
        self.timeout_override = Some(TimeoutOverride::new(override_fn));
        self
    }

    /// Registers a listener invoked with the timeout outcome.
    #[must_use]
    pub fn on_timeout(mut self, timeout_fn: impl Fn(&Out, OnTimeoutArgs) + Send + Sync + 'static) -> Self {
        self.on_timeout = Some(OnTimeout::new(timeout_fn));
        self
    }

    /// Applies the deadline only to inputs for which `is_enabled` returns `true`.
    #[must_use]
    pub fn enable_if(mut self, is_enabled: impl Fn(&In) -> bool + Send + Sync + 'static) -> Self {
        self.enable_if = EnableIf::new(is_enabled);
        self
    }

    /// Applies the deadline to every input. This is the default.
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

    fn into_state<T, O>(self) -> TimeoutLayer<In, Out, T, O> {
        TimeoutLayer {
            clock: self.clock,
            timeout: self.timeout,
            timeout_output: self.timeout_output,
            timeout_override: self.timeout_override,
            on_timeout: self.on_timeout,
            enable_if: self.enable_if,
            telemetry: self.telemetry,
            _state: PhantomData,
        }
    }
}

impl<In, Out, OutputState> TimeoutLayer<In, Out, Set, OutputState> {
    /// Applies serializable options on top of the current configuration.
    #[cfg(feature = "serde")]
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    #[must_use]
    pub fn options(self, options: &crate::options::TimeoutOptions) -> Self {
        let layer = match options.timeout {
            Some(timeout) => self.timeout(timeout),
            None => self,
        };

        if options.enabled { layer } else { layer.disable() }
    }
}

impl<In: 'static, Out, TimeoutState, OutputState> RequestPolicy<In> for TimeoutLayer<In, Out, TimeoutState, OutputState> {
    fn applies(&self, input: &In) -> bool {
        self.enable_if.call(input)
    }

    fn when(mut self, predicate: impl Applies<In>) -> Self {
        self.enable_if = self.enable_if.and(predicate);
        self
    }
}

impl<In, Out, S> Layer<S> for TimeoutLayer<In, Out, Set, Set> {
    type Service = Timeout<In, Out, S>;

    fn layer(&self, inner: S) -> Self::Service {
        let shared = TimeoutShared {
            clock: self.clock.clone(),
            timeout: self.timeout.expect("timeout must be set in Ready state"),
            timeout_output: self.timeout_output.clone().expect("timeout_output must be set in Ready state"),
            timeout_override: self.timeout_override.clone(),
            on_timeout: self.on_timeout.clone(),
            enable_if: self.enable_if.clone(),
            telemetry: self.telemetry.clone(),
        };

        Timeout {
            shared: Arc::new(shared),
            inner,
        }
    }
}
