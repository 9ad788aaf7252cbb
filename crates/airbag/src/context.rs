// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::marker::PhantomData;

use tick::Clock;

use crate::utils::TelemetryHelper;

pub(crate) const DEFAULT_PIPELINE_NAME: &str = "default";

/// Shared dependencies and telemetry configuration for a set of policies.
///
/// Pass the same `PolicyContext` to every policy layer that wraps one service. The context
/// carries the [`Clock`] that drives every delay (retry backoff, backup delay, timeout deadline,
/// circuit break duration), so tests can substitute a controlled clock.
///
/// The `In` and `Out` parameters pin the request and outcome types of the pipeline, which lets
/// the layer builders infer closure argument types.
#[derive(Debug)]
pub struct PolicyContext<In, Out> {
    clock: Clock,
    name: Cow<'static, str>,
    #[cfg(feature = "metrics")]
    meter: Option<opentelemetry::metrics::Meter>,
    logs_enabled: bool,
    _in: PhantomData<fn() -> In>,
    _out: PhantomData<fn() -> Out>,
}

impl<In, Out> PolicyContext<In, Out> {
    /// Creates a context that uses `clock`, named `"default"`.
    pub fn new(clock: impl AsRef<Clock>) -> Self {
        Self {
            clock: clock.as_ref().clone(),
            name: Cow::Borrowed(DEFAULT_PIPELINE_NAME),
            #[cfg(feature = "metrics")]
            meter: None,
            logs_enabled: false,
            _in: PhantomData,
            _out: PhantomData,
        }
    }

    /// Sets the pipeline name reported with every event. Prefer `snake_case`.
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Emits a `tracing` event for every resilience event raised by policies built from this context.
    #[must_use]
    pub fn enable_logs(mut self) -> Self {
        self.logs_enabled = true;
        self
    }

    /// Reports resilience events to the `resilience.event` counter of the given meter provider.
    #[must_use]
    #[cfg(feature = "metrics")]
    pub fn enable_metrics(mut self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        self.meter = Some(crate::telemetry::metrics::create_meter(provider));
        self
    }

    pub(crate) fn clock(&self) -> &Clock {
        &self.clock
    }

    pub(crate) fn pipeline_name(&self) -> &str {
        &self.name
    }

    pub(crate) fn create_telemetry(&self, strategy_name: Cow<'static, str>) -> TelemetryHelper {
        TelemetryHelper {
            pipeline_name: self.name.clone(),
            strategy_name,
            #[cfg(feature = "metrics")]
            event_reporter: self.meter.as_ref().map(crate::telemetry::metrics::create_resilience_event_counter),
            logs_enabled: self.logs_enabled,
        }
    }
}

impl<In, Out> Clone for PolicyContext<In, Out> {
    fn clone(&self) -> Self {
        Self {
            clock: self.clock.clone(),
            name: self.name.clone(),
            #[cfg(feature = "metrics")]
            meter: self.meter.clone(),
            logs_enabled: self.logs_enabled,
            _in: PhantomData,
            _out: PhantomData,
        }
    }
}
