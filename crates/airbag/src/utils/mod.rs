// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod define_fn_wrapper;
pub(crate) use define_fn_wrapper::define_fn_wrapper;

mod telemetry_helper;
pub(crate) use telemetry_helper::TelemetryHelper;

use crate::Applies;

define_fn_wrapper!(EnableIf<In>(Fn(input: &In) -> bool));

impl<In> EnableIf<In> {
    pub(crate) fn always() -> Self {
        Self::new(|_| true)
    }

    pub(crate) fn never() -> Self {
        Self::new(|_| false)
    }

    pub(crate) fn from_applies(predicate: impl Applies<In>) -> Self {
        Self::new(move |input| predicate.applies(input))
    }

    /// Returns a predicate that holds only when both `self` and `other` hold.
    pub(crate) fn and(self, other: impl Applies<In>) -> Self
    where
        In: 'static,
    {
        Self::new(move |input| self.call(input) && other.applies(input))
    }
}

/// Runs a user listener, containing any panic it raises.
///
/// Listeners observe resilience events and must never change the outcome of a request, so a
/// panicking listener is logged and otherwise ignored.
pub(crate) fn invoke_listener(telemetry: &TelemetryHelper, listener: &'static str, f: impl FnOnce()) {
    if std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).is_err() {
        tracing::event!(
            name: "airbag.listener.panicked",
            tracing::Level::ERROR,
            pipeline.name = %telemetry.pipeline_name,
            strategy.name = %telemetry.strategy_name,
            listener = listener,
        );
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_if_debug() {
        let enable_if: EnableIf<String> = EnableIf::always();
        assert_eq!(format!("{enable_if:?}"), "EnableIf { .. }");
    }

    #[test]
    fn enable_if_and_combines() {
        let enable_if: EnableIf<u32> = EnableIf::new(|value| *value > 1).and(|value: &u32| *value < 10);
        assert!(enable_if.call(&5));
        assert!(!enable_if.call(&1));
        assert!(!enable_if.call(&10));
        assert!(!EnableIf::<u32>::never().call(&5));
        assert!(EnableIf::from_applies(crate::Always).call(&0_u32));
    }

    #[test]
    fn invoke_listener_contains_panic() {
        let telemetry = TelemetryHelper::for_tests("listener");
        invoke_listener(&telemetry, "on_test", || panic!("listener failure"));

        let mut called = false;
        invoke_listener(&telemetry, "on_test", || called = true);
        assert!(called);
    }
}
