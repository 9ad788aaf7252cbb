// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use tick::Clock;

/// Arguments for the [`recovery_with`][super::BreakerLayer::recovery_with] callback.
#[derive(Debug)]
#[non_exhaustive]
pub struct RecoveryArgs<'a> {
    pub(crate) clock: &'a Clock,
}

impl RecoveryArgs<'_> {
    /// The clock of the pipeline.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        self.clock
    }
}

/// Arguments for the [`rejected_output`][super::BreakerLayer::rejected_output] callback.
#[derive(Debug)]
#[non_exhaustive]
pub struct RejectedArgs {
    pub(crate) retry_after: Option<Duration>,
}

impl RejectedArgs {
    /// Time left until the circuit starts probing; `None` when it is already probing at capacity.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

/// Arguments for the [`break_duration_with`][super::BreakerLayer::break_duration_with] callback.
#[derive(Debug)]
#[non_exhaustive]
pub struct BreakDurationArgs<'a> {
    pub(crate) clock: &'a Clock,
    pub(crate) default: Duration,
}

impl BreakDurationArgs<'_> {
    /// The clock of the pipeline.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        self.clock
    }

    /// The configured static break duration.
    #[must_use]
    pub fn default_duration(&self) -> Duration {
        self.default
    }
}

/// Arguments for the [`on_open`][super::BreakerLayer::on_open] listener.
#[derive(Debug)]
#[non_exhaustive]
pub struct OnOpenArgs {
    pub(crate) open_for: Duration,
}

impl OnOpenArgs {
    /// How long the circuit stays open before probing.
    #[must_use]
    pub fn open_for(&self) -> Duration {
        self.open_for
    }
}

/// Arguments for the [`on_half_open`][super::BreakerLayer::on_half_open] listener.
#[derive(Debug)]
#[non_exhaustive]
pub struct OnHalfOpenArgs {
    pub(crate) open_duration: Duration,
}

impl OnHalfOpenArgs {
    /// How long the circuit was open.
    #[must_use]
    pub fn open_duration(&self) -> Duration {
        self.open_duration
    }
}

/// Arguments for the [`on_close`][super::BreakerLayer::on_close] listener.
#[derive(Debug)]
#[non_exhaustive]
pub struct OnCloseArgs {
    pub(crate) open_duration: Duration,
}

impl OnCloseArgs {
    /// Time between the circuit opening and closing again.
    #[must_use]
    pub fn open_duration(&self) -> Duration {
        self.open_duration
    }
}
