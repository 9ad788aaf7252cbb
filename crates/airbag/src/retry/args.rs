// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use tick::Clock;

use crate::{Attempt, RecoveryInfo};

/// Arguments for the [`clone_input_with`][super::RetryLayer::clone_input_with] callback.
#[derive(Debug)]
pub struct CloneArgs {
    pub(super) attempt: Attempt,
    pub(super) previous_recovery: Option<RecoveryInfo>,
}

impl CloneArgs {
    /// The attempt the clone is made for.
    #[must_use]
    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// The classification of the previous attempt; `None` for the original call.
    #[must_use]
    pub fn previous_recovery(&self) -> Option<&RecoveryInfo> {
        self.previous_recovery.as_ref()
    }
}

/// Arguments for the [`recovery_with`][super::RetryLayer::recovery_with] callback.
#[derive(Debug)]
pub struct RecoveryArgs<'a> {
    pub(super) attempt: Attempt,
    pub(super) clock: &'a Clock,
}

impl RecoveryArgs<'_> {
    /// The attempt that produced the outcome.
    #[must_use]
    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// The clock of the pipeline.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        self.clock
    }
}

/// Arguments for the [`delay_with`][super::RetryLayer::delay_with] callback.
#[derive(Debug)]
pub struct DelayArgs<'a> {
    pub(super) attempt: Attempt,
    pub(super) clock: &'a Clock,
}

impl DelayArgs<'_> {
    /// The attempt that produced the outcome.
    #[must_use]
    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// The clock of the pipeline. Use it as "now" when interpreting absolute hints.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        self.clock
    }
}

/// Arguments for the [`on_retry`][super::RetryLayer::on_retry] listener.
#[derive(Debug)]
pub struct OnRetryArgs {
    pub(super) attempt: Attempt,
    pub(super) retry_delay: Duration,
    pub(super) elapsed: Duration,
    pub(super) recovery: RecoveryInfo,
}

impl OnRetryArgs {
    /// The attempt that failed.
    #[must_use]
    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// How long the policy waits before the next attempt.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Time spent since the original call started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The classification that triggered the retry.
    #[must_use]
    pub fn recovery(&self) -> &RecoveryInfo {
        &self.recovery
    }
}

/// Arguments for the [`restore_input`][super::RetryLayer::restore_input] callback.
#[derive(Debug)]
pub struct RestoreInputArgs {
    pub(super) attempt: Attempt,
    pub(super) recovery: RecoveryInfo,
}

impl RestoreInputArgs {
    /// The attempt that failed.
    #[must_use]
    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// The classification that triggered the restoration.
    #[must_use]
    pub fn recovery(&self) -> &RecoveryInfo {
        &self.recovery
    }
}
