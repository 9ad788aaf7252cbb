// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Arguments for the [`on_backup`][super::BackupLayer::on_backup] listener.
#[derive(Debug)]
#[non_exhaustive]
pub struct OnBackupArgs {
    pub(crate) delay: Duration,
}

impl OnBackupArgs {
    /// How long the primary request ran before the backup was launched.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// The request that produced the returned outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Leg {
    /// The original request.
    Primary,
    /// The speculative duplicate.
    Backup,
}

impl Leg {
    /// Stable name used in telemetry.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Backup => "backup",
        }
    }
}
