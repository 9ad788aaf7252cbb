// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::{Backoff, Jitter};

pub(crate) const DEFAULT_BACKOFF: Backoff = Backoff::Exponential;

pub(crate) const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

pub(crate) const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Delays vary by up to a quarter in either direction.
pub(crate) const DEFAULT_JITTER: Jitter = Jitter::Factor(0.25);

pub(crate) const DEFAULT_MAX_RETRIES: u32 = 3;
