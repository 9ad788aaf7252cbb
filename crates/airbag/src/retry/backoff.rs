// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cmp::min;
use std::time::Duration;

use super::constants::{DEFAULT_BACKOFF, DEFAULT_BASE_DELAY, DEFAULT_JITTER, DEFAULT_MULTIPLIER};
use crate::rnd::Rnd;

/// How the delay between retries grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Backoff {
    /// The same delay before every retry.
    ///
    /// **Example with `2s` base delay:** `2s, 2s, 2s, ...`
    Constant,

    /// The delay grows with the retry number.
    ///
    /// **Example with `2s` base delay:** `2s, 4s, 6s, 8s, ...`
    Linear,

    /// The delay is multiplied by the multiplier after every retry.
    ///
    /// **Example with `2s` base delay and multiplier `2`:** `2s, 4s, 8s, 16s, ...`
    Exponential,
}

/// Randomization applied to each computed delay.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Jitter {
    /// Delays are used as computed.
    None,

    /// A uniform offset in `[-d, +d]` is added to the delay.
    Duration(Duration),

    /// A uniform offset in `[-f * delay, +f * delay]` is added to the delay. `f` is clamped to `[0, 1]`.
    Factor(f64),
}

#[derive(Debug, Clone)]
pub(crate) struct BackoffOptions {
    pub(crate) backoff_type: Backoff,
    pub(crate) base_delay: Duration,
    pub(crate) max_delay: Option<Duration>,
    pub(crate) multiplier: f64,
    pub(crate) jitter: Jitter,
    pub(crate) rnd: Rnd,
}

impl Default for BackoffOptions {
    fn default() -> Self {
        Self {
            backoff_type: DEFAULT_BACKOFF,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: None,
            multiplier: DEFAULT_MULTIPLIER,
            jitter: DEFAULT_JITTER,
            rnd: Rnd::default(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct DelayBackoff(pub(super) BackoffOptions);

impl From<BackoffOptions> for DelayBackoff {
    fn from(options: BackoffOptions) -> Self {
        Self(options)
    }
}

impl DelayBackoff {
    pub(crate) fn delays(&self) -> impl Iterator<Item = Duration> {
        DelaysIter {
            options: self.0.clone(),
            retry: 0,
        }
    }
}

#[derive(Debug)]
struct DelaysIter {
    options: BackoffOptions,
    retry: u32,
}

impl Iterator for DelaysIter {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        // zero base delay => always zero
        if self.options.base_delay.is_zero() {
            return Some(Duration::ZERO);
        }

        let base = self.options.base_delay;
        let delay = match self.options.backoff_type {
            Backoff::Constant => base,
            Backoff::Linear => base.saturating_mul(self.retry.saturating_add(1)),
            Backoff::Exponential => duration_mul_pow(base, self.options.multiplier, self.retry),
        };

        self.retry = self.retry.saturating_add(1);

        let delay = apply_jitter(delay, self.options.jitter, &self.options.rnd);
        Some(clamp_to_max(delay, self.options.max_delay))
    }
}

fn clamp_to_max(delay: Duration, max: Option<Duration>) -> Duration {
    max.map_or(delay, |max| min(delay, max))
}

fn duration_mul_pow(base: Duration, multiplier: f64, retry: u32) -> Duration {
    let factor = multiplier.powi(i32::try_from(retry).unwrap_or(i32::MAX));
    secs_to_duration_saturating(base.as_secs_f64() * factor)
}

/// Adds a uniform offset in `[-amplitude, +amplitude]` to `delay`, clamping at zero.
fn apply_jitter(delay: Duration, jitter: Jitter, rnd: &Rnd) -> Duration {
    let amplitude = match jitter {
        Jitter::None => return delay,
        Jitter::Duration(amplitude) => amplitude.as_secs_f64(),
        Jitter::Factor(factor) => delay.as_secs_f64() * factor.clamp(0.0, 1.0),
    };

    let offset = amplitude * 2.0f64.mul_add(rnd.next_f64(), -1.0);
    secs_to_duration_saturating(delay.as_secs_f64() + offset)
}

pub(crate) fn secs_to_duration_saturating(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }

    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
