// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Arguments for the [`on_timeout`][super::TimeoutLayer::on_timeout] listener.
#[derive(Debug)]
#[non_exhaustive]
pub struct OnTimeoutArgs {
    pub(crate) timeout: Duration,
}

impl OnTimeoutArgs {
    /// The deadline that was exceeded.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Arguments for the [`timeout_override`][super::TimeoutLayer::timeout_override] callback.
#[derive(Debug)]
#[non_exhaustive]
pub struct TimeoutOverrideArgs {
    pub(crate) default_timeout: Duration,
}

impl TimeoutOverrideArgs {
    /// The deadline configured with [`timeout`][super::TimeoutLayer::timeout].
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}

/// Arguments for the [`timeout_output`][super::TimeoutLayer::timeout_output] callback.
#[derive(Debug)]
#[non_exhaustive]
pub struct TimeoutOutputArgs {
    pub(crate) timeout: Duration,
}

impl TimeoutOutputArgs {
    /// The deadline that was exceeded.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let second = Duration::from_secs(1);

        assert_eq!(OnTimeoutArgs { timeout: second }.timeout(), second);
        assert_eq!(TimeoutOverrideArgs { default_timeout: second }.default_timeout(), second);
        assert_eq!(TimeoutOutputArgs { timeout: second }.timeout(), second);
    }
}
