// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Serializable policy configuration.
//!
//! Each options struct mirrors the data part of one layer builder and is applied with the
//! builder's `options` method. Callbacks such as recovery classification or input cloning are
//! code and stay on the builder.
//!
//! Every field has a default, so a partial document deserializes:
//!
//! ```rust
//! use std::time::Duration;
//!
//! use airbag::options::OrchestratorOptions;
//!
//! let options: OrchestratorOptions = serde_json::from_str(
//!     r#"{ "retry": { "max_retries": 5 }, "timeout": { "timeout": { "secs": 10, "nanos": 0 } } }"#,
//! )
//! .unwrap();
//!
//! assert_eq!(options.retry.max_retries, Some(5));
//! assert_eq!(options.timeout.timeout, Some(Duration::from_secs(10)));
//! assert!(options.breaker.enabled);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backup::constants::DEFAULT_BACKUP_DELAY;
use crate::breaker::constants::{
    DEFAULT_BREAK_DURATION, DEFAULT_FAILURE_COUNT, DEFAULT_FAILURE_WINDOW, DEFAULT_SUCCESS_COUNT, DEFAULT_SUCCESS_WINDOW,
};
use crate::retry::constants::{DEFAULT_BACKOFF, DEFAULT_BASE_DELAY, DEFAULT_JITTER, DEFAULT_MAX_RETRIES, DEFAULT_MULTIPLIER};
use crate::retry::{Backoff, Jitter};

/// Options for [`RetryLayer::options`][crate::retry::RetryLayer::options].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct RetryOptions {
    /// Retries after the original call; `None` retries without limit.
    pub max_retries: Option<u32>,
    /// Upper bound of the whole retry sequence.
    pub max_duration: Option<Duration>,
    /// Growth of the delay between retries.
    pub backoff: Backoff,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Cap applied to every computed delay.
    pub max_delay: Option<Duration>,
    /// Growth factor of exponential backoff.
    pub multiplier: f64,
    /// Randomization of computed delays.
    pub jitter: Jitter,
    /// Retry outcomes classified as unavailable.
    pub handle_unavailable: bool,
    /// `false` turns the policy into a pass-through.
    pub enabled: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: Some(DEFAULT_MAX_RETRIES),
            max_duration: None,
            backoff: DEFAULT_BACKOFF,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: None,
            multiplier: DEFAULT_MULTIPLIER,
            jitter: DEFAULT_JITTER,
            handle_unavailable: false,
            enabled: true,
        }
    }
}

/// Options for [`BreakerLayer::options`][crate::breaker::BreakerLayer::options].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct BreakerOptions {
    /// Failures that open the circuit.
    pub failure_count: u32,
    /// Number of recent outcomes the failures are counted in.
    pub failure_window: u32,
    /// Successful probes that close the circuit.
    pub success_count: u32,
    /// Probes allowed at a time while half-open.
    pub success_window: u32,
    /// Time the circuit stays open before probing.
    pub break_duration: Duration,
    /// `false` turns the policy into a pass-through.
    pub enabled: bool,
}

impl Default for BreakerOptions {
    fn default() -> Self {
        Self {
            failure_count: DEFAULT_FAILURE_COUNT,
            failure_window: DEFAULT_FAILURE_WINDOW,
            success_count: DEFAULT_SUCCESS_COUNT,
            success_window: DEFAULT_SUCCESS_WINDOW,
            break_duration: DEFAULT_BREAK_DURATION,
            enabled: true,
        }
    }
}

/// Options for [`BackupLayer::options`][crate::backup::BackupLayer::options].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct BackupOptions {
    /// Head start of the primary request.
    pub delay: Duration,
    /// `false` turns the policy into a pass-through.
    pub enabled: bool,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            delay: DEFAULT_BACKUP_DELAY,
            enabled: true,
        }
    }
}

/// Options for [`TimeoutLayer::options`][crate::timeout::TimeoutLayer::options].
///
/// `timeout` is optional here because the builder requires it anyway; `None` keeps the value
/// already set on the builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct TimeoutOptions {
    /// Deadline of every call.
    pub timeout: Option<Duration>,
    /// `false` turns the policy into a pass-through.
    pub enabled: bool,
}

impl Default for TimeoutOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            enabled: true,
        }
    }
}

/// Options for every policy of an [`Orchestrator`][crate::Orchestrator].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct OrchestratorOptions {
    /// Applied to every retry layer.
    pub retry: RetryOptions,
    /// Circuit breaker options.
    pub breaker: BreakerOptions,
    /// Backup request options.
    pub backup: BackupOptions,
    /// Timeout options.
    pub timeout: TimeoutOptions,
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let options: OrchestratorOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, OrchestratorOptions::default());
        assert_eq!(options.retry.max_retries, Some(3));
        assert_eq!(options.breaker.break_duration, Duration::from_secs(5));
        assert_eq!(options.backup.delay, Duration::from_secs(1));
        assert_eq!(options.timeout.timeout, None);
    }

    #[test]
    fn enums_use_snake_case() {
        let options: RetryOptions =
            serde_json::from_str(r#"{ "backoff": "linear", "jitter": { "factor": 0.5 }, "max_retries": null }"#).unwrap();

        assert_eq!(options.backoff, Backoff::Linear);
        assert_eq!(options.jitter, Jitter::Factor(0.5));
        assert_eq!(options.max_retries, None);

        let json = serde_json::to_value(RetryOptions::default()).unwrap();
        assert_eq!(json["backoff"], "exponential");
        assert_eq!(json["jitter"]["factor"], 0.25);
    }

    #[test]
    fn disabled_policy() {
        let options: BreakerOptions = serde_json::from_str(r#"{ "enabled": false, "failure_count": 2 }"#).unwrap();
        assert!(!options.enabled);
        assert_eq!(options.failure_count, 2);
        assert_eq!(options.failure_window, 10);
    }
}
