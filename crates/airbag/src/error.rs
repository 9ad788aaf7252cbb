// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::time::Duration;

use http::HeaderMap;

use crate::{Recovery, RecoveryInfo};

/// A boxed error that can cross threads.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure outcome of a request executed through `airbag` policies.
///
/// Each variant classifies itself through [`Recovery`], so a retry layer configured with
/// `recovery_with(|out, _| ...)` can delegate the error case to [`Recovery::recovery`].
///
/// | Variant | Recovery |
/// |---------|----------|
/// | [`TransientNetworkFault`][Error::TransientNetworkFault] | `retry` |
/// | [`ApplicationRequestedRetry`][Error::ApplicationRequestedRetry] | `retry` |
/// | [`CircuitOpen`][Error::CircuitOpen] | `unavailable` |
/// | [`TimeoutExceeded`][Error::TimeoutExceeded] | `retry` |
/// | [`NonRetryableFailure`][Error::NonRetryableFailure] | `never` |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The transport failed in a way that is expected to be temporary, such as a reset connection.
    #[error("transient network fault")]
    TransientNetworkFault {
        /// The underlying transport error.
        #[source]
        source: BoxError,
    },

    /// Response handling asked for the request to be repeated.
    ///
    /// The headers of the response, when attached, serve as delay hints
    /// (for example `Retry-After`).
    #[error("retry requested: {reason}")]
    ApplicationRequestedRetry {
        /// Human readable reason.
        reason: Cow<'static, str>,
        /// Response headers carrying delay hints.
        headers: Option<HeaderMap>,
    },

    /// The circuit breaker rejected the request without calling the inner service.
    #[error("circuit is open")]
    CircuitOpen {
        /// How long the circuit is expected to stay open, if known.
        retry_after: Option<Duration>,
    },

    /// The request did not complete before its deadline.
    #[error("request timed out after {timeout:?}")]
    TimeoutExceeded {
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// A failure that repeating the request cannot fix.
    #[error("non-retryable failure")]
    NonRetryableFailure {
        /// The underlying error.
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Wraps a temporary transport failure.
    pub fn transient(source: impl Into<BoxError>) -> Self {
        Self::TransientNetworkFault { source: source.into() }
    }

    /// Wraps a permanent failure.
    pub fn non_retryable(source: impl Into<BoxError>) -> Self {
        Self::NonRetryableFailure { source: source.into() }
    }

    /// Signals that the request should be repeated.
    pub fn retry_requested(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::ApplicationRequestedRetry {
            reason: reason.into(),
            headers: None,
        }
    }

    /// Creates the rejection error of an open circuit.
    #[must_use]
    pub fn circuit_open(retry_after: Option<Duration>) -> Self {
        Self::CircuitOpen { retry_after }
    }

    /// Creates the error reported when a deadline is hit.
    #[must_use]
    pub fn timeout(timeout: Duration) -> Self {
        Self::TimeoutExceeded { timeout }
    }

    /// Attaches delay hint headers to an [`ApplicationRequestedRetry`][Error::ApplicationRequestedRetry] error.
    ///
    /// Other variants are returned unchanged.
    #[must_use]
    pub fn with_headers(self, headers: HeaderMap) -> Self {
        match self {
            Self::ApplicationRequestedRetry { reason, .. } => Self::ApplicationRequestedRetry {
                reason,
                headers: Some(headers),
            },
            other => other,
        }
    }

    /// Returns the delay hint headers, if any.
    #[must_use]
    pub fn headers(&self) -> Option<&HeaderMap> {
        match self {
            Self::ApplicationRequestedRetry { headers, .. } => headers.as_ref(),
            _ => None,
        }
    }

    /// Returns `true` for [`CircuitOpen`][Error::CircuitOpen].
    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Returns `true` for [`TimeoutExceeded`][Error::TimeoutExceeded].
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimeoutExceeded { .. })
    }
}

impl Recovery for Error {
    fn recovery(&self) -> RecoveryInfo {
        match self {
            Self::TransientNetworkFault { .. } | Self::ApplicationRequestedRetry { .. } | Self::TimeoutExceeded { .. } => {
                RecoveryInfo::retry()
            }
            Self::CircuitOpen { .. } => RecoveryInfo::unavailable(),
            Self::NonRetryableFailure { .. } => RecoveryInfo::never(),
        }
    }
}
