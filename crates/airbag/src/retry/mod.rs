// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Retry middleware.
//!
//! [`Retry`] wraps an inner service and calls it again while the outcome is classified as
//! recoverable. [`RetryLayer`] configures it.
//!
//! # Quick start
//!
//! ```rust
//! # use std::time::Duration;
//! # use airbag::retry::Retry;
//! # use airbag::{Error, PolicyContext, RecoveryInfo};
//! # use airbag::delay::DelayFunction;
//! # use http::{Request, Response};
//! # use layered::{Execute, Layer, Service};
//! # use tick::Clock;
//! # async fn example(clock: Clock) {
//! type Out = Result<Response<()>, Error>;
//!
//! let context = PolicyContext::<Request<()>, Out>::new(&clock);
//!
//! let service = Retry::layer("retry", &context)
//!     .clone_input_with(|request, _args| airbag::try_clone_request(request))
//!     .recovery_with(|out: &Out, _args| match out {
//!         Ok(response) if response.status().is_server_error() => RecoveryInfo::retry(),
//!         Ok(_) => RecoveryInfo::never(),
//!         Err(error) => airbag::Recovery::recovery(error),
//!     })
//!     .delay_function(DelayFunction::default())
//!     .max_retries(4)
//!     .max_duration(Duration::from_secs(30))
//!     .layer(Execute::new(|_request: Request<()>| async { Ok::<_, Error>(Response::new(())) }));
//!
//! let response = service.execute(Request::new(())).await;
//! # let _ = response;
//! # }
//! ```
//!
//! # Algorithm
//!
//! For every attempt the input is cloned, the inner service is called and the outcome is
//! classified:
//!
//! - [`RecoveryKind::Retry`][crate::RecoveryKind::Retry] is retried.
//! - [`RecoveryKind::Unavailable`][crate::RecoveryKind::Unavailable] is retried only with
//!   [`handle_unavailable(true)`][RetryLayer::handle_unavailable].
//! - Anything else is returned immediately and unchanged.
//!
//! The delay before the next attempt comes from [`delay_with`][RetryLayer::delay_with] (or
//! [`delay_function`][RetryLayer::delay_function]) when it returns `Some`, and from the backoff
//! strategy otherwise. The sequence stops and the last outcome is returned when the retry budget is
//! spent or when waiting would exceed [`max_duration`][RetryLayer::max_duration].
//!
//! Retry layers nest. An outer layer can retry the exhausted outcome of an inner one, for example
//! an [`Error::ApplicationRequestedRetry`][crate::Error::ApplicationRequestedRetry].
//!
//! # Defaults
//!
//! | Parameter | Default | Configured by |
//! |-----------|---------|---------------|
//! | Max retries | `3` (4 calls) | [`max_retries`][RetryLayer::max_retries], [`infinite_retries`][RetryLayer::infinite_retries] |
//! | Max duration | none | [`max_duration`][RetryLayer::max_duration] |
//! | Backoff | [`Backoff::Exponential`] | [`backoff`][RetryLayer::backoff] |
//! | Base delay | 2 seconds | [`base_delay`][RetryLayer::base_delay] |
//! | Multiplier | `2.0` | [`multiplier`][RetryLayer::multiplier] |
//! | Jitter | [`Jitter::Factor(0.25)`][Jitter::Factor] | [`jitter`][RetryLayer::jitter] |
//! | Max delay | none | [`max_delay`][RetryLayer::max_delay] |
//! | Enabled | always | [`enable_if`][RetryLayer::enable_if], [`RequestPolicy::when`][crate::RequestPolicy::when] |
//!
//! # Telemetry
//!
//! Every scheduled retry emits the `airbag.retry` event (`WARN`) and every exhausted sequence
//! emits `airbag.retry.exhausted`. With metrics enabled, both increment the `resilience.event`
//! counter with the `retry` and `retry_exhausted` event names.

mod args;
mod backoff;
mod callbacks;
pub(crate) mod constants;
mod layer;
mod service;

pub use args::{CloneArgs, DelayArgs, OnRetryArgs, RecoveryArgs, RestoreInputArgs};
pub use backoff::{Backoff, Jitter};
pub(crate) use callbacks::{CloneInput, ComputeDelay, OnRetry, RestoreInput, ShouldRecover};
pub use layer::RetryLayer;
pub(crate) use service::RetryShared;
pub use service::Retry;
