// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Resilience policy orchestration for HTTP request execution.
//!
//! `airbag` wraps an asynchronous request-execution primitive, any [`Service`] that turns a request
//! into a `Result<Response, Error>`, with composable fault-tolerance policies:
//!
//! - [`retry`]: repeated execution with server-directed or computed backoff.
//! - [`breaker`]: a circuit breaker that fails fast while a dependency is unhealthy.
//! - [`timeout`]: a hard deadline on execution.
//! - [`backup`]: a speculative duplicate request that races the original after a delay.
//!
//! Each policy is a [`Layer`] built from a shared [`PolicyContext`] that carries the
//! [`Clock`][tick::Clock] used for every delay and the telemetry configuration. The
//! [`Orchestrator`] composes the policies around one service in a fixed order:
//!
//! ```text
//! circuit breaker -> timeout -> backup request -> retry... -> service
//! ```
//!
//! # Delay hints
//!
//! Servers tell clients how long to wait with headers such as `Retry-After` or
//! `X-RateLimit-Reset`. The [`delay`] module parses these hints (epoch seconds, HTTP dates and
//! plain seconds) and feeds them to retry and circuit breaker policies. A malformed hint is never
//! an error; the policy falls back to its configured delay.
//!
//! # Idempotency
//!
//! Only requests that are safe to repeat are duplicated by the backup policy. The
//! [`IdempotencyPredicate`] makes that decision from the request method and optional override
//! headers, and can gate retries as well through [`RequestPolicy::when`].
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use airbag::retry::Retry;
//! use airbag::timeout::Timeout;
//! use airbag::{Error, Orchestrator, PolicyContext, RecoveryInfo};
//! use http::{Request, Response};
//! use layered::{Execute, Service};
//! use tick::Clock;
//!
//! # async fn example(clock: Clock) {
//! type Out = Result<Response<String>, Error>;
//!
//! let context = PolicyContext::<Request<String>, Out>::new(&clock).name("catalog_client");
//!
//! let orchestrator = Orchestrator::builder(&context)
//!     .timeout(
//!         Timeout::layer("timeout", &context)
//!             .timeout(Duration::from_secs(10))
//!             .timeout_error(|args| Error::timeout(args.timeout())),
//!     )
//!     .retry(
//!         Retry::layer("retry", &context)
//!             .clone_input_with(|request, _args| airbag::try_clone_request(request))
//!             .recovery_with(|out: &Out, _args| match out {
//!                 Ok(_) => RecoveryInfo::never(),
//!                 Err(error) => airbag::Recovery::recovery(error),
//!             }),
//!     )
//!     .build(Execute::new(|_request: Request<String>| async move {
//!         Ok::<_, Error>(Response::new("done".to_string()))
//!     }));
//!
//! let response = orchestrator.execute(Request::new(String::new())).await;
//! # let _ = response;
//! # }
//! ```

#[doc(inline)]
pub use recoverable::{Recovery, RecoveryInfo, RecoveryKind};

#[doc(inline)]
pub use layered::{Layer, Service};

mod attempt;
pub use attempt::Attempt;

mod context;
pub use context::PolicyContext;

mod error;
pub use error::{BoxError, Error};

mod request;
pub use request::{RequestView, try_clone_request};

mod idempotency;
pub use idempotency::{IDEMPOTENT_METHODS, IdempotencyPredicate, is_idempotent_method};

mod policy;
pub use policy::{Always, Applies, AppliesExt, Conditional, Never, RequestPolicy};

pub mod delay;

pub mod backup;
pub mod breaker;
pub mod retry;
pub mod timeout;

mod orchestrator;
pub use orchestrator::{Orchestrator, OrchestratorBuilder};

#[cfg(feature = "serde")]
pub mod options;

pub mod telemetry;

mod rnd;
mod type_state;
pub use type_state::{NotSet, Set};

mod utils;

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
pub(crate) mod testing;
