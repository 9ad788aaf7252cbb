// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Timeout middleware.
//!
//! [`Timeout`] races the inner service against a deadline measured with the pipeline
//! [`Clock`][tick::Clock]. When the deadline passes first, the inner future is dropped at its
//! current suspension point and the output of
//! [`timeout_output`][TimeoutLayer::timeout_output] is returned instead.
//!
//! # Example
//!
//! ```rust
//! # use std::time::Duration;
//! # use airbag::timeout::Timeout;
//! # use airbag::{Error, PolicyContext};
//! # use layered::{Execute, Layer, Service};
//! # use tick::Clock;
//! # async fn example(clock: Clock) {
//! let context = PolicyContext::<String, Result<String, Error>>::new(&clock);
//!
//! let service = Timeout::layer("timeout", &context)
//!     .timeout(Duration::from_secs(10))
//!     .timeout_exceeded()
//!     .timeout_override(|input: &String, args| input.starts_with("batch").then(|| args.default_timeout() * 6))
//!     .layer(Execute::new(|input: String| async move { Ok::<_, Error>(input) }));
//!
//! let result = service.execute("request".to_string()).await;
//! # let _ = result;
//! # }
//! ```
//!
//! Both the deadline and the timeout output are required; the builder does not compile into a
//! layer until they are set.
//!
//! # Telemetry
//!
//! Every exceeded deadline emits `airbag.timeout` (`WARN`) and, with metrics enabled, the
//! `timeout` event.

mod args;
mod callbacks;
mod layer;
mod service;

pub use args::{OnTimeoutArgs, TimeoutOutputArgs, TimeoutOverrideArgs};
pub(crate) use callbacks::{OnTimeout, TimeoutOutput, TimeoutOverride};
pub use layer::TimeoutLayer;
pub use service::Timeout;
pub(crate) use service::TimeoutShared;
