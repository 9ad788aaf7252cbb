// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Delay hints sent by servers.
//!
//! Servers tell clients when to come back through headers such as `Retry-After` or
//! `X-RateLimit-Reset`. The value may be a number of seconds, a Unix timestamp or an HTTP date.
//! This module turns such hints into a [`Duration`][std::time::Duration]:
//!
//! - [`DelayParser`] parses one raw value; [`EpochSecondsParser`], [`HttpDateParser`] and
//!   [`SecondsParser`] cover the three formats.
//! - [`DelayParserChain`] tries parsers in order and keeps the first result.
//! - [`HeaderDelay`] applies a chain to every value of one header.
//! - [`DelayFunction`] tries several headers in order on a response or error.
//!
//! A missing or malformed hint is never an error. It yields `None` and the policy falls back to
//! its configured delay.
//!
//! # Examples
//!
//! ```rust
//! use std::time::{Duration, SystemTime};
//!
//! use airbag::delay::DelayFunction;
//! use http::Response;
//!
//! let response = Response::builder()
//!     .status(503)
//!     .header("retry-after", "7")
//!     .body(())
//!     .unwrap();
//!
//! let delay = DelayFunction::default().compute(&response, SystemTime::now());
//! assert_eq!(delay, Some(Duration::from_secs(7)));
//! ```

mod function;
mod parser;

pub use function::{DelayFunction, HeaderDelay, HeaderSource, X_RATELIMIT_RESET};
pub use parser::{DEFAULT_EPOCH_THRESHOLD, DelayParser, DelayParserChain, EpochSecondsParser, HttpDateParser, SecondsParser};
