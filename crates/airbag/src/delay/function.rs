// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, SystemTime};

use http::header::RETRY_AFTER;
use http::{HeaderMap, HeaderName, Response};

use super::{DelayParser, DelayParserChain};
use crate::Error;

/// Name of the `X-RateLimit-Reset` header.
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// An outcome that may carry headers with delay hints.
pub trait HeaderSource {
    /// Returns the headers to inspect, if any.
    fn header_map(&self) -> Option<&HeaderMap>;
}

impl HeaderSource for HeaderMap {
    fn header_map(&self) -> Option<&HeaderMap> {
        Some(self)
    }
}

impl<B> HeaderSource for Response<B> {
    fn header_map(&self) -> Option<&HeaderMap> {
        Some(self.headers())
    }
}

impl HeaderSource for Error {
    fn header_map(&self) -> Option<&HeaderMap> {
        self.headers()
    }
}

impl<R: HeaderSource> HeaderSource for Result<R, Error> {
    fn header_map(&self) -> Option<&HeaderMap> {
        match self {
            Ok(response) => response.header_map(),
            Err(error) => error.header_map(),
        }
    }
}

/// Reads a delay from every value of one header, in order.
#[derive(Debug, Clone)]
pub struct HeaderDelay {
    header: HeaderName,
    parsers: DelayParserChain,
}

impl HeaderDelay {
    /// Creates a delay function that parses `header` with `parsers`.
    #[must_use]
    pub fn new(header: HeaderName, parsers: DelayParserChain) -> Self {
        Self { header, parsers }
    }

    /// The header this function reads.
    #[must_use]
    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Returns the first value of the header that parses, or `None`.
    #[must_use]
    pub fn compute(&self, headers: &HeaderMap, now: SystemTime) -> Option<Duration> {
        headers.get_all(&self.header).iter().find_map(|value| {
            let parsed = value.to_str().ok().and_then(|raw| self.parsers.parse(raw, now));

            if parsed.is_none() {
                tracing::event!(
                    name: "airbag.delay.ignored",
                    tracing::Level::DEBUG,
                    header = %self.header,
                    value = ?value,
                );
            }

            parsed
        })
    }
}

/// Computes a delay from the headers of an outcome.
///
/// Headers are tried in order and the first one that yields a delay wins. The default list is
/// `Retry-After` followed by `X-RateLimit-Reset`, both read with the default
/// [`DelayParserChain`].
///
/// # Examples
///
/// ```rust
/// use std::time::{Duration, SystemTime};
///
/// use airbag::delay::DelayFunction;
/// use http::{HeaderMap, HeaderName, HeaderValue};
///
/// let function = DelayFunction::new().with_header(HeaderName::from_static("x-backoff"));
///
/// let mut headers = HeaderMap::new();
/// headers.insert("x-backoff", HeaderValue::from_static("3"));
///
/// assert_eq!(function.compute(&headers, SystemTime::now()), Some(Duration::from_secs(3)));
/// ```
#[derive(Debug, Clone)]
pub struct DelayFunction {
    delays: Vec<HeaderDelay>,
}

impl Default for DelayFunction {
    fn default() -> Self {
        Self::new()
            .with_header(RETRY_AFTER)
            .with_header(HeaderName::from_static(X_RATELIMIT_RESET))
    }
}

impl DelayFunction {
    /// Creates a function that reads no header.
    #[must_use]
    pub fn new() -> Self {
        Self { delays: Vec::new() }
    }

    /// Appends `header`, read with the default parser chain.
    #[must_use]
    pub fn with_header(self, header: HeaderName) -> Self {
        self.with_delay(HeaderDelay::new(header, DelayParserChain::default()))
    }

    /// Appends a header delay function.
    #[must_use]
    pub fn with_delay(mut self, delay: HeaderDelay) -> Self {
        self.delays.push(delay);
        self
    }

    /// Computes the delay hinted by `output`, or `None` when it carries no usable hint.
    pub fn compute<O: HeaderSource + ?Sized>(&self, output: &O, now: SystemTime) -> Option<Duration> {
        let headers = output.header_map()?;
        self.delays.iter().find_map(|delay| delay.compute(headers, now))
    }
}
