// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// How far in the past an epoch timestamp may lie and still be read as "now".
///
/// Older values are rejected so that a small number of seconds is not mistaken for a timestamp.
pub const DEFAULT_EPOCH_THRESHOLD: Duration = Duration::from_secs(26 * 60 * 60);

/// Parses a raw delay hint.
///
/// Returns `None` when the value is not in the format the parser understands.
pub trait DelayParser: Debug + Send + Sync {
    /// Parses `raw` relative to `now`.
    fn parse(&self, raw: &str, now: SystemTime) -> Option<Duration>;
}

/// Parses Unix timestamps in seconds, as sent in `X-RateLimit-Reset`.
///
/// - a future timestamp yields the time left until it,
/// - a timestamp up to the threshold in the past yields [`Duration::ZERO`],
/// - an older timestamp yields `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochSecondsParser {
    threshold: Duration,
}

impl Default for EpochSecondsParser {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_EPOCH_THRESHOLD,
        }
    }
}

impl EpochSecondsParser {
    /// Sets how far in the past a timestamp is still accepted.
    ///
    /// **Default**: 26 hours
    #[must_use]
    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }
}

impl DelayParser for EpochSecondsParser {
    fn parse(&self, raw: &str, now: SystemTime) -> Option<Duration> {
        let seconds: u64 = raw.trim().parse().ok()?;
        let instant = UNIX_EPOCH.checked_add(Duration::from_secs(seconds))?;

        match instant.duration_since(now) {
            Ok(remaining) => Some(remaining),
            Err(past) if past.duration() <= self.threshold => Some(Duration::ZERO),
            Err(_) => None,
        }
    }
}

/// Parses RFC 1123 dates such as `Wed, 21 Oct 2015 07:28:00 GMT`.
///
/// Dates in the past yield [`Duration::ZERO`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HttpDateParser;

impl DelayParser for HttpDateParser {
    fn parse(&self, raw: &str, now: SystemTime) -> Option<Duration> {
        let date = httpdate::parse_http_date(raw.trim()).ok()?;
        Some(date.duration_since(now).unwrap_or(Duration::ZERO))
    }
}

/// Parses a non-negative integer number of seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecondsParser;

impl DelayParser for SecondsParser {
    fn parse(&self, raw: &str, _now: SystemTime) -> Option<Duration> {
        raw.trim().parse::<u64>().ok().map(Duration::from_secs)
    }
}

/// An ordered list of parsers; the first one that returns a value wins.
///
/// The default chain is [`EpochSecondsParser`], [`HttpDateParser`], [`SecondsParser`].
///
/// ```rust
/// use std::time::{Duration, SystemTime};
///
/// use airbag::delay::{DelayParser, DelayParserChain, SecondsParser};
///
/// let chain = DelayParserChain::new().with_parser(SecondsParser);
/// assert_eq!(chain.parse("3", SystemTime::now()), Some(Duration::from_secs(3)));
/// assert_eq!(chain.parse("soon", SystemTime::now()), None);
/// ```
#[derive(Debug, Clone)]
pub struct DelayParserChain {
    parsers: Vec<Arc<dyn DelayParser>>,
}

impl Default for DelayParserChain {
    fn default() -> Self {
        Self::new()
            .with_parser(EpochSecondsParser::default())
            .with_parser(HttpDateParser)
            .with_parser(SecondsParser)
    }
}

impl DelayParserChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self { parsers: Vec::new() }
    }

    /// Appends a parser with the lowest priority so far.
    #[must_use]
    pub fn with_parser(mut self, parser: impl DelayParser + 'static) -> Self {
        self.parsers.push(Arc::new(parser));
        self
    }

    /// Returns `true` if the chain has no parsers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

impl DelayParser for DelayParserChain {
    fn parse(&self, raw: &str, now: SystemTime) -> Option<Duration> {
        self.parsers.iter().find_map(|parser| parser.parse(raw, now))
    }
}
