// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use http::{HeaderMap, HeaderName, Method};

use crate::{Applies, RequestView};

/// Methods that are safe to repeat: `GET`, `HEAD`, `OPTIONS`, `PUT`, `DELETE` and `TRACE`.
pub const IDEMPOTENT_METHODS: [Method; 6] = [
    Method::GET,
    Method::HEAD,
    Method::OPTIONS,
    Method::PUT,
    Method::DELETE,
    Method::TRACE,
];

const METHOD_OVERRIDE_HEADER: &str = "x-http-method-override";
const IDEMPOTENT_HEADER: &str = "x-idempotent";
const TRUTHY_VALUES: [&str; 3] = ["true", "1", "yes"];

/// Returns `true` if `method` is one of the [`IDEMPOTENT_METHODS`].
#[must_use]
pub fn is_idempotent_method(method: &Method) -> bool {
    IDEMPOTENT_METHODS.contains(method)
}

/// Decides whether a request is safe to retry or duplicate.
///
/// A request is idempotent when any of these holds:
///
/// - its method is one of the [`IDEMPOTENT_METHODS`],
/// - the method override header (`X-HTTP-Method-Override` by default) names such a method,
///   compared case-insensitively,
/// - the flag header (`X-Idempotent` by default) is `true`, `1` or `yes`, compared
///   case-insensitively.
///
/// `POST` and `PATCH` requests without an override are not idempotent. The predicate gates
/// backup requests by default and can gate retries through
/// [`RequestPolicy::when`][crate::RequestPolicy::when].
///
/// # Examples
///
/// ```rust
/// use airbag::IdempotencyPredicate;
/// use http::{HeaderMap, HeaderValue, Method};
///
/// let predicate = IdempotencyPredicate::default();
/// let mut headers = HeaderMap::new();
/// assert!(predicate.is_idempotent(&Method::GET, &headers));
/// assert!(!predicate.is_idempotent(&Method::POST, &headers));
///
/// headers.insert("x-idempotent", HeaderValue::from_static("yes"));
/// assert!(predicate.is_idempotent(&Method::POST, &headers));
/// assert!(!predicate.without_overrides().is_idempotent(&Method::POST, &headers));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyPredicate {
    method_override: Option<HeaderName>,
    flag: Option<HeaderName>,
}

impl Default for IdempotencyPredicate {
    fn default() -> Self {
        Self::new()
    }
}

impl IdempotencyPredicate {
    /// Creates a predicate with the default override headers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            method_override: Some(HeaderName::from_static(METHOD_OVERRIDE_HEADER)),
            flag: Some(HeaderName::from_static(IDEMPOTENT_HEADER)),
        }
    }

    /// Reads the method override from `header` instead of `X-HTTP-Method-Override`.
    #[must_use]
    pub fn with_method_override_header(mut self, header: HeaderName) -> Self {
        self.method_override = Some(header);
        self
    }

    /// Reads the idempotency flag from `header` instead of `X-Idempotent`.
    #[must_use]
    pub fn with_flag_header(mut self, header: HeaderName) -> Self {
        self.flag = Some(header);
        self
    }

    /// Ignores all override headers; only the request method counts.
    #[must_use]
    pub fn without_overrides(mut self) -> Self {
        self.method_override = None;
        self.flag = None;
        self
    }

    /// Returns `true` if a request with `method` and `headers` is safe to repeat.
    #[must_use]
    pub fn is_idempotent(&self, method: &Method, headers: &HeaderMap) -> bool {
        is_idempotent_method(method) || self.has_idempotent_override(headers) || self.has_idempotent_flag(headers)
    }

    fn has_idempotent_override(&self, headers: &HeaderMap) -> bool {
        let Some(name) = &self.method_override else {
            return false;
        };

        headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .any(|value| {
                IDEMPOTENT_METHODS
                    .iter()
                    .any(|method| method.as_str().eq_ignore_ascii_case(value.trim()))
            })
    }

    fn has_idempotent_flag(&self, headers: &HeaderMap) -> bool {
        let Some(name) = &self.flag else {
            return false;
        };

        headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .any(|value| TRUTHY_VALUES.iter().any(|truthy| truthy.eq_ignore_ascii_case(value.trim())))
    }
}

impl<R: RequestView> Applies<R> for IdempotencyPredicate {
    fn applies(&self, input: &R) -> bool {
        self.is_idempotent(input.method(), input.headers())
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use http::{HeaderValue, Request};
    use rstest::rstest;

    use super::*;

    fn request(method: Method, headers: &[(&'static str, &'static str)]) -> Request<()> {
        let mut builder = Request::builder().method(method);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[rstest]
    #[case(Method::GET, true)]
    #[case(Method::HEAD, true)]
    #[case(Method::OPTIONS, true)]
    #[case(Method::PUT, true)]
    #[case(Method::DELETE, true)]
    #[case(Method::TRACE, true)]
    #[case(Method::POST, false)]
    #[case(Method::PATCH, false)]
    #[case(Method::CONNECT, false)]
    fn by_method(#[case] method: Method, #[case] expected: bool) {
        assert_eq!(is_idempotent_method(&method), expected);
        assert_eq!(IdempotencyPredicate::default().applies(&request(method, &[])), expected);
    }

    #[rstest]
    #[case("GET", true)]
    #[case("get", true)]
    #[case(" delete ", true)]
    #[case("PATCH", false)]
    #[case("", false)]
    fn method_override(#[case] value: &'static str, #[case] expected: bool) {
        let post = request(Method::POST, &[("x-http-method-override", value)]);
        assert_eq!(IdempotencyPredicate::default().applies(&post), expected);
    }

    #[rstest]
    #[case("true", true)]
    #[case("TRUE", true)]
    #[case("1", true)]
    #[case("Yes", true)]
    #[case("false", false)]
    #[case("0", false)]
    fn flag_header(#[case] value: &'static str, #[case] expected: bool) {
        let patch = request(Method::PATCH, &[("x-idempotent", value)]);
        assert_eq!(IdempotencyPredicate::default().applies(&patch), expected);
    }

    #[test]
    fn custom_headers() {
        let predicate = IdempotencyPredicate::new()
            .with_method_override_header(HeaderName::from_static("x-original-method"))
            .with_flag_header(HeaderName::from_static("x-allow-backup"));

        assert!(predicate.applies(&request(Method::POST, &[("x-original-method", "HEAD")])));
        assert!(predicate.applies(&request(Method::POST, &[("x-allow-backup", "1")])));
        assert!(!predicate.applies(&request(Method::POST, &[("x-http-method-override", "GET")])));
        assert!(!predicate.applies(&request(Method::POST, &[("x-idempotent", "true")])));
    }

    #[test]
    fn non_utf8_values_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(IDEMPOTENT_HEADER), HeaderValue::from_bytes(&[0xFF]).unwrap());
        assert!(!IdempotencyPredicate::default().is_idempotent(&Method::POST, &headers));
    }

    #[test]
    fn any_of_multiple_values_counts() {
        let post = request(Method::POST, &[("x-idempotent", "no"), ("x-idempotent", "yes")]);
        assert!(IdempotencyPredicate::default().applies(&post));
    }
}
