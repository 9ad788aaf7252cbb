// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use http::{HeaderMap, Method, Request};

/// Read-only access to the parts of a request that policies inspect.
///
/// Policies never mutate the request; they only look at its method and headers to decide
/// whether they apply.
pub trait RequestView {
    /// The request method.
    fn method(&self) -> &Method;

    /// The request headers.
    fn headers(&self) -> &HeaderMap;
}

impl<B> RequestView for Request<B> {
    fn method(&self) -> &Method {
        Request::method(self)
    }

    fn headers(&self) -> &HeaderMap {
        Request::headers(self)
    }
}

impl RequestView for http::request::Parts {
    fn method(&self) -> &Method {
        &self.method
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Clones an [`http::Request`] whose body is cloneable.
///
/// Method, URI, version, headers and body are copied. Extensions are not, because they are not
/// required to be cloneable. Returns `None` if the request cannot be rebuilt.
///
/// Use it as the clone function of the retry and backup policies:
///
/// ```rust
/// # use airbag::{Error, PolicyContext, RecoveryInfo};
/// # use airbag::retry::Retry;
/// # use http::{Request, Response};
/// # use tick::Clock;
/// # let context = PolicyContext::<Request<String>, Result<Response<String>, Error>>::new(Clock::new_frozen());
/// let layer = Retry::layer("retry", &context)
///     .clone_input_with(|request, _args| airbag::try_clone_request(request))
///     .recovery_with(|_, _| RecoveryInfo::never());
/// # let _ = layer;
/// ```
#[must_use]
pub fn try_clone_request<B: Clone>(request: &Request<B>) -> Option<Request<B>> {
    let mut builder = Request::builder()
        .method(request.method().clone())
        .uri(request.uri().clone())
        .version(request.version());

    builder.headers_mut()?.clone_from(request.headers());
    builder.body(request.body().clone()).ok()
}
