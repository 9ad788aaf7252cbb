// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(missing_docs, reason = "This is a test module")]

use airbag::{
    Always, Applies, AppliesExt, IDEMPOTENT_METHODS, IdempotencyPredicate, Never, RequestView, is_idempotent_method,
};
use http::{HeaderName, Method, Request};
use rstest::rstest;

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
fn methods(#[case] method: Method, #[case] expected: bool) {
    assert_eq!(is_idempotent_method(&method), expected);
    assert_eq!(IdempotencyPredicate::default().applies(&request(method, &[])), expected);
}

#[test]
fn idempotent_methods_are_listed() {
    assert_eq!(IDEMPOTENT_METHODS.len(), 6);
    assert!(IDEMPOTENT_METHODS.iter().all(is_idempotent_method));
}

#[rstest]
#[case::override_get(&[("x-http-method-override", "GET")], true)]
#[case::override_lowercase(&[("x-http-method-override", "put")], true)]
#[case::override_post(&[("x-http-method-override", "POST")], false)]
#[case::flag_true(&[("x-idempotent", "true")], true)]
#[case::flag_one(&[("x-idempotent", "1")], true)]
#[case::flag_yes(&[("x-idempotent", "YES")], true)]
#[case::flag_false(&[("x-idempotent", "false")], false)]
#[case::no_headers(&[], false)]
fn post_overrides(#[case] headers: &[(&'static str, &'static str)], #[case] expected: bool) {
    let predicate = IdempotencyPredicate::default();
    assert_eq!(predicate.applies(&request(Method::POST, headers)), expected);
}

#[test]
fn overrides_can_be_disabled_or_renamed() {
    let flagged = request(Method::POST, &[("x-idempotent", "true"), ("x-safe", "true")]);

    assert!(!IdempotencyPredicate::default().without_overrides().applies(&flagged));
    assert!(
        IdempotencyPredicate::default()
            .without_overrides()
            .with_flag_header(HeaderName::from_static("x-safe"))
            .applies(&flagged)
    );

    let overridden = request(Method::POST, &[("x-method", "GET")]);
    assert!(
        IdempotencyPredicate::new()
            .with_method_override_header(HeaderName::from_static("x-method"))
            .applies(&overridden)
    );
}

#[test]
fn works_on_request_parts() {
    let (parts, ()) = request(Method::DELETE, &[]).into_parts();

    assert_eq!(parts.method(), &Method::DELETE);
    assert!(IdempotencyPredicate::default().applies(&parts));
}

#[test]
fn predicates_compose() {
    let get = request(Method::GET, &[]);
    let post = request(Method::POST, &[]);

    let idempotent_and_short =
        IdempotencyPredicate::default().and(|request: &Request<()>| request.uri().path().len() < 10);
    assert!(idempotent_and_short.applies(&get));
    assert!(!idempotent_and_short.applies(&post));

    assert!(Always.applies(&post));
    assert!(!Never.applies(&get));
    assert!(!Always.and(Never).applies(&get));
}
