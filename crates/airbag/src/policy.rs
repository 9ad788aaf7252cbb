// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// A predicate that decides whether a policy applies to an input.
///
/// Implemented for closures `Fn(&In) -> bool`, for [`Always`], [`Never`], [`Conditional`] and
/// [`IdempotencyPredicate`][crate::IdempotencyPredicate].
///
/// # Examples
///
/// ```rust
/// use airbag::{Always, Applies, AppliesExt};
///
/// let small = |value: &u32| *value < 10;
/// let combined = Always.and(small);
///
/// assert!(combined.applies(&3));
/// assert!(!combined.applies(&30));
/// ```
pub trait Applies<In>: Send + Sync + 'static {
    /// Returns `true` when the policy should handle `input`.
    fn applies(&self, input: &In) -> bool;
}

impl<In, F> Applies<In> for F
where
    F: Fn(&In) -> bool + Send + Sync + 'static,
{
    fn applies(&self, input: &In) -> bool {
        self(input)
    }
}

/// A predicate that always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Always;

impl<In> Applies<In> for Always {
    fn applies(&self, _input: &In) -> bool {
        true
    }
}

/// A predicate that never holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Never;

impl<In> Applies<In> for Never {
    fn applies(&self, _input: &In) -> bool {
        false
    }
}

/// The logical AND of two predicates, created by [`AppliesExt::and`].
///
/// The second predicate is evaluated only when the first one holds.
#[derive(Debug, Clone, Copy)]
pub struct Conditional<A, B> {
    first: A,
    second: B,
}

impl<In, A, B> Applies<In> for Conditional<A, B>
where
    A: Applies<In>,
    B: Applies<In>,
{
    fn applies(&self, input: &In) -> bool {
        self.first.applies(input) && self.second.applies(input)
    }
}

/// Combinators for [`Applies`] predicates.
///
/// The trait does not name an input type, so predicates that hold for every input, such as
/// [`Always`] and [`Never`], combine without annotations. The input type is fixed where the
/// combined predicate is evaluated.
pub trait AppliesExt: Sized + Send + Sync + 'static {
    /// Returns a predicate that holds when both `self` and `other` hold.
    fn and<B>(self, other: B) -> Conditional<Self, B> {
        Conditional { first: self, second: other }
    }
}

impl<A: Send + Sync + 'static> AppliesExt for A {}

/// A policy that is applied to a request only when its predicate holds.
///
/// Every policy layer implements this trait. A policy whose predicate does not hold passes the
/// request straight to the inner service; this is never a failure.
///
/// # Examples
///
/// ```rust
/// use airbag::retry::Retry;
/// use airbag::{Error, IdempotencyPredicate, PolicyContext, RecoveryInfo, RequestPolicy};
/// use http::{Method, Request, Response};
/// use tick::Clock;
///
/// let context = PolicyContext::<Request<()>, Result<Response<()>, Error>>::new(Clock::new_frozen());
/// let layer = Retry::layer("retry", &context)
///     .clone_input_with(|request, _| airbag::try_clone_request(request))
///     .recovery_with(|_, _| RecoveryInfo::never())
///     .when(IdempotencyPredicate::default());
///
/// let post = Request::builder().method(Method::POST).body(()).unwrap();
/// assert!(!layer.applies(&post));
/// assert!(layer.applies(&Request::new(())));
/// ```
pub trait RequestPolicy<In> {
    /// Returns `true` when the policy handles `input`.
    fn applies(&self, input: &In) -> bool;

    /// Narrows the policy to inputs for which both the current predicate and `predicate` hold.
    #[must_use]
    fn when(self, predicate: impl Applies<In>) -> Self
    where
        Self: Sized;
}
