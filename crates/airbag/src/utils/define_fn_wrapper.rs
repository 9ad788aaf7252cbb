// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Generates a cloneable, thread-safe wrapper around a user-supplied closure.
///
/// ```rust,ignore
/// define_fn_wrapper!(ShouldRecover<Out>(Fn(out: &Out, args: RecoveryArgs) -> RecoveryInfo));
/// define_fn_wrapper!(OnOpen(Fn(args: OnOpenArgs)));
/// ```
///
/// The generated type stores an `Arc<dyn Fn(..) + Send + Sync>` and offers `new` and `call`,
/// together with `Clone` and an opaque `Debug`.
macro_rules! define_fn_wrapper {
    ($name:ident $(<$($generic:ident),+>)? (Fn($($arg:ident: $arg_ty:ty),*) $(-> $ret:ty)?)) => {
        pub(crate) struct $name $(<$($generic),+>)? (std::sync::Arc<dyn Fn($($arg_ty),*) $(-> $ret)? + Send + Sync>);

        impl $(<$($generic),+>)? $name $(<$($generic),+>)? {
            pub(crate) fn new(f: impl Fn($($arg_ty),*) $(-> $ret)? + Send + Sync + 'static) -> Self {
                Self(std::sync::Arc::new(f))
            }

            pub(crate) fn call(&self, $($arg: $arg_ty),*) $(-> $ret)? {
                (self.0)($($arg),*)
            }
        }

        impl $(<$($generic),+>)? Clone for $name $(<$($generic),+>)? {
            fn clone(&self) -> Self {
                Self(std::sync::Arc::clone(&self.0))
            }
        }

        impl $(<$($generic),+>)? std::fmt::Debug for $name $(<$($generic),+>)? {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }
    };
}

pub(crate) use define_fn_wrapper;
