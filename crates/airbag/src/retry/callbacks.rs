// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::{CloneArgs, DelayArgs, OnRetryArgs, RecoveryArgs, RestoreInputArgs};
use crate::RecoveryInfo;
use crate::utils::define_fn_wrapper;

define_fn_wrapper!(CloneInput<In>(Fn(input: &mut In, args: CloneArgs) -> Option<In>));
define_fn_wrapper!(ShouldRecover<Out>(Fn(out: &Out, args: RecoveryArgs<'_>) -> RecoveryInfo));
define_fn_wrapper!(ComputeDelay<Out>(Fn(out: &Out, args: DelayArgs<'_>) -> Option<Duration>));
define_fn_wrapper!(OnRetry<In, Out>(Fn(input: &In, out: &Out, args: OnRetryArgs)));
define_fn_wrapper!(RestoreInput<In, Out>(Fn(out: &mut Out, args: RestoreInputArgs) -> Option<In>));
