// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::{BreakDurationArgs, OnCloseArgs, OnHalfOpenArgs, OnOpenArgs, RecoveryArgs, RejectedArgs};
use crate::RecoveryInfo;
use crate::utils::define_fn_wrapper;

define_fn_wrapper!(ShouldRecover<Out>(Fn(out: &Out, args: RecoveryArgs<'_>) -> RecoveryInfo));
define_fn_wrapper!(RejectedOutput<In, Out>(Fn(input: In, args: RejectedArgs) -> Out));
define_fn_wrapper!(BreakDuration<Out>(Fn(out: &Out, args: BreakDurationArgs<'_>) -> Option<Duration>));
define_fn_wrapper!(OnOpen(Fn(args: OnOpenArgs)));
define_fn_wrapper!(OnHalfOpen(Fn(args: OnHalfOpenArgs)));
define_fn_wrapper!(OnClose(Fn(args: OnCloseArgs)));
