// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::{OnTimeoutArgs, TimeoutOutputArgs, TimeoutOverrideArgs};
use crate::utils::define_fn_wrapper;

define_fn_wrapper!(TimeoutOutput<Out>(Fn(args: TimeoutOutputArgs) -> Out));
define_fn_wrapper!(OnTimeout<Out>(Fn(out: &Out, args: OnTimeoutArgs)));
define_fn_wrapper!(TimeoutOverride<In>(Fn(input: &In, args: TimeoutOverrideArgs) -> Option<Duration>));
