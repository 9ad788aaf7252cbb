// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Open after 5 failures among the last 10 calls.
pub(crate) const DEFAULT_FAILURE_COUNT: u32 = 5;
pub(crate) const DEFAULT_FAILURE_WINDOW: u32 = 10;

/// Close after 3 successful probes; up to 3 probes run at a time.
pub(crate) const DEFAULT_SUCCESS_COUNT: u32 = 3;
pub(crate) const DEFAULT_SUCCESS_WINDOW: u32 = 3;

pub(crate) const DEFAULT_BREAK_DURATION: Duration = Duration::from_secs(5);
