// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::OnBackupArgs;
use crate::utils::define_fn_wrapper;

define_fn_wrapper!(CloneInput<In>(Fn(input: &In) -> Option<In>));
define_fn_wrapper!(BackupDelay<In>(Fn(input: &In) -> Duration));
define_fn_wrapper!(OnBackup<In>(Fn(input: &In, args: OnBackupArgs)));
