// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

pub(crate) const DEFAULT_BACKUP_DELAY: Duration = Duration::from_secs(1);
