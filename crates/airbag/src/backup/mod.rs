// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Backup request middleware.
//!
//! A backup request trims tail latency: when the primary request has not finished after a
//! delay, [`Backup`] sends a duplicate and returns whichever of the two completes first. The
//! other one is dropped, which cancels it at its next suspension point.
//!
//! Only requests that are safe to send twice are duplicated. The decision is made by
//! [`IdempotencyPredicate::default`][crate::IdempotencyPredicate::default] unless replaced with
//! [`enable_if`][BackupLayer::enable_if] or narrowed with
//! [`RequestPolicy::when`][crate::RequestPolicy::when].
//!
//! # Example
//!
//! ```rust
//! # use std::time::Duration;
//! # use airbag::backup::Backup;
//! # use airbag::{Error, PolicyContext};
//! # use http::{Request, Response};
//! # use layered::{Execute, Layer, Service};
//! # use tick::Clock;
//! # async fn example(clock: Clock) {
//! let context = PolicyContext::<Request<String>, Result<Response<String>, Error>>::new(&clock);
//!
//! let service = Backup::layer("backup", &context)
//!     .clone_input_with(airbag::try_clone_request)
//!     .delay(Duration::from_millis(250))
//!     .layer(Execute::new(|_request: Request<String>| async {
//!         Ok::<_, Error>(Response::new(String::new()))
//!     }));
//!
//! let response = service.execute(Request::new(String::new())).await;
//! # let _ = response;
//! # }
//! ```
//!
//! # Ordering
//!
//! The primary request is always polled before the backup, so when both are ready in the same
//! poll the primary wins. Beyond that, which request completes first is up to the inner service.
//!
//! # Telemetry
//!
//! Launching a backup emits `airbag.backup.launched` (`INFO`). Once a launched race settles,
//! `airbag.backup.settled` (`DEBUG`) records the winning [`Leg`].

mod args;
mod callbacks;
pub(crate) mod constants;
mod layer;
mod service;

pub use args::{Leg, OnBackupArgs};
pub(crate) use callbacks::{BackupDelay, CloneInput, OnBackup};
pub use layer::BackupLayer;
pub use service::Backup;
pub(crate) use service::BackupShared;
