// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tick::Clock;

use super::constants::DEFAULT_BACKUP_DELAY;
use super::{Backup, BackupDelay, BackupShared, CloneInput, OnBackup, OnBackupArgs};
use crate::utils::{EnableIf, TelemetryHelper};
use crate::{Applies, IdempotencyPredicate, Layer, NotSet, PolicyContext, RequestPolicy, RequestView, Set};

/// Builder for the [`Backup`] middleware.
///
/// Created by [`Backup::layer`]. The layer needs a way to duplicate the input, set with
/// [`clone_input_with`][BackupLayer::clone_input_with] or [`clone_input`][BackupLayer::clone_input],
/// before it can wrap a service.
///
/// By default only idempotent requests, as decided by [`IdempotencyPredicate::default`], are
/// duplicated. [`enable_if`][BackupLayer::enable_if] replaces that decision.
#[derive(Debug)]
pub struct BackupLayer<In, Out, CloneState = Set> {
    clock: Clock,
    delay: Duration,
    delay_fn: Option<BackupDelay<In>>,
    clone_input: Option<CloneInput<In>>,
    on_backup: Option<OnBackup<In>>,
    enable_if: EnableIf<In>,
    telemetry: TelemetryHelper,
    _state: PhantomData<fn(In, CloneState) -> Out>,
}

impl<In: RequestView, Out> BackupLayer<In, Out, NotSet> {
    pub(crate) fn new(name: Cow<'static, str>, context: &PolicyContext<In, Out>) -> Self {
        Self {
            clock: context.clock().clone(),
            delay: DEFAULT_BACKUP_DELAY,
            delay_fn: None,
            clone_input: None,
            on_backup: None,
            enable_if: EnableIf::from_applies(IdempotencyPredicate::default()),
            telemetry: context.create_telemetry(name),
            _state: PhantomData,
        }
    }
}

impl<In, Out, CloneState> BackupLayer<In, Out, CloneState> {
    /// Duplicates the input for the backup request. Returning `None` runs the primary alone.
    #[must_use]
    pub fn clone_input_with(mut self, clone_fn: impl Fn(&In) -> Option<In> + Send + Sync + 'static) -> BackupLayer<In, Out, Set> {
        self.clone_input = Some(CloneInput::new(clone_fn));
        self.into_state::<Set>()
    }

    /// Duplicates the input with [`Clone`].
    #[must_use]
    pub fn clone_input(self) -> BackupLayer<In, Out, Set>
    where
        In: Clone,
    {
        self.clone_input_with(|input| Some(input.clone()))
    }

    /// How long the primary request may run before the backup is launched.
    ///
    /// **Default**: 1 second
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Computes the launch delay per input. Replaces [`delay`][BackupLayer::delay].
    #[must_use]
    pub fn delay_with(mut self, delay_fn: impl Fn(&In) -> Duration + Send + Sync + 'static) -> Self {
        self.delay_fn = Some(BackupDelay::new(delay_fn));
        self
    }

    /// Registers a listener invoked right before the backup request starts.
    #[must_use]
    pub fn on_backup(mut self, backup_fn: impl Fn(&In, OnBackupArgs) + Send + Sync + 'static) -> Self {
        self.on_backup = Some(OnBackup::new(backup_fn));
        self
    }

    /// Launches backups only for inputs for which `is_enabled` returns `true`.
    ///
    /// This replaces the idempotency check; make sure the predicate only admits requests that
    /// are safe to send twice.
    #[must_use]
    pub fn enable_if(mut self, is_enabled: impl Fn(&In) -> bool + Send + Sync + 'static) -> Self {
        self.enable_if = EnableIf::new(is_enabled);
        self
    }

    /// Never launches a backup.
    #[must_use]
    pub fn disable(mut self) -> Self {
        self.enable_if = EnableIf::never();
        self
    }

    /// Applies serializable options on top of the current configuration.
    #[cfg(feature = "serde")]
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    #[must_use]
    pub fn options(self, options: &crate::options::BackupOptions) -> Self {
        let layer = self.delay(options.delay);
        if options.enabled { layer } else { layer.disable() }
    }

    fn into_state<C>(self) -> BackupLayer<In, Out, C> {
        BackupLayer {
            clock: self.clock,
            delay: self.delay,
            delay_fn: self.delay_fn,
            clone_input: self.clone_input,
            on_backup: self.on_backup,
            enable_if: self.enable_if,
            telemetry: self.telemetry,
            _state: PhantomData,
        }
    }
}

impl<In: 'static, Out, CloneState> RequestPolicy<In> for BackupLayer<In, Out, CloneState> {
    fn applies(&self, input: &In) -> bool {
        self.enable_if.call(input)
    }

    fn when(mut self, predicate: impl Applies<In>) -> Self {
        self.enable_if = self.enable_if.and(predicate);
        self
    }
}

impl<In, Out, S> Layer<S> for BackupLayer<In, Out, Set> {
    type Service = Backup<In, Out, S>;

    fn layer(&self, inner: S) -> Self::Service {
        let shared = BackupShared {
            clock: self.clock.clone(),
            delay: self.delay,
            delay_fn: self.delay_fn.clone(),
            clone_input: self.clone_input.clone().expect("clone_input must be set in Ready state"),
            on_backup: self.on_backup.clone(),
            enable_if: self.enable_if.clone(),
            telemetry: self.telemetry.clone(),
        };

        Backup {
            shared: Arc::new(shared),
            inner,
            _out: PhantomData,
        }
    }
}
