// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::marker::PhantomData;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{Either, select};
use layered::Service;
use tick::Clock;

use super::{BackupDelay, CloneInput, Leg, OnBackup, OnBackupArgs};
use crate::utils::{EnableIf, TelemetryHelper, invoke_listener};
use crate::{NotSet, PolicyContext, RequestView};

/// Sends a duplicate of a slow request and returns whichever finishes first.
///
/// The primary request gets a head start of [`delay`][super::BackupLayer::delay]. If it is still
/// running after that, a backup request is started and both race; the first outcome, success or
/// failure, is returned and the other request is dropped. Configure it with [`Backup::layer`].
#[derive(Debug)]
pub struct Backup<In, Out, S> {
    pub(super) shared: Arc<BackupShared<In>>,
    pub(super) inner: S,
    pub(super) _out: PhantomData<fn() -> Out>,
}

#[derive(Debug)]
pub(crate) struct BackupShared<In> {
    pub(crate) clock: Clock,
    pub(crate) delay: Duration,
    pub(crate) delay_fn: Option<BackupDelay<In>>,
    pub(crate) clone_input: CloneInput<In>,
    pub(crate) on_backup: Option<OnBackup<In>>,
    pub(crate) enable_if: EnableIf<In>,
    pub(crate) telemetry: TelemetryHelper,
}

impl<In, Out, S: Clone> Clone for Backup<In, Out, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
            _out: PhantomData,
        }
    }
}

impl<In: RequestView, Out> Backup<In, Out, ()> {
    /// Starts configuring a backup request layer named `name`.
    pub fn layer(
        name: impl Into<std::borrow::Cow<'static, str>>,
        context: &PolicyContext<In, Out>,
    ) -> super::BackupLayer<In, Out, NotSet> {
        super::BackupLayer::new(name.into(), context)
    }
}

impl<In, Out, S> Service<In> for Backup<In, Out, S>
where
    In: Send,
    Out: Send,
    S: Service<In, Out = Out>,
{
    type Out = Out;

    #[cfg_attr(test, mutants::skip)] // causes test timeouts
    async fn execute(&self, input: In) -> Self::Out {
        if !self.shared.enable_if.call(&input) {
            return self.inner.execute(input).await;
        }

        let Some(backup_input) = self.shared.clone_input.call(&input) else {
            return self.inner.execute(input).await;
        };

        let delay = self.shared.delay_for(&input);

        let primary = pin!(self.inner.execute(input));
        let timer = pin!(self.shared.clock.delay(delay));

        let primary = match select(primary, timer).await {
            Either::Left((out, _timer)) => return out,
            Either::Right(((), primary)) => primary,
        };

        self.shared.launch(&backup_input, delay);
        let backup = pin!(self.inner.execute(backup_input));

        // The primary is polled first and wins a simultaneous completion.
        let (out, winner) = match select(primary, backup).await {
            Either::Left((out, _backup)) => (out, Leg::Primary),
            Either::Right((out, _primary)) => (out, Leg::Backup),
        };

        self.shared.emit_settled(winner);
        out
    }
}

impl<In> BackupShared<In> {
    fn delay_for(&self, input: &In) -> Duration {
        self.delay_fn.as_ref().map_or(self.delay, |delay_fn| delay_fn.call(input))
    }

    fn launch(&self, input: &In, delay: Duration) {
        if let Some(on_backup) = &self.on_backup {
            invoke_listener(&self.telemetry, "on_backup", || on_backup.call(input, OnBackupArgs { delay }));
        }

        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "airbag.backup.launched",
                tracing::Level::INFO,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                resilience.backup.delay = delay.as_secs_f32(),
            );
        }

        #[cfg(feature = "metrics")]
        self.telemetry.report_metrics(crate::telemetry::events::BACKUP_LAUNCHED, &[]);
    }

    fn emit_settled(&self, winner: Leg) {
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "airbag.backup.settled",
                tracing::Level::DEBUG,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                resilience.backup.winner = winner.as_str(),
            );
        }

        #[cfg(feature = "metrics")]
        self.telemetry.report_metrics(
            crate::telemetry::events::BACKUP_SETTLED,
            &[opentelemetry::KeyValue::new(crate::telemetry::BACKUP_WINNER, winner.as_str())],
        );
    }
}
