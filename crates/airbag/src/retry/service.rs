// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use layered::Service;
use tick::Clock;

use super::backoff::DelayBackoff;
use super::{
    CloneArgs, CloneInput, ComputeDelay, DelayArgs, OnRetry, OnRetryArgs, RecoveryArgs, RestoreInput, RestoreInputArgs, ShouldRecover,
};
use crate::attempt::MaxAttempts;
use crate::utils::{EnableIf, TelemetryHelper, invoke_listener};
use crate::{Attempt, NotSet, PolicyContext, RecoveryInfo, RecoveryKind};

/// Retries the inner service while its outcome is classified as recoverable.
///
/// Configure it with [`Retry::layer`] and the builder methods of
/// [`RetryLayer`][super::RetryLayer]. See the [module documentation][super] for the retry
/// algorithm.
#[derive(Debug)]
pub struct Retry<In, Out, S> {
    pub(super) shared: Arc<RetryShared<In, Out>>,
    pub(super) inner: S,
}

#[derive(Debug)]
pub(crate) struct RetryShared<In, Out> {
    pub(crate) clock: Clock,
    pub(crate) max_attempts: MaxAttempts,
    pub(crate) max_duration: Option<Duration>,
    pub(crate) backoff: DelayBackoff,
    pub(crate) clone_input: CloneInput<In>,
    pub(crate) should_recover: ShouldRecover<Out>,
    pub(crate) compute_delay: Option<ComputeDelay<Out>>,
    pub(crate) on_retry: Option<OnRetry<In, Out>>,
    pub(crate) enable_if: EnableIf<In>,
    pub(crate) telemetry: TelemetryHelper,
    pub(crate) restore_input: Option<RestoreInput<In, Out>>,
    pub(crate) handle_unavailable: bool,
}

impl<In, Out, S: Clone> Clone for Retry<In, Out, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
        }
    }
}

impl<In, Out> Retry<In, Out, ()> {
    /// Starts configuring a retry layer named `name`.
    pub fn layer(
        name: impl Into<std::borrow::Cow<'static, str>>,
        context: &PolicyContext<In, Out>,
    ) -> super::RetryLayer<In, Out, NotSet, NotSet> {
        super::RetryLayer::new(name.into(), context)
    }
}

impl<In, Out, S> Service<In> for Retry<In, Out, S>
where
    In: Send,
    Out: Send,
    S: Service<In, Out = Out>,
{
    type Out = Out;

    #[cfg_attr(test, mutants::skip)] // Mutating enable_if check causes infinite loops
    async fn execute(&self, mut input: In) -> Self::Out {
        if !self.shared.enable_if.call(&input) {
            return self.inner.execute(input).await;
        }

        let started = self.shared.clock.instant();
        let mut attempt = Attempt::first(self.shared.max_attempts);
        let mut delays = self.shared.backoff.delays();
        let mut previous_recovery = None;

        loop {
            let (original_input, attempt_input) = self.shared.clone_input(input, attempt, previous_recovery.take());

            let out = self.inner.execute(attempt_input).await;

            match self.shared.evaluate_attempt(original_input, out, attempt, &mut delays, started) {
                ControlFlow::Continue(state) => {
                    self.shared.clock.delay(state.delay).await;
                    input = state.input;
                    attempt = state.attempt;
                    previous_recovery = Some(state.recovery);
                }
                ControlFlow::Break(out) => return out,
            }
        }
    }
}

impl<In, Out> RetryShared<In, Out> {
    fn clone_input(&self, mut input: In, attempt: Attempt, previous_recovery: Option<RecoveryInfo>) -> (Option<In>, In) {
        let args = CloneArgs {
            attempt,
            previous_recovery,
        };

        match self.clone_input.call(&mut input, args) {
            Some(cloned) => (Some(input), cloned),
            None => (None, input),
        }
    }

    fn evaluate_attempt(
        &self,
        mut original_input: Option<In>,
        mut out: Out,
        attempt: Attempt,
        delays: &mut impl Iterator<Item = Duration>,
        started: Instant,
    ) -> ControlFlow<Out, ContinueRetry<In>> {
        let recovery = self.should_recover.call(
            &out,
            RecoveryArgs {
                attempt,
                clock: &self.clock,
            },
        );

        if !self.is_recoverable(&recovery) {
            return ControlFlow::Break(out);
        }

        let Some(next_attempt) = attempt.increment(self.max_attempts) else {
            self.emit_exhausted(attempt, ExhaustedReason::MaxRetries);
            return ControlFlow::Break(out);
        };

        let retry_delay = self.compute_retry_delay(&out, attempt, delays);
        let elapsed = self.clock.instant().saturating_duration_since(started);

        if self.max_duration.is_some_and(|max| elapsed.saturating_add(retry_delay) > max) {
            self.emit_exhausted(attempt, ExhaustedReason::MaxDuration);
            return ControlFlow::Break(out);
        }

        if let Some(input) = self.try_restore_input(original_input.as_ref(), &mut out, attempt, &recovery) {
            original_input = Some(input);
        }

        match original_input {
            Some(input) => {
                self.emit_retry(attempt, retry_delay);
                self.invoke_on_retry(&input, &out, attempt, retry_delay, elapsed, &recovery);
                ControlFlow::Continue(ContinueRetry {
                    input,
                    attempt: next_attempt,
                    recovery,
                    delay: retry_delay,
                })
            }
            None => ControlFlow::Break(out),
        }
    }

    #[cfg_attr(test, mutants::skip)] // causes test timeout
    fn is_recoverable(&self, recovery: &RecoveryInfo) -> bool {
        match recovery.kind() {
            RecoveryKind::Unavailable => self.handle_unavailable,
            RecoveryKind::Retry => true,
            RecoveryKind::Never | RecoveryKind::Unknown | _ => false,
        }
    }

    /// A dynamic delay wins over backoff; the backoff sequence advances either way.
    fn compute_retry_delay(&self, out: &Out, attempt: Attempt, delays: &mut impl Iterator<Item = Duration>) -> Duration {
        let backoff_delay = delays.next().unwrap_or(Duration::ZERO);

        self.compute_delay
            .as_ref()
            .and_then(|compute| {
                compute.call(
                    out,
                    DelayArgs {
                        attempt,
                        clock: &self.clock,
                    },
                )
            })
            .unwrap_or(backoff_delay)
    }

    fn try_restore_input(&self, original_input: Option<&In>, out: &mut Out, attempt: Attempt, recovery: &RecoveryInfo) -> Option<In> {
        if original_input.is_some() {
            return None;
        }

        self.restore_input.as_ref().and_then(|restore| {
            restore.call(
                out,
                RestoreInputArgs {
                    attempt,
                    recovery: recovery.clone(),
                },
            )
        })
    }

    fn invoke_on_retry(&self, input: &In, out: &Out, attempt: Attempt, retry_delay: Duration, elapsed: Duration, recovery: &RecoveryInfo) {
        if let Some(on_retry) = &self.on_retry {
            invoke_listener(&self.telemetry, "on_retry", || {
                on_retry.call(
                    input,
                    out,
                    OnRetryArgs {
                        attempt,
                        retry_delay,
                        elapsed,
                        recovery: recovery.clone(),
                    },
                );
            });
        }
    }

    fn emit_retry(&self, attempt: Attempt, retry_delay: Duration) {
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "airbag.retry",
                tracing::Level::WARN,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                resilience.attempt.index = attempt.index(),
                resilience.attempt.is_last = attempt.is_last(),
                resilience.retry.delay = retry_delay.as_secs_f32(),
            );
        }

        #[cfg(feature = "metrics")]
        {
            use crate::telemetry::{ATTEMPT_INDEX, ATTEMPT_IS_LAST, events};

            self.telemetry.report_metrics(
                events::RETRY,
                &[
                    opentelemetry::KeyValue::new(ATTEMPT_INDEX, i64::from(attempt.index())),
                    opentelemetry::KeyValue::new(ATTEMPT_IS_LAST, attempt.is_last()),
                ],
            );
        }
    }

    fn emit_exhausted(&self, attempt: Attempt, reason: ExhaustedReason) {
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "airbag.retry.exhausted",
                tracing::Level::WARN,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                resilience.attempt.index = attempt.index(),
                resilience.retry.exhausted_reason = reason.as_str(),
            );
        }

        #[cfg(feature = "metrics")]
        {
            use crate::telemetry::{ATTEMPT_INDEX, EXHAUSTED_REASON, events};

            self.telemetry.report_metrics(
                events::RETRY_EXHAUSTED,
                &[
                    opentelemetry::KeyValue::new(ATTEMPT_INDEX, i64::from(attempt.index())),
                    opentelemetry::KeyValue::new(EXHAUSTED_REASON, reason.as_str()),
                ],
            );
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ExhaustedReason {
    MaxRetries,
    MaxDuration,
}

impl ExhaustedReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::MaxRetries => "max_retries",
            Self::MaxDuration => "max_duration",
        }
    }
}

/// State carried into the next iteration of the retry loop.
struct ContinueRetry<In> {
    input: In,
    attempt: Attempt,
    recovery: RecoveryInfo,
    delay: Duration,
}
