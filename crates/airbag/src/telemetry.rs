// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Well-known telemetry keys and event names.
//!
//! Every resilience event is logged through `tracing` when logs are enabled on the
//! [`PolicyContext`][crate::PolicyContext], and counted on the `resilience.event` counter when
//! metrics are enabled (feature `metrics`). Keys follow the OpenTelemetry naming guidelines.

/// Name of the pipeline the event belongs to.
pub const PIPELINE_NAME: &str = "resilience.pipeline.name";

/// Name of the strategy (policy instance) that raised the event.
pub const STRATEGY_NAME: &str = "resilience.strategy.name";

/// Name of the event.
pub const EVENT_NAME: &str = "resilience.event.name";

/// 0-based index of the attempt that triggered a retry.
pub const ATTEMPT_INDEX: &str = "resilience.attempt.index";

/// Whether the attempt was the last one allowed.
pub const ATTEMPT_IS_LAST: &str = "resilience.attempt.is_last";

/// Which leg of a backup race produced the result, `primary` or `backup`.
pub const BACKUP_WINNER: &str = "resilience.backup.winner";

/// Why a retry sequence stopped, `max_retries` or `max_duration`.
pub const EXHAUSTED_REASON: &str = "resilience.retry.exhausted_reason";

/// Event names.
pub mod events {
    /// A retry was scheduled.
    pub const RETRY: &str = "retry";

    /// A retry sequence ran out of budget.
    pub const RETRY_EXHAUSTED: &str = "retry_exhausted";

    /// The circuit breaker opened.
    pub const CIRCUIT_OPENED: &str = "circuit_opened";

    /// The circuit breaker started probing.
    pub const CIRCUIT_HALF_OPENED: &str = "circuit_half_opened";

    /// The circuit breaker closed.
    pub const CIRCUIT_CLOSED: &str = "circuit_closed";

    /// A call was rejected by an open circuit.
    pub const CIRCUIT_REJECTED: &str = "circuit_rejected";

    /// A backup request was launched.
    pub const BACKUP_LAUNCHED: &str = "backup_launched";

    /// A backup race finished.
    pub const BACKUP_SETTLED: &str = "backup_settled";

    /// Execution hit its deadline.
    pub const TIMEOUT: &str = "timeout";
}

#[cfg(feature = "metrics")]
pub(crate) mod metrics {
    use opentelemetry::InstrumentationScope;
    use opentelemetry::metrics::{Counter, Meter, MeterProvider};

    const METER_NAME: &str = "airbag";
    const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";

    pub(crate) fn create_meter(meter_provider: &dyn MeterProvider) -> Meter {
        meter_provider.meter_with_scope(
            InstrumentationScope::builder(METER_NAME)
                .with_version(env!("CARGO_PKG_VERSION"))
                .with_schema_url(SCHEMA_URL)
                .build(),
        )
    }

    pub(crate) fn create_resilience_event_counter(meter: &Meter) -> Counter<u64> {
        meter
            .u64_counter("resilience.event")
            .with_description("Emitted upon the occurrence of a resilience event.")
            .build()
    }
}
