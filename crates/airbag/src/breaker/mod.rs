// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Circuit breaker middleware.
//!
//! [`Breaker`] tracks the outcomes of the inner service and stops calling it once too many of
//! them fail. While the circuit is open every call is rejected immediately with the output of
//! [`rejected_output`][BreakerLayer::rejected_output], typically
//! [`Error::CircuitOpen`][crate::Error::CircuitOpen].
//!
//! # States
//!
//! - **Closed**: calls pass through. The last `window` outcomes are kept, and the circuit opens
//!   when `count` of them are failures.
//! - **Open**: calls are rejected until the break duration elapses.
//! - **Half-open**: up to `window` probe calls pass through at a time. `count` successful probes
//!   close the circuit; any failed probe opens it again.
//!
//! The transition from open to half-open happens lazily, on the first call after the break
//! duration. A [`BreakerHandle`] therefore reports [`CircuitState::Open`] until that call
//! arrives.
//!
//! # Example
//!
//! ```rust
//! # use std::time::Duration;
//! # use airbag::breaker::Breaker;
//! # use airbag::{Error, PolicyContext, Recovery, RecoveryInfo};
//! # use layered::{Execute, Layer, Service};
//! # use tick::Clock;
//! # async fn example(clock: Clock) {
//! let context = PolicyContext::<String, Result<String, Error>>::new(&clock);
//!
//! let service = Breaker::layer("breaker", &context)
//!     .recovery_with(|out, _args| match out {
//!         Ok(_) => RecoveryInfo::never(),
//!         Err(error) => error.recovery(),
//!     })
//!     .rejected_circuit_open()
//!     .failure_threshold(5, 10)
//!     .break_duration(Duration::from_secs(30))
//!     .layer(Execute::new(|input: String| async move { Ok::<_, Error>(input) }));
//!
//! let result = service.execute("request".to_string()).await;
//! # let _ = result;
//! # }
//! ```
//!
//! # Telemetry
//!
//! Transitions emit `airbag.breaker.opened` (`WARN`), `airbag.breaker.half_opened` and
//! `airbag.breaker.closed` (`INFO`). Rejected calls emit `airbag.breaker.rejected` (`DEBUG`).

use std::sync::Arc;

mod args;
mod callbacks;
pub(crate) mod constants;
mod engine;
mod layer;
mod service;

pub use args::{BreakDurationArgs, OnCloseArgs, OnHalfOpenArgs, OnOpenArgs, RecoveryArgs, RejectedArgs};
pub(crate) use callbacks::{BreakDuration, OnClose, OnHalfOpen, OnOpen, RejectedOutput, ShouldRecover};
pub use layer::BreakerLayer;
pub use service::Breaker;
pub(crate) use service::BreakerShared;

/// State of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CircuitState {
    /// Calls pass through.
    Closed,
    /// Calls are rejected.
    Open,
    /// A limited number of probe calls pass through.
    HalfOpen,
}

/// Read-only view of the circuit shared by services built from one [`BreakerLayer`].
#[derive(Debug, Clone)]
pub struct BreakerHandle {
    pub(crate) engine: Arc<engine::Engine>,
}

impl BreakerHandle {
    /// The current state of the circuit.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.engine.state()
    }
}
