// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::CircuitState;

/// `count` outcomes out of the last `window` ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Threshold {
    pub(crate) count: u32,
    pub(crate) window: u32,
}

impl Threshold {
    /// Keeps `1 <= count <= window`.
    pub(crate) fn new(count: u32, window: u32) -> Self {
        let count = count.max(1);
        Self {
            count,
            window: window.max(count),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutionResult {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutionMode {
    /// A regular call, tagged with the closed period it was admitted in.
    Normal(u64),
    /// A half-open probe, tagged with the half-open period it was admitted in.
    Probe(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnterResult {
    Accepted {
        mode: ExecutionMode,
        /// Set when this call moved the circuit to half-open; holds how long it was open.
        half_opened: Option<Duration>,
    },
    Rejected {
        retry_after: Option<Duration>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Unchanged,
    Opened { open_for: Duration },
    Closed { open_duration: Duration },
}

/// The circuit state machine. One engine is shared by every service built from a layer.
#[derive(Debug)]
pub(crate) struct Engine {
    state: Mutex<State>,
    failure: Threshold,
    success: Threshold,
}

#[derive(Debug)]
enum State {
    Closed {
        window: VecDeque<ExecutionResult>,
        generation: u64,
    },
    Open {
        open_until: Instant,
        opened_at: Instant,
        generation: u64,
    },
    HalfOpen {
        opened_at: Instant,
        generation: u64,
        in_flight: u32,
        successes: u32,
    },
}

impl Engine {
    pub(crate) fn new(failure: Threshold, success: Threshold) -> Self {
        Self {
            state: Mutex::new(State::Closed {
                window: VecDeque::with_capacity(failure.window as usize),
                generation: 0,
            }),
            failure,
            success,
        }
    }

    pub(crate) fn failure_threshold(&self) -> Threshold {
        self.failure
    }

    pub(crate) fn success_threshold(&self) -> Threshold {
        self.success
    }

    pub(crate) fn state(&self) -> CircuitState {
        match &*self.lock() {
            State::Closed { .. } => CircuitState::Closed,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    pub(crate) fn enter(&self, now: Instant) -> EnterResult {
        let mut state = self.lock();

        match &mut *state {
            State::Closed { generation, .. } => EnterResult::Accepted {
                mode: ExecutionMode::Normal(*generation),
                half_opened: None,
            },
            State::Open {
                open_until,
                opened_at,
                generation,
            } => {
                if now < *open_until {
                    return EnterResult::Rejected {
                        retry_after: Some(open_until.saturating_duration_since(now)),
                    };
                }

                let generation = generation.wrapping_add(1);
                let open_duration = now.saturating_duration_since(*opened_at);
                *state = State::HalfOpen {
                    opened_at: *opened_at,
                    generation,
                    in_flight: 1,
                    successes: 0,
                };

                EnterResult::Accepted {
                    mode: ExecutionMode::Probe(generation),
                    half_opened: Some(open_duration),
                }
            }
            State::HalfOpen {
                generation, in_flight, ..
            } => {
                if *in_flight >= self.success.window {
                    return EnterResult::Rejected { retry_after: None };
                }

                *in_flight = in_flight.saturating_add(1);
                EnterResult::Accepted {
                    mode: ExecutionMode::Probe(*generation),
                    half_opened: None,
                }
            }
        }
    }

    pub(crate) fn exit(
        &self,
        result: ExecutionResult,
        mode: ExecutionMode,
        now: Instant,
        break_duration: Duration,
    ) -> Transition {
        let mut state = self.lock();

        match &mut *state {
            State::Closed { window, generation } if mode == ExecutionMode::Normal(*generation) => {
                if window.len() >= self.failure.window as usize {
                    window.pop_front();
                }
                window.push_back(result);

                let failures = window.iter().filter(|result| **result == ExecutionResult::Failure).count();
                if failures < self.failure.count as usize {
                    return Transition::Unchanged;
                }

                *state = State::Open {
                    open_until: deadline(now, break_duration),
                    opened_at: now,
                    generation: *generation,
                };

                Transition::Opened { open_for: break_duration }
            }
            State::HalfOpen {
                opened_at,
                generation,
                in_flight,
                successes,
            } if mode == ExecutionMode::Probe(*generation) => {
                let generation = *generation;
                *in_flight = in_flight.saturating_sub(1);

                if result == ExecutionResult::Failure {
                    *state = State::Open {
                        open_until: deadline(now, break_duration),
                        opened_at: now,
                        generation,
                    };

                    return Transition::Opened { open_for: break_duration };
                }

                *successes = successes.saturating_add(1);
                if *successes < self.success.count {
                    return Transition::Unchanged;
                }

                let open_duration = now.saturating_duration_since(*opened_at);
                *state = State::Closed {
                    window: VecDeque::with_capacity(self.failure.window as usize),
                    // Calls admitted before the outage must not count against the new window.
                    generation: generation.wrapping_add(1),
                };

                Transition::Closed { open_duration }
            }
            // Results that arrive after the circuit moved on are ignored.
            _ => Transition::Unchanged,
        }
    }

    /// Frees the slot of a probe that was cancelled before it completed.
    pub(crate) fn release_probe(&self, probe_generation: u64) {
        if let State::HalfOpen {
            generation, in_flight, ..
        } = &mut *self.lock()
        {
            if *generation == probe_generation {
                *in_flight = in_flight.saturating_sub(1);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `now + duration`, saturating at roughly a century for durations `Instant` cannot represent.
fn deadline(now: Instant, duration: Duration) -> Instant {
    const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

    now.checked_add(duration)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    const BREAK: Duration = Duration::from_secs(5);

    fn engine() -> Engine {
        Engine::new(Threshold::new(2, 4), Threshold::new(2, 2))
    }

    fn admit(engine: &Engine, now: Instant) -> ExecutionMode {
        match engine.enter(now) {
            EnterResult::Accepted { mode, .. } => mode,
            EnterResult::Rejected { .. } => panic!("call rejected"),
        }
    }

    fn fail(engine: &Engine, now: Instant) -> Transition {
        let mode = admit(engine, now);
        engine.exit(ExecutionResult::Failure, mode, now, BREAK)
    }

    fn open(engine: &Engine, now: Instant) {
        fail(engine, now);
        assert_eq!(fail(engine, now), Transition::Opened { open_for: BREAK });
    }

    fn probe(engine: &Engine, now: Instant) -> ExecutionMode {
        admit(engine, now)
    }

    #[test]
    fn threshold_is_clamped() {
        assert_eq!(Threshold::new(0, 0), Threshold { count: 1, window: 1 });
        assert_eq!(Threshold::new(5, 3), Threshold { count: 5, window: 5 });
        assert_eq!(Threshold::new(2, 10), Threshold { count: 2, window: 10 });
    }

    #[test]
    fn closed_accepts_and_opens_at_threshold() {
        let engine = engine();
        let now = Instant::now();

        assert_eq!(
            engine.enter(now),
            EnterResult::Accepted {
                mode: ExecutionMode::Normal(0),
                half_opened: None
            }
        );
        assert_eq!(fail(&engine, now), Transition::Unchanged);
        assert_eq!(engine.state(), CircuitState::Closed);
        assert_eq!(fail(&engine, now), Transition::Opened { open_for: BREAK });
        assert_eq!(engine.state(), CircuitState::Open);
    }

    #[test]
    fn rolling_window_forgets_old_failures() {
        let engine = engine();
        let now = Instant::now();

        fail(&engine, now);
        for _ in 0..4 {
            engine.exit(ExecutionResult::Success, ExecutionMode::Normal(0), now, BREAK);
        }

        assert_eq!(fail(&engine, now), Transition::Unchanged);
        assert_eq!(engine.state(), CircuitState::Closed);
    }

    #[test]
    fn open_rejects_until_break_elapses() {
        let engine = engine();
        let now = Instant::now();
        open(&engine, now);

        assert_eq!(
            engine.enter(now + Duration::from_secs(2)),
            EnterResult::Rejected {
                retry_after: Some(Duration::from_secs(3))
            }
        );

        let later = now + BREAK;
        assert_eq!(
            engine.enter(later),
            EnterResult::Accepted {
                mode: ExecutionMode::Probe(1),
                half_opened: Some(BREAK)
            }
        );
        assert_eq!(engine.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_limits_concurrent_probes_and_closes() {
        let engine = engine();
        let now = Instant::now();
        open(&engine, now);

        let later = now + BREAK;
        let first = probe(&engine, later);
        let second = probe(&engine, later);
        assert_eq!(engine.enter(later), EnterResult::Rejected { retry_after: None });

        assert_eq!(engine.exit(ExecutionResult::Success, first, later, BREAK), Transition::Unchanged);
        assert_eq!(
            engine.exit(ExecutionResult::Success, second, later + Duration::from_secs(1), BREAK),
            Transition::Closed {
                open_duration: BREAK + Duration::from_secs(1)
            }
        );
        assert_eq!(engine.state(), CircuitState::Closed);
    }

    #[test]
    fn probe_failure_reopens() {
        let engine = engine();
        let now = Instant::now();
        open(&engine, now);

        let later = now + BREAK;
        let mode = probe(&engine, later);
        assert_eq!(
            engine.exit(ExecutionResult::Failure, mode, later, Duration::from_secs(9)),
            Transition::Opened {
                open_for: Duration::from_secs(9)
            }
        );
        assert!(matches!(engine.enter(later), EnterResult::Rejected { .. }));
    }

    #[test]
    fn stale_results_are_ignored() {
        let engine = engine();
        let now = Instant::now();
        open(&engine, now);

        // A call admitted while closed finishes after the circuit opened.
        assert_eq!(
            engine.exit(ExecutionResult::Failure, ExecutionMode::Normal(0), now, BREAK),
            Transition::Unchanged
        );

        let later = now + BREAK;
        let old_probe = probe(&engine, later);
        engine.exit(ExecutionResult::Failure, old_probe, later, BREAK);

        let next = later + BREAK;
        let _new_probe = probe(&engine, next);

        // The probe of the previous half-open period no longer counts.
        assert_eq!(engine.exit(ExecutionResult::Failure, old_probe, next, BREAK), Transition::Unchanged);
        engine.release_probe(1);
        assert_eq!(engine.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn results_from_before_the_outage_do_not_reopen() {
        let engine = Engine::new(Threshold::new(1, 1), Threshold::new(1, 1));
        let now = Instant::now();

        let slow_call = admit(&engine, now);
        assert_eq!(fail(&engine, now), Transition::Opened { open_for: BREAK });

        let later = now + BREAK;
        let mode = probe(&engine, later);
        assert_eq!(
            engine.exit(ExecutionResult::Success, mode, later, BREAK),
            Transition::Closed { open_duration: BREAK }
        );

        assert_eq!(engine.exit(ExecutionResult::Failure, slow_call, later, BREAK), Transition::Unchanged);
        assert_eq!(engine.state(), CircuitState::Closed);

        // Calls admitted after closing are counted again.
        assert_eq!(fail(&engine, later), Transition::Opened { open_for: BREAK });
    }

    #[test]
    fn released_probe_frees_slot() {
        let engine = Engine::new(Threshold::new(1, 1), Threshold::new(1, 1));
        let now = Instant::now();
        fail(&engine, now);

        let later = now + BREAK;
        let ExecutionMode::Probe(generation) = probe(&engine, later) else {
            panic!("expected probe");
        };
        assert!(matches!(engine.enter(later), EnterResult::Rejected { .. }));

        engine.release_probe(generation);
        assert!(matches!(engine.enter(later), EnterResult::Accepted { .. }));
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let engine = std::sync::Arc::new(engine());
        let engine_clone = std::sync::Arc::clone(&engine);

        let _ = std::thread::spawn(move || {
            let _guard = engine_clone.state.lock().unwrap();
            panic!("poison");
        })
        .join();

        assert!(engine.state.is_poisoned());
        assert_eq!(engine.state(), CircuitState::Closed);
    }
}
