//! Circuit breaker state machine implementation.

use std::fmt::{self, Display, Formatter};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::BreakerConfig;

/// Represents the possible states of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Circuit is closed and operations are allowed.
    Closed,

    /// Circuit is open and operations are rejected.
    Open,

    /// Circuit is letting calls through to test whether the dependency recovered.
    HalfOpen,
}

impl State {
    /// Stable lowercase name, suitable for health endpoints and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half_open",
        }
    }

    /// Numeric encoding used for gauges.
    pub fn as_i64(&self) -> i64 {
        match self {
            State::Closed => 0,
            State::Open => 1,
            State::HalfOpen => 2,
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State before the change.
    pub from: State,
    /// State after the change.
    pub to: State,
}

/// Outcome of asking the state machine whether a call may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// The call may proceed. Carries the OPEN -> HALF_OPEN transition if this
    /// admission caused one.
    Allowed(Option<Transition>),
    /// The circuit is open.
    Rejected { retry_after: Duration },
}

/// Counter values captured together under the breaker lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Counters {
    pub failure_count: u32,
    pub success_count: u32,
    pub total_calls: u64,
    pub total_failures: u64,
    pub total_successes: u64,
    pub total_rejections: u64,
    pub state_transitions: u64,
}

/// All mutable breaker fields. Always accessed under the breaker's mutex; every
/// method is O(1) and performs no I/O.
#[derive(Debug)]
pub(crate) struct StateMachine {
    config: BreakerConfig,
    state: State,
    counters: Counters,
    opened_at: Option<Instant>,
    last_failure_time: Option<Instant>,
}

impl StateMachine {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: State::Closed,
            counters: Counters::default(),
            opened_at: None,
            last_failure_time: None,
        }
    }

    pub fn config(&self) -> BreakerConfig {
        self.config
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn last_failure_time(&self) -> Option<Instant> {
        self.last_failure_time
    }

    /// Moves OPEN to HALF_OPEN once the open timeout has elapsed.
    pub fn refresh(&mut self, now: Instant) -> Option<Transition> {
        if self.state == State::Open && self.retry_after(now).is_zero() {
            return Some(self.transition(State::HalfOpen, now));
        }
        None
    }

    /// Time left before a HALF_OPEN probe is permitted. Zero unless OPEN.
    pub fn retry_after(&self, now: Instant) -> Duration {
        match (self.state, self.opened_at) {
            (State::Open, Some(opened_at)) => self
                .config
                .open_timeout
                .saturating_sub(now.saturating_duration_since(opened_at)),
            _ => Duration::ZERO,
        }
    }

    /// Decides whether a call may run. Counts every call, admitted or not.
    pub fn admit(&mut self, now: Instant) -> Admission {
        self.counters.total_calls += 1;
        let transition = self.refresh(now);
        match self.state {
            State::Open => {
                self.counters.total_rejections += 1;
                Admission::Rejected {
                    retry_after: self.retry_after(now),
                }
            }
            State::Closed | State::HalfOpen => Admission::Allowed(transition),
        }
    }

    pub fn record_success(&mut self, now: Instant) -> Option<Transition> {
        self.counters.total_successes += 1;
        match self.state {
            State::Closed => {
                self.counters.failure_count = 0;
                None
            }
            State::HalfOpen => {
                if self.counters.success_count + 1 >= self.config.success_threshold {
                    Some(self.transition(State::Closed, now))
                } else {
                    self.counters.success_count += 1;
                    None
                }
            }
            // A call admitted before the circuit tripped finished late.
            State::Open => None,
        }
    }

    pub fn record_failure(&mut self, now: Instant) -> Option<Transition> {
        self.counters.total_failures += 1;
        self.last_failure_time = Some(now);
        match self.state {
            State::Closed => {
                if self.counters.failure_count + 1 >= self.config.failure_threshold {
                    Some(self.transition(State::Open, now))
                } else {
                    self.counters.failure_count += 1;
                    None
                }
            }
            State::HalfOpen => Some(self.transition(State::Open, now)),
            State::Open => None,
        }
    }

    /// Trips the circuit regardless of counters. The open timeout starts now.
    pub fn force_open(&mut self, now: Instant) -> Option<Transition> {
        if self.state == State::Open {
            return None;
        }
        Some(self.transition(State::Open, now))
    }

    /// Forces CLOSED and zeroes every counter, cumulative totals included.
    pub fn reset(&mut self) -> Option<Transition> {
        let from = self.state;
        self.state = State::Closed;
        self.counters = Counters::default();
        self.opened_at = None;
        self.last_failure_time = None;
        (from != State::Closed).then_some(Transition {
            from,
            to: State::Closed,
        })
    }

    fn transition(&mut self, to: State, now: Instant) -> Transition {
        let from = self.state;
        self.state = to;
        self.counters.failure_count = 0;
        self.counters.success_count = 0;
        self.counters.state_transitions += 1;
        self.opened_at = (to == State::Open).then_some(now);
        Transition { from, to }
    }
}
