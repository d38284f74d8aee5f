//! Core circuit breaker implementation.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::{BreakerBuilder, BreakerConfig};
use crate::error::{BreakerError, BreakerResult};
use crate::hook::HookRegistry;
use crate::metrics::{BreakerMetrics, CallOutcome, MetricSink};
use crate::policy::Classify;
use crate::state::{Admission, State, StateMachine, Transition};

/// Inner state of the circuit breaker, shared between clones.
struct BreakerInner {
    name: String,
    machine: Mutex<StateMachine>,
    metric_sink: Arc<dyn MetricSink>,
    hooks: Arc<HookRegistry>,
}

/// A named circuit breaker guarding one external dependency.
///
/// Cloning is cheap and every clone shares the same state. The lock is held only
/// to decide admission and to record an outcome, never while the protected
/// operation runs, so calls through a closed breaker execute in parallel.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker with the specified settings.
    pub fn new(
        name: impl Into<String>,
        config: BreakerConfig,
        metric_sink: Arc<dyn MetricSink>,
        hooks: Arc<HookRegistry>,
    ) -> Self {
        let inner = BreakerInner {
            name: name.into(),
            machine: Mutex::new(StateMachine::new(config)),
            metric_sink,
            hooks,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Creates a new builder for customizing a circuit breaker.
    pub fn builder(name: impl Into<String>) -> BreakerBuilder {
        BreakerBuilder::new(name)
    }

    /// Name of the protected dependency.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Configured thresholds.
    pub fn config(&self) -> BreakerConfig {
        self.inner.machine.lock().config()
    }

    /// Gets the current state, moving OPEN to HALF_OPEN if the open timeout has
    /// elapsed.
    pub fn state(&self) -> State {
        let (state, transition) = {
            let mut machine = self.inner.machine.lock();
            let transition = machine.refresh(Instant::now());
            (machine.state(), transition)
        };

        if let Some(transition) = transition {
            self.notify_transition(transition);
        }

        state
    }

    /// True if both handles refer to the same breaker.
    pub fn ptr_eq(&self, other: &CircuitBreaker) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Executes a function wrapped by the circuit breaker.
    ///
    /// Only transient failures count against the breaker; other failures are
    /// returned to the caller without touching its counters.
    pub fn call<F, T, E>(&self, f: F) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: Classify,
    {
        self.call_with(f, E::is_transient)
    }

    /// Executes a function wrapped by the circuit breaker, using `trips` to decide
    /// whether a failure counts against it.
    pub fn call_with<F, T, E, P>(&self, f: F, trips: P) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        P: FnOnce(&E) -> bool,
    {
        self.pre_call()?;

        let start = Instant::now();
        let result = f();
        let duration = start.elapsed();

        self.post_call(&result, trips, duration);

        result.map_err(BreakerError::Operation)
    }

    /// Checks if a call is allowed based on the current state.
    fn pre_call<E>(&self) -> Result<(), BreakerError<E>> {
        let admission = self.inner.machine.lock().admit(Instant::now());

        match admission {
            Admission::Allowed(transition) => {
                if let Some(transition) = transition {
                    self.notify_transition(transition);
                }
                Ok(())
            }
            Admission::Rejected { retry_after } => {
                tracing::trace!(
                    breaker = %self.inner.name,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "circuit open, rejecting call"
                );
                self.inner.metric_sink.record_rejection(&self.inner.name);
                self.inner.hooks.execute_rejected_hook(&self.inner.name);

                Err(BreakerError::Open {
                    name: self.inner.name.clone(),
                    retry_after,
                })
            }
        }
    }

    /// Processes the result of a call to update stats and potentially change state.
    fn post_call<T, E, P>(&self, result: &Result<T, E>, trips: P, duration: Duration)
    where
        P: FnOnce(&E) -> bool,
    {
        let outcome = match result {
            Ok(_) => CallOutcome::Success,
            Err(e) => {
                if trips(e) {
                    CallOutcome::Failure
                } else {
                    CallOutcome::Ignored
                }
            }
        };

        let transition = {
            let mut machine = self.inner.machine.lock();
            let now = Instant::now();
            match outcome {
                CallOutcome::Success => machine.record_success(now),
                CallOutcome::Failure => machine.record_failure(now),
                CallOutcome::Ignored => None,
            }
        };

        self.inner
            .metric_sink
            .record_call(&self.inner.name, outcome, duration);

        match outcome {
            CallOutcome::Success => self.inner.hooks.execute_success_hook(&self.inner.name),
            CallOutcome::Failure => self.inner.hooks.execute_failure_hook(&self.inner.name),
            CallOutcome::Ignored => {}
        }

        if let Some(transition) = transition {
            self.notify_transition(transition);
        }
    }

    // Runs outside the lock path.
    fn notify_transition(&self, Transition { from, to }: Transition) {
        let name = self.inner.name.as_str();
        if to == State::Open {
            tracing::info!(breaker = name, %from, %to, "circuit breaker opened");
        } else {
            tracing::debug!(breaker = name, %from, %to, "circuit breaker state change");
        }

        self.inner.metric_sink.record_state_transition(name, from, to);
        self.inner.hooks.execute_state_transition_hook(name, from, to);
    }

    /// Forces the circuit breaker to the open state. The open timeout starts now.
    ///
    /// Returns false if it was already open.
    pub fn force_open(&self) -> bool {
        let transition = self.inner.machine.lock().force_open(Instant::now());
        match transition {
            Some(transition) => {
                self.notify_transition(transition);
                true
            }
            None => false,
        }
    }

    /// Forces the circuit breaker closed and zeroes every counter.
    pub fn reset(&self) {
        let transition = self.inner.machine.lock().reset();
        tracing::debug!(breaker = %self.inner.name, "circuit breaker reset");
        if let Some(transition) = transition {
            self.notify_transition(transition);
        }
    }

    /// Takes a consistent snapshot of state, counters and configuration.
    pub fn metrics(&self) -> BreakerMetrics {
        let machine = self.inner.machine.lock();
        let now = Instant::now();
        let counters = machine.counters();
        let config = machine.config();

        BreakerMetrics {
            name: self.inner.name.clone(),
            state: machine.state(),
            failure_count: counters.failure_count,
            success_count: counters.success_count,
            total_calls: counters.total_calls,
            total_failures: counters.total_failures,
            total_successes: counters.total_successes,
            total_rejections: counters.total_rejections,
            state_transitions: counters.state_transitions,
            failure_threshold: config.failure_threshold,
            success_threshold: config.success_threshold,
            open_timeout_ms: config.open_timeout.as_millis() as u64,
            retry_after_ms: machine.retry_after(now).as_millis() as u64,
            last_failure_age_ms: machine
                .last_failure_time()
                .map(|at| now.saturating_duration_since(at).as_millis() as u64),
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let machine = self.inner.machine.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.name)
            .field("state", &machine.state())
            .field("config", &machine.config())
            .finish()
    }
}

// Implement Async support when the feature is enabled
#[cfg(feature = "async")]
impl CircuitBreaker {
    /// Executes an async function wrapped by the circuit breaker.
    pub async fn call_async<F, Fut, T, E>(&self, f: F) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: Classify,
    {
        self.call_async_with(f, E::is_transient).await
    }

    /// Executes an async function wrapped by the circuit breaker, using `trips` to
    /// decide whether a failure counts against it.
    pub async fn call_async_with<F, Fut, T, E, P>(&self, f: F, trips: P) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        P: FnOnce(&E) -> bool,
    {
        self.pre_call()?;

        let start = Instant::now();
        let result = f().await;
        let duration = start.elapsed();

        self.post_call(&result, trips, duration);

        result.map_err(BreakerError::Operation)
    }
}
