//! Metric sinks and point-in-time breaker snapshots.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::state::State;

/// How a protected call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    /// The operation returned `Ok`.
    Success,
    /// The operation failed with an error that counts against the breaker.
    Failure,
    /// The operation failed with an error the breaker does not count.
    Ignored,
}

impl CallOutcome {
    /// Stable lowercase name, used as a metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Failure => "failure",
            CallOutcome::Ignored => "ignored",
        }
    }
}

/// Trait for metrics sinks that can receive circuit breaker events.
pub trait MetricSink: Send + Sync + 'static {
    /// Records a state transition event.
    fn record_state_transition(&self, breaker: &str, from: State, to: State);

    /// Records a call that was allowed through, with how long it ran.
    fn record_call(&self, breaker: &str, outcome: CallOutcome, duration: Duration);

    /// Records a call rejected because the circuit was open.
    fn record_rejection(&self, breaker: &str);
}

/// A null metrics sink that discards all events.
pub struct NullMetricSink;

impl MetricSink for NullMetricSink {
    fn record_state_transition(&self, _breaker: &str, _from: State, _to: State) {}
    fn record_call(&self, _breaker: &str, _outcome: CallOutcome, _duration: Duration) {}
    fn record_rejection(&self, _breaker: &str) {}
}

static NULL_SINK: Lazy<Arc<dyn MetricSink>> = Lazy::new(|| Arc::new(NullMetricSink));

pub(crate) fn null_sink() -> Arc<dyn MetricSink> {
    Arc::clone(&NULL_SINK)
}

/// A consistent snapshot of one breaker, for dashboards and health endpoints.
///
/// The state is the one stored at snapshot time; an OPEN breaker whose timeout
/// has elapsed reports OPEN until the next call or `state()` read moves it on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerMetrics {
    /// Breaker name.
    pub name: String,
    /// Current state.
    pub state: State,
    /// Consecutive failures counted in the current state.
    pub failure_count: u32,
    /// Consecutive successes counted in the current state.
    pub success_count: u32,
    /// Calls made through the breaker, rejected ones included.
    pub total_calls: u64,
    /// Failures that counted against the breaker.
    pub total_failures: u64,
    /// Successful calls.
    pub total_successes: u64,
    /// Calls rejected while open.
    pub total_rejections: u64,
    /// Number of state transitions since creation or the last reset.
    pub state_transitions: u64,
    /// Configured failure threshold.
    pub failure_threshold: u32,
    /// Configured success threshold.
    pub success_threshold: u32,
    /// Configured open timeout in milliseconds.
    pub open_timeout_ms: u64,
    /// Milliseconds until a probe is allowed; zero unless open.
    pub retry_after_ms: u64,
    /// Milliseconds since the last counted failure, if any.
    pub last_failure_age_ms: Option<u64>,
}

#[cfg(feature = "prometheus")]
pub use self::prometheus::PrometheusSink;

#[cfg(feature = "prometheus")]
mod prometheus {
    use std::time::Duration;

    use prometheus_client::encoding::EncodeLabelSet;
    use prometheus_client::metrics::counter::Counter;
    use prometheus_client::metrics::family::Family;
    use prometheus_client::metrics::gauge::Gauge;
    use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
    use prometheus_client::registry::Registry;

    use super::{CallOutcome, MetricSink};
    use crate::state::State;

    #[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
    struct BreakerLabels {
        breaker: String,
    }

    #[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
    struct CallLabels {
        breaker: String,
        outcome: String,
    }

    #[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
    struct TransitionLabels {
        breaker: String,
        from: String,
        to: String,
    }

    fn duration_histogram() -> Histogram {
        Histogram::new(exponential_buckets(0.001, 2.0, 16))
    }

    /// Exports breaker events to a `prometheus-client` registry.
    #[derive(Clone)]
    pub struct PrometheusSink {
        calls: Family<CallLabels, Counter>,
        call_duration: Family<CallLabels, Histogram, fn() -> Histogram>,
        rejections: Family<BreakerLabels, Counter>,
        transitions: Family<TransitionLabels, Counter>,
        state: Family<BreakerLabels, Gauge>,
    }

    impl PrometheusSink {
        /// Creates the metric families and registers them in `registry`.
        pub fn new(registry: &mut Registry) -> Self {
            let sink = Self {
                calls: Family::default(),
                call_duration: Family::new_with_constructor(
                    duration_histogram as fn() -> Histogram,
                ),
                rejections: Family::default(),
                transitions: Family::default(),
                state: Family::default(),
            };

            registry.register(
                "circuit_breaker_calls",
                "Calls allowed through a circuit breaker, by outcome",
                sink.calls.clone(),
            );
            registry.register(
                "circuit_breaker_call_duration_seconds",
                "Duration of calls allowed through a circuit breaker",
                sink.call_duration.clone(),
            );
            registry.register(
                "circuit_breaker_rejections",
                "Calls rejected by an open circuit breaker",
                sink.rejections.clone(),
            );
            registry.register(
                "circuit_breaker_transitions",
                "Circuit breaker state transitions",
                sink.transitions.clone(),
            );
            registry.register(
                "circuit_breaker_state",
                "Circuit breaker state (0 closed, 1 open, 2 half_open)",
                sink.state.clone(),
            );

            sink
        }
    }

    impl MetricSink for PrometheusSink {
        fn record_state_transition(&self, breaker: &str, from: State, to: State) {
            self.transitions
                .get_or_create(&TransitionLabels {
                    breaker: breaker.to_owned(),
                    from: from.as_str().to_owned(),
                    to: to.as_str().to_owned(),
                })
                .inc();
            self.state
                .get_or_create(&BreakerLabels {
                    breaker: breaker.to_owned(),
                })
                .set(to.as_i64());
        }

        fn record_call(&self, breaker: &str, outcome: CallOutcome, duration: Duration) {
            let labels = CallLabels {
                breaker: breaker.to_owned(),
                outcome: outcome.as_str().to_owned(),
            };
            self.calls.get_or_create(&labels).inc();
            self.call_duration
                .get_or_create(&labels)
                .observe(duration.as_secs_f64());
        }

        fn record_rejection(&self, breaker: &str) {
            self.rejections
                .get_or_create(&BreakerLabels {
                    breaker: breaker.to_owned(),
                })
                .inc();
        }
    }
}
