//! Configuration for circuit breakers.

use std::sync::Arc;
use std::time::Duration;

use crate::breaker::CircuitBreaker;
use crate::hook::HookRegistry;
use crate::metrics::{self, MetricSink};

/// Thresholds and timing for a single circuit breaker.
///
/// A threshold of `0` behaves exactly like `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures in CLOSED that open the circuit.
    pub failure_threshold: u32,
    /// Consecutive successes in HALF_OPEN that close the circuit.
    pub success_threshold: u32,
    /// How long the circuit stays OPEN before a probe is allowed.
    pub open_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(60),
        }
    }
}

impl BreakerConfig {
    /// Profile for the external provider API: tolerant of bursts, slow to probe.
    pub fn provider_api() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(60),
        }
    }

    /// Profile for the internal datastore: trips quickly, recovers quickly.
    pub fn datastore() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 1,
            open_timeout: Duration::from_secs(15),
        }
    }
}

/// Builder for creating circuit breakers with custom configurations.
pub struct BreakerBuilder {
    name: String,
    config: BreakerConfig,
    metric_sink: Arc<dyn MetricSink>,
    hook_registry: Arc<HookRegistry>,
}

impl BreakerBuilder {
    /// Creates a new builder with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: BreakerConfig::default(),
            metric_sink: metrics::null_sink(),
            hook_registry: Arc::new(HookRegistry::new()),
        }
    }

    /// Replaces all thresholds at once.
    pub fn config(mut self, config: BreakerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the number of consecutive failures that opens the circuit.
    pub fn failure_threshold(mut self, count: u32) -> Self {
        self.config.failure_threshold = count;
        self
    }

    /// Sets the number of consecutive half-open successes that closes the circuit.
    pub fn success_threshold(mut self, count: u32) -> Self {
        self.config.success_threshold = count;
        self
    }

    /// Sets how long the circuit stays open before probing.
    pub fn open_timeout(mut self, duration: Duration) -> Self {
        self.config.open_timeout = duration;
        self
    }

    /// Sets a metric sink for the circuit breaker.
    pub fn metric_sink<M: MetricSink>(mut self, sink: M) -> Self {
        self.metric_sink = Arc::new(sink);
        self
    }

    /// Sets a hook registry for the circuit breaker.
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hook_registry = Arc::new(hooks);
        self
    }

    pub(crate) fn shared(mut self, hooks: Arc<HookRegistry>, sink: Arc<dyn MetricSink>) -> Self {
        self.hook_registry = hooks;
        self.metric_sink = sink;
        self
    }

    /// Builds a new circuit breaker with the configured settings.
    pub fn build(self) -> CircuitBreaker {
        CircuitBreaker::new(self.name, self.config, self.metric_sink, self.hook_registry)
    }
}
