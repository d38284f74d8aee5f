//! Name-keyed registry of circuit breakers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::breaker::CircuitBreaker;
use crate::config::{BreakerBuilder, BreakerConfig};
use crate::hook::HookRegistry;
use crate::metrics::{self, BreakerMetrics, MetricSink};
use crate::state::State;

/// Owns one circuit breaker per dependency name.
///
/// Share it with `Arc`. Breakers live as long as the registry; there is no
/// eviction. The map lock is separate from every breaker's own lock and is
/// never held while a breaker runs hooks or protected calls.
pub struct CircuitBreakerRegistry {
    breakers: RwLock<AHashMap<String, CircuitBreaker>>,
    hooks: Arc<HookRegistry>,
    metric_sink: Arc<dyn MetricSink>,
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            breakers: RwLock::new(AHashMap::new()),
            hooks: Arc::new(HookRegistry::new()),
            metric_sink: metrics::null_sink(),
        }
    }

    /// Hooks shared by every breaker this registry creates.
    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Metric sink shared by every breaker this registry creates.
    pub fn with_metric_sink<M: MetricSink>(mut self, sink: M) -> Self {
        self.metric_sink = Arc::new(sink);
        self
    }

    /// Returns the breaker registered under `name`, creating it with `config` if
    /// absent. An existing breaker keeps its original configuration.
    pub fn get_or_create(&self, name: &str, config: BreakerConfig) -> CircuitBreaker {
        if let Some(breaker) = self.breakers.read().get(name) {
            return breaker.clone();
        }

        let mut breakers = self.breakers.write();
        // Another thread may have created it between the two locks.
        breakers
            .entry(name.to_owned())
            .or_insert_with(|| {
                tracing::debug!(breaker = name, ?config, "creating circuit breaker");
                BreakerBuilder::new(name)
                    .config(config)
                    .shared(Arc::clone(&self.hooks), Arc::clone(&self.metric_sink))
                    .build()
            })
            .clone()
    }

    /// Registers a breaker built elsewhere. If the name is taken, the existing
    /// breaker wins and is returned.
    pub fn register(&self, breaker: CircuitBreaker) -> CircuitBreaker {
        self.breakers
            .write()
            .entry(breaker.name().to_owned())
            .or_insert(breaker)
            .clone()
    }

    /// Looks up a breaker without creating it.
    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.read().get(name).cloned()
    }

    /// Current state of the named breaker, if registered.
    pub fn state(&self, name: &str) -> Option<State> {
        self.get(name).map(|breaker| breaker.state())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Number of registered breakers.
    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    /// True if no breaker has been registered.
    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }

    /// Forces every registered breaker closed with zeroed counters.
    pub fn reset_all(&self) {
        let breakers = self.handles();
        tracing::info!(count = breakers.len(), "resetting all circuit breakers");
        for breaker in breakers {
            breaker.reset();
        }
    }

    /// Snapshot of every registered breaker, keyed by name.
    pub fn snapshot_all(&self) -> BTreeMap<String, BreakerMetrics> {
        self.handles()
            .into_iter()
            .map(|breaker| (breaker.name().to_owned(), breaker.metrics()))
            .collect()
    }

    fn handles(&self) -> Vec<CircuitBreaker> {
        self.breakers.read().values().cloned().collect()
    }
}

impl fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("breakers", &self.names())
            .finish()
    }
}
