//! Re-exports common types for convenient usage.
//!
//! # Example
//! ```rust,no_run
//! use provider_resilience::prelude::*;
//!
//! let registry = CircuitBreakerRegistry::new();
//! let breaker = registry.get_or_create("inventory", BreakerConfig::default());
//! assert_eq!(breaker.state(), State::Closed);
//! ```

pub use crate::{
    retry, BreakerConfig, BreakerError, CircuitBreaker, CircuitBreakerRegistry, Classify,
    RetryError, RetryExecutor, RetryPolicy, State,
};
