//! # provider-resilience
//!
//! The resilience layer shared by the cloud reporting jobs (inventory discovery,
//! cost estimation, compliance checks, health probes): every outbound call to the
//! provider API goes through it to decide whether to attempt the call, how long to
//! wait between attempts, and when to stop attempting altogether.
//!
//! Two independent, composable pieces:
//!
//! - [`RetryExecutor`] retries transient failures with capped exponential backoff
//!   and optional jitter, up to a bounded number of attempts.
//! - [`CircuitBreaker`] guards one named dependency with a CLOSED / OPEN /
//!   HALF_OPEN state machine and fails fast while the dependency is known bad.
//!
//! A [`CircuitBreakerRegistry`] hands out one breaker per dependency name.
//!
//! ## State machine
//!
//! ```text
//! Closed ──[failure_threshold consecutive failures]──> Open
//!   ▲                                                    │
//!   │                                                    │ [open_timeout elapsed]
//!   │                                                    ▼
//!   └──[success_threshold consecutive successes]── HalfOpen
//!                       [any failure] ─────────────────> Open
//! ```
//!
//! ## Basic Usage
//!
//! ```rust
//! use provider_resilience::{
//!     retry, BreakerConfig, BreakerError, CircuitBreakerRegistry, RetryPolicy,
//! };
//! use std::io;
//! use std::time::Duration;
//!
//! let registry = CircuitBreakerRegistry::new();
//! let breaker = registry.get_or_create("pricing-api", BreakerConfig::provider_api());
//!
//! let policy = RetryPolicy::<io::Error>::builder()
//!     .max_attempts(3)
//!     .base_delay(Duration::from_millis(1))
//!     .build()
//!     .unwrap();
//! let executor = retry(policy);
//!
//! // Retries run inside the breaker: one exhausted retry loop counts as one failure.
//! match breaker.call(|| executor.call(|| Ok::<_, io::Error>("price table"))) {
//!     Ok(table) => println!("fetched {}", table),
//!     Err(BreakerError::Open { retry_after, .. }) => {
//!         println!("skipped, retry in {:?}", retry_after)
//!     }
//!     Err(BreakerError::Operation(err)) => println!("call failed: {}", err),
//! }
//! ```
//!
//! ## Failure classification
//!
//! Whether a failure is retried, and whether it counts against a breaker, is
//! decided by [`Classify`]. Only transient failures are retried or recorded;
//! anything else propagates untouched on first occurrence. Both components also
//! accept explicit predicates ([`RetryPolicyBuilder::retry_if`],
//! [`CircuitBreaker::call_with`]).
//!
//! ## Features
//!
//! - `async` - `call_async` on breakers and executors, using Tokio for sleeps
//! - `prometheus` - [`PrometheusSink`] exporting breaker events

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod breaker;
mod config;
mod error;
mod hook;
mod metrics;
mod policy;
pub mod prelude;
mod registry;
mod retry;
mod state;

// Re-exports
pub use breaker::CircuitBreaker;
pub use config::{BreakerBuilder, BreakerConfig};
pub use error::{BreakerError, BreakerResult, ConfigError, RetryError, RetryResult};
pub use hook::HookRegistry;
#[cfg(feature = "prometheus")]
pub use metrics::PrometheusSink;
pub use metrics::{BreakerMetrics, CallOutcome, MetricSink, NullMetricSink};
pub use policy::Classify;
pub use registry::CircuitBreakerRegistry;
pub use retry::{retry, RetryExecutor, RetryPolicy, RetryPolicyBuilder};
pub use state::{State, Transition};
