//! Error types for the resilience layer.

use std::time::Duration;

use thiserror::Error;

/// Result type for circuit breaker operations.
pub type BreakerResult<T, E> = Result<T, BreakerError<E>>;

/// Result type for retried operations.
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Error type for circuit breaker operations.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open and the operation was not attempted.
    #[error("circuit breaker '{name}' is open, retry after {retry_after:?}")]
    Open {
        /// Name of the breaker that rejected the call.
        name: String,
        /// Time left before the breaker will let a probe through.
        retry_after: Duration,
    },

    /// The underlying operation ran and failed.
    #[error("operation error: {0}")]
    Operation(#[source] E),
}

impl<E> BreakerError<E> {
    /// True when the call was rejected without running.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// The operation's own failure, if it ran.
    pub fn operation(&self) -> Option<&E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            BreakerError::Open { .. } => None,
        }
    }

    /// Consumes the error, returning the operation's own failure if it ran.
    pub fn into_operation(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            BreakerError::Open { .. } => None,
        }
    }
}

/// Error type for the retry executor.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error.
    #[error("retry exhausted after {attempts} attempts: {last_error}")]
    Exhausted {
        /// Number of times the operation was invoked.
        attempts: u32,
        /// The failure from the final attempt.
        #[source]
        last_error: E,
    },

    /// The operation failed with an error the policy does not retry.
    #[error("non-retryable failure: {0}")]
    Fatal(#[source] E),
}

impl<E> RetryError<E> {
    /// Number of times the operation was invoked before giving up.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            RetryError::Exhausted { attempts, .. } => Some(*attempts),
            RetryError::Fatal(_) => None,
        }
    }

    /// True when all attempts were used.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// The underlying failure.
    pub fn inner(&self) -> &E {
        match self {
            RetryError::Exhausted { last_error, .. } => last_error,
            RetryError::Fatal(e) => e,
        }
    }

    /// Consumes the error, returning the underlying failure.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last_error, .. } => last_error,
            RetryError::Fatal(e) => e,
        }
    }
}

/// Invalid retry policy settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// `max_attempts` was zero.
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    /// `exponential_base` was not a finite number greater than 1.0.
    #[error("exponential_base must be a finite number greater than 1.0 (got {0})")]
    InvalidExponentialBase(f64),
}
