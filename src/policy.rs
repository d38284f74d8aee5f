//! Failure classification shared by the retry executor and the circuit breaker.

use std::io;

use crate::error::{BreakerError, RetryError};

/// Classifies a failure as transient (a dependency hiccup worth retrying and
/// counting against a breaker) or fatal (a caller bug or a permanent refusal).
///
/// The retry executor uses this as its default retry predicate, and the breaker
/// only records transient failures. Fatal failures pass through both untouched.
pub trait Classify {
    /// Returns true if the failure is transient.
    fn is_transient(&self) -> bool;
}

impl Classify for io::Error {
    fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            io::ErrorKind::TimedOut
                | io::ErrorKind::Interrupted
                | io::ErrorKind::WouldBlock
                | io::ErrorKind::ConnectionRefused
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::NotConnected
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof
        )
    }
}

/// Retrying an open circuit defeats its purpose, so `Open` is never transient.
impl<E: Classify> Classify for BreakerError<E> {
    fn is_transient(&self) -> bool {
        match self {
            BreakerError::Open { .. } => false,
            BreakerError::Operation(e) => e.is_transient(),
        }
    }
}

/// An exhausted retry loop is a dependency failure; a fatal one keeps its own class.
impl<E: Classify> Classify for RetryError<E> {
    fn is_transient(&self) -> bool {
        match self {
            RetryError::Exhausted { .. } => true,
            RetryError::Fatal(e) => e.is_transient(),
        }
    }
}
