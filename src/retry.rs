//! Retrying call executor with exponential backoff and jitter.
//!
//! ```text
//! delay(attempt) = min(base_delay * exponential_base^(attempt - 1), max_delay)
//! ```
//!
//! With jitter enabled the capped delay is scaled by a uniform factor in
//! `[0.5, 1.0]`, so the cap still holds after jitter.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::error::{ConfigError, RetryError, RetryResult};
use crate::policy::Classify;

type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync + 'static>;
type RetryObserver<E> = Arc<dyn Fn(u32, Duration, &E) + Send + Sync + 'static>;

/// Immutable retry configuration.
pub struct RetryPolicy<E> {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    exponential_base: f64,
    jitter: bool,
    retry_if: RetryPredicate<E>,
    on_retry: Option<RetryObserver<E>>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            exponential_base: self.exponential_base,
            jitter: self.jitter,
            retry_if: Arc::clone(&self.retry_if),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("exponential_base", &self.exponential_base)
            .field("jitter", &self.jitter)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl<E: Classify + 'static> RetryPolicy<E> {
    /// Creates a builder that retries failures classified as transient.
    pub fn builder() -> RetryPolicyBuilder<E> {
        RetryPolicyBuilder::new(E::is_transient)
    }

    /// Profile for the external provider API: more attempts, moderate base delay.
    pub fn provider_api() -> Self {
        Self::preset(5, Duration::from_secs(1), Duration::from_secs(60))
    }

    /// Profile for the internal datastore: fewer attempts, short base delay.
    pub fn datastore() -> Self {
        Self::preset(3, Duration::from_millis(100), Duration::from_secs(5))
    }

    fn preset(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            exponential_base: 2.0,
            jitter: true,
            retry_if: Arc::new(E::is_transient),
            on_retry: None,
        }
    }
}

impl<E> RetryPolicy<E> {
    /// Maximum number of invocations, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the first retry.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Upper bound on any single delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Growth factor between consecutive delays.
    pub fn exponential_base(&self) -> f64 {
        self.exponential_base
    }

    /// Whether delays are randomized.
    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Returns true if `error` should be retried.
    pub fn is_retryable(&self, error: &E) -> bool {
        (self.retry_if)(error)
    }

    /// Capped exponential delay after failed attempt `attempt` (1-based), before
    /// jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.base_delay.as_secs_f64() * self.exponential_base.powi(exponent);

        // Overflow (or infinity) saturates at the cap.
        Duration::try_from_secs_f64(scaled)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Delay actually slept after failed attempt `attempt`, jitter included.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.backoff_delay(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }

        let factor = rand::thread_rng().gen_range(0.5..=1.0);
        delay.mul_f64(factor).min(delay).max(delay / 2)
    }

    /// Classifies a failure and, if another attempt is due, returns how long to
    /// wait first. `attempt` counts retryable failures seen so far.
    fn after_failure(&self, attempt: &mut u32, error: E) -> Result<Duration, RetryError<E>> {
        if !self.is_retryable(&error) {
            tracing::debug!(attempt = *attempt + 1, "failure is not retryable");
            return Err(RetryError::Fatal(error));
        }

        *attempt += 1;
        if *attempt >= self.max_attempts {
            tracing::warn!(attempts = *attempt, "retry attempts exhausted");
            return Err(RetryError::Exhausted {
                attempts: *attempt,
                last_error: error,
            });
        }

        let delay = self.delay_for(*attempt);
        tracing::debug!(
            attempt = *attempt,
            max_attempts = self.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "retrying after transient failure"
        );

        if let Some(observer) = &self.on_retry {
            let attempt = *attempt;
            let notify = || observer(attempt, delay, &error);
            if panic::catch_unwind(AssertUnwindSafe(notify)).is_err() {
                tracing::warn!(attempt, "on_retry observer panicked; ignoring");
            }
        }

        Ok(delay)
    }
}

/// Builder for [`RetryPolicy`].
pub struct RetryPolicyBuilder<E> {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    exponential_base: f64,
    jitter: bool,
    retry_if: RetryPredicate<E>,
    on_retry: Option<RetryObserver<E>>,
}

impl<E> RetryPolicyBuilder<E> {
    /// Creates a builder with default settings and the given retry predicate.
    ///
    /// Defaults: 3 attempts, 1 s base delay, 60 s cap, base 2, jitter on.
    pub fn new<P>(retry_if: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter: true,
            retry_if: Arc::new(retry_if),
            on_retry: None,
        }
    }

    /// Sets the maximum number of invocations, the first one included.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the upper bound on any single delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the growth factor between consecutive delays.
    pub fn exponential_base(mut self, base: f64) -> Self {
        self.exponential_base = base;
        self
    }

    /// Enables or disables jitter.
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Replaces the retry predicate.
    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Arc::new(predicate);
        self
    }

    /// Sets an observer called with `(attempt, delay, error)` before each sleep.
    pub fn on_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(u32, Duration, &E) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    /// Validates the settings and builds the policy.
    pub fn build(self) -> Result<RetryPolicy<E>, ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if !self.exponential_base.is_finite() || self.exponential_base <= 1.0 {
            return Err(ConfigError::InvalidExponentialBase(self.exponential_base));
        }

        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            exponential_base: self.exponential_base,
            jitter: self.jitter,
            retry_if: self.retry_if,
            on_retry: self.on_retry,
        })
    }
}

/// Runs operations under a [`RetryPolicy`]. Holds no state between calls.
pub struct RetryExecutor<E> {
    policy: RetryPolicy<E>,
}

/// Creates an executor for `policy`.
pub fn retry<E>(policy: RetryPolicy<E>) -> RetryExecutor<E> {
    RetryExecutor::new(policy)
}

impl<E> Clone for RetryExecutor<E> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryExecutor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .finish()
    }
}

impl<E> RetryExecutor<E> {
    /// Creates an executor for `policy`.
    pub fn new(policy: RetryPolicy<E>) -> Self {
        Self { policy }
    }

    /// The policy this executor applies.
    pub fn policy(&self) -> &RetryPolicy<E> {
        &self.policy
    }

    /// Invokes `operation` until it succeeds, fails fatally, or runs out of
    /// attempts, blocking the current thread between attempts.
    pub fn call<T, F>(&self, mut operation: F) -> RetryResult<T, E>
    where
        F: FnMut() -> Result<T, E>,
    {
        let mut attempt = 0;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let delay = self.policy.after_failure(&mut attempt, error)?;
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
            }
        }
    }
}

#[cfg(feature = "async")]
impl<E> RetryExecutor<E> {
    /// Async variant of [`RetryExecutor::call`]; waits with `tokio::time::sleep`.
    pub async fn call_async<T, F, Fut>(&self, mut operation: F) -> RetryResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let delay = self.policy.after_failure(&mut attempt, error)?;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
