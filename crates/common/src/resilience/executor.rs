//! Generic call executor: bounded attempts, per-attempt timeout, classified
//! retries and capped exponential backoff.
//!
//! The executor never wraps the caller's error. Whatever the operation (or
//! the timeout conversion) produced on the final attempt is returned as-is.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::classify::{Classification, ErrorClassifier};
use super::error::AttemptTimeout;
use super::policy::RetryPolicy;
use super::sleep::{Sleeper, TokioSleeper};

/// Handle passed to the operation on every attempt.
///
/// Each attempt gets a fresh cancellation token. The token is cancelled when
/// the attempt's deadline elapses, so work spawned by the attempt (blocking
/// tasks, streaming bodies) can stop early.
#[derive(Debug, Clone)]
pub struct Attempt {
    number: u32,
    cancel: CancellationToken,
}

impl Attempt {
    /// Create attempt `number` (1-based) with a fresh token
    pub fn new(number: u32) -> Self {
        Self { number, cancel: CancellationToken::new() }
    }

    /// One-based attempt number
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Whether this is any attempt after the first
    pub fn is_retry(&self) -> bool {
        self.number > 1
    }

    /// Token cancelled when this attempt's deadline passes
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the attempt has been abandoned
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once this attempt has been abandoned.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

/// Result of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome<T, E> {
    /// The attempt produced a value
    Success(T),
    /// The attempt failed with the given verdict
    Failure {
        /// Error returned by the operation
        error: E,
        /// Verdict the classifier gave it
        classification: Classification,
    },
}

impl<T, E> AttemptOutcome<T, E> {
    /// Whether the attempt produced a value
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Drop the classification and keep the result
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure { error, .. } => Err(error),
        }
    }
}

/// Outcome of a whole call including summary statistics.
#[derive(Debug)]
pub struct CallOutcome<T, E> {
    /// The value, or the last error observed
    pub result: Result<T, E>,
    /// Attempts actually made, the first try included.
    pub attempts: u32,
    /// Sum of backoff delays slept between attempts.
    pub total_delay: Duration,
    /// Each backoff delay, in order.
    pub delays: Vec<Duration>,
}

impl<T, E> CallOutcome<T, E> {
    fn finish(result: Result<T, E>, attempts: u32, delays: Vec<Duration>) -> Self {
        let total_delay = delays.iter().sum();
        Self { result, attempts, total_delay, delays }
    }

    /// Consume the outcome and return only the result.
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }

    /// Whether more than one attempt was made
    pub fn retried(&self) -> bool {
        self.attempts > 1
    }

    /// Get the average delay between attempts (excludes operation execution
    /// time).
    pub fn average_delay(&self) -> Duration {
        if self.delays.is_empty() {
            return Duration::ZERO;
        }
        self.total_delay / self.delays.len() as u32
    }
}

/// Runs operations under a [`RetryPolicy`] with a failure classifier.
///
/// Executors hold no per-call state; one instance can serve any number of
/// concurrent calls.
pub struct CallExecutor<C> {
    policy: RetryPolicy,
    classifier: C,
    sleeper: Arc<dyn Sleeper>,
}

impl<C: Clone> Clone for CallExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy,
            classifier: self.classifier.clone(),
            sleeper: Arc::clone(&self.sleeper),
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for CallExecutor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallExecutor")
            .field("policy", &self.policy)
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}

impl<C> CallExecutor<C> {
    /// Executor that sleeps on the tokio timer
    pub fn new(policy: RetryPolicy, classifier: C) -> Self {
        Self { policy, classifier, sleeper: Arc::new(TokioSleeper) }
    }

    /// Replace the sleep capability (tests inject a recorder here).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Same classifier and sleeper, different policy.
    pub fn with_policy(&self, policy: RetryPolicy) -> Self
    where
        C: Clone,
    {
        Self { policy, classifier: self.classifier.clone(), sleeper: Arc::clone(&self.sleeper) }
    }

    /// Policy applied to every call
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Classifier applied to every failure
    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Execute an operation and return its final result.
    #[instrument(skip(self, operation), fields(max_attempts = self.policy.max_attempts()))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        C: ErrorClassifier<E>,
        E: From<AttemptTimeout> + fmt::Display,
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_outcome(operation).await.into_result()
    }

    /// Execute an operation and return the result together with attempt and
    /// delay statistics.
    pub async fn execute_with_outcome<F, Fut, T, E>(&self, mut operation: F) -> CallOutcome<T, E>
    where
        C: ErrorClassifier<E>,
        E: From<AttemptTimeout> + fmt::Display,
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.policy.max_attempts();
        let mut delays = Vec::new();
        let mut number = 1;

        loop {
            debug!("Executing operation (attempt {}/{})", number, max_attempts);

            match self.run_attempt(number, &mut operation).await {
                AttemptOutcome::Success(value) => {
                    if number > 1 {
                        debug!("Operation succeeded after {} retries", number - 1);
                    }
                    return CallOutcome::finish(Ok(value), number, delays);
                }
                AttemptOutcome::Failure { error, classification: Classification::Permanent } => {
                    debug!(attempt = number, error = %error, "Permanent failure, not retrying");
                    return CallOutcome::finish(Err(error), number, delays);
                }
                AttemptOutcome::Failure { error, classification: Classification::Retryable } => {
                    if number >= max_attempts {
                        warn!(
                            attempts = number,
                            error = %error,
                            "All retry attempts exhausted"
                        );
                        return CallOutcome::finish(Err(error), number, delays);
                    }

                    let delay = self.policy.delay_for(number - 1);
                    warn!(
                        attempt = number,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "Operation failed, retrying"
                    );
                    self.sleeper.sleep(delay).await;
                    delays.push(delay);
                    number += 1;
                }
            }
        }
    }

    async fn run_attempt<F, Fut, T, E>(
        &self,
        number: u32,
        operation: &mut F,
    ) -> AttemptOutcome<T, E>
    where
        C: ErrorClassifier<E>,
        E: From<AttemptTimeout>,
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempt = Attempt::new(number);
        let cancel = attempt.cancel.clone();

        let result = match self.policy.per_attempt_timeout() {
            Some(timeout) => match tokio::time::timeout(timeout, operation(attempt)).await {
                Ok(result) => result,
                Err(_) => {
                    cancel.cancel();
                    Err(E::from(AttemptTimeout { attempt: number, timeout }))
                }
            },
            None => operation(attempt).await,
        };

        match result {
            Ok(value) => AttemptOutcome::Success(value),
            Err(error) => {
                let classification = self.classifier.classify(&error);
                AttemptOutcome::Failure { error, classification }
            }
        }
    }
}

/// Execute `operation` under `policy` with a one-off executor.
pub async fn execute<C, F, Fut, T, E>(
    policy: RetryPolicy,
    classifier: C,
    operation: F,
) -> Result<T, E>
where
    C: ErrorClassifier<E>,
    E: From<AttemptTimeout> + fmt::Display,
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    CallExecutor::new(policy, classifier).execute(operation).await
}
