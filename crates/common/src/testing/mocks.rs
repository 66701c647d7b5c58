//! Mock operations for exercising the call executor.
//!
//! Provides scripted operations whose results are fixed up front.

// Allow missing panics docs for test mocks - an empty script is a test bug
#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use std::collections::VecDeque;
use std::future::{ready, Ready};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// One scripted attempt result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T, E> {
    /// Return this value
    Succeed(T),
    /// Return this error
    Fail(E),
}

impl<T, E> From<Step<T, E>> for Result<T, E> {
    fn from(step: Step<T, E>) -> Self {
        match step {
            Step::Succeed(value) => Ok(value),
            Step::Fail(error) => Err(error),
        }
    }
}

#[derive(Debug)]
struct Script<T, E> {
    pending: VecDeque<Step<T, E>>,
    last: Option<Step<T, E>>,
}

/// Operation that replays a fixed sequence of results.
///
/// Once the script runs out the final step repeats forever, so a single
/// `Fail` step models an operation that never recovers. Clones share the
/// script and the invocation counter.
///
/// # Examples
///
/// ```
/// # #[cfg(feature = "test-utils")]
/// # async fn demo() {
/// use wayfare_common::testing::ScriptedOperation;
///
/// let op = ScriptedOperation::fail_then_succeed(["down", "down"], 42);
/// assert_eq!(op.next().await, Err("down"));
/// assert_eq!(op.next().await, Err("down"));
/// assert_eq!(op.next().await, Ok(42));
/// assert_eq!(op.invocations(), 3);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedOperation<T, E> {
    script: Arc<Mutex<Script<T, E>>>,
    invocations: Arc<AtomicU32>,
}

impl<T: Clone, E: Clone> ScriptedOperation<T, E> {
    /// Play `steps` in order, repeating the last one
    pub fn new(steps: impl IntoIterator<Item = Step<T, E>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                pending: steps.into_iter().collect(),
                last: None,
            })),
            invocations: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Fails with `error` on every invocation
    pub fn failing(error: E) -> Self {
        Self::new([Step::Fail(error)])
    }

    /// Fails once per given error, then succeeds with `value` from then on
    pub fn fail_then_succeed(errors: impl IntoIterator<Item = E>, value: T) -> Self {
        Self::new(errors.into_iter().map(Step::Fail).chain([Step::Succeed(value)]))
    }

    /// Produce the next scripted result.
    pub fn next(&self) -> Ready<Result<T, E>> {
        self.invocations.fetch_add(1, Ordering::SeqCst);

        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        let step = match script.pending.pop_front() {
            Some(step) => {
                script.last = Some(step.clone());
                step
            }
            None => script.last.clone().expect("ScriptedOperation needs at least one step"),
        };

        ready(step.into())
    }

    /// Number of times [`next`](Self::next) has been called
    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }
}
