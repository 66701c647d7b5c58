//! Time utilities for executor tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::resilience::Sleeper;

/// Sleeper that records every requested delay and returns immediately.
///
/// Clones share the same log, so a test keeps one handle and gives the other
/// to the executor.
///
/// # Examples
///
/// ```
/// # #[cfg(feature = "test-utils")]
/// # async fn demo() {
/// use std::time::Duration;
///
/// use wayfare_common::resilience::Sleeper;
/// use wayfare_common::testing::RecordingSleeper;
///
/// let sleeper = RecordingSleeper::new();
/// sleeper.sleep(Duration::from_millis(250)).await;
/// assert_eq!(sleeper.recorded(), vec![Duration::from_millis(250)]);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order
    pub fn recorded(&self) -> Vec<Duration> {
        self.delays.lock().map(|delays| delays.clone()).unwrap_or_default()
    }

    /// Sum of all recorded delays
    pub fn total(&self) -> Duration {
        self.recorded().iter().sum()
    }

    /// Forget every recorded delay
    pub fn clear(&self) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.clear();
        }
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(duration);
        }
        // Let other tasks run so concurrent calls still interleave.
        tokio::task::yield_now().await;
    }
}
