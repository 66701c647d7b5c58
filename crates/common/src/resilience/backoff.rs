//! Capped exponential backoff.
//!
//! `delay = min(base_delay * 2^attempt_index, max_delay)` with a zero-based
//! index: the first retry waits `base_delay`. The computation is done in
//! 128-bit nanoseconds so large indices saturate to `max_delay` instead of
//! overflowing. No jitter is applied.

use std::time::Duration;

use super::policy::RetryPolicy;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Delay to wait before the retry that follows a failure at
/// `attempt_index` (zero-based).
pub fn delay_for(attempt_index: u32, policy: &RetryPolicy) -> Duration {
    capped_exponential(policy.base_delay(), policy.max_delay(), attempt_index)
}

fn capped_exponential(base: Duration, cap: Duration, attempt_index: u32) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }

    let cap_nanos = cap.as_nanos();
    let scaled = 1u128
        .checked_shl(attempt_index)
        .and_then(|multiplier| base.as_nanos().checked_mul(multiplier));

    match scaled {
        Some(nanos) if nanos < cap_nanos => from_nanos(nanos),
        _ => cap,
    }
}

fn from_nanos(nanos: u128) -> Duration {
    // Callers pass values below a valid Duration's nanosecond count, so the
    // seconds always fit in u64.
    let secs = (nanos / NANOS_PER_SEC) as u64;
    let subsec = (nanos % NANOS_PER_SEC) as u32;
    Duration::new(secs, subsec)
}

/// Iterator over the backoff delays a policy produces, one per retry.
///
/// Yields `max_attempts - 1` values; a policy with a single attempt never
/// sleeps.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    policy: RetryPolicy,
    next_index: u32,
}

impl BackoffSchedule {
    pub(crate) fn new(policy: RetryPolicy) -> Self {
        Self { policy, next_index: 0 }
    }
}

impl Iterator for BackoffSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let retries = self.policy.max_attempts().saturating_sub(1);
        if self.next_index >= retries {
            return None;
        }
        let delay = delay_for(self.next_index, &self.policy);
        self.next_index += 1;
        Some(delay)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining =
            self.policy.max_attempts().saturating_sub(1).saturating_sub(self.next_index) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BackoffSchedule {}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base_ms: u64, max_ms: u64, attempts: u32) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(attempts)
            .base_delay(Duration::from_millis(base_ms))
            .max_delay(Duration::from_millis(max_ms))
            .build()
            .expect("valid policy")
    }

    #[test]
    fn doubles_from_base_delay() {
        let p = policy(1000, 30_000, 5);
        assert_eq!(delay_for(0, &p), Duration::from_millis(1000));
        assert_eq!(delay_for(1, &p), Duration::from_millis(2000));
        assert_eq!(delay_for(2, &p), Duration::from_millis(4000));
        assert_eq!(delay_for(3, &p), Duration::from_millis(8000));
        assert_eq!(delay_for(4, &p), Duration::from_millis(16_000));
    }

    #[test]
    fn caps_at_max_delay() {
        let p = policy(1000, 10_000, 8);
        assert_eq!(delay_for(3, &p), Duration::from_millis(8000));
        assert_eq!(delay_for(4, &p), Duration::from_millis(10_000));
        assert_eq!(delay_for(12, &p), Duration::from_millis(10_000));
    }

    #[test]
    fn matches_formula_and_is_monotonic() {
        let p = policy(250, 45_000, 20);
        let mut previous = Duration::ZERO;
        for index in 0..20u32 {
            let expected = Duration::from_millis(250)
                .saturating_mul(2u32.pow(index))
                .min(Duration::from_millis(45_000));
            let delay = delay_for(index, &p);
            assert_eq!(delay, expected, "attempt index {index}");
            assert!(delay >= previous, "delay must not decrease at index {index}");
            previous = delay;
        }
    }

    #[test]
    fn huge_indices_saturate_to_cap() {
        let p = policy(1, 3_600_000, 3);
        assert_eq!(delay_for(64, &p), Duration::from_secs(3600));
        assert_eq!(delay_for(127, &p), Duration::from_secs(3600));
        assert_eq!(delay_for(u32::MAX, &p), Duration::from_secs(3600));
    }

    #[test]
    fn zero_base_never_sleeps() {
        let p = policy(0, 1000, 4);
        assert_eq!(delay_for(0, &p), Duration::ZERO);
        assert_eq!(delay_for(40, &p), Duration::ZERO);
    }

    #[test]
    fn schedule_yields_one_delay_per_retry() {
        let p = policy(1000, 30_000, 3);
        let delays: Vec<_> = p.schedule().collect();
        assert_eq!(delays, vec![Duration::from_millis(1000), Duration::from_millis(2000)]);
        assert_eq!(p.schedule().len(), 2);

        let single = policy(1000, 30_000, 1);
        assert_eq!(single.schedule().next(), None);
    }
}
