//! Poll backoff
//!
//! Both poll variants sleep `multiplier * 2^attempt` seconds between probes,
//! capped so a long-running job settles into a fixed cadence. The sequence
//! is monotonically non-decreasing up to the cap; a sleep is allowed to run
//! past the deadline because the next loop iteration detects the timeout.

use std::time::Duration;

/// Delay before the next poll probe.
///
/// `attempt` starts at 0 and increments every iteration. The doubling
/// saturates rather than overflowing for absurd attempt counts.
pub fn delay(attempt: u32, multiplier: u64, cap: Duration) -> Duration {
    let uncapped = multiplier.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
    Duration::from_secs(uncapped).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: Duration = Duration::from_secs(60);

    #[test]
    fn test_result_poll_sequence() {
        let secs: Vec<u64> = (0..8).map(|i| delay(i, 1, CAP).as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 16, 32, 60, 60]);
    }

    #[test]
    fn test_sentinel_poll_sequence() {
        let secs: Vec<u64> = (0..6).map(|i| delay(i, 5, CAP).as_secs()).collect();
        assert_eq!(secs, vec![5, 10, 20, 40, 60, 60]);
    }

    #[test]
    fn test_saturates_at_cap_for_large_attempts() {
        assert_eq!(delay(63, 1, CAP), CAP);
        assert_eq!(delay(64, 1, CAP), CAP);
        assert_eq!(delay(u32::MAX, 5, CAP), CAP);
    }
}
