//! Request pacing.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Spaces requests at least `min_interval` apart.
///
/// Callers reserve the next free slot and then sleep until it arrives, so
/// concurrent callers queue up behind each other instead of bursting.
/// Share one limiter (behind an `Arc`) between clients that draw on the
/// same quota.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter allowing one request per `min_interval`.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// The configured spacing.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for the next request slot.
    pub async fn acquire(&self) {
        let wait = self.reserve(Instant::now());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    /// Claim the first slot at or after `now`, returning how long to wait
    /// for it.
    fn reserve(&self, now: Instant) -> Duration {
        let mut next = self.next_slot.lock();
        let slot = next.map_or(now, |n| n.max(now));
        *next = Some(slot + self.min_interval);
        slot - now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        let now = Instant::now();
        assert_eq!(limiter.reserve(now), Duration::ZERO);
        assert_eq!(limiter.reserve(now), Duration::from_millis(100));
        assert_eq!(limiter.reserve(now), Duration::from_millis(200));

        let later = now + Duration::from_secs(5);
        assert_eq!(limiter.reserve(later), Duration::ZERO);
    }

    #[test]
    fn test_unlimited_never_waits() {
        let limiter = RateLimiter::unlimited();
        let now = Instant::now();
        for _ in 0..5 {
            assert_eq!(limiter.reserve(now), Duration::ZERO);
        }
    }

    #[tokio::test]
    async fn test_acquire_waits() {
        let limiter = RateLimiter::new(Duration::from_millis(30));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
