//! Time source for bus settling, sampling and polling delays
//!
//! Every delay in the core goes through [`Clock`], so tests can swap in
//! [`ManualClock`] and run a full sweep without real sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time, sleeping, and wall-clock timestamps
pub trait Clock {
    /// Current monotonic instant
    fn now(&self) -> Instant;

    /// Block for the given duration
    fn sleep(&self, duration: Duration);

    /// Wall-clock time in Unix milliseconds
    fn timestamp_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }

    fn timestamp_ms(&self) -> u64 {
        (**self).timestamp_ms()
    }
}

/// Real time: `Instant::now`, `thread::sleep` and `chrono::Utc`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }

    fn timestamp_ms(&self) -> u64 {
        chrono::Utc::now().timestamp_millis() as u64
    }
}

/// Clock that only advances when slept on or explicitly advanced
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    origin_ms: u64,
    offset_nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            origin_ms: chrono::Utc::now().timestamp_millis() as u64,
            offset_nanos: AtomicU64::new(0),
        }
    }

    /// Time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }

    pub fn advance(&self, duration: Duration) {
        self.offset_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }

    fn timestamp_ms(&self) -> u64 {
        self.origin_ms + self.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances_on_sleep() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.sleep(Duration::from_millis(250));
        assert_eq!(clock.now() - start, Duration::from_millis(250));
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
    }

    #[test]
    fn test_manual_clock_wall_time_tracks_offset() {
        let clock = Arc::new(ManualClock::new());
        let t0 = clock.timestamp_ms();
        clock.sleep(Duration::from_secs(2));
        assert_eq!(clock.timestamp_ms() - t0, 2000);
    }
}
