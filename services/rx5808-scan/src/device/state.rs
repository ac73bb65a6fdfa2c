//! Live receiver counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for one receiver, shared with the reporting loop
#[derive(Debug, Default)]
pub struct ReceiverStats {
    pub tunes: AtomicU64,
    pub tune_failures: AtomicU64,
    pub samples: AtomicU64,
    pub failed_samples: AtomicU64,
    pub detections: AtomicU64,
    pub sweeps: AtomicU64,
}

impl ReceiverStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_tune(&self, ok: bool) {
        self.tunes.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.tune_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_samples(&self, samples: u32, failed: u32) {
        self.samples.fetch_add(samples as u64, Ordering::Relaxed);
        self.failed_samples.fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub fn record_detection(&self) {
        self.detections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sweep(&self) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            tunes: self.tunes.load(Ordering::Relaxed),
            tune_failures: self.tune_failures.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
            failed_samples: self.failed_samples.load(Ordering::Relaxed),
            detections: self.detections.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ReceiverStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatsSnapshot {
    pub tunes: u64,
    pub tune_failures: u64,
    pub samples: u64,
    pub failed_samples: u64,
    pub detections: u64,
    pub sweeps: u64,
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Sweeps: {} | Tunes: {} (failed: {}) | Samples: {} (failed: {}) | Detections: {}",
            self.sweeps, self.tunes, self.tune_failures, self.samples, self.failed_samples, self.detections
        )
    }
}
