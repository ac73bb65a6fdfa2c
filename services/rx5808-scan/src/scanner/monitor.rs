//! Single-frequency watch
//!
//! The monitor tunes once, takes a baseline reading, then polls single
//! (unaveraged) samples and yields an event whenever the level moves more than
//! the sensitivity away from the last reported value. Every failed read
//! yields an event carrying the error, scored as zero.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::report::RssiChangeEvent;
use crate::clock::Clock;
use crate::config::Config;
use crate::device::Receiver;
use crate::error::Result;
use crate::transport::Transport;

/// Watch parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    /// Minimum change, in percentage points, that produces an event
    pub sensitivity: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        MonitorSettings::from(&Config::default())
    }
}

impl From<&Config> for MonitorSettings {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            sensitivity: config.change_sensitivity,
        }
    }
}

/// Watches one frequency on a borrowed receiver
pub struct Monitor<'r, T: Transport, C: Clock> {
    receiver: &'r mut Receiver<T, C>,
    settings: MonitorSettings,
}

impl<'r, T: Transport, C: Clock> Monitor<'r, T, C> {
    pub fn new(receiver: &'r mut Receiver<T, C>, settings: MonitorSettings) -> Self {
        Self { receiver, settings }
    }

    /// Tune to `frequency` and start watching it.
    ///
    /// A zero `duration` watches until `cancel` fires. A failed tune is
    /// returned here and no watch is started.
    pub fn watch(
        self,
        frequency: u16,
        duration: Duration,
        cancel: CancellationToken,
    ) -> Result<Watch<'r, T, C>> {
        info!("Monitoring {} MHz...", frequency);
        self.receiver.tune(frequency)?;

        let (baseline, baseline_error) = read_or_zero(self.receiver, frequency);
        info!("{} MHz baseline RSSI {:.1}%", frequency, baseline);
        let started = self.receiver.clock().now();

        Ok(Watch {
            receiver: self.receiver,
            settings: self.settings,
            frequency,
            duration,
            cancel,
            started,
            baseline,
            baseline_error,
            last_reported: baseline,
            finished: false,
        })
    }
}

/// Live stream of RSSI changes on one frequency. Ends when the duration runs
/// out or the token is cancelled; cannot be restarted.
pub struct Watch<'r, T: Transport, C: Clock> {
    receiver: &'r mut Receiver<T, C>,
    settings: MonitorSettings,
    frequency: u16,
    duration: Duration,
    cancel: CancellationToken,
    started: Instant,
    baseline: f64,
    baseline_error: Option<String>,
    last_reported: f64,
    finished: bool,
}

impl<'r, T: Transport, C: Clock> Watch<'r, T, C> {
    pub fn frequency(&self) -> u16 {
        self.frequency
    }

    /// Reading taken right after tuning
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    /// Error of the baseline read, if it failed and was scored as zero
    pub fn baseline_error(&self) -> Option<&str> {
        self.baseline_error.as_deref()
    }

    pub fn last_reported(&self) -> f64 {
        self.last_reported
    }

    fn expired(&self) -> bool {
        if self.duration.is_zero() {
            return false;
        }
        self.receiver.clock().now().duration_since(self.started) > self.duration
    }

    fn finish(&mut self, reason: &str) {
        self.finished = true;
        info!("Monitoring {} MHz stopped: {}", self.frequency, reason);
    }
}

impl<'r, T: Transport, C: Clock> Iterator for Watch<'r, T, C> {
    type Item = RssiChangeEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }
            if self.cancel.is_cancelled() {
                self.finish("cancelled");
                return None;
            }
            if self.expired() {
                self.finish("duration elapsed");
                return None;
            }

            self.receiver.clock().sleep(self.settings.poll_interval);
            let (rssi, read_error) = read_or_zero(self.receiver, self.frequency);

            let changed = (rssi - self.last_reported).abs() > self.settings.sensitivity;
            if changed || read_error.is_some() {
                let clock = self.receiver.clock();
                let event = RssiChangeEvent {
                    frequency: self.frequency,
                    rssi,
                    previous: self.last_reported,
                    elapsed_ms: clock.now().duration_since(self.started).as_millis() as u64,
                    timestamp_ms: clock.timestamp_ms(),
                    read_error,
                };
                info!("{} MHz: RSSI = {:.1}%", self.frequency, rssi);
                self.last_reported = rssi;
                return Some(event);
            }
            debug!("{} MHz: RSSI {:.1}% (no change)", self.frequency, rssi);
        }
    }
}

/// Single read; a failed read counts as zero and hands back the error
fn read_or_zero<T: Transport, C: Clock>(
    receiver: &mut Receiver<T, C>,
    frequency: u16,
) -> (f64, Option<String>) {
    match receiver.read_rssi() {
        Ok(rssi) => (rssi, None),
        Err(e) => {
            warn!("RSSI read failed at {} MHz, counting as zero: {}", frequency, e);
            (0.0, Some(e.to_string()))
        }
    }
}
