//! Range sweeps and continuous scanning
//!
//! A sweep tunes every step of a range, averages the RSSI, and records a
//! detection when the average is above the threshold. A bad tune scores the
//! step as zero and the sweep carries on; cancellation is checked before each
//! step, so a sweep stops within one step of the token being cancelled.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::report::{Detection, ScanObserver, StepReport, SweepSummary};
use crate::clock::Clock;
use crate::config::Config;
use crate::device::Receiver;
use crate::error::{Error, Result};
use crate::rx5808::RssiReading;
use crate::transport::Transport;

/// Sweep parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSettings {
    pub step_mhz: u16,
    /// Detection threshold in percent (strictly greater than)
    pub threshold: f64,
    pub sample_count: u32,
    pub sweep_pause: Duration,
    /// Granularity at which the pause between sweeps checks for cancellation
    pub poll_interval: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        ScanSettings::from(&Config::default())
    }
}

impl From<&Config> for ScanSettings {
    fn from(config: &Config) -> Self {
        Self {
            step_mhz: config.step_mhz,
            threshold: config.rssi_threshold,
            sample_count: config.sample_count,
            sweep_pause: config.sweep_pause,
            poll_interval: config.poll_interval,
        }
    }
}

/// Frequency scanner borrowing a receiver for the duration of a run
pub struct Scanner<'r, T: Transport, C: Clock> {
    receiver: &'r mut Receiver<T, C>,
    settings: ScanSettings,
}

impl<'r, T: Transport, C: Clock> Scanner<'r, T, C> {
    pub fn new(receiver: &'r mut Receiver<T, C>, settings: ScanSettings) -> Self {
        Self { receiver, settings }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Sweep `start..=end` in `step` MHz increments and return the detections,
    /// in ascending frequency order.
    ///
    /// Cancellation is not an error: the detections found so far are returned.
    pub fn scan_range(
        &mut self,
        start: u16,
        end: u16,
        step: u16,
        cancel: &CancellationToken,
        observer: &mut dyn ScanObserver,
    ) -> Result<Vec<Detection>> {
        self.sweep(start, end, step, cancel, observer)
            .map(|summary| summary.detections)
    }

    /// Like [`Scanner::scan_range`], returning the full summary
    pub fn sweep(
        &mut self,
        start: u16,
        end: u16,
        step: u16,
        cancel: &CancellationToken,
        observer: &mut dyn ScanObserver,
    ) -> Result<SweepSummary> {
        let band = self.receiver.band();
        band.check(start)?;
        band.check(end)?;
        if start > end || step == 0 {
            return Err(Error::InvalidRange { start, end, step });
        }

        info!("Scanning {}-{} MHz (step {} MHz)...", start, end, step);
        let started = self.receiver.clock().now();
        let mut summary = SweepSummary {
            start,
            end,
            steps: 0,
            tune_failures: 0,
            failed_samples: 0,
            completed: true,
            elapsed_ms: 0,
            detections: Vec::new(),
        };

        let mut frequency = start as u32;
        while frequency <= end as u32 {
            if cancel.is_cancelled() {
                info!("Sweep cancelled before {} MHz", frequency);
                summary.completed = false;
                break;
            }

            let report = self.step(frequency as u16);
            if report.tune_error.is_some() {
                summary.tune_failures += 1;
            }
            summary.failed_samples += report.failed_samples;
            summary.steps += 1;

            if report.classified_as_signal {
                summary.detections.push(Detection {
                    frequency: report.frequency,
                    rssi: report.rssi,
                    timestamp_ms: self.receiver.clock().timestamp_ms(),
                });
            }
            observer.on_step(&report);

            frequency += step as u32;
        }

        summary.elapsed_ms = self.receiver.clock().now().duration_since(started).as_millis() as u64;
        if summary.completed {
            self.receiver.stats().record_sweep();
        }
        info!(
            "Sweep {}-{} MHz done: {} steps, {} signals, {} tune failures",
            start,
            end,
            summary.steps,
            summary.detections.len(),
            summary.tune_failures
        );
        observer.on_sweep(&summary);
        Ok(summary)
    }

    /// Tune, sample and classify one frequency
    fn step(&mut self, frequency: u16) -> StepReport {
        let (reading, tune_error) = match self.receiver.tune(frequency) {
            Ok(()) => (self.receiver.sample_average(self.settings.sample_count), None),
            Err(e) => {
                warn!("Tune failed at {} MHz, scoring step as zero: {}", frequency, e);
                let reading = RssiReading {
                    frequency,
                    rssi: 0.0,
                    samples: 0,
                    failed: 0,
                };
                (reading, Some(e.to_string()))
            }
        };

        let classified_as_signal = reading.rssi > self.settings.threshold;
        if classified_as_signal {
            self.receiver.stats().record_detection();
            info!("SIGNAL DETECTED: {} MHz, RSSI {:.1}%", frequency, reading.rssi);
        } else {
            debug!("{} MHz: RSSI {:.1}%", frequency, reading.rssi);
        }

        StepReport {
            frequency,
            rssi: reading.rssi,
            classified_as_signal,
            samples: reading.samples,
            failed_samples: reading.failed,
            tune_error,
        }
    }

    /// Sweep the whole band over and over until cancelled.
    ///
    /// Each sweep is reported through `observer.on_sweep`; nothing carries
    /// over between sweeps. Returns the number of completed sweeps.
    pub fn continuous(
        &mut self,
        cancel: &CancellationToken,
        observer: &mut dyn ScanObserver,
    ) -> Result<u64> {
        info!("Continuous scanning until cancelled...");
        let band = self.receiver.band();
        let mut completed = 0u64;

        while !cancel.is_cancelled() {
            let summary = self.sweep(band.min, band.max, self.settings.step_mhz, cancel, observer)?;
            if !summary.completed {
                break;
            }
            completed += 1;

            if !summary.detections.is_empty() {
                info!("Sweep {}: {} signals", completed, summary.detections.len());
                for detection in &summary.detections {
                    info!("   {} MHz: {:.1}%", detection.frequency, detection.rssi);
                }
            }

            self.pause(cancel);
        }

        info!("Continuous scanning stopped after {} sweeps", completed);
        Ok(completed)
    }

    /// Wait out the inter-sweep pause in poll-sized slices
    fn pause(&self, cancel: &CancellationToken) {
        let clock = self.receiver.clock();
        let until = clock.now() + self.settings.sweep_pause;
        debug!("Pausing {:?} before next sweep", self.settings.sweep_pause);
        while !cancel.is_cancelled() {
            let now = clock.now();
            if now >= until {
                break;
            }
            let slice = (until - now).min(self.settings.poll_interval.max(Duration::from_millis(1)));
            clock.sleep(slice);
        }
    }

    /// Tune once and take a single RSSI reading
    pub fn probe(&mut self, frequency: u16) -> Result<RssiReading> {
        self.receiver.tune(frequency)?;
        let reading = self.receiver.sample_average(1);
        info!("Probe {} MHz: RSSI {:.1}%", frequency, reading.rssi);
        Ok(reading)
    }
}
