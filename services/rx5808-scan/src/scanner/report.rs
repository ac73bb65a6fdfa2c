//! Scan results and the reporting sink
//!
//! The scanner never prints. Every step, every finished sweep and every
//! monitor change goes to a [`ScanObserver`], and the caller decides how to
//! render it.

use crossbeam_channel::{Sender, TrySendError};
use serde::Serialize;
use tracing::{debug, warn};

/// A frequency whose averaged RSSI exceeded the detection threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub frequency: u16,
    pub rssi: f64,
    pub timestamp_ms: u64,
}

/// Outcome of one sweep step, reported whether or not it was a signal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub frequency: u16,
    pub rssi: f64,
    pub classified_as_signal: bool,
    pub samples: u32,
    pub failed_samples: u32,
    /// Set when tuning failed and the step was scored as zero
    pub tune_error: Option<String>,
}

/// Totals for one pass over a range
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepSummary {
    pub start: u16,
    pub end: u16,
    pub steps: u32,
    pub tune_failures: u32,
    pub failed_samples: u32,
    /// False when the sweep was cancelled before reaching `end`
    pub completed: bool,
    pub elapsed_ms: u64,
    pub detections: Vec<Detection>,
}

/// RSSI moved by more than the sensitivity on a monitored frequency, or the
/// read failed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RssiChangeEvent {
    pub frequency: u16,
    /// Zero when the read failed
    pub rssi: f64,
    pub previous: f64,
    /// Time since the watch started
    pub elapsed_ms: u64,
    pub timestamp_ms: u64,
    /// Set when the RSSI read failed; emitted regardless of sensitivity
    pub read_error: Option<String>,
}

/// Everything the core reports, as one message type for channels
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    Step(StepReport),
    Sweep(SweepSummary),
    Change(RssiChangeEvent),
}

impl ScanEvent {
    /// Tag used in logs and as the JSON `event` field
    pub fn kind(&self) -> &'static str {
        match self {
            ScanEvent::Step(_) => "step",
            ScanEvent::Sweep(_) => "sweep",
            ScanEvent::Change(_) => "change",
        }
    }
}

/// Receives scan progress
pub trait ScanObserver {
    fn on_step(&mut self, step: &StepReport);

    fn on_sweep(&mut self, _summary: &SweepSummary) {}
}

/// Discards everything
impl ScanObserver for () {
    fn on_step(&mut self, _step: &StepReport) {}
}

/// Forwards events over a bounded channel without ever blocking the bus loop
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: Sender<ScanEvent>,
}

impl ChannelObserver {
    pub fn new(tx: Sender<ScanEvent>) -> Self {
        Self { tx }
    }

    /// Send an event without blocking. Returns false if it was dropped
    /// because the channel is full or closed.
    pub fn forward(&self, event: ScanEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!("Scan event channel full, dropping {} event", event.kind());
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Scan event channel closed");
                false
            }
        }
    }
}

impl ScanObserver for ChannelObserver {
    fn on_step(&mut self, step: &StepReport) {
        self.forward(ScanEvent::Step(step.clone()));
    }

    fn on_sweep(&mut self, summary: &SweepSummary) {
        self.forward(ScanEvent::Sweep(summary.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    fn step(frequency: u16) -> StepReport {
        StepReport {
            frequency,
            rssi: 0.0,
            classified_as_signal: false,
            samples: 10,
            failed_samples: 0,
            tune_error: None,
        }
    }

    #[test]
    fn test_channel_observer_forwards() {
        let (tx, rx) = bounded(4);
        let mut observer = ChannelObserver::new(tx);
        observer.on_step(&step(5800));
        assert_eq!(rx.try_recv().unwrap(), ScanEvent::Step(step(5800)));
    }

    #[test]
    fn test_channel_observer_drops_when_full() {
        let (tx, rx) = bounded(1);
        let observer = ChannelObserver::new(tx);
        assert!(observer.forward(ScanEvent::Step(step(5800))));
        assert!(!observer.forward(ScanEvent::Step(step(5801))));
        assert_eq!(rx.len(), 1);
        assert_eq!(rx.try_recv().unwrap(), ScanEvent::Step(step(5800)));

        drop(rx);
        assert!(!observer.forward(ScanEvent::Step(step(5802))));
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(ScanEvent::Step(step(5800))).unwrap();
        assert_eq!(json["event"], "step");
        assert_eq!(json["frequency"], 5800);
        assert_eq!(json["classified_as_signal"], false);

        let event = ScanEvent::Change(RssiChangeEvent {
            frequency: 5800,
            rssi: 0.0,
            previous: 60.0,
            elapsed_ms: 100,
            timestamp_ms: 0,
            read_error: Some("bus error: RSSI input not responding".to_string()),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], event.kind());
        assert_eq!(json["read_error"], "bus error: RSSI input not responding");
    }
}
