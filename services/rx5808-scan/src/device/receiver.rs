//! Receiver handle - owns the bus for the lifetime of the process

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Error, Result, TransportError};
use crate::rx5808::{Band, RssiReading, RssiSampler, Tuner};
use crate::transport::Transport;

use super::state::ReceiverStats;

/// An RX5808 behind a transport, with tuner, sampler and counters.
///
/// Dropping the handle deselects the chip and releases the transport, whether
/// the run loop finished, was cancelled, or bailed out with an error.
pub struct Receiver<T: Transport, C: Clock> {
    transport: T,
    clock: C,
    tuner: Tuner,
    sampler: RssiSampler,
    stats: Arc<ReceiverStats>,
    tuned: Option<u16>,
}

impl<T: Transport, C: Clock> Receiver<T, C> {
    /// Build a receiver from a validated configuration
    pub fn new(transport: T, clock: C, config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(
            transport,
            clock,
            Tuner::new(config.band, config.tuner_timing()),
            RssiSampler::new(config.rssi_input, config.sampler_timing()),
        ))
    }

    pub fn from_parts(transport: T, clock: C, tuner: Tuner, sampler: RssiSampler) -> Self {
        info!(
            "Receiver ready: band {}-{} MHz, RSSI input {:?}",
            tuner.band().min,
            tuner.band().max,
            sampler.input()
        );
        Self {
            transport,
            clock,
            tuner,
            sampler,
            stats: ReceiverStats::new(),
            tuned: None,
        }
    }

    /// Tune to `frequency` (MHz). The tuned frequency is forgotten on failure.
    pub fn tune(&mut self, frequency: u16) -> Result<()> {
        let result = self.tuner.tune(&mut self.transport, &self.clock, frequency);
        // Rejected frequencies never reach the bus, so they are not counted
        if !matches!(result, Err(Error::InvalidFrequency { .. })) {
            self.stats.record_tune(result.is_ok());
        }
        self.tuned = result.as_ref().ok().map(|_| frequency);
        result
    }

    /// Averaged RSSI at the tuned frequency.
    ///
    /// Without a successful tune the reading is labelled frequency 0, which
    /// lies outside every valid band, so it cannot be mistaken for a channel.
    pub fn sample_average(&mut self, count: u32) -> RssiReading {
        let frequency = self.tuned.unwrap_or(0);
        let reading = self
            .sampler
            .sample_average(&mut self.transport, &self.clock, frequency, count);
        self.stats.record_samples(reading.samples, reading.failed);
        reading
    }

    /// Single RSSI read in percent
    pub fn read_rssi(&mut self) -> std::result::Result<f64, TransportError> {
        let result = self.sampler.read_percent(&mut self.transport);
        self.stats.record_samples(1, result.is_err() as u32);
        result
    }

    pub fn band(&self) -> Band {
        self.tuner.band()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn stats(&self) -> &Arc<ReceiverStats> {
        &self.stats
    }

    pub fn tuned_frequency(&self) -> Option<u16> {
        self.tuned
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

impl<T: Transport, C: Clock> Drop for Receiver<T, C> {
    fn drop(&mut self) {
        debug!("Releasing RX5808 transport");
        if let Err(e) = self.transport.deassert_select() {
            warn!("Failed to deselect RX5808 on shutdown: {}", e);
        }
        if let Err(e) = self.transport.release() {
            warn!("Failed to release transport: {}", e);
        }
        info!("Receiver released. {}", self.stats.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::transport::{BusOp, Emitter, SimulatedTransport};

    type SimReceiver = Receiver<SimulatedTransport<Arc<ManualClock>>, Arc<ManualClock>>;

    fn receiver(emitters: Vec<Emitter>) -> SimReceiver {
        let clock = Arc::new(ManualClock::new());
        let sim = SimulatedTransport::with_clock(emitters, clock.clone());
        Receiver::new(sim, clock, &Config::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let clock = Arc::new(ManualClock::new());
        let sim = SimulatedTransport::with_clock(vec![], clock.clone());
        let config = Config {
            step_mhz: 0,
            ..Config::default()
        };
        assert!(matches!(
            Receiver::new(sim, clock, &config),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_tune_and_sample() {
        let mut rx = receiver(vec![Emitter::new(5800, 100.0)]);
        rx.tune(5800).unwrap();
        assert_eq!(rx.tuned_frequency(), Some(5800));

        let reading = rx.sample_average(10);
        assert_eq!(reading.frequency, 5800);
        assert_eq!(reading.rssi, 100.0);

        let snap = rx.stats().snapshot();
        assert_eq!(snap.tunes, 1);
        assert_eq!(snap.samples, 10);
    }

    #[test]
    fn test_untuned_reading_labelled_zero() {
        let mut rx = receiver(vec![Emitter::new(5800, 100.0)]);
        let reading = rx.sample_average(3);
        assert_eq!(reading.frequency, 0);
        assert_eq!(reading.samples, 3);

        rx.tune(5800).unwrap();
        assert!(rx.tune(6500).is_err());
        assert_eq!(rx.tuned_frequency(), None);
        assert_eq!(rx.sample_average(1).frequency, 0);
    }

    #[test]
    fn test_rejected_frequency_not_counted() {
        let mut rx = receiver(vec![]);
        assert!(rx.tune(5000).is_err());
        assert_eq!(rx.tuned_frequency(), None);
        assert_eq!(rx.stats().snapshot().tunes, 0);
    }

    #[test]
    fn test_release_sequence_on_drop() {
        struct Probe(std::rc::Rc<std::cell::RefCell<Vec<BusOp>>>);

        impl Transport for Probe {
            fn assert_select(&mut self) -> std::result::Result<(), TransportError> {
                self.0.borrow_mut().push(BusOp::Select);
                Ok(())
            }
            fn deassert_select(&mut self) -> std::result::Result<(), TransportError> {
                self.0.borrow_mut().push(BusOp::Deselect);
                Ok(())
            }
            fn write(&mut self, bytes: &[u8]) -> std::result::Result<(), TransportError> {
                self.0.borrow_mut().push(BusOp::Write(bytes.to_vec()));
                Ok(())
            }
            fn read(&mut self, count: usize) -> std::result::Result<Vec<u8>, TransportError> {
                self.0.borrow_mut().push(BusOp::Read(count));
                Ok(vec![0; count])
            }
            fn read_digital(&mut self, pin: u8) -> std::result::Result<bool, TransportError> {
                self.0.borrow_mut().push(BusOp::ReadPin(pin));
                Ok(false)
            }
            fn release(&mut self) -> std::result::Result<(), TransportError> {
                self.0.borrow_mut().push(BusOp::Release);
                Ok(())
            }
        }

        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let rx = Receiver::new(Probe(log.clone()), Arc::new(ManualClock::new()), &Config::default()).unwrap();
        drop(rx);
        assert_eq!(*log.borrow(), vec![BusOp::Deselect, BusOp::Release]);
    }
}
