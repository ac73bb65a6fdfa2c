//! Frequency tuning over the register write protocol
//!
//! Tuning is write-only: three chip-select framed writes followed by a fixed
//! settling wait. Nothing is read back, the lock is assumed once the settle
//! time has passed.

use std::time::Duration;

use tracing::{debug, trace, warn};

use super::registers::RegisterPair;
use super::Band;
use crate::clock::Clock;
use crate::error::{Result, TransportError};
use crate::transport::Transport;

/// Delays around the tuning sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunerTiming {
    /// Pause after the first and second register writes
    pub write_delay: Duration,
    /// Wait after the synthesizer enable before the frequency counts as locked
    pub settle_time: Duration,
}

impl Default for TunerTiming {
    fn default() -> Self {
        Self {
            write_delay: Duration::from_millis(10),
            settle_time: Duration::from_millis(50),
        }
    }
}

/// Drives the RX5808 synthesizer registers
#[derive(Debug, Clone)]
pub struct Tuner {
    band: Band,
    timing: TunerTiming,
}

impl Tuner {
    pub fn new(band: Band, timing: TunerTiming) -> Self {
        Self { band, timing }
    }

    pub fn band(&self) -> Band {
        self.band
    }

    /// Program `frequency` (MHz) and wait for it to settle.
    ///
    /// Out-of-band frequencies are rejected before the bus is touched. A failed
    /// transaction aborts the sequence; registers already written stay written.
    pub fn tune<T, C>(&self, bus: &mut T, clock: &C, frequency: u16) -> Result<()>
    where
        T: Transport + ?Sized,
        C: Clock + ?Sized,
    {
        self.band.check(frequency)?;

        let pair = RegisterPair::from_frequency(frequency);
        trace!(
            "Tuning {} MHz: word=0x{:04X} high=0x{:02X} low=0x{:02X}",
            frequency,
            pair.word(),
            pair.high,
            pair.low
        );

        let sequence = pair.write_sequence();
        let last = sequence.len() - 1;
        for (i, command) in sequence.iter().enumerate() {
            transaction(bus, command)?;
            if i < last {
                clock.sleep(self.timing.write_delay);
            }
        }

        clock.sleep(self.timing.settle_time);
        debug!("Tuned {} MHz", frequency);
        Ok(())
    }
}

/// One select -> write -> deselect transaction.
/// Select is released even when the write fails.
fn transaction<T: Transport + ?Sized>(bus: &mut T, bytes: &[u8]) -> std::result::Result<(), TransportError> {
    bus.assert_select()?;
    trace!("bus write {}", hex::encode(bytes));
    if let Err(e) = bus.write(bytes) {
        if let Err(release_err) = bus.deassert_select() {
            warn!("Failed to release chip select after write error: {}", release_err);
        }
        return Err(e);
    }
    bus.deassert_select()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::Error;
    use crate::transport::{BusOp, SimulatedTransport};
    use std::sync::Arc;

    fn setup() -> (Tuner, SimulatedTransport<Arc<ManualClock>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let sim = SimulatedTransport::with_clock(vec![], clock.clone());
        (Tuner::new(Band::default(), TunerTiming::default()), sim, clock)
    }

    #[test]
    fn test_tune_write_sequence() {
        let (tuner, mut sim, clock) = setup();
        tuner.tune(&mut sim, &clock, 5800).unwrap();

        assert_eq!(
            sim.bus_log(),
            &[
                BusOp::Select,
                BusOp::Write(vec![0x8A, 0xAA]),
                BusOp::Deselect,
                BusOp::Select,
                BusOp::Write(vec![0x8B, 0x46]),
                BusOp::Deselect,
                BusOp::Select,
                BusOp::Write(vec![0x8C, 0x01]),
                BusOp::Deselect,
            ]
        );
        assert_eq!(sim.tuned_frequency(), Some(5800));
    }

    #[test]
    fn test_tune_waits_write_delays_and_settle() {
        let (tuner, mut sim, clock) = setup();
        tuner.tune(&mut sim, &clock, 5800).unwrap();
        assert_eq!(clock.elapsed(), Duration::from_millis(70));
    }

    #[test]
    fn test_tune_twice_is_identical() {
        let (tuner, mut sim, clock) = setup();
        tuner.tune(&mut sim, &clock, 5880).unwrap();
        let first = sim.take_bus_log();
        tuner.tune(&mut sim, &clock, 5880).unwrap();
        let second = sim.take_bus_log();
        assert_eq!(first, second);
        assert_eq!(first.len(), 9);
    }

    #[test]
    fn test_band_edges_accepted() {
        let (tuner, mut sim, clock) = setup();
        assert!(tuner.tune(&mut sim, &clock, 5725).is_ok());
        assert!(tuner.tune(&mut sim, &clock, 6000).is_ok());
    }

    #[test]
    fn test_out_of_band_rejected_without_bus_activity() {
        let (tuner, mut sim, clock) = setup();
        assert!(matches!(
            tuner.tune(&mut sim, &clock, 5724),
            Err(Error::InvalidFrequency { frequency: 5724, min: 5725, max: 6000 })
        ));
        assert!(matches!(
            tuner.tune(&mut sim, &clock, 6001),
            Err(Error::InvalidFrequency { frequency: 6001, .. })
        ));
        assert!(sim.bus_log().is_empty());
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_failed_write_aborts_and_releases_select() {
        let clock = Arc::new(ManualClock::new());
        let mut sim = SimulatedTransport::with_clock(vec![], clock.clone()).with_faulty_frequency(5760);
        let tuner = Tuner::new(Band::default(), TunerTiming::default());

        let result = tuner.tune(&mut sim, &clock, 5760);
        assert!(matches!(result, Err(Error::Transport(_))));
        assert!(!sim.is_selected());
        assert_eq!(sim.bus_log().last(), Some(&BusOp::Deselect));
        // No settle wait after the failed commit
        assert_eq!(clock.elapsed(), Duration::from_millis(20));
    }
}
