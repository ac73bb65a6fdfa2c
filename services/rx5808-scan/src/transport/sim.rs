//! In-process RX5808 model
//!
//! Decodes the register writes of the tuning sequence into a tuned frequency
//! and answers RSSI reads from a list of emitters over a flat noise floor.
//! Every bus operation is recorded, so tests use it as a recording mock.

use std::str::FromStr;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::{Transport, TransportError};
use crate::clock::{Clock, SystemClock};
use crate::rx5808::{RegisterPair, REG_A, REG_B, REG_C, SYNTH_ENABLE};

/// A transmitter seen by the simulated receiver
#[derive(Debug, Clone, PartialEq)]
pub struct Emitter {
    /// Centre frequency in MHz
    pub frequency: u16,
    /// Level at the centre frequency, in percent
    pub strength: f64,
    /// Half-width in MHz over which the level falls off linearly
    pub width_mhz: u16,
    /// Time after transport creation when the emitter keys up
    pub keyed_at: Duration,
}

impl Emitter {
    pub fn new(frequency: u16, strength: f64) -> Self {
        Self {
            frequency,
            strength,
            width_mhz: 0,
            keyed_at: Duration::ZERO,
        }
    }

    pub fn with_width(mut self, width_mhz: u16) -> Self {
        self.width_mhz = width_mhz;
        self
    }

    pub fn keyed_at(mut self, at: Duration) -> Self {
        self.keyed_at = at;
        self
    }

    /// Level this emitter contributes at `frequency`
    fn level_at(&self, frequency: u16) -> f64 {
        let distance = self.frequency.abs_diff(frequency);
        if distance > self.width_mhz {
            return 0.0;
        }
        let falloff = distance as f64 / (self.width_mhz as f64 + 1.0);
        self.strength * (1.0 - falloff)
    }
}

/// Parses `freq:strength[:width]`, e.g. `5800:90:4`
impl FromStr for Emitter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.trim().split(':');
        let frequency = fields
            .next()
            .and_then(|f| f.trim().parse::<u16>().ok())
            .ok_or_else(|| format!("bad emitter frequency in '{}'", s))?;
        let strength = fields
            .next()
            .and_then(|f| f.trim().parse::<f64>().ok())
            .ok_or_else(|| format!("bad emitter strength in '{}'", s))?;
        let width_mhz = match fields.next() {
            Some(w) => w
                .trim()
                .parse::<u16>()
                .map_err(|_| format!("bad emitter width in '{}'", s))?,
            None => 0,
        };
        Ok(Emitter::new(frequency, strength).with_width(width_mhz))
    }
}

/// One recorded bus operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    Select,
    Deselect,
    Write(Vec<u8>),
    Read(usize),
    ReadPin(u8),
    Release,
}

/// Simulated RX5808 behind a [`Transport`]
pub struct SimulatedTransport<C: Clock = SystemClock> {
    clock: C,
    created: Instant,
    emitters: Vec<Emitter>,
    noise_floor: f64,
    adc_bits: u8,
    selected: bool,
    pending_high: u8,
    pending_low: u8,
    tuned: Option<u16>,
    faulty_frequencies: Vec<u16>,
    rssi_fault: bool,
    released: bool,
    bus_log: Vec<BusOp>,
}

impl SimulatedTransport<SystemClock> {
    pub fn new(emitters: Vec<Emitter>) -> Self {
        Self::with_clock(emitters, SystemClock)
    }
}

impl<C: Clock> SimulatedTransport<C> {
    pub fn with_clock(emitters: Vec<Emitter>, clock: C) -> Self {
        let created = clock.now();
        Self {
            clock,
            created,
            emitters,
            noise_floor: 0.0,
            adc_bits: 8,
            selected: false,
            pending_high: 0,
            pending_low: 0,
            tuned: None,
            faulty_frequencies: Vec::new(),
            rssi_fault: false,
            released: false,
            bus_log: Vec::new(),
        }
    }

    /// Level reported where no emitter is present, in percent
    pub fn with_noise_floor(mut self, percent: f64) -> Self {
        self.noise_floor = percent;
        self
    }

    /// Resolution of the simulated RSSI ADC
    pub fn with_adc_bits(mut self, bits: u8) -> Self {
        self.adc_bits = bits.clamp(1, 16);
        self
    }

    /// Make the synthesizer-enable write fail whenever it would lock onto `frequency`
    pub fn with_faulty_frequency(mut self, frequency: u16) -> Self {
        self.faulty_frequencies.push(frequency);
        self
    }

    /// Make every RSSI read fail
    pub fn set_rssi_fault(&mut self, fault: bool) {
        self.rssi_fault = fault;
    }

    /// Frequency the synthesizer last locked onto
    pub fn tuned_frequency(&self) -> Option<u16> {
        self.tuned
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn bus_log(&self) -> &[BusOp] {
        &self.bus_log
    }

    /// Drain the recorded operations
    pub fn take_bus_log(&mut self) -> Vec<BusOp> {
        std::mem::take(&mut self.bus_log)
    }

    /// Current level at the tuned frequency, in percent
    pub fn level(&self) -> f64 {
        let Some(frequency) = self.tuned else {
            return self.noise_floor;
        };
        let on_air = self.clock.now().saturating_duration_since(self.created);
        self.emitters
            .iter()
            .filter(|e| on_air >= e.keyed_at)
            .map(|e| e.level_at(frequency))
            .fold(self.noise_floor, f64::max)
    }

    fn ensure_selected(&self, op: &str) -> Result<(), TransportError> {
        if self.selected {
            Ok(())
        } else {
            Err(TransportError::Bus(format!("{} without chip select", op)))
        }
    }

    fn ensure_rssi(&self) -> Result<(), TransportError> {
        if self.rssi_fault {
            Err(TransportError::Bus("RSSI input not responding".to_string()))
        } else {
            Ok(())
        }
    }
}

impl<C: Clock> Transport for SimulatedTransport<C> {
    fn assert_select(&mut self) -> Result<(), TransportError> {
        self.bus_log.push(BusOp::Select);
        self.selected = true;
        Ok(())
    }

    fn deassert_select(&mut self) -> Result<(), TransportError> {
        self.bus_log.push(BusOp::Deselect);
        self.selected = false;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.bus_log.push(BusOp::Write(bytes.to_vec()));
        trace!("sim write {}", hex::encode(bytes));
        self.ensure_selected("write")?;

        match bytes {
            [REG_A, value] => self.pending_high = *value,
            [REG_B, value] => self.pending_low = *value,
            [REG_C, SYNTH_ENABLE] => {
                let pair = RegisterPair {
                    high: self.pending_high,
                    low: self.pending_low,
                };
                let frequency = pair.frequency();
                if self.faulty_frequencies.contains(&frequency) {
                    return Err(TransportError::Bus(format!(
                        "synthesizer rejected word 0x{:04X}",
                        pair.word()
                    )));
                }
                debug!("sim synthesizer locked at {} MHz", frequency);
                self.tuned = Some(frequency);
            }
            _ => trace!("sim ignoring write {}", hex::encode(bytes)),
        }
        Ok(())
    }

    fn read(&mut self, count: usize) -> Result<Vec<u8>, TransportError> {
        self.bus_log.push(BusOp::Read(count));
        self.ensure_selected("read")?;
        self.ensure_rssi()?;

        let full_scale = (1u32 << self.adc_bits) - 1;
        let code = (self.level().clamp(0.0, 100.0) * full_scale as f64 / 100.0).round() as u32;
        let mut bytes = vec![0u8; count];
        for (i, byte) in bytes.iter_mut().rev().enumerate().take(4) {
            *byte = ((code >> (8 * i)) & 0xFF) as u8;
        }
        trace!("sim read {}", hex::encode(&bytes));
        Ok(bytes)
    }

    fn read_digital(&mut self, pin: u8) -> Result<bool, TransportError> {
        self.bus_log.push(BusOp::ReadPin(pin));
        self.ensure_rssi()?;
        Ok(self.level() >= 50.0)
    }

    fn release(&mut self) -> Result<(), TransportError> {
        self.bus_log.push(BusOp::Release);
        self.selected = false;
        self.released = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn tune(sim: &mut SimulatedTransport<Arc<ManualClock>>, frequency: u16) {
        for write in RegisterPair::from_frequency(frequency).write_sequence() {
            sim.assert_select().unwrap();
            sim.write(&write).unwrap();
            sim.deassert_select().unwrap();
        }
    }

    #[test]
    fn test_decodes_tuning_sequence() {
        let clock = Arc::new(ManualClock::new());
        let mut sim = SimulatedTransport::with_clock(vec![], clock);
        tune(&mut sim, 5865);
        assert_eq!(sim.tuned_frequency(), Some(5865));
        assert!(!sim.is_selected());
    }

    #[test]
    fn test_write_requires_select() {
        let mut sim = SimulatedTransport::new(vec![]);
        assert!(sim.write(&[REG_A, 0xAA]).is_err());
    }

    #[test]
    fn test_digital_level_follows_emitter() {
        let clock = Arc::new(ManualClock::new());
        let mut sim = SimulatedTransport::with_clock(vec![Emitter::new(5800, 100.0)], clock);
        tune(&mut sim, 5800);
        assert!(sim.read_digital(7).unwrap());
        tune(&mut sim, 5801);
        assert!(!sim.read_digital(7).unwrap());
    }

    #[test]
    fn test_analog_read_encodes_level() {
        let clock = Arc::new(ManualClock::new());
        let mut sim = SimulatedTransport::with_clock(vec![Emitter::new(5800, 100.0)], clock)
            .with_adc_bits(10);
        tune(&mut sim, 5800);
        sim.assert_select().unwrap();
        assert_eq!(sim.read(2).unwrap(), vec![0x03, 0xFF]);
        sim.deassert_select().unwrap();
    }

    #[test]
    fn test_emitter_keys_up_later() {
        let clock = Arc::new(ManualClock::new());
        let emitter = Emitter::new(5800, 80.0).keyed_at(Duration::from_millis(200));
        let mut sim = SimulatedTransport::with_clock(vec![emitter], clock.clone())
            .with_noise_floor(10.0);
        tune(&mut sim, 5800);
        assert_eq!(sim.level(), 10.0);
        clock.advance(Duration::from_millis(200));
        assert_eq!(sim.level(), 80.0);
    }

    #[test]
    fn test_emitter_falloff() {
        let emitter = Emitter::new(5800, 90.0).with_width(2);
        assert_eq!(emitter.level_at(5800), 90.0);
        assert_eq!(emitter.level_at(5803), 0.0);
        assert!(emitter.level_at(5802) > 0.0 && emitter.level_at(5802) < emitter.level_at(5801));
    }

    #[test]
    fn test_faulty_frequency_rejects_enable() {
        let clock = Arc::new(ManualClock::new());
        let mut sim = SimulatedTransport::with_clock(vec![], clock).with_faulty_frequency(5750);
        let [a, b, c] = RegisterPair::from_frequency(5750).write_sequence();
        sim.assert_select().unwrap();
        sim.write(&a).unwrap();
        sim.write(&b).unwrap();
        assert!(sim.write(&c).is_err());
        assert_eq!(sim.tuned_frequency(), None);
    }

    #[test]
    fn test_parse_emitter() {
        let e: Emitter = "5800:90:4".parse().unwrap();
        assert_eq!(e, Emitter::new(5800, 90.0).with_width(4));
        let e: Emitter = " 5745:60 ".parse().unwrap();
        assert_eq!(e.width_mhz, 0);
        assert!("abc:1".parse::<Emitter>().is_err());
        assert!("5800".parse::<Emitter>().is_err());
    }
}
