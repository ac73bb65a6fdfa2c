//! RSSI sampling and averaging
//!
//! Raw readings come either from the RSSI comparator on a digital pin (0/1)
//! or from an ADC code clocked in over the bus. Both are mapped linearly onto
//! 0-100 %. A read that fails counts as a zero sample and is tallied in
//! [`RssiReading::failed`], so the average always covers the requested count.

use std::time::Duration;

use serde::Serialize;
use tracing::{trace, warn};

use crate::clock::Clock;
use crate::error::TransportError;
use crate::transport::Transport;

/// Where the RSSI level is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RssiInput {
    /// Comparator output on a GPIO pin
    Digital { pin: u8 },
    /// ADC code of `bits` resolution, read big-endian in a select-framed transfer
    Analog { bits: u8 },
}

impl RssiInput {
    /// Largest raw code the input can produce
    pub fn full_scale(&self) -> u32 {
        match self {
            RssiInput::Digital { .. } => 1,
            RssiInput::Analog { bits } => (1u32 << (*bits).clamp(1, 16)) - 1,
        }
    }

    /// Map one raw code to percent
    pub fn to_percent(&self, raw: u32) -> f64 {
        raw as f64 * 100.0 / self.full_scale() as f64
    }

    fn byte_count(&self) -> usize {
        match self {
            RssiInput::Digital { .. } => 0,
            RssiInput::Analog { bits } => ((*bits).clamp(1, 16) as usize + 7) / 8,
        }
    }
}

impl Default for RssiInput {
    fn default() -> Self {
        RssiInput::Digital { pin: 7 }
    }
}

/// Averaged RSSI at one frequency
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RssiReading {
    pub frequency: u16,
    /// Mean level in percent
    pub rssi: f64,
    /// Samples averaged, failed ones included
    pub samples: u32,
    /// Samples whose read failed and were counted as zero
    pub failed: u32,
}

/// Delay between consecutive reads of one average
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerTiming {
    pub sample_delay: Duration,
}

impl Default for SamplerTiming {
    fn default() -> Self {
        Self {
            sample_delay: Duration::from_millis(10),
        }
    }
}

/// Reads and averages the RSSI input
#[derive(Debug, Clone)]
pub struct RssiSampler {
    input: RssiInput,
    timing: SamplerTiming,
}

impl RssiSampler {
    pub fn new(input: RssiInput, timing: SamplerTiming) -> Self {
        Self { input, timing }
    }

    pub fn input(&self) -> RssiInput {
        self.input
    }

    /// Read a single raw code from the input
    pub fn read_raw<T: Transport + ?Sized>(&self, bus: &mut T) -> Result<u32, TransportError> {
        let raw = match self.input {
            RssiInput::Digital { pin } => bus.read_digital(pin)? as u32,
            RssiInput::Analog { .. } => {
                bus.assert_select()?;
                let read = bus.read(self.input.byte_count());
                bus.deassert_select()?;
                read?
                    .iter()
                    .fold(0u32, |acc, b| (acc << 8) | *b as u32)
                    .min(self.input.full_scale())
            }
        };
        trace!("RSSI raw={}", raw);
        Ok(raw)
    }

    /// Read a single sample as percent
    pub fn read_percent<T: Transport + ?Sized>(&self, bus: &mut T) -> Result<f64, TransportError> {
        self.read_raw(bus).map(|raw| self.input.to_percent(raw))
    }

    /// Average `count` reads taken `sample_delay` apart.
    ///
    /// The mean is taken over raw codes and scaled once, so a constant input
    /// returns exactly its mapped percentage.
    pub fn sample_average<T, C>(&self, bus: &mut T, clock: &C, frequency: u16, count: u32) -> RssiReading
    where
        T: Transport + ?Sized,
        C: Clock + ?Sized,
    {
        if count == 0 {
            return RssiReading {
                frequency,
                rssi: 0.0,
                samples: 0,
                failed: 0,
            };
        }

        let mut sum: u64 = 0;
        let mut failed = 0u32;
        for i in 0..count {
            match self.read_raw(bus) {
                Ok(raw) => sum += raw as u64,
                Err(e) => {
                    failed += 1;
                    warn!("RSSI read failed at {} MHz, counting as zero: {}", frequency, e);
                }
            }
            if i + 1 < count {
                clock.sleep(self.timing.sample_delay);
            }
        }

        let rssi = sum as f64 * 100.0 / (self.input.full_scale() as f64 * count as f64);
        RssiReading {
            frequency,
            rssi,
            samples: count,
            failed,
        }
    }
}
