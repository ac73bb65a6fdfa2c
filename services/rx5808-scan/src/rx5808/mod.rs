//! RX5808 register protocol and RSSI sampling
//!
//! This module provides the module-level pieces the scanner is built on:
//! 1. Band bounds for the 5.8 GHz video band
//! 2. Frequency to synthesizer register encoding
//! 3. The three-write tuning sequence with settling delays
//! 4. Averaged RSSI sampling from a digital pin or an ADC

mod registers;
pub mod rssi;
pub mod tuner;

pub use registers::{synth_word, RegisterPair, MAX_ENCODABLE_MHZ, REG_A, REG_B, REG_C, SYNTH_ENABLE};
pub use rssi::{RssiInput, RssiReading, RssiSampler, SamplerTiming};
pub use tuner::{Tuner, TunerTiming};

use crate::error::{Error, Result};

/// Lowest frequency of the default band (MHz)
pub const FREQ_MIN: u16 = 5725;
/// Highest frequency of the default band (MHz)
pub const FREQ_MAX: u16 = 6000;

/// Inclusive frequency bounds in MHz
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Band {
    pub min: u16,
    pub max: u16,
}

impl Band {
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, frequency: u16) -> bool {
        self.min <= frequency && frequency <= self.max
    }

    /// Reject out-of-band frequencies with [`Error::InvalidFrequency`]
    pub fn check(&self, frequency: u16) -> Result<u16> {
        if self.contains(frequency) {
            Ok(frequency)
        } else {
            Err(Error::InvalidFrequency {
                frequency,
                min: self.min,
                max: self.max,
            })
        }
    }

    /// Number of MHz channels in the band
    pub fn width(&self) -> u32 {
        (self.max as u32).saturating_sub(self.min as u32) + 1
    }
}

impl Default for Band {
    fn default() -> Self {
        Self::new(FREQ_MIN, FREQ_MAX)
    }
}
