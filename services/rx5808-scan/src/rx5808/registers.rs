//! RX5808 synthesizer register encoding
//!
//! The synthesizer word is `round((f - 479) * 8192 / 1000)` for a frequency
//! `f` in MHz, split across register A (upper byte) and register B (lower byte)
//! and committed by writing the enable bit to register C.

/// IF offset subtracted before scaling, in MHz
pub const IF_OFFSET_MHZ: u16 = 479;

/// Register A select byte (upper synthesizer byte)
pub const REG_A: u8 = 0x8A;
/// Register B select byte (lower synthesizer byte)
pub const REG_B: u8 = 0x8B;
/// Register C select byte (synthesizer control)
pub const REG_C: u8 = 0x8C;
/// Synthesizer enable value written to register C
pub const SYNTH_ENABLE: u8 = 0x01;

/// Highest frequency whose synthesizer word still fits in 16 bits
pub const MAX_ENCODABLE_MHZ: u16 = 8478;

/// Upper and lower synthesizer bytes for one frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterPair {
    pub high: u8,
    pub low: u8,
}

impl RegisterPair {
    /// Encode a frequency in MHz. Frequencies below the IF offset encode as zero.
    pub fn from_frequency(frequency: u16) -> Self {
        let word = synth_word(frequency);
        Self {
            high: ((word >> 8) & 0xFF) as u8,
            low: (word & 0xFF) as u8,
        }
    }

    /// Raw 16-bit synthesizer word
    pub fn word(&self) -> u16 {
        ((self.high as u16) << 8) | self.low as u16
    }

    /// Decode back to the nearest MHz
    pub fn frequency(&self) -> u16 {
        let mhz = (self.word() as u32 * 1000 + 4096) / 8192;
        (mhz + IF_OFFSET_MHZ as u32).min(u16::MAX as u32) as u16
    }

    /// The three register writes that commit this pair, in bus order
    pub fn write_sequence(&self) -> [[u8; 2]; 3] {
        [[REG_A, self.high], [REG_B, self.low], [REG_C, SYNTH_ENABLE]]
    }
}

/// Compute `round((f - 479) * 8192 / 1000)`, saturating to the 16-bit word
pub fn synth_word(frequency: u16) -> u16 {
    let offset = frequency.saturating_sub(IF_OFFSET_MHZ) as u32;
    let word = (offset * 8192 + 500) / 1000;
    word.min(u16::MAX as u32) as u16
}
