//! Error types for the scan service.
//!
//! Bus failures are carried as [`TransportError`]; everything the core can
//! reject or fail on is folded into [`Error`].

use thiserror::Error;

/// A failure reported by the underlying bus or pin driver.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The bus rejected or could not complete a transfer.
    #[error("bus error: {0}")]
    Bus(String),

    /// An OS-level I/O failure from the device node.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The error type for all tuning, sampling and scanning operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Frequency outside the configured band. Rejected before any bus activity.
    #[error("frequency {frequency} MHz outside band {min}-{max} MHz")]
    InvalidFrequency { frequency: u16, min: u16, max: u16 },

    /// Scan bounds inverted or step of zero.
    #[error("invalid scan range {start}-{end} MHz (step {step})")]
    InvalidRange { start: u16, end: u16, step: u16 },

    /// Bus or pin I/O failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration rejected at construction.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
