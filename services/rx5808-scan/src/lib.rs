//! RX5808 frequency scanner
//!
//! Tunes an RX5808 5.8 GHz video receiver over a chip-select framed bus,
//! samples its RSSI output, and reports which frequencies carry a signal.
//!
//! The bus itself is not driven here: callers provide a [`Transport`] and a
//! [`Clock`], wrap them in a [`Receiver`], then borrow it into a [`Scanner`]
//! or a [`Monitor`]. Long-running loops take a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) and check it
//! between steps.

pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod rx5808;
pub mod scanner;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, RunMode, RunOptions};
pub use device::{Receiver, ReceiverStats, StatsSnapshot};
pub use error::{Error, Result, TransportError};
pub use rx5808::{Band, RegisterPair, RssiInput, RssiReading};
pub use scanner::{
    ChannelObserver, Detection, Monitor, MonitorSettings, RssiChangeEvent, ScanEvent, ScanObserver,
    ScanSettings, Scanner, StepReport, SweepSummary, Watch,
};
pub use transport::{Emitter, SimulatedTransport, Transport};
