//! Frequency sweeps, single-frequency monitoring, and result reporting

mod monitor;
mod report;
mod sweep;

pub use monitor::{Monitor, MonitorSettings, Watch};
pub use report::{
    ChannelObserver, Detection, RssiChangeEvent, ScanEvent, ScanObserver, StepReport, SweepSummary,
};
pub use sweep::{ScanSettings, Scanner};
