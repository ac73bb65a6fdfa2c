//! Receiver ownership and live counters

mod receiver;
mod state;

pub use receiver::Receiver;
pub use state::{ReceiverStats, StatsSnapshot};
