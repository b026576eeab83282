mod ring;
mod statistics;

pub use ring::{HistoryRing, Timestamped};
pub use statistics::{compute_statistics, window_start};
