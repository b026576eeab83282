mod window;

pub use window::{HoldReason, StabilizerOutcome, TemporalStabilizer};
