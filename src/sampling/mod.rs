mod controller;
mod similarity;

pub use controller::{SamplingController, SamplingState};
pub use similarity::{similarity, SampleSignature};
