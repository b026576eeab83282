pub mod classifier;
pub mod engine;
pub mod historical;

pub use classifier::{Classification, Classifier, KeywordClassifier, DEFAULT_KEYWORDS};
pub use engine::FusionEngine;
pub use historical::historical_signal;
