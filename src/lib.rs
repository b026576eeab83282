//! Infers what the user is currently doing by fusing accessibility text,
//! on-screen text and the foreground application into one stabilized,
//! confidence-scored activity.
//!
//! The host supplies platform services through the traits in [`sensing`],
//! wires them into [`Collaborators`] and drives the engine through
//! [`EngineController`].

pub mod cache;
pub mod config;
pub mod error;
pub mod fusion;
pub mod history;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod sampling;
pub mod sensing;
pub mod stabilizer;
pub mod utils;

pub use config::EngineConfig;
pub use error::DetectorError;
pub use fusion::{Classification, Classifier, FusionEngine, KeywordClassifier};
pub use models::{
    ActivityRecord, ActivityStatistics, DetectionResult, FusedResult, SourceKind,
    StabilizedActivity, WindowContext,
};
pub use orchestrator::{Collaborators, EngineController, EngineEvent};
pub use sensing::{ContentExtractor, ContextProvider, Detector, ImageCapturer, TextRecognizer};
pub use utils::{init_logging, init_test_logging};
