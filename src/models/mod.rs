pub mod activity;
pub mod context;
pub mod detection;
pub mod fused;

pub use activity::{ActivityRecord, ActivityStatistics, CategoryCount};
pub use context::{AppIdentity, WindowContext, WindowIdentity, SYSTEM_BUNDLE_ID};
pub use detection::{DetectionResult, SourceKind};
pub use fused::{
    CategoryScore, FusedResult, SourceContribution, StabilizedActivity, UNKNOWN_CATEGORY,
};
