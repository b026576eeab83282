use thiserror::Error;

/// Failure of one detector invocation.
///
/// None of these escape the fan-out join: the orchestrator folds them into a
/// [`DetectionResult`](crate::models::DetectionResult) carrying the error, and
/// fusion gives that result zero weight. "Nothing on screen" is not an error,
/// see [`DetectionResult::no_content`](crate::models::DetectionResult::no_content).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectorError {
    /// A required OS capability (screen recording, accessibility) is not granted.
    /// Sticky until the user fixes it.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Capture or recognition failed for this round only.
    #[error("transient extraction failure: {0}")]
    Transient(String),

    /// The call did not finish within its budget. Handled like `Transient`.
    #[error("timed out after {0}ms")]
    Timeout(u64),
}

impl DetectorError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    pub fn is_permission(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    /// Errors that only cost the current round.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }

    /// Short tag used in fusion trace strings.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "permission",
            Self::Transient(_) => "failed",
            Self::Timeout(_) => "timeout",
        }
    }
}
