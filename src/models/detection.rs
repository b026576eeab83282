use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DetectorError;

/// Kind of signal a detection came from.
///
/// Declaration order is the fusion priority order: when two categories tie,
/// the one first reached by a higher-priority source wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    Accessibility,
    Ocr,
    ApplicationState,
    Historical,
}

impl SourceKind {
    /// All kinds, highest priority first.
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Accessibility,
        SourceKind::Ocr,
        SourceKind::ApplicationState,
        SourceKind::Historical,
    ];

    /// Kinds backed by a live detector family (everything except history).
    pub const FAMILIES: [SourceKind; 3] = [
        SourceKind::Accessibility,
        SourceKind::Ocr,
        SourceKind::ApplicationState,
    ];

    pub fn priority(self) -> u8 {
        match self {
            SourceKind::Accessibility => 0,
            SourceKind::Ocr => 1,
            SourceKind::ApplicationState => 2,
            SourceKind::Historical => 3,
        }
    }

    /// Text sources are classified from their content and scaled by extraction reliability.
    pub fn is_text(self) -> bool {
        matches!(self, SourceKind::Accessibility | SourceKind::Ocr)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Accessibility => "accessibility",
            SourceKind::Ocr => "ocr",
            SourceKind::ApplicationState => "app",
            SourceKind::Historical => "history",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detector's opinion for one sampling round.
///
/// For text sources `content` holds the extracted text and `confidence` the
/// extraction reliability; for application-state and history `label` is
/// already a category and `confidence` its local confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub source_kind: SourceKind,
    pub label: String,
    pub content: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub context_key: Option<String>,
    pub error: Option<DetectorError>,
}

impl DetectionResult {
    pub fn new(
        source_kind: SourceKind,
        label: impl Into<String>,
        content: impl Into<String>,
        confidence: f64,
        context_key: Option<String>,
    ) -> Self {
        Self {
            source_kind,
            label: label.into(),
            content: content.into(),
            confidence: confidence.clamp(0.0, 1.0),
            timestamp: Utc::now(),
            context_key,
            error: None,
        }
    }

    /// Valid result meaning "looked, found nothing": zero confidence, no content.
    pub fn no_content(source_kind: SourceKind, context_key: Option<String>) -> Self {
        Self::new(source_kind, "", "", 0.0, context_key)
    }

    pub fn failed(
        source_kind: SourceKind,
        context_key: Option<String>,
        error: DetectorError,
    ) -> Self {
        Self {
            error: Some(error),
            ..Self::no_content(source_kind, context_key)
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_no_content(&self) -> bool {
        self.error.is_none() && self.confidence <= 0.0 && self.content.is_empty() && self.label.is_empty()
    }

    /// Whether fusion may draw a non-zero contribution from this result.
    pub fn is_usable(&self) -> bool {
        if self.error.is_some() || self.confidence <= 0.0 {
            return false;
        }
        if self.source_kind.is_text() {
            !self.content.trim().is_empty()
        } else {
            !self.label.trim().is_empty()
        }
    }
}
