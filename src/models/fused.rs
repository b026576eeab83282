use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::detection::SourceKind;

/// Category reported when no source produced a usable contribution.
pub const UNKNOWN_CATEGORY: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub category: String,
    pub score: f64,
}

/// What one source added to one category in a fusion cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceContribution {
    pub source_kind: SourceKind,
    pub category: String,
    pub weighted_score: f64,
}

/// Per-cycle output of the fusion engine.
///
/// `category_scores` keeps first-insertion order, which is also the tie-break
/// order. `overall_confidence` is the sum of all contributions capped at 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusedResult {
    pub primary_category: String,
    pub overall_confidence: f64,
    pub category_scores: Vec<CategoryScore>,
    pub contributing_sources: Vec<SourceKind>,
    pub contributions: Vec<SourceContribution>,
    pub context: String,
    pub context_key: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl FusedResult {
    pub fn is_unknown(&self) -> bool {
        self.primary_category == UNKNOWN_CATEGORY
    }

    pub fn score_for(&self, category: &str) -> Option<f64> {
        self.category_scores
            .iter()
            .find(|entry| entry.category == category)
            .map(|entry| entry.score)
    }

    /// Category a given source voted for this cycle, if it contributed.
    pub fn category_from(&self, source_kind: SourceKind) -> Option<&str> {
        self.contributions
            .iter()
            .find(|c| c.source_kind == source_kind)
            .map(|c| c.category.as_str())
    }
}

/// The committed, externally visible activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilizedActivity {
    pub label: String,
    pub confidence: f64,
    pub committed_at: DateTime<Utc>,
}
