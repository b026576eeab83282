//! Higher-level activity history and the statistics computed over it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::context::WindowContext;

/// One committed activity, appended whenever the committed label or the
/// observed context changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: String,
    pub label: String,
    pub confidence: f64,
    pub context_key: Option<String>,
    pub app_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn new(
        label: impl Into<String>,
        confidence: f64,
        context: Option<&WindowContext>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            label: label.into(),
            confidence,
            context_key: context.map(WindowContext::context_key),
            app_name: context.map(|ctx| ctx.app.app_name.clone()),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

/// Summary of fused results over a trailing window.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStatistics {
    pub count: usize,
    pub avg_confidence: f64,
    pub top_categories: Vec<CategoryCount>,
    pub context_switch_count: usize,
}
