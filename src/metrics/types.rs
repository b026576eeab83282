use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::SourceKind;

/// Timings and outcome counts for one fusion cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleMetrics {
    pub timestamp: DateTime<Utc>,
    pub context_ms: u64,
    pub fanout_ms: u64,
    pub total_ms: u64,
    pub invoked: usize,
    pub cached: usize,
    pub skipped: usize,
    pub failed: usize,
    pub committed: bool,
}

/// Running counters for one detector family.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMetrics {
    pub source_kind: Option<SourceKind>,
    pub invocations: u64,
    pub cache_hits: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub last_latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub system: SystemMetrics,
    pub families: Vec<FamilyMetrics>,
    pub recent_cycles: Vec<CycleMetrics>,
    pub cycle_count: u64,
    pub commit_count: u64,
}

impl MetricsSnapshot {
    pub fn family(&self, kind: SourceKind) -> Option<&FamilyMetrics> {
        self.families
            .iter()
            .find(|family| family.source_kind == Some(kind))
    }
}
