mod types;

pub use types::{CycleMetrics, FamilyMetrics, MetricsSnapshot, SystemMetrics};

use std::collections::BTreeMap;
use std::time::Duration;

use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::error::DetectorError;
use crate::models::SourceKind;

const MAX_RECENT_CYCLES: usize = 20;

/// Engine counters. Owned by the engine task, so no locking.
pub struct EngineMetrics {
    families: BTreeMap<SourceKind, FamilyMetrics>,
    recent_cycles: Vec<CycleMetrics>,
    cycle_count: u64,
    commit_count: u64,
    system: System,
    pid: Pid,
}

impl EngineMetrics {
    pub fn new() -> Self {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());

        // Initial refresh to establish baseline for CPU calculation
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        let families = SourceKind::FAMILIES
            .iter()
            .map(|kind| {
                (
                    *kind,
                    FamilyMetrics {
                        source_kind: Some(*kind),
                        ..FamilyMetrics::default()
                    },
                )
            })
            .collect();

        Self {
            families,
            recent_cycles: Vec::with_capacity(MAX_RECENT_CYCLES),
            cycle_count: 0,
            commit_count: 0,
            system,
            pid,
        }
    }

    pub fn record_invocation(&mut self, kind: SourceKind, latency: Duration, error: Option<&DetectorError>) {
        let Some(family) = self.families.get_mut(&kind) else {
            return;
        };
        family.invocations += 1;
        family.last_latency_ms = Some(latency.as_millis() as u64);
        match error {
            Some(DetectorError::Timeout(_)) => {
                family.timeouts += 1;
                family.failures += 1;
            }
            Some(_) => family.failures += 1,
            None => {}
        }
    }

    pub fn record_cache_hit(&mut self, kind: SourceKind) {
        if let Some(family) = self.families.get_mut(&kind) {
            family.cache_hits += 1;
        }
    }

    pub fn record_cycle(&mut self, metrics: CycleMetrics) {
        self.cycle_count += 1;
        if metrics.committed {
            self.commit_count += 1;
        }

        self.recent_cycles.push(metrics);

        if self.recent_cycles.len() > MAX_RECENT_CYCLES {
            self.recent_cycles.remove(0);
        }
    }

    pub fn family(&self, kind: SourceKind) -> Option<&FamilyMetrics> {
        self.families.get(&kind)
    }

    pub fn snapshot(&mut self) -> MetricsSnapshot {
        let pid = self.pid;

        // Refresh to get current CPU/RAM
        self.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        let system = self
            .system
            .process(pid)
            .map(|process| SystemMetrics {
                cpu_percent: process.cpu_usage(),
                memory_mb: process.memory() as f64 / 1024.0 / 1024.0,
            })
            .unwrap_or_default();

        MetricsSnapshot {
            system,
            families: self.families.values().cloned().collect(),
            recent_cycles: self.recent_cycles.clone(),
            cycle_count: self.cycle_count,
            commit_count: self.commit_count,
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
