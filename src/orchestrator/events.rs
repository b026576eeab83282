use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::metrics::MetricsSnapshot;
use crate::models::{ActivityRecord, ActivityStatistics, FusedResult, SourceKind, StabilizedActivity};

/// Notifications for observers. Sent on a broadcast channel, so slow
/// subscribers may miss events but never block the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// The committed label changed.
    ActivityCommitted { activity: StabilizedActivity },
    /// A family lost a required permission. Sent once until it recovers.
    PermissionDenied { family: SourceKind, message: String },
    PermissionRestored { family: SourceKind },
}

pub(crate) type Reply<T> = oneshot::Sender<T>;

/// Requests served by the engine task between cycles.
pub(crate) enum EngineCommand {
    ForceCycle {
        reply: Reply<Option<StabilizedActivity>>,
    },
    History {
        since: Option<DateTime<Utc>>,
        limit: usize,
        reply: Reply<Vec<FusedResult>>,
    },
    ActivityHistory {
        since: Option<DateTime<Utc>>,
        limit: usize,
        reply: Reply<Vec<ActivityRecord>>,
    },
    Statistics {
        window: chrono::Duration,
        reply: Reply<ActivityStatistics>,
    },
    ClearHistoryOlderThan {
        cutoff: DateTime<Utc>,
        reply: Reply<usize>,
    },
    Metrics {
        reply: Reply<MetricsSnapshot>,
    },
}

impl EngineCommand {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            EngineCommand::ForceCycle { .. } => "force_cycle",
            EngineCommand::History { .. } => "history",
            EngineCommand::ActivityHistory { .. } => "activity_history",
            EngineCommand::Statistics { .. } => "statistics",
            EngineCommand::ClearHistoryOlderThan { .. } => "clear_history",
            EngineCommand::Metrics { .. } => "metrics",
        }
    }
}
