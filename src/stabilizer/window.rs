use chrono::{DateTime, Duration, Utc};

use crate::config::StabilizerConfig;
use crate::history::HistoryRing;
use crate::models::{FusedResult, StabilizedActivity};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Why a window evaluation did not commit.
#[derive(Debug, Clone, PartialEq)]
pub enum HoldReason {
    TooFewResults { count: usize, required: usize },
    MixedCategories,
    Unknown,
    LowConfidence { average: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StabilizerOutcome {
    Committed {
        activity: StabilizedActivity,
        label_changed: bool,
    },
    Held(HoldReason),
}

impl StabilizerOutcome {
    pub fn is_commit(&self) -> bool {
        matches!(self, StabilizerOutcome::Committed { .. })
    }
}

/// Sliding-window hysteresis over fused results.
///
/// A commit needs at least `min_window_count` results inside the window, all
/// with the same category, averaging at least `commit_threshold`. Anything
/// else holds the last committed value.
pub struct TemporalStabilizer {
    config: StabilizerConfig,
    window: HistoryRing<FusedResult>,
    current: Option<StabilizedActivity>,
}

impl TemporalStabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        let window = HistoryRing::new(config.capacity);
        Self {
            config,
            window,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&StabilizedActivity> {
        self.current.as_ref()
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Add a fused result and evaluate the window as of `now`.
    pub fn observe(&mut self, result: FusedResult, now: DateTime<Utc>) -> StabilizerOutcome {
        self.window.push(result);
        let cutoff = i64::try_from(self.config.window_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|span| now.checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.window.retain(|entry| entry.timestamp > cutoff);

        let outcome = self.evaluate(now);
        if let StabilizerOutcome::Held(reason) = &outcome {
            log_debug!("stabilizer holding ({} in window): {:?}", self.window.len(), reason);
        }
        outcome
    }

    fn evaluate(&mut self, now: DateTime<Utc>) -> StabilizerOutcome {
        let count = self.window.len();
        if count < self.config.min_window_count {
            return StabilizerOutcome::Held(HoldReason::TooFewResults {
                count,
                required: self.config.min_window_count,
            });
        }

        let Some(first) = self.window.iter().next() else {
            return StabilizerOutcome::Held(HoldReason::TooFewResults {
                count,
                required: self.config.min_window_count,
            });
        };
        let category = first.primary_category.clone();

        if self.window.iter().any(|entry| entry.primary_category != category) {
            return StabilizerOutcome::Held(HoldReason::MixedCategories);
        }
        if first.is_unknown() {
            return StabilizerOutcome::Held(HoldReason::Unknown);
        }

        let average =
            self.window.iter().map(|entry| entry.overall_confidence).sum::<f64>() / count as f64;
        if average < self.config.commit_threshold {
            return StabilizerOutcome::Held(HoldReason::LowConfidence { average });
        }

        let label_changed = self
            .current
            .as_ref()
            .map_or(true, |current| current.label != category);

        let activity = StabilizedActivity {
            label: category,
            confidence: average,
            committed_at: now,
        };
        self.current = Some(activity.clone());

        StabilizerOutcome::Committed {
            activity,
            label_changed,
        }
    }
}
