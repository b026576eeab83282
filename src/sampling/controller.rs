use std::collections::HashMap;

use serde::Serialize;
use tokio::time::{Duration, Instant};

use crate::config::{SamplingConfig, SamplingPolicy};
use crate::models::SourceKind;

use super::similarity::{similarity, SampleSignature};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Polling cadence of one detector family.
///
/// `base_interval <= current_interval <= max_interval` holds after every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingState {
    pub current_interval: Duration,
    pub base_interval: Duration,
    pub max_interval: Duration,
    pub consecutive_stable_count: u32,
}

impl SamplingState {
    pub fn new(policy: &SamplingPolicy) -> Self {
        let base_interval = policy.base_interval();
        let max_interval = policy.max_interval().max(base_interval);
        Self {
            current_interval: base_interval,
            base_interval,
            max_interval,
            consecutive_stable_count: 0,
        }
    }

    /// Fold one round's similarity into the cadence. `None` means the round
    /// produced nothing usable. Returns the new interval only when it changed.
    pub fn adapt(&mut self, similarity: Option<f64>, policy: &SamplingPolicy) -> Option<Duration> {
        let previous = self.current_interval;

        match similarity {
            Some(score) if score > policy.stable_threshold => {
                self.consecutive_stable_count = self.consecutive_stable_count.saturating_add(1);
                if self.consecutive_stable_count > policy.debounce_count {
                    self.current_interval = self.scaled(policy.grow_factor);
                }
            }
            _ => {
                self.consecutive_stable_count = 0;
                self.current_interval = self.scaled(policy.shrink_factor);
            }
        }

        (self.current_interval != previous).then_some(self.current_interval)
    }

    /// Jump to the slowest cadence, e.g. while a permission is missing.
    pub fn park_at_max(&mut self) {
        self.consecutive_stable_count = 0;
        self.current_interval = self.max_interval;
    }

    fn scaled(&self, factor: f64) -> Duration {
        let factor = if factor.is_finite() && factor > 0.0 { factor } else { 1.0 };
        // saturate instead of panicking when the product leaves Duration's range
        Duration::try_from_secs_f64(self.current_interval.as_secs_f64() * factor)
            .unwrap_or(self.max_interval)
            .clamp(self.base_interval, self.max_interval)
    }
}

#[derive(Debug)]
struct FamilyCadence {
    policy: SamplingPolicy,
    state: SamplingState,
    next_due: Option<Instant>,
    last_signature: Option<SampleSignature>,
    last_context_key: Option<String>,
    parked: bool,
}

/// Per-family adaptive cadence.
///
/// Families poll slowly while consecutive results agree and snap back to
/// their base interval as soon as they diverge or the observed window changes.
/// New intervals only apply from the next scheduling decision.
#[derive(Debug)]
pub struct SamplingController {
    families: HashMap<SourceKind, FamilyCadence>,
    verbose: bool,
}

impl SamplingController {
    pub fn new(config: &SamplingConfig, verbose: bool) -> Self {
        let families = SourceKind::FAMILIES
            .iter()
            .filter_map(|kind| {
                config.policy(*kind).map(|policy| {
                    (
                        *kind,
                        FamilyCadence {
                            policy: policy.clone(),
                            state: SamplingState::new(policy),
                            next_due: None,
                            last_signature: None,
                            last_context_key: None,
                            parked: false,
                        },
                    )
                })
            })
            .collect();

        Self { families, verbose }
    }

    /// Never-sampled families are always due.
    pub fn is_due(&self, kind: SourceKind, now: Instant) -> bool {
        self.families
            .get(&kind)
            .map_or(false, |family| family.next_due.map_or(true, |due| now >= due))
    }

    /// Whether the observed window moved since this family last sampled.
    /// Parked families ignore context changes.
    pub fn context_changed(&self, kind: SourceKind, context_key: Option<&str>) -> bool {
        self.families.get(&kind).map_or(false, |family| {
            !family.parked
                && family.last_signature.is_some()
                && family.last_context_key.as_deref() != context_key
        })
    }

    /// Record that `kind` was sampled at `now`, adapt its cadence and schedule
    /// the next sample. Returns the new interval when it changed.
    pub fn record(
        &mut self,
        kind: SourceKind,
        signature: Option<SampleSignature>,
        context_key: Option<&str>,
        now: Instant,
    ) -> Option<Duration> {
        let verbose = self.verbose;
        let family = self.families.get_mut(&kind)?;

        let score = match (&signature, &family.last_signature) {
            (Some(current), Some(previous)) => Some(similarity(current, previous, &family.policy)),
            // first accepted result: nothing to compare against yet
            (Some(_), None) => Some(0.0),
            (None, _) => None,
        };

        let changed = if family.parked {
            None
        } else {
            family.state.adapt(score, &family.policy)
        };

        if let Some(interval) = changed {
            if verbose {
                log_info!("{kind} interval -> {}ms (similarity {:?})", interval.as_millis(), score);
            } else {
                log_debug!("{kind} interval -> {}ms (similarity {:?})", interval.as_millis(), score);
            }
        }

        if signature.is_some() {
            family.last_signature = signature;
        }
        family.last_context_key = context_key.map(str::to_string);
        family.next_due = Some(now + family.state.current_interval);
        changed
    }

    /// Slow a family to its max interval until [`unpark`](Self::unpark).
    pub fn park(&mut self, kind: SourceKind, now: Instant) {
        if let Some(family) = self.families.get_mut(&kind) {
            family.parked = true;
            family.state.park_at_max();
            family.next_due = Some(now + family.state.current_interval);
        }
    }

    /// Resume normal adaptation, starting again from the base interval.
    pub fn unpark(&mut self, kind: SourceKind) {
        if let Some(family) = self.families.get_mut(&kind) {
            if family.parked {
                family.parked = false;
                family.state.current_interval = family.state.base_interval;
                family.state.consecutive_stable_count = 0;
            }
        }
    }

    pub fn is_parked(&self, kind: SourceKind) -> bool {
        self.families.get(&kind).map_or(false, |family| family.parked)
    }

    pub fn state(&self, kind: SourceKind) -> Option<&SamplingState> {
        self.families.get(&kind).map(|family| &family.state)
    }

    pub fn current_interval(&self, kind: SourceKind) -> Option<Duration> {
        self.state(kind).map(|state| state.current_interval)
    }
}
