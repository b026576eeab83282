use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tokio::time::{Duration, Instant};

use crate::cache::ResultCache;
use crate::config::EngineConfig;
use crate::error::DetectorError;
use crate::fusion::{historical_signal, FusionEngine};
use crate::history::{compute_statistics, window_start, HistoryRing};
use crate::metrics::{CycleMetrics, EngineMetrics, MetricsSnapshot};
use crate::models::{
    ActivityRecord, ActivityStatistics, DetectionResult, FusedResult, SourceKind,
    StabilizedActivity, WindowContext,
};
use crate::sampling::{SampleSignature, SamplingController};
use crate::sensing::{with_timeout, ContextProvider, Detector};
use crate::stabilizer::{StabilizerOutcome, TemporalStabilizer};

use super::events::EngineEvent;
use super::fanout::fan_out;
use super::wiring::Collaborators;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Per-cycle bookkeeping for the summary log and metrics.
#[derive(Debug, Default)]
struct CycleTally {
    invoked: usize,
    cached: usize,
    held: usize,
    skipped: usize,
    failed: usize,
}

/// All mutable engine state, owned by the engine task.
///
/// `run_cycle` only awaits while gathering (context capture and detector
/// fan-out); every mutation happens after the last await, so dropping a
/// cycle mid-flight leaves the state exactly as it was before the cycle.
pub struct EngineCore {
    config: EngineConfig,
    context_provider: Arc<dyn ContextProvider>,
    detectors: Vec<Arc<dyn Detector>>,
    caches: HashMap<SourceKind, ResultCache<DetectionResult>>,
    /// Last result per family, carried into cycles where the family is not due.
    held: HashMap<SourceKind, DetectionResult>,
    sampling: SamplingController,
    fusion: FusionEngine,
    stabilizer: TemporalStabilizer,
    fused_history: HistoryRing<FusedResult>,
    activity_history: HistoryRing<ActivityRecord>,
    metrics: EngineMetrics,
    denied: HashSet<SourceKind>,
    current_tx: Arc<watch::Sender<Option<StabilizedActivity>>>,
    events_tx: broadcast::Sender<EngineEvent>,
}

impl EngineCore {
    pub fn new(
        config: EngineConfig,
        collaborators: Collaborators,
        current_tx: Arc<watch::Sender<Option<StabilizedActivity>>>,
        events_tx: broadcast::Sender<EngineEvent>,
    ) -> Self {
        let caches = SourceKind::FAMILIES
            .iter()
            .map(|kind| (*kind, ResultCache::new(config.cache.ttl(*kind))))
            .collect();

        Self {
            sampling: SamplingController::new(&config.sampling, config.debug),
            fusion: FusionEngine::new(config.fusion.clone(), collaborators.classifier),
            stabilizer: TemporalStabilizer::new(config.stabilizer.clone()),
            fused_history: HistoryRing::new(config.history.fused_capacity),
            activity_history: HistoryRing::new(config.history.activity_capacity),
            context_provider: collaborators.context_provider,
            detectors: collaborators.detectors,
            caches,
            held: HashMap::new(),
            metrics: EngineMetrics::new(),
            denied: HashSet::new(),
            current_tx,
            events_tx,
            config,
        }
    }

    pub fn fusion_interval(&self) -> Duration {
        self.config.fusion_interval()
    }

    pub fn current(&self) -> Option<StabilizedActivity> {
        self.stabilizer.current().cloned()
    }

    /// Drop every detector's private cache.
    pub async fn reset_detectors(&self) {
        for detector in &self.detectors {
            detector.reset().await;
        }
    }

    /// One fusion cycle. `force` treats every family as due.
    ///
    /// Returns the stabilized activity after the cycle, committed or held.
    pub async fn run_cycle(&mut self, force: bool) -> Option<StabilizedActivity> {
        let started = Instant::now();

        let captured = with_timeout(
            self.config.timeouts.context(),
            self.context_provider.capture_context(),
        )
        .await;
        let context_elapsed = started.elapsed();

        let context = match captured {
            Ok(context) => context,
            Err(err) => {
                self.context_failed(err, started, context_elapsed);
                return self.current();
            }
        };

        let key = context.context_key();
        let planned_at = Instant::now();
        let mut tally = CycleTally::default();
        let mut gathered: Vec<DetectionResult> = Vec::with_capacity(SourceKind::ALL.len());
        let mut sampled: Vec<SourceKind> = Vec::new();
        let mut cache_hits: Vec<SourceKind> = Vec::new();
        let mut to_invoke: Vec<Arc<dyn Detector>> = Vec::new();

        for detector in &self.detectors {
            let kind = detector.kind();
            let due = force
                || self.sampling.is_due(kind, planned_at)
                || self.sampling.context_changed(kind, Some(key.as_str()));

            if due {
                match self.caches.get(&kind).and_then(|cache| cache.lookup_at(&key, planned_at)) {
                    Some(hit) => {
                        gathered.push(hit.clone());
                        sampled.push(kind);
                        cache_hits.push(kind);
                    }
                    None => to_invoke.push(Arc::clone(detector)),
                }
            } else if let Some(last) = self
                .held
                .get(&kind)
                .filter(|last| last.context_key.as_deref() == Some(key.as_str()))
            {
                gathered.push(last.clone());
                tally.held += 1;
            } else {
                tally.skipped += 1;
            }
        }

        let fanout_started = Instant::now();
        let invocations = fan_out(&to_invoke, &context, self.config.timeouts.detector()).await;
        let fanout_elapsed = fanout_started.elapsed();
        // TTLs and next deadlines count from when the results arrived
        let now = Instant::now();

        // No awaits past this point.

        tally.cached = cache_hits.len();
        for kind in cache_hits {
            self.metrics.record_cache_hit(kind);
        }

        if !self.detectors.iter().any(|d| d.kind() == SourceKind::ApplicationState) {
            // context capture is the only app-state signal left
            self.permission_ok(SourceKind::ApplicationState);
        }

        for invocation in invocations {
            let kind = invocation.kind;
            tally.invoked += 1;

            let outcome = invocation.outcome.and_then(|result| match result.error.clone() {
                Some(err) => Err(err),
                None => Ok(result),
            });
            self.metrics
                .record_invocation(kind, invocation.latency, outcome.as_ref().err());

            let result = match outcome {
                Ok(result) => {
                    self.permission_ok(kind);
                    if let Some(cache) = self.caches.get_mut(&kind) {
                        cache.store_at(key.clone(), result.clone(), now);
                    }
                    self.held.insert(kind, result.clone());
                    result
                }
                Err(err) => {
                    tally.failed += 1;
                    self.detector_failed(kind, &err, invocation.latency, now);
                    self.held.remove(&kind);
                    DetectionResult::failed(kind, Some(key.clone()), err)
                }
            };

            sampled.push(kind);
            gathered.push(result);
        }

        let now_utc = Utc::now();
        if self.config.fusion.weights.weight(SourceKind::Historical) > 0.0 {
            if let Some(signal) = historical_signal(
                &self.activity_history,
                &key,
                now_utc,
                &self.config.fusion.historical,
            ) {
                gathered.push(signal);
            }
        }

        let Some(fused) = self.fusion.fuse(&gathered, now_utc) else {
            log_debug!("no family due and nothing held for {key}");
            self.finish_cycle(started, context_elapsed, fanout_elapsed, &tally, false);
            return self.current();
        };

        for kind in sampled {
            let signature = fused
                .category_from(kind)
                .map(|category| SampleSignature::new(category, Some(key.clone())));
            self.sampling.record(kind, signature, Some(key.as_str()), now);
        }

        let committed = self.observe(fused, &context, now_utc);
        self.finish_cycle(started, context_elapsed, fanout_elapsed, &tally, committed);
        self.current()
    }

    /// Feed one fused result to the stabilizer and publish the outcome.
    fn observe(&mut self, fused: FusedResult, context: &WindowContext, now: DateTime<Utc>) -> bool {
        let trace = fused.context.clone();
        let outcome = self.stabilizer.observe(fused.clone(), now);
        self.fused_history.push(fused);

        let StabilizerOutcome::Committed {
            activity,
            label_changed,
        } = outcome
        else {
            return false;
        };

        self.current_tx.send_replace(Some(activity.clone()));

        let key = context.context_key();
        let context_moved = self
            .activity_history
            .latest()
            .map_or(true, |last| last.context_key.as_deref() != Some(key.as_str()));
        if label_changed || context_moved {
            self.activity_history.push(ActivityRecord::new(
                activity.label.clone(),
                activity.confidence,
                Some(context),
                now,
            ));
        }

        if label_changed {
            log_info!(
                "committed activity '{}' (confidence {:.2}) [{}]",
                activity.label,
                activity.confidence,
                trace
            );
            // no subscribers is fine
            let _ = self.events_tx.send(EngineEvent::ActivityCommitted { activity });
        }
        true
    }

    fn context_failed(&mut self, err: DetectorError, started: Instant, context_elapsed: Duration) {
        log_warn!("window context capture failed: {err}");
        let now = Instant::now();

        let results: Vec<DetectionResult> = self
            .detectors
            .iter()
            .map(|detector| {
                let kind = detector.kind();
                let cause = if kind == SourceKind::ApplicationState {
                    err.clone()
                } else {
                    DetectorError::transient("no window context")
                };
                DetectionResult::failed(kind, None, cause)
            })
            .collect();

        if err.is_permission() {
            self.permission_denied(SourceKind::ApplicationState, &err, now);
        }

        let tally = CycleTally {
            failed: results.len(),
            ..CycleTally::default()
        };
        let now_utc = Utc::now();
        let committed = match self.fusion.fuse(&results, now_utc) {
            Some(fused) => {
                let outcome = self.stabilizer.observe(fused.clone(), now_utc);
                self.fused_history.push(fused);
                outcome.is_commit()
            }
            None => false,
        };
        self.finish_cycle(started, context_elapsed, Duration::ZERO, &tally, committed);
    }

    fn detector_failed(&mut self, kind: SourceKind, err: &DetectorError, latency: Duration, now: Instant) {
        match err {
            DetectorError::PermissionDenied(_) => self.permission_denied(kind, err, now),
            DetectorError::Timeout(budget) => {
                log_warn!("{kind} detector timed out after {budget}ms");
            }
            _ => {
                log_debug!("{kind} detector failed after {}ms: {err}", latency.as_millis());
            }
        }
    }

    fn permission_denied(&mut self, kind: SourceKind, err: &DetectorError, now: Instant) {
        if !self.denied.insert(kind) {
            return;
        }
        self.sampling.park(kind, now);
        log_warn!("{kind} lost a required permission, polling at max interval: {err}");
        let _ = self.events_tx.send(EngineEvent::PermissionDenied {
            family: kind,
            message: err.to_string(),
        });
    }

    fn permission_ok(&mut self, kind: SourceKind) {
        if !self.denied.remove(&kind) {
            return;
        }
        self.sampling.unpark(kind);
        log_info!("{kind} permission restored");
        let _ = self.events_tx.send(EngineEvent::PermissionRestored { family: kind });
    }

    fn finish_cycle(
        &mut self,
        started: Instant,
        context_elapsed: Duration,
        fanout_elapsed: Duration,
        tally: &CycleTally,
        committed: bool,
    ) {
        let total = started.elapsed();
        if self.config.debug {
            log_info!(
                "cycle {}ms: invoked={} cached={} held={} skipped={} failed={}",
                total.as_millis(),
                tally.invoked,
                tally.cached,
                tally.held,
                tally.skipped,
                tally.failed
            );
        } else {
            log_debug!(
                "cycle {}ms: invoked={} cached={} held={} skipped={} failed={}",
                total.as_millis(),
                tally.invoked,
                tally.cached,
                tally.held,
                tally.skipped,
                tally.failed
            );
        }

        self.metrics.record_cycle(CycleMetrics {
            timestamp: Utc::now(),
            context_ms: context_elapsed.as_millis() as u64,
            fanout_ms: fanout_elapsed.as_millis() as u64,
            total_ms: total.as_millis() as u64,
            invoked: tally.invoked,
            cached: tally.cached,
            skipped: tally.skipped,
            failed: tally.failed,
            committed,
        });
    }

    pub fn history(&self, since: Option<DateTime<Utc>>, limit: usize) -> Vec<FusedResult> {
        self.fused_history.recent_since(since, limit)
    }

    pub fn activity_history(&self, since: Option<DateTime<Utc>>, limit: usize) -> Vec<ActivityRecord> {
        self.activity_history.recent_since(since, limit)
    }

    pub fn statistics(&self, window: chrono::Duration) -> ActivityStatistics {
        compute_statistics(&self.fused_history, window_start(Utc::now(), window))
    }

    /// Prune both history rings. The stabilizer window is left alone.
    pub fn clear_history_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let removed =
            self.fused_history.prune_before(cutoff) + self.activity_history.prune_before(cutoff);
        log_info!("cleared {removed} history entries older than {cutoff}");
        removed
    }

    pub fn metrics(&mut self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
