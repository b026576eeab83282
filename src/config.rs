use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::models::SourceKind;

/// Env flag that switches the engine to a fast, verbose cadence.
pub const DEBUG_ENV_VAR: &str = "ACTIVITY_SENSE_DEBUG";

const DEBUG_FUSION_INTERVAL_MS: u64 = 250;

/// Upper bound for any configured interval or window: one week. Keeps
/// duration arithmetic (chrono spans, interval scaling) far from overflow.
pub const MAX_SPAN_MS: u64 = 7 * 24 * 3_600 * 1_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Period of the fusion cycle. Detector families are checked for due-ness on each tick.
    pub fusion_interval_ms: u64,
    pub fusion: FusionConfig,
    pub stabilizer: StabilizerConfig,
    pub sampling: SamplingConfig,
    pub cache: CacheConfig,
    pub timeouts: TimeoutConfig,
    pub history: HistoryConfig,
    #[serde(skip)]
    pub debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fusion_interval_ms: 1_000,
            fusion: FusionConfig::default(),
            stabilizer: StabilizerConfig::default(),
            sampling: SamplingConfig::default(),
            cache: CacheConfig::default(),
            timeouts: TimeoutConfig::default(),
            history: HistoryConfig::default(),
            debug: false,
        }
    }
}

/// Base weight per source kind. Must sum to at most 1.0 so fused confidence stays bounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceWeights {
    pub accessibility: f64,
    pub ocr: f64,
    pub application_state: f64,
    pub historical: f64,
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            accessibility: 0.40,
            ocr: 0.30,
            application_state: 0.20,
            historical: 0.10,
        }
    }
}

impl SourceWeights {
    pub fn weight(&self, kind: SourceKind) -> f64 {
        match kind {
            SourceKind::Accessibility => self.accessibility,
            SourceKind::Ocr => self.ocr,
            SourceKind::ApplicationState => self.application_state,
            SourceKind::Historical => self.historical,
        }
    }

    pub fn total(&self) -> f64 {
        SourceKind::ALL.iter().map(|kind| self.weight(*kind)).sum()
    }
}

/// Recency handling for the historical signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalConfig {
    /// Exponential decay half-life; 0 disables decay.
    pub half_life_secs: u64,
    /// Past activities older than this are ignored; 0 means no bound.
    pub max_age_secs: u64,
}

impl Default for HistoricalConfig {
    fn default() -> Self {
        Self {
            half_life_secs: 600,
            max_age_secs: 3_600,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub weights: SourceWeights,
    pub historical: HistoricalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// Trailing span of fused results considered for a commit.
    pub window_secs: u64,
    /// Debounce floor: fewer results than this never commit.
    pub min_window_count: usize,
    /// Average fused confidence required to commit.
    pub commit_threshold: f64,
    pub capacity: usize,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            window_secs: 10,
            min_window_count: 3,
            // OCR and app state agreeing on their own must still commit
            commit_threshold: 0.35,
            capacity: 32,
        }
    }
}

/// Cadence policy of one detector family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingPolicy {
    pub base_interval_ms: u64,
    pub max_interval_ms: u64,
    /// Multiplier applied once a family has been stable long enough (> 1).
    pub grow_factor: f64,
    /// Multiplier applied on divergence (between 0 and 1).
    pub shrink_factor: f64,
    /// Similarity above which a round counts as stable.
    pub stable_threshold: f64,
    /// Stable rounds needed before the interval grows.
    pub debounce_count: u32,
    pub label_weight: f64,
    pub context_weight: f64,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            base_interval_ms: 2_000,
            max_interval_ms: 10_000,
            grow_factor: 1.25,
            shrink_factor: 0.75,
            stable_threshold: 0.8,
            debounce_count: 2,
            label_weight: 0.7,
            context_weight: 0.3,
        }
    }
}

impl SamplingPolicy {
    pub fn with_bounds(base_interval_ms: u64, max_interval_ms: u64) -> Self {
        Self {
            base_interval_ms,
            max_interval_ms,
            ..Self::default()
        }
    }

    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub accessibility: SamplingPolicy,
    pub ocr: SamplingPolicy,
    pub application_state: SamplingPolicy,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            accessibility: SamplingPolicy::with_bounds(2_000, 10_000),
            ocr: SamplingPolicy::with_bounds(5_000, 60_000),
            application_state: SamplingPolicy::with_bounds(1_000, 5_000),
        }
    }
}

impl SamplingConfig {
    /// `None` for kinds without a detector family.
    pub fn policy(&self, kind: SourceKind) -> Option<&SamplingPolicy> {
        match kind {
            SourceKind::Accessibility => Some(&self.accessibility),
            SourceKind::Ocr => Some(&self.ocr),
            SourceKind::ApplicationState => Some(&self.application_state),
            SourceKind::Historical => None,
        }
    }
}

/// Result TTL per detector family: short for cheap signals, long for OCR.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub accessibility_ttl_ms: u64,
    pub ocr_ttl_ms: u64,
    pub application_state_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            accessibility_ttl_ms: 3_000,
            ocr_ttl_ms: 30_000,
            application_state_ttl_ms: 1_000,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self, kind: SourceKind) -> Duration {
        let ms = match kind {
            SourceKind::Accessibility => self.accessibility_ttl_ms,
            SourceKind::Ocr => self.ocr_ttl_ms,
            SourceKind::ApplicationState => self.application_state_ttl_ms,
            SourceKind::Historical => 0,
        };
        Duration::from_millis(ms)
    }
}

/// Per-call budgets for the inbound collaborators, plus an outer bound per detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub context_ms: u64,
    pub extraction_ms: u64,
    pub capture_ms: u64,
    pub recognition_ms: u64,
    pub detector_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            context_ms: 1_000,
            extraction_ms: 3_000,
            capture_ms: 3_000,
            recognition_ms: 8_000,
            detector_ms: 10_000,
        }
    }
}

impl TimeoutConfig {
    pub fn context(&self) -> Duration {
        Duration::from_millis(self.context_ms)
    }

    pub fn extraction(&self) -> Duration {
        Duration::from_millis(self.extraction_ms)
    }

    pub fn capture(&self) -> Duration {
        Duration::from_millis(self.capture_ms)
    }

    pub fn recognition(&self) -> Duration {
        Duration::from_millis(self.recognition_ms)
    }

    pub fn detector(&self) -> Duration {
        Duration::from_millis(self.detector_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub fused_capacity: usize,
    pub activity_capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            fused_capacity: 512,
            activity_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file. A missing file yields defaults; a present but
    /// unreadable or malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse engine config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write engine config to {}", path.display()))
    }

    /// Apply `ACTIVITY_SENSE_DEBUG`: fast fusion ticks and verbose cadence logs.
    pub fn with_env_overrides(mut self) -> Self {
        let debug_mode = std::env::var(DEBUG_ENV_VAR)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if debug_mode {
            self.debug = true;
            self.fusion_interval_ms = DEBUG_FUSION_INTERVAL_MS;
        }
        self
    }

    pub fn fusion_interval(&self) -> Duration {
        Duration::from_millis(self.fusion_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.fusion_interval_ms > 0, "fusion_interval_ms must be greater than zero");

        let weights = &self.fusion.weights;
        for kind in SourceKind::ALL {
            let weight = weights.weight(kind);
            ensure!(
                (0.0..=1.0).contains(&weight),
                "weight for {kind} must be within [0, 1], got {weight}"
            );
        }
        // small epsilon so 0.4 + 0.3 + 0.2 + 0.1 passes
        if weights.total() > 1.0 + 1e-9 {
            bail!("source weights sum to {:.3}, must not exceed 1.0", weights.total());
        }

        for kind in SourceKind::FAMILIES {
            if let Some(policy) = self.sampling.policy(kind) {
                validate_policy(kind, policy)?;
            }
        }

        let stabilizer = &self.stabilizer;
        ensure!(stabilizer.min_window_count > 0, "min_window_count must be at least 1");
        ensure!(stabilizer.capacity > 0, "stabilizer capacity must be at least 1");
        ensure!(
            stabilizer.capacity >= stabilizer.min_window_count,
            "stabilizer capacity {} cannot hold min_window_count {}",
            stabilizer.capacity,
            stabilizer.min_window_count
        );
        ensure!(
            (0.0..=1.0).contains(&stabilizer.commit_threshold),
            "commit_threshold must be within [0, 1]"
        );
        ensure!(stabilizer.window_secs > 0, "window_secs must be greater than zero");
        ensure!(
            stabilizer.window_secs.saturating_mul(1_000) <= MAX_SPAN_MS,
            "window_secs must not exceed {}",
            MAX_SPAN_MS / 1_000
        );
        ensure!(
            self.fusion_interval_ms <= MAX_SPAN_MS,
            "fusion_interval_ms must not exceed {MAX_SPAN_MS}"
        );

        ensure!(self.history.fused_capacity > 0, "fused_capacity must be at least 1");
        ensure!(self.history.activity_capacity > 0, "activity_capacity must be at least 1");
        Ok(())
    }
}

fn validate_policy(kind: SourceKind, policy: &SamplingPolicy) -> Result<()> {
    ensure!(policy.base_interval_ms > 0, "{kind}: base interval must be greater than zero");
    ensure!(
        policy.base_interval_ms <= policy.max_interval_ms,
        "{kind}: base interval {}ms exceeds max interval {}ms",
        policy.base_interval_ms,
        policy.max_interval_ms
    );
    ensure!(
        policy.max_interval_ms <= MAX_SPAN_MS,
        "{kind}: max interval must not exceed {MAX_SPAN_MS}ms"
    );
    ensure!(policy.grow_factor > 1.0, "{kind}: grow_factor must be greater than 1");
    ensure!(
        policy.shrink_factor > 0.0 && policy.shrink_factor < 1.0,
        "{kind}: shrink_factor must be within (0, 1)"
    );
    ensure!(
        (0.0..=1.0).contains(&policy.stable_threshold),
        "{kind}: stable_threshold must be within [0, 1]"
    );
    ensure!(
        policy.label_weight >= 0.0
            && policy.context_weight >= 0.0
            && policy.label_weight + policy.context_weight <= 1.0 + 1e-9,
        "{kind}: similarity weights must be non-negative and sum to at most 1"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert!((config.fusion.weights.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_weights_over_one() {
        let mut config = EngineConfig::default();
        config.fusion.weights.accessibility = 0.9;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must not exceed 1.0"));
    }

    #[test]
    fn test_rejects_inverted_interval_bounds() {
        let mut config = EngineConfig::default();
        config.sampling.ocr = SamplingPolicy::with_bounds(10_000, 1_000);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_factors() {
        let mut config = EngineConfig::default();
        config.sampling.accessibility.grow_factor = 1.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.sampling.accessibility.shrink_factor = 1.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_window_count() {
        let mut config = EngineConfig::default();
        config.stabilizer.min_window_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unbounded_spans() {
        let mut config = EngineConfig::default();
        config.stabilizer.window_secs = u64::MAX / 2;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.sampling.ocr.max_interval_ms = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.stabilizer.window_secs = MAX_SPAN_MS / 1_000;
        config.sampling.ocr.max_interval_ms = MAX_SPAN_MS;
        config.validate().unwrap();
    }

    #[test]
    fn test_debug_env_override() {
        // only test in this crate that touches the variable
        std::env::set_var(DEBUG_ENV_VAR, "true");
        let config = EngineConfig::default().with_env_overrides();
        std::env::remove_var(DEBUG_ENV_VAR);

        assert!(config.debug);
        assert_eq!(config.fusion_interval_ms, 250);
        config.validate().unwrap();

        let config = EngineConfig::default().with_env_overrides();
        assert!(!config.debug);
        assert_eq!(config.fusion_interval_ms, 1_000);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.fusion_interval_ms, EngineConfig::default().fusion_interval_ms);
    }

    #[test]
    fn test_save_then_load_preserves_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.json");

        let mut config = EngineConfig::default();
        config.stabilizer.min_window_count = 5;
        config.cache.ocr_ttl_ms = 45_000;
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.stabilizer.min_window_count, 5);
        assert_eq!(loaded.cache.ocr_ttl_ms, 45_000);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{ "stabilizer": { "commitThreshold": 0.9, "window_secs": 20 } }"#)
            .unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.stabilizer.window_secs, 20);
        // unknown keys are ignored, everything else falls back
        assert_eq!(
            loaded.stabilizer.commit_threshold,
            StabilizerConfig::default().commit_threshold
        );
        assert_eq!(loaded.sampling.ocr.base_interval_ms, 5_000);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(&path, "{ not json").unwrap();

        let err = EngineConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse engine config"));
    }

    #[test]
    fn test_cache_ttl_per_family() {
        let cache = CacheConfig::default();
        assert!(cache.ttl(SourceKind::Ocr) > cache.ttl(SourceKind::ApplicationState));
        assert_eq!(cache.ttl(SourceKind::Historical), Duration::ZERO);
    }
}
