use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::FusionConfig;
use crate::models::{
    CategoryScore, DetectionResult, FusedResult, SourceContribution, SourceKind, UNKNOWN_CATEGORY,
};

use super::classifier::Classifier;

/// Combines one round of detection results into a single [`FusedResult`].
///
/// Stateless apart from configuration: the same batch always fuses to the
/// same result.
pub struct FusionEngine {
    config: FusionConfig,
    classifier: Arc<dyn Classifier>,
}

impl FusionEngine {
    pub fn new(config: FusionConfig, classifier: Arc<dyn Classifier>) -> Self {
        Self { config, classifier }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Fuse one batch. An empty batch yields `None`; a batch where nothing is
    /// usable yields an `unknown` result with zero confidence.
    pub fn fuse(&self, results: &[DetectionResult], now: DateTime<Utc>) -> Option<FusedResult> {
        if results.is_empty() {
            return None;
        }

        // Stable sort: equal kinds keep arrival order
        let mut ordered: Vec<&DetectionResult> = results.iter().collect();
        ordered.sort_by_key(|result| result.source_kind.priority());

        let mut scores: Vec<CategoryScore> = Vec::new();
        let mut contributions: Vec<SourceContribution> = Vec::new();
        let mut descriptors: Vec<String> = Vec::with_capacity(ordered.len());

        for result in &ordered {
            let kind = result.source_kind;

            if let Some(error) = &result.error {
                descriptors.push(format!("{kind}:{}", error.tag()));
                continue;
            }

            let Some((category, local_confidence)) = self.score_source(result) else {
                descriptors.push(format!("{kind}:none"));
                continue;
            };

            // History may only reinforce what a live source already reports
            if kind == SourceKind::Historical
                && !contributions
                    .iter()
                    .any(|c| c.source_kind != SourceKind::Historical && c.category == category)
            {
                descriptors.push(format!("{kind}:{category}~ignored"));
                continue;
            }

            let weighted = local_confidence * self.config.weights.weight(kind);
            if weighted <= 0.0 {
                descriptors.push(format!("{kind}:none"));
                continue;
            }

            match scores.iter_mut().find(|entry| entry.category == category) {
                Some(entry) => entry.score += weighted,
                None => scores.push(CategoryScore {
                    category: category.clone(),
                    score: weighted,
                }),
            }
            descriptors.push(format!("{kind}:{category}={weighted:.2}"));
            contributions.push(SourceContribution {
                source_kind: kind,
                category,
                weighted_score: weighted,
            });
        }

        let context = descriptors.join(" | ");
        let context_key = ordered.iter().find_map(|result| result.context_key.clone());

        // First-inserted wins among equal maxima
        let primary = scores.iter().fold(None::<&CategoryScore>, |best, entry| match best {
            Some(current) if current.score >= entry.score => Some(current),
            _ => Some(entry),
        });

        let Some(primary) = primary else {
            return Some(FusedResult {
                primary_category: UNKNOWN_CATEGORY.to_string(),
                overall_confidence: 0.0,
                category_scores: Vec::new(),
                contributing_sources: Vec::new(),
                contributions: Vec::new(),
                context,
                context_key,
                timestamp: now,
            });
        };

        let total: f64 = contributions.iter().map(|c| c.weighted_score).sum();
        let mut contributing_sources: Vec<SourceKind> = Vec::new();
        for contribution in &contributions {
            if !contributing_sources.contains(&contribution.source_kind) {
                contributing_sources.push(contribution.source_kind);
            }
        }

        Some(FusedResult {
            primary_category: primary.category.clone(),
            overall_confidence: total.min(1.0),
            category_scores: scores.clone(),
            contributing_sources,
            contributions,
            context,
            context_key,
            timestamp: now,
        })
    }

    /// Category and local confidence for one result, before the base weight.
    ///
    /// Text sources are classified from their content and scaled by their
    /// extraction reliability; other sources already carry a category label.
    fn score_source(&self, result: &DetectionResult) -> Option<(String, f64)> {
        if !result.is_usable() {
            return None;
        }

        if result.source_kind.is_text() {
            let classification = self.classifier.classify(&result.content);
            if classification.category == UNKNOWN_CATEGORY || classification.confidence <= 0.0 {
                return None;
            }
            Some((
                classification.category,
                classification.confidence * result.confidence,
            ))
        } else {
            Some((result.label.clone(), result.confidence))
        }
    }
}
