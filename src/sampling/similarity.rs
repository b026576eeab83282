use crate::config::SamplingPolicy;

/// What the cadence controller compares between consecutive accepted results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSignature {
    pub label: String,
    pub context_key: Option<String>,
}

impl SampleSignature {
    pub fn new(label: impl Into<String>, context_key: Option<String>) -> Self {
        Self {
            label: label.into(),
            context_key,
        }
    }
}

/// Weighted label/context equality in [0, 1].
///
/// Two missing context keys count as different: an unknown window is never
/// evidence of stability.
pub fn similarity(current: &SampleSignature, previous: &SampleSignature, policy: &SamplingPolicy) -> f64 {
    let label_match = !current.label.is_empty() && current.label == previous.label;
    let context_match = matches!(
        (&current.context_key, &previous.context_key),
        (Some(a), Some(b)) if a == b
    );

    let mut score = 0.0;
    if label_match {
        score += policy.label_weight;
    }
    if context_match {
        score += policy.context_weight;
    }
    score.clamp(0.0, 1.0)
}
