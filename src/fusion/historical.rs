use chrono::{DateTime, Utc};

use crate::config::HistoricalConfig;
use crate::history::HistoryRing;
use crate::models::{ActivityRecord, DetectionResult, SourceKind};

/// Recency signal: the most recent past activity for the same context key,
/// its confidence decayed by age.
///
/// Returns `None` when nothing matches, when the match is older than
/// `max_age_secs`, or when decay leaves nothing. Fusion only lets this
/// reinforce a category some live source already supports.
pub fn historical_signal(
    history: &HistoryRing<ActivityRecord>,
    context_key: &str,
    now: DateTime<Utc>,
    config: &HistoricalConfig,
) -> Option<DetectionResult> {
    let record = history
        .iter_recent()
        .find(|record| record.context_key.as_deref() == Some(context_key))?;

    let age_secs = (now - record.timestamp).num_milliseconds().max(0) as f64 / 1_000.0;
    if config.max_age_secs > 0 && age_secs > config.max_age_secs as f64 {
        return None;
    }

    let confidence = record.confidence * decay_factor(age_secs, config.half_life_secs);
    if confidence <= 0.0 {
        return None;
    }

    Some(
        DetectionResult::new(
            SourceKind::Historical,
            record.label.clone(),
            "",
            confidence,
            Some(context_key.to_string()),
        )
        .with_timestamp(now),
    )
}

fn decay_factor(age_secs: f64, half_life_secs: u64) -> f64 {
    if half_life_secs == 0 {
        return 1.0;
    }
    0.5f64.powf(age_secs / half_life_secs as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(label: &str, key: &str, confidence: f64, at: DateTime<Utc>) -> ActivityRecord {
        ActivityRecord {
            id: format!("{label}-{key}"),
            label: label.to_string(),
            confidence,
            context_key: Some(key.to_string()),
            app_name: None,
            timestamp: at,
        }
    }

    fn config(half_life_secs: u64, max_age_secs: u64) -> HistoricalConfig {
        HistoricalConfig {
            half_life_secs,
            max_age_secs,
        }
    }

    #[test]
    fn test_uses_most_recent_match_for_key() {
        let now = Utc::now();
        let mut history = HistoryRing::new(8);
        history.push(record("writing", "notes#1", 0.9, now - Duration::seconds(50)));
        history.push(record("coding", "code#1", 0.8, now - Duration::seconds(40)));
        history.push(record("reading", "notes#1", 0.7, now - Duration::seconds(10)));

        let signal = historical_signal(&history, "notes#1", now, &config(0, 0)).unwrap();
        assert_eq!(signal.source_kind, SourceKind::Historical);
        assert_eq!(signal.label, "reading");
        assert!((signal.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_decays_with_half_life() {
        let now = Utc::now();
        let mut history = HistoryRing::new(4);
        history.push(record("coding", "k", 0.8, now - Duration::seconds(60)));

        let signal = historical_signal(&history, "k", now, &config(60, 0)).unwrap();
        assert!((signal.confidence - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_drops_records_past_max_age() {
        let now = Utc::now();
        let mut history = HistoryRing::new(4);
        history.push(record("coding", "k", 0.8, now - Duration::seconds(120)));

        assert!(historical_signal(&history, "k", now, &config(0, 60)).is_none());
        assert!(historical_signal(&history, "k", now, &config(0, 600)).is_some());
    }

    #[test]
    fn test_no_match_for_other_keys() {
        let now = Utc::now();
        let mut history = HistoryRing::new(4);
        history.push(record("coding", "k", 0.8, now));
        assert!(historical_signal(&history, "other", now, &config(0, 0)).is_none());
    }
}
