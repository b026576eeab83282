use chrono::{DateTime, Duration, Utc};

use crate::models::{ActivityStatistics, CategoryCount, FusedResult};

use super::ring::HistoryRing;

/// Start of a trailing `window` ending at `now`. Windows reaching past the
/// representable range saturate, so `Duration::MAX` means "all time".
pub fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window).unwrap_or(if window < Duration::zero() {
        DateTime::<Utc>::MAX_UTC
    } else {
        DateTime::<Utc>::MIN_UTC
    })
}

/// Summarize fused results at or after `since`.
///
/// `top_categories` is sorted by count, descending; equal counts keep the
/// order in which categories first appeared. A context switch is counted
/// whenever two consecutive results carrying a context key disagree on it.
pub fn compute_statistics(history: &HistoryRing<FusedResult>, since: DateTime<Utc>) -> ActivityStatistics {
    let mut count = 0usize;
    let mut confidence_sum = 0.0;
    let mut categories: Vec<CategoryCount> = Vec::new();
    let mut context_switch_count = 0usize;
    let mut last_key: Option<&str> = None;

    for result in history.iter().filter(|result| result.timestamp >= since) {
        count += 1;
        confidence_sum += result.overall_confidence;

        match categories
            .iter_mut()
            .find(|entry| entry.category == result.primary_category)
        {
            Some(entry) => entry.count += 1,
            None => categories.push(CategoryCount {
                category: result.primary_category.clone(),
                count: 1,
            }),
        }

        if let Some(key) = result.context_key.as_deref() {
            if last_key.is_some_and(|previous| previous != key) {
                context_switch_count += 1;
            }
            last_key = Some(key);
        }
    }

    // Stable sort keeps first-appearance order among equal counts
    categories.sort_by(|a, b| b.count.cmp(&a.count));

    ActivityStatistics {
        count,
        avg_confidence: if count == 0 {
            0.0
        } else {
            confidence_sum / count as f64
        },
        top_categories: categories,
        context_switch_count,
    }
}
