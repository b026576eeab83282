//! Content classification behind a narrow trait so fusion stays independent
//! of the heuristics.

use crate::models::UNKNOWN_CATEGORY;

/// Category guess for a block of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: String,
    pub confidence: f64,
}

impl Classification {
    pub fn new(category: impl Into<String>, confidence: f64) -> Self {
        Self {
            category: category.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_CATEGORY, 0.0)
    }
}

pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str) -> Classification;
}

/// Hits at which a category's confidence stops growing with evidence.
const SATURATION_HITS: f64 = 4.0;

/// Default keyword table, one row per category.
pub const DEFAULT_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "coding",
        &[
            "fn ", "impl ", "struct ", "class ", "def ", "import ", "return", "cargo", "compile",
            "debug", "git ", "commit", "pull request", "terminal", "function", "const ",
            "error[e", "stack trace", ".rs", ".py", ".ts", "npm ",
        ],
    ),
    (
        "browsing",
        &["http", "www.", "search", "google", "new tab", "bookmark", "reddit", "youtube"],
    ),
    (
        "writing",
        &["draft", "paragraph", "heading", "chapter", "notes", "word count", "outline", "essay"],
    ),
    (
        "communication",
        &["inbox", "reply", "message", "slack", "thread", "compose", "unread", "mention"],
    ),
    (
        "meeting",
        &["mute", "unmute", "participants", "zoom", "meet.google", "recording", "join call"],
    ),
    (
        "design",
        &["figma", "layer", "artboard", "canvas", "prototype", "component", "frame"],
    ),
];

/// Lower-cased substring matching against a keyword table.
///
/// Confidence is the winning category's share of all hits, scaled down while
/// it has fewer than `SATURATION_HITS` hits. Ties go to the earlier table row.
pub struct KeywordClassifier {
    table: Vec<(String, Vec<String>)>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS)
    }
}

impl KeywordClassifier {
    pub fn new(table: &[(&str, &[&str])]) -> Self {
        Self {
            table: table
                .iter()
                .map(|(category, words)| {
                    (
                        category.to_string(),
                        words.iter().map(|w| w.to_lowercase()).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Classification {
        let lower = text.to_lowercase();
        if lower.trim().is_empty() {
            return Classification::unknown();
        }

        let mut best: Option<(&str, usize)> = None;
        let mut total_hits = 0usize;

        for (category, words) in &self.table {
            let hits: usize = words.iter().map(|w| lower.matches(w.as_str()).count()).sum();
            total_hits += hits;
            if hits > best.map_or(0, |(_, h)| h) {
                best = Some((category.as_str(), hits));
            }
        }

        match best {
            Some((category, hits)) => {
                let share = hits as f64 / total_hits as f64;
                let evidence = (hits as f64 / SATURATION_HITS).min(1.0);
                Classification::new(category, share * evidence)
            }
            None => Classification::unknown(),
        }
    }
}
