//! Stub collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use activity_sense::config::SourceWeights;
use activity_sense::fusion::Classification;
use activity_sense::models::WindowIdentity;
use activity_sense::sensing::ExtractedContent;
use activity_sense::{
    Classifier, ContentExtractor, ContextProvider, DetectionResult, Detector, DetectorError,
    EngineConfig, SourceKind, WindowContext,
};
use async_trait::async_trait;
use tokio::sync::Notify;

pub fn editor_window() -> WindowContext {
    WindowContext::new("com.microsoft.VSCode", "Code", 7, "engine.rs - activity-sense")
}

pub fn browser_window() -> WindowContext {
    WindowContext::new("com.apple.Safari", "Safari", 8, "docs.rs")
}

/// Config with only the given weights, a 3-result window and no caching
/// unless a test turns it back on.
pub fn config_with(weights: SourceWeights, threshold: f64) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.fusion.weights = weights;
    config.stabilizer.min_window_count = 3;
    config.stabilizer.commit_threshold = threshold;
    config.stabilizer.window_secs = 60;
    config.cache.accessibility_ttl_ms = 0;
    config.cache.ocr_ttl_ms = 0;
    config.cache.application_state_ttl_ms = 0;
    config
}

pub fn weights(accessibility: f64, ocr: f64, application_state: f64, historical: f64) -> SourceWeights {
    SourceWeights {
        accessibility,
        ocr,
        application_state,
        historical,
    }
}

/// Foreground window that tests can switch or break.
pub struct SwitchableContext {
    current: Mutex<Result<WindowContext, DetectorError>>,
}

impl SwitchableContext {
    pub fn new(context: WindowContext) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(Ok(context)),
        })
    }

    pub fn set(&self, context: Result<WindowContext, DetectorError>) {
        *self.current.lock().unwrap() = context;
    }
}

#[async_trait]
impl ContextProvider for SwitchableContext {
    async fn capture_context(&self) -> Result<WindowContext, DetectorError> {
        self.current.lock().unwrap().clone()
    }
}

/// Replays scripted accessibility text; the last entry repeats.
pub struct ScriptedExtractor {
    script: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    pub calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn new(script: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.iter().map(|s| s.to_string()).collect()),
            last: Mutex::new(String::new()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ContentExtractor for ScriptedExtractor {
    async fn extract_content(&self, _window: &WindowIdentity) -> Result<ExtractedContent, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let text = match next {
            Some(text) => {
                *self.last.lock().unwrap() = text.clone();
                text
            }
            None => self.last.lock().unwrap().clone(),
        };
        Ok(ExtractedContent {
            text,
            elements: Vec::new(),
        })
    }
}

/// Category is the first word of the text, at a fixed confidence.
pub struct FirstWordClassifier(pub f64);

impl Classifier for FirstWordClassifier {
    fn classify(&self, text: &str) -> Classification {
        match text.split_whitespace().next() {
            Some(word) => Classification::new(word, self.0),
            None => Classification::unknown(),
        }
    }
}

/// Detector whose answer tests can change between cycles.
pub struct StubDetector {
    kind: SourceKind,
    answer: Mutex<Result<(String, f64), DetectorError>>,
    delay: Mutex<Duration>,
    pub calls: AtomicUsize,
    pub entered: Notify,
    pub dropped_mid_call: AtomicBool,
}

impl StubDetector {
    /// For text kinds the label doubles as content so the classifier sees it.
    pub fn new(kind: SourceKind, label: &str, confidence: f64) -> Arc<Self> {
        Arc::new(Self {
            kind,
            answer: Mutex::new(Ok((label.to_string(), confidence))),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
            entered: Notify::new(),
            dropped_mid_call: AtomicBool::new(false),
        })
    }

    pub fn answer(&self, answer: Result<(&str, f64), DetectorError>) {
        *self.answer.lock().unwrap() = answer.map(|(label, confidence)| (label.to_string(), confidence));
    }

    pub fn delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Flags the stub when its in-flight call is dropped before finishing.
struct CallGuard<'a> {
    flag: &'a AtomicBool,
    finished: bool,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.flag.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Detector for StubDetector {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn detect(&self, context: &WindowContext) -> Result<DetectionResult, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut guard = CallGuard {
            flag: &self.dropped_mid_call,
            finished: false,
        };
        self.entered.notify_one();

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        guard.finished = true;

        let answer = self.answer.lock().unwrap().clone();
        let (label, confidence) = answer?;
        let key = Some(context.context_key());
        Ok(if self.kind.is_text() {
            DetectionResult::new(self.kind, context.window.title.clone(), label, confidence, key)
        } else {
            DetectionResult::new(self.kind, label, "", confidence, key)
        })
    }
}
