use std::sync::Arc;

use anyhow::{bail, Result};

use crate::config::TimeoutConfig;
use crate::fusion::{Classifier, KeywordClassifier};
use crate::models::SourceKind;
use crate::sensing::{
    AccessibilityDetector, AppStateDetector, ContentExtractor, ContextProvider, Detector,
    ImageCapturer, OcrDetector, TextRecognizer,
};

/// Everything the engine calls out to, injected by the host.
#[derive(Clone)]
pub struct Collaborators {
    pub(crate) context_provider: Arc<dyn ContextProvider>,
    pub(crate) detectors: Vec<Arc<dyn Detector>>,
    pub(crate) classifier: Arc<dyn Classifier>,
}

impl Collaborators {
    /// No detectors yet, keyword classifier.
    pub fn new(context_provider: Arc<dyn ContextProvider>) -> Self {
        Self {
            context_provider,
            detectors: Vec::new(),
            classifier: Arc::new(KeywordClassifier::default()),
        }
    }

    /// The three built-in families wired to the host's platform services.
    pub fn standard(
        context_provider: Arc<dyn ContextProvider>,
        extractor: Arc<dyn ContentExtractor>,
        capturer: Arc<dyn ImageCapturer>,
        recognizer: Arc<dyn TextRecognizer>,
        timeouts: &TimeoutConfig,
    ) -> Self {
        Self::new(context_provider)
            .with_detector(Arc::new(AccessibilityDetector::new(
                extractor,
                timeouts.extraction(),
            )))
            .with_detector(Arc::new(OcrDetector::new(
                capturer,
                recognizer,
                timeouts.capture(),
                timeouts.recognition(),
            )))
            .with_detector(Arc::new(AppStateDetector::new()))
    }

    pub fn with_detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn detector_kinds(&self) -> Vec<SourceKind> {
        self.detectors.iter().map(|detector| detector.kind()).collect()
    }

    /// One detector per live family; history is derived by the engine itself.
    pub fn validate(&self) -> Result<()> {
        let mut seen: Vec<SourceKind> = Vec::with_capacity(self.detectors.len());
        for kind in self.detector_kinds() {
            if kind == SourceKind::Historical {
                bail!("the historical signal is computed by the engine, not a detector");
            }
            if seen.contains(&kind) {
                bail!("more than one {kind} detector registered");
            }
            seen.push(kind);
        }
        Ok(())
    }
}
