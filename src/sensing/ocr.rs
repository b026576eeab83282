use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::DetectorError;
use crate::models::{DetectionResult, SourceKind, WindowContext};

use super::collaborators::{ImageCapturer, TextRecognizer};
use super::detector::{with_timeout, Detector};
use super::phash::{compute_hamming_distance, compute_phash};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

pub const OCR_COOLDOWN_SECS: u64 = 20;
pub const PHASH_CHANGE_THRESHOLD: u32 = 8;

/// Reliability assumed when the recognizer reports text without per-region scores.
const UNSCORED_RELIABILITY: f64 = 0.5;

#[derive(Debug, Clone)]
struct OcrMemo {
    context_key: String,
    phash: String,
    recognized_at: Instant,
    text: String,
    confidence: f64,
}

/// Screen capture followed by text recognition.
///
/// Recognition is expensive, so the last result is reused while the window
/// stays the same and its screenshot hash has not drifted past
/// [`PHASH_CHANGE_THRESHOLD`], or while the cooldown since the last
/// recognition is still running.
pub struct OcrDetector {
    capturer: Arc<dyn ImageCapturer>,
    recognizer: Arc<dyn TextRecognizer>,
    capture_timeout: Duration,
    recognition_timeout: Duration,
    memo: Mutex<Option<OcrMemo>>,
}

impl OcrDetector {
    pub fn new(
        capturer: Arc<dyn ImageCapturer>,
        recognizer: Arc<dyn TextRecognizer>,
        capture_timeout: Duration,
        recognition_timeout: Duration,
    ) -> Self {
        Self {
            capturer,
            recognizer,
            capture_timeout,
            recognition_timeout,
            memo: Mutex::new(None),
        }
    }

    fn result(context: &WindowContext, key: String, text: &str, confidence: f64) -> DetectionResult {
        if text.trim().is_empty() {
            return DetectionResult::no_content(SourceKind::Ocr, Some(key));
        }
        DetectionResult::new(
            SourceKind::Ocr,
            context.window.title.clone(),
            text.trim().to_string(),
            confidence,
            Some(key),
        )
    }
}

fn should_perform_ocr(memo: Option<&OcrMemo>, context_key: &str, phash: &str, now: Instant) -> bool {
    let Some(memo) = memo else {
        return true;
    };
    if memo.context_key != context_key {
        return true;
    }
    if !cooldown_elapsed(memo.recognized_at, now) {
        return false;
    }
    compute_hamming_distance(phash, &memo.phash) >= PHASH_CHANGE_THRESHOLD
}

fn cooldown_elapsed(recognized_at: Instant, now: Instant) -> bool {
    now.saturating_duration_since(recognized_at) >= Duration::from_secs(OCR_COOLDOWN_SECS)
}

#[async_trait]
impl Detector for OcrDetector {
    fn kind(&self) -> SourceKind {
        SourceKind::Ocr
    }

    async fn detect(&self, context: &WindowContext) -> Result<DetectionResult, DetectorError> {
        let key = context.context_key();

        let Some(image) =
            with_timeout(self.capture_timeout, self.capturer.capture_image(&context.window)).await?
        else {
            log_debug!("nothing capturable for window {}", context.window.window_id);
            return Ok(DetectionResult::no_content(SourceKind::Ocr, Some(key)));
        };

        let image = Arc::new(image);
        let phash = tokio::task::spawn_blocking({
            let image = Arc::clone(&image);
            move || compute_phash(&image.bytes)
        })
        .await
        .map_err(|err| DetectorError::transient(format!("phash worker join failed: {err}")))?
        .map_err(|err| DetectorError::transient(format!("{err:#}")))?;

        let now = Instant::now();
        {
            let memo = self.memo.lock().await;
            if !should_perform_ocr(memo.as_ref(), &key, &phash, now) {
                if let Some(memo) = memo.as_ref() {
                    log_debug!("reusing recognized text for {key}");
                    return Ok(Self::result(context, key, &memo.text, memo.confidence));
                }
            }
        }

        let recognized =
            match with_timeout(self.recognition_timeout, self.recognizer.recognize_text(&image)).await {
                Ok(recognized) => recognized,
                Err(err) => {
                    log_warn!("text recognition failed for window {}: {err}", image.window_id);
                    return Err(err);
                }
            };

        let confidence = if recognized.region_confidences.is_empty() {
            UNSCORED_RELIABILITY
        } else {
            recognized.mean_confidence()
        };

        *self.memo.lock().await = Some(OcrMemo {
            context_key: key.clone(),
            phash,
            recognized_at: Instant::now(),
            text: recognized.text.clone(),
            confidence,
        });

        Ok(Self::result(context, key, &recognized.text, confidence))
    }

    async fn reset(&self) {
        *self.memo.lock().await = None;
    }
}
