//! Inbound collaborator contracts.
//!
//! The host supplies the platform side (window metadata, accessibility walk,
//! screen capture, text recognition) behind these traits. Every call is
//! awaited under a per-call timeout by the detectors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DetectorError;
use crate::models::{WindowContext, WindowIdentity};

/// One element from the accessibility tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiElement {
    pub role: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContent {
    pub text: String,
    pub elements: Vec<UiElement>,
}

/// Encoded screenshot of one window.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pub window_id: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedText {
    pub text: String,
    pub region_confidences: Vec<f64>,
}

impl RecognizedText {
    pub fn mean_confidence(&self) -> f64 {
        if self.region_confidences.is_empty() {
            return 0.0;
        }
        self.region_confidences.iter().sum::<f64>() / self.region_confidences.len() as f64
    }
}

/// Foreground app and window.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn capture_context(&self) -> Result<WindowContext, DetectorError>;
}

/// Accessibility-tree text of a window.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract_content(&self, window: &WindowIdentity) -> Result<ExtractedContent, DetectorError>;
}

/// Window screenshot. `Ok(None)` when the window has nothing capturable
/// (minimized, off-screen).
#[async_trait]
pub trait ImageCapturer: Send + Sync {
    async fn capture_image(&self, window: &WindowIdentity) -> Result<Option<CapturedImage>, DetectorError>;
}

#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize_text(&self, image: &CapturedImage) -> Result<RecognizedText, DetectorError>;
}
