use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DetectorError;
use crate::models::{DetectionResult, SourceKind, WindowContext};

use super::collaborators::ContentExtractor;
use super::detector::{with_timeout, Detector};

/// Reliability when the tree exposes only element labels, no body text.
const ELEMENTS_ONLY_RELIABILITY: f64 = 0.6;

/// Roles whose labels are chrome, not content.
const IGNORED_ROLES: &[&str] = &["AXScrollBar", "AXSplitter", "AXToolbar", "AXImage"];

/// Text from the accessibility tree of the focused window.
pub struct AccessibilityDetector {
    extractor: Arc<dyn ContentExtractor>,
    timeout: Duration,
}

impl AccessibilityDetector {
    pub fn new(extractor: Arc<dyn ContentExtractor>, timeout: Duration) -> Self {
        Self { extractor, timeout }
    }
}

#[async_trait]
impl Detector for AccessibilityDetector {
    fn kind(&self) -> SourceKind {
        SourceKind::Accessibility
    }

    async fn detect(&self, context: &WindowContext) -> Result<DetectionResult, DetectorError> {
        let key = Some(context.context_key());
        let extracted =
            with_timeout(self.timeout, self.extractor.extract_content(&context.window)).await?;

        let body = extracted.text.trim();
        let element_text = extracted
            .elements
            .iter()
            .filter(|element| !IGNORED_ROLES.contains(&element.role.as_str()))
            .map(|element| element.label.trim())
            .filter(|label| !label.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let (content, reliability) = match (body.is_empty(), element_text.is_empty()) {
            (true, true) => return Ok(DetectionResult::no_content(SourceKind::Accessibility, key)),
            (true, false) => (element_text, ELEMENTS_ONLY_RELIABILITY),
            (false, true) => (body.to_string(), 1.0),
            (false, false) => (format!("{body} {element_text}"), 1.0),
        };

        Ok(DetectionResult::new(
            SourceKind::Accessibility,
            context.window.title.clone(),
            content,
            reliability,
            key,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WindowIdentity;
    use crate::sensing::collaborators::{ExtractedContent, UiElement};

    struct FixedExtractor(Result<ExtractedContent, DetectorError>);

    #[async_trait]
    impl ContentExtractor for FixedExtractor {
        async fn extract_content(
            &self,
            _window: &WindowIdentity,
        ) -> Result<ExtractedContent, DetectorError> {
            self.0.clone()
        }
    }

    struct SlowExtractor;

    #[async_trait]
    impl ContentExtractor for SlowExtractor {
        async fn extract_content(
            &self,
            _window: &WindowIdentity,
        ) -> Result<ExtractedContent, DetectorError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ExtractedContent::default())
        }
    }

    fn context() -> WindowContext {
        WindowContext::new("com.microsoft.VSCode", "Code", 3, "engine.rs - activity")
    }

    fn detector(result: Result<ExtractedContent, DetectorError>) -> AccessibilityDetector {
        AccessibilityDetector::new(Arc::new(FixedExtractor(result)), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_body_text_is_fully_reliable() {
        let result = detector(Ok(ExtractedContent {
            text: "fn main() {}".into(),
            elements: vec![UiElement {
                role: "AXButton".into(),
                label: "Run".into(),
            }],
        }))
        .detect(&context())
        .await
        .unwrap();

        assert_eq!(result.source_kind, SourceKind::Accessibility);
        assert_eq!(result.content, "fn main() {} Run");
        assert_eq!(result.label, "engine.rs - activity");
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.context_key, Some(context().context_key()));
    }

    #[tokio::test]
    async fn test_elements_only_is_less_reliable() {
        let result = detector(Ok(ExtractedContent {
            text: "  ".into(),
            elements: vec![
                UiElement {
                    role: "AXScrollBar".into(),
                    label: "vertical".into(),
                },
                UiElement {
                    role: "AXStaticText".into(),
                    label: "Inbox".into(),
                },
            ],
        }))
        .detect(&context())
        .await
        .unwrap();

        assert_eq!(result.content, "Inbox");
        assert_eq!(result.confidence, ELEMENTS_ONLY_RELIABILITY);
    }

    #[tokio::test]
    async fn test_empty_tree_is_no_content() {
        let result = detector(Ok(ExtractedContent::default()))
            .detect(&context())
            .await
            .unwrap();
        assert!(result.is_no_content());
    }

    #[tokio::test]
    async fn test_permission_error_propagates() {
        let err = detector(Err(DetectorError::permission("accessibility")))
            .detect(&context())
            .await
            .unwrap_err();
        assert!(err.is_permission());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_extraction_times_out() {
        let detector = AccessibilityDetector::new(Arc::new(SlowExtractor), Duration::from_millis(500));
        let err = detector.detect(&context()).await.unwrap_err();
        assert_eq!(err, DetectorError::Timeout(500));
    }
}
