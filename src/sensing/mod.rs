pub mod accessibility;
pub mod app_state;
pub mod collaborators;
pub mod detector;
pub mod ocr;
pub mod phash;

pub use accessibility::AccessibilityDetector;
pub use app_state::{category_for_bundle, AppStateDetector};
pub use collaborators::{
    CapturedImage, ContentExtractor, ContextProvider, ExtractedContent, ImageCapturer,
    RecognizedText, TextRecognizer, UiElement,
};
pub use detector::{with_timeout, Detector};
pub use ocr::OcrDetector;
