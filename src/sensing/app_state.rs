use async_trait::async_trait;

use crate::error::DetectorError;
use crate::models::{DetectionResult, SourceKind, WindowContext};

use super::detector::Detector;

/// Local confidence for a table match. The app alone says little about the task.
pub const APP_MATCH_CONFIDENCE: f64 = 0.75;

/// Bundle ids of IDEs, editors and terminals.
pub const CODING_APPS: &[&str] = &[
    "com.microsoft.VSCode",
    "com.microsoft.VSCodeInsiders",
    "dev.zed.Zed",
    "com.jetbrains.intellij",
    "com.jetbrains.intellij.ce",
    "com.jetbrains.WebStorm",
    "com.jetbrains.pycharm",
    "com.jetbrains.CLion",
    "com.jetbrains.goland",
    "com.jetbrains.rustrover",
    "com.sublimetext.4",
    "com.apple.dt.Xcode",
    "org.vim.MacVim",
    "com.googlecode.iterm2",
    "com.apple.Terminal",
    "io.alacritty",
    "com.github.wez.wezterm",
];

pub const BROWSING_APPS: &[&str] = &[
    "com.apple.Safari",
    "com.google.Chrome",
    "org.mozilla.firefox",
    "company.thebrowser.Browser",
    "com.brave.Browser",
    "com.microsoft.edgemac",
];

pub const MEETING_APPS: &[&str] = &[
    "us.zoom.xos",
    "com.microsoft.teams",
    "com.microsoft.teams2",
    "com.cisco.webexmeetingsapp",
    "com.apple.FaceTime",
];

pub const WRITING_APPS: &[&str] = &[
    "md.obsidian",
    "notion.id",
    "com.apple.Notes",
    "com.ulysses.mac",
    "com.microsoft.Word",
    "com.apple.iWork.Pages",
    "net.ia.iawriter",
    "co.noteplan.NotePlan3",
];

pub const COMMUNICATION_APPS: &[&str] = &[
    "com.tinyspeck.slackmacgap",
    "com.apple.mail",
    "com.microsoft.Outlook",
    "com.hnc.Discord",
    "com.apple.MobileSMS",
    "ru.keepcoder.Telegram",
];

pub const DESIGN_APPS: &[&str] = &[
    "com.figma.Desktop",
    "com.bohemiancoding.sketch3",
    "com.adobe.Photoshop",
    "com.adobe.illustrator",
];

const APP_TABLE: &[(&str, &[&str])] = &[
    ("coding", CODING_APPS),
    ("browsing", BROWSING_APPS),
    ("meeting", MEETING_APPS),
    ("writing", WRITING_APPS),
    ("communication", COMMUNICATION_APPS),
    ("design", DESIGN_APPS),
];

/// Category for a foreground bundle id, if the app is known.
pub fn category_for_bundle(bundle_id: &str) -> Option<&'static str> {
    APP_TABLE
        .iter()
        .find(|(_, apps)| apps.iter().any(|&app| app == bundle_id))
        .map(|(category, _)| *category)
}

/// Category from the foreground application alone. Cheap and never fails.
#[derive(Debug, Default)]
pub struct AppStateDetector;

impl AppStateDetector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Detector for AppStateDetector {
    fn kind(&self) -> SourceKind {
        SourceKind::ApplicationState
    }

    async fn detect(&self, context: &WindowContext) -> Result<DetectionResult, DetectorError> {
        let key = Some(context.context_key());
        if context.is_system() {
            return Ok(DetectionResult::no_content(SourceKind::ApplicationState, key));
        }

        Ok(match category_for_bundle(&context.app.bundle_id) {
            Some(category) => DetectionResult::new(
                SourceKind::ApplicationState,
                category,
                context.app.app_name.clone(),
                APP_MATCH_CONFIDENCE,
                key,
            ),
            None => DetectionResult::no_content(SourceKind::ApplicationState, key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_lookup() {
        assert_eq!(category_for_bundle("com.microsoft.VSCode"), Some("coding"));
        assert_eq!(category_for_bundle("us.zoom.xos"), Some("meeting"));
        assert_eq!(category_for_bundle("md.obsidian"), Some("writing"));
        assert_eq!(category_for_bundle("com.example.unknown"), None);
    }

    #[tokio::test]
    async fn test_known_app_maps_to_category() {
        let ctx = WindowContext::new("com.tinyspeck.slackmacgap", "Slack", 4, "general");
        let result = AppStateDetector::new().detect(&ctx).await.unwrap();

        assert_eq!(result.source_kind, SourceKind::ApplicationState);
        assert_eq!(result.label, "communication");
        assert_eq!(result.confidence, APP_MATCH_CONFIDENCE);
        assert!(result.is_usable());
    }

    #[tokio::test]
    async fn test_unknown_and_system_apps_are_no_content() {
        let detector = AppStateDetector::new();
        let unknown = WindowContext::new("com.example.unknown", "Thing", 1, "x");
        let system = WindowContext::new("", "", 0, "");

        assert!(detector.detect(&unknown).await.unwrap().is_no_content());
        assert!(detector.detect(&system).await.unwrap().is_no_content());
    }
}
