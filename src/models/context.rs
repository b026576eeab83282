use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Synthetic bundle id for windows without an owning app (menu bar, dock).
pub const SYSTEM_BUNDLE_ID: &str = "com.apple.system";

/// Foreground application identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppIdentity {
    pub bundle_id: String,
    pub app_name: String,
}

/// Foreground window identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowIdentity {
    pub window_id: u32,
    pub title: String,
}

/// What `capture_context` reports: the app and window currently in front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowContext {
    pub app: AppIdentity,
    pub window: WindowIdentity,
}

impl WindowContext {
    pub fn new(
        bundle_id: impl Into<String>,
        app_name: impl Into<String>,
        window_id: u32,
        title: impl Into<String>,
    ) -> Self {
        let mut app = AppIdentity {
            bundle_id: bundle_id.into(),
            app_name: app_name.into(),
        };
        // Record system windows under a stable synthetic id instead of dropping them
        if app.bundle_id.is_empty() {
            app.bundle_id = SYSTEM_BUNDLE_ID.to_string();
            app.app_name = "System UI".to_string();
        }

        Self {
            app,
            window: WindowIdentity {
                window_id,
                title: title.into(),
            },
        }
    }

    pub fn is_system(&self) -> bool {
        self.app.bundle_id == SYSTEM_BUNDLE_ID
    }

    /// Stable identifier of what is being observed: `bundle_id#title-hash`.
    ///
    /// The window id is left out so that reopening the same document maps to
    /// the same key.
    pub fn context_key(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.window.title.hash(&mut hasher);
        format!("{}#{:016x}", self.app.bundle_id, hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_key_ignores_window_id() {
        let a = WindowContext::new("com.microsoft.VSCode", "Code", 11, "main.rs - crate");
        let b = WindowContext::new("com.microsoft.VSCode", "Code", 42, "main.rs - crate");
        assert_eq!(a.context_key(), b.context_key());
    }

    #[test]
    fn test_context_key_changes_with_title() {
        let a = WindowContext::new("com.microsoft.VSCode", "Code", 1, "main.rs");
        let b = WindowContext::new("com.microsoft.VSCode", "Code", 1, "lib.rs");
        assert_ne!(a.context_key(), b.context_key());
        assert!(a.context_key().starts_with("com.microsoft.VSCode#"));
    }

    #[test]
    fn test_empty_bundle_becomes_system() {
        let ctx = WindowContext::new("", "", 7, "");
        assert!(ctx.is_system());
        assert_eq!(ctx.app.app_name, "System UI");
    }
}
