//! Keyboard shortcut preferences.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortcut {
    pub key: String,
    #[serde(default)]
    pub ctrl_key: bool,
    #[serde(default)]
    pub shift_key: bool,
    #[serde(default)]
    pub alt_key: bool,
    #[serde(default)]
    pub meta_key: bool,
    /// Cmd on macOS, Ctrl everywhere else.
    #[serde(default)]
    pub ctrl_or_meta_key: bool,
    #[serde(default)]
    pub description: String,
}

/// A key press as reported by the UI layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPress {
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Mac,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::Mac
        } else {
            Platform::Other
        }
    }
}

impl Shortcut {
    pub fn matches(&self, press: &KeyPress, platform: Platform) -> bool {
        if !self.key.eq_ignore_ascii_case(&press.key) {
            return false;
        }
        let (ctrl, meta) = if self.ctrl_or_meta_key {
            match platform {
                Platform::Mac => (false, true),
                Platform::Other => (true, false),
            }
        } else {
            (self.ctrl_key, self.meta_key)
        };
        press.ctrl == ctrl
            && press.meta == meta
            && press.shift == self.shift_key
            && press.alt == self.alt_key
    }
}

pub fn default_shortcuts() -> BTreeMap<String, Shortcut> {
    let mut map = BTreeMap::new();
    map.insert(
        "toggle_terminal".to_string(),
        Shortcut {
            key: "`".into(),
            ctrl_key: false,
            shift_key: false,
            alt_key: false,
            meta_key: false,
            ctrl_or_meta_key: true,
            description: "Toggle terminal".into(),
        },
    );
    map.insert(
        "toggle_theme".to_string(),
        Shortcut {
            key: "d".into(),
            ctrl_key: false,
            shift_key: true,
            alt_key: true,
            meta_key: true,
            ctrl_or_meta_key: false,
            description: "Toggle theme".into(),
        },
    );
    map.insert(
        "open_settings".to_string(),
        Shortcut {
            key: ",".into(),
            ctrl_key: false,
            shift_key: false,
            alt_key: false,
            meta_key: false,
            ctrl_or_meta_key: true,
            description: "Open settings".into(),
        },
    );
    map
}

/// Persisted overrides win; defaults fill in anything missing.
pub fn merge_with_defaults(persisted: BTreeMap<String, Shortcut>) -> BTreeMap<String, Shortcut> {
    let mut merged = default_shortcuts();
    merged.extend(persisted);
    merged
}

/// Id of the first shortcut matching `press`.
pub fn find_match<'a>(
    shortcuts: &'a BTreeMap<String, Shortcut>,
    press: &KeyPress,
    platform: Platform,
) -> Option<&'a str> {
    shortcuts
        .iter()
        .find(|(_, s)| s.matches(press, platform))
        .map(|(id, _)| id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(key: &str, ctrl: bool, meta: bool) -> KeyPress {
        KeyPress {
            key: key.into(),
            ctrl,
            meta,
            ..Default::default()
        }
    }

    #[test]
    fn test_ctrl_or_meta_follows_platform() {
        let shortcuts = default_shortcuts();
        let terminal = &shortcuts["toggle_terminal"];

        assert!(terminal.matches(&press("`", true, false), Platform::Other));
        assert!(!terminal.matches(&press("`", false, true), Platform::Other));
        assert!(terminal.matches(&press("`", false, true), Platform::Mac));
        assert!(!terminal.matches(&press("`", true, false), Platform::Mac));
    }

    #[test]
    fn test_key_compare_ignores_case() {
        let shortcuts = default_shortcuts();
        let theme = &shortcuts["toggle_theme"];
        let p = KeyPress {
            key: "D".into(),
            ctrl: false,
            shift: true,
            alt: true,
            meta: true,
        };
        assert!(theme.matches(&p, Platform::Other));
        assert_eq!(find_match(&shortcuts, &p, Platform::Other), Some("toggle_theme"));
    }

    #[test]
    fn test_persisted_override_wins() {
        let mut persisted = BTreeMap::new();
        persisted.insert(
            "toggle_terminal".to_string(),
            Shortcut {
                key: "j".into(),
                ctrl_key: true,
                shift_key: false,
                alt_key: false,
                meta_key: false,
                ctrl_or_meta_key: false,
                description: "Toggle terminal".into(),
            },
        );
        let merged = merge_with_defaults(persisted);
        assert_eq!(merged["toggle_terminal"].key, "j");
        assert!(merged.contains_key("toggle_theme"));
    }
}
