//! Settings-panel tab visibility and ordering.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabWindow {
    User,
    Developer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabConfig {
    pub id: String,
    pub visible: bool,
    pub window: TabWindow,
    pub order: u32,
}

impl TabConfig {
    fn new(id: &str, visible: bool, window: TabWindow, order: u32) -> Self {
        Self {
            id: id.to_string(),
            visible,
            window,
            order,
        }
    }

    pub fn label(&self) -> String {
        self.id
            .split('-')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn default_tabs() -> Vec<TabConfig> {
    vec![
        TabConfig::new("profile", true, TabWindow::User, 0),
        TabConfig::new("settings", true, TabWindow::User, 1),
        TabConfig::new("features", true, TabWindow::User, 2),
        TabConfig::new("cloud-providers", true, TabWindow::User, 3),
        TabConfig::new("local-providers", true, TabWindow::User, 4),
        TabConfig::new("shortcuts", true, TabWindow::User, 5),
        TabConfig::new("connection", false, TabWindow::User, 6),
        TabConfig::new("debug", true, TabWindow::Developer, 7),
        TabConfig::new("event-logs", true, TabWindow::Developer, 8),
    ]
}

/// Persisted tabs override defaults with the same id; defaults missing from
/// the persisted list are appended. Unknown persisted tabs are kept.
pub fn merge_with_defaults(persisted: Vec<TabConfig>) -> Vec<TabConfig> {
    let mut merged = persisted;
    for tab in default_tabs() {
        if !merged.iter().any(|t| t.id == tab.id) {
            merged.push(tab);
        }
    }
    merged
}

/// Replace the tab with the same id, or append it.
pub fn upsert(tabs: &mut Vec<TabConfig>, tab: TabConfig) {
    match tabs.iter_mut().find(|t| t.id == tab.id) {
        Some(existing) => *existing = tab,
        None => tabs.push(tab),
    }
}

/// Tabs to render, sorted by order. Developer tabs only show in developer mode.
pub fn visible_tabs(tabs: &[TabConfig], developer_mode: bool) -> Vec<&TabConfig> {
    let mut out: Vec<&TabConfig> = tabs
        .iter()
        .filter(|t| t.visible && (developer_mode || t.window == TabWindow::User))
        .collect();
    out.sort_by_key(|t| t.order);
    out
}
