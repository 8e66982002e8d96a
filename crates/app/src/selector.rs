//! Provider / model / chat-mode picker.
//!
//! The controller owns no network code: model list refreshes go through the
//! `on_refresh` callback and the caller feeds results back with `set_models`.

use eframe::egui;
use providers::{ModelDescriptor, ProviderDescriptor};
use shared::agent_api::ChatModeKind;
use shared::settings::SettingsStores;
use std::sync::Arc;

type RefreshFn = Box<dyn FnMut(&ProviderDescriptor)>;
type ModeFn = Box<dyn FnMut(ChatModeKind)>;

pub struct ModelSelector {
    stores: Arc<SettingsStores>,
    providers: Vec<ProviderDescriptor>,
    models: Vec<ModelDescriptor>,
    search: String,
    mode: ChatModeKind,
    on_refresh: RefreshFn,
    on_mode: ModeFn,
}

impl ModelSelector {
    pub fn new(
        stores: Arc<SettingsStores>,
        providers: Vec<ProviderDescriptor>,
        on_refresh: impl FnMut(&ProviderDescriptor) + 'static,
        on_mode: impl FnMut(ChatModeKind) + 'static,
    ) -> Self {
        let current = stores.selected_provider.get();
        let models = providers
            .iter()
            .find(|p| p.name == current)
            .map(|p| p.static_models.clone())
            .unwrap_or_default();
        Self {
            stores,
            providers,
            models,
            search: String::new(),
            mode: ChatModeKind::default(),
            on_refresh: Box::new(on_refresh),
            on_mode: Box::new(on_mode),
        }
    }

    pub fn mode(&self) -> ChatModeKind {
        self.mode
    }

    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Uses stored settings, so enabling a provider or saving its key unlocks it.
    pub fn is_selectable(&self, provider: &ProviderDescriptor) -> bool {
        provider.is_selectable(&self.stores.provider_settings(&provider.name))
    }

    /// Returns false when the provider is unknown or inert.
    pub fn select_provider(&mut self, name: &str) -> bool {
        let Some(provider) = self.providers.iter().find(|p| p.name == name).cloned() else {
            tracing::debug!(provider = name, "ignoring unknown provider");
            return false;
        };
        if !self.is_selectable(&provider) {
            tracing::debug!(provider = name, "provider is not configured");
            return false;
        }

        let model = if provider.default_model.is_empty() {
            provider
                .static_models
                .first()
                .map(|m| m.name.clone())
                .unwrap_or_default()
        } else {
            provider.default_model.clone()
        };
        // Providers without static models get their model once the live list arrives.
        let persisted = if model.is_empty() {
            self.stores.selected_provider.set(provider.name.clone())
        } else {
            self.stores.set_selection(&provider.name, &model)
        };
        if let Err(e) = persisted {
            tracing::warn!(error = %e, "failed to persist provider selection");
        }

        self.models = provider.static_models.clone();
        self.search.clear();
        (self.on_refresh)(&provider);
        true
    }

    pub fn select_model(&mut self, name: &str) {
        if let Err(e) = self.stores.set_model(name) {
            tracing::warn!(error = %e, "failed to persist model selection");
        }
    }

    pub fn select_mode(&mut self, mode: ChatModeKind) {
        self.mode = mode;
        (self.on_mode)(mode);
    }

    /// Replace the listed models if `provider` is still the selected one.
    ///
    /// A saved model missing from the new list is replaced by its first entry.
    pub fn set_models(&mut self, provider: &str, models: Vec<ModelDescriptor>) {
        if self.stores.selected_provider.get() != provider {
            return;
        }
        let current = self.stores.selected_model.get();
        if !models.iter().any(|m| m.name == current) {
            if let Some(first) = models.first() {
                self.select_model(&first.name);
            }
        }
        self.models = models;
    }

    pub fn set_search(&mut self, query: &str) {
        self.search = query.to_string();
    }

    pub fn filtered_models(&self) -> Vec<&ModelDescriptor> {
        let query = self.search.trim().to_lowercase();
        self.models
            .iter()
            .filter(|m| {
                query.is_empty()
                    || m.name.to_lowercase().contains(&query)
                    || m.label.to_lowercase().contains(&query)
            })
            .collect()
    }

    pub fn show(&mut self, ui: &mut egui::Ui) {
        let current_provider = self.stores.selected_provider.get();
        let current_model = self.stores.selected_model.get();
        let mut picked_provider: Option<String> = None;
        let mut picked_model: Option<String> = None;
        let mut picked_mode: Option<ChatModeKind> = None;

        ui.horizontal(|ui| {
            egui::ComboBox::from_id_source("provider_select")
                .selected_text(current_provider.as_str())
                .show_ui(ui, |ui| {
                    for provider in &self.providers {
                        let enabled = self.is_selectable(provider);
                        let label = if enabled {
                            provider.name.clone()
                        } else {
                            format!("{} (not configured)", provider.name)
                        };
                        let selected = provider.name == current_provider;
                        if ui
                            .add_enabled(enabled, egui::SelectableLabel::new(selected, label))
                            .clicked()
                        {
                            picked_provider = Some(provider.name.clone());
                        }
                    }
                });

            let model_text = self
                .models
                .iter()
                .find(|m| m.name == current_model)
                .map(|m| m.label.clone())
                .unwrap_or_else(|| current_model.clone());
            egui::ComboBox::from_id_source("model_select")
                .selected_text(model_text)
                .width(260.0)
                .show_ui(ui, |ui| {
                    ui.add(
                        egui::TextEdit::singleline(&mut self.search)
                            .hint_text("Search models..."),
                    );
                    let filtered = self.filtered_models();
                    if filtered.is_empty() {
                        ui.label(egui::RichText::new("No models found").weak());
                    }
                    for model in filtered {
                        if ui
                            .selectable_label(model.name == current_model, model.label.as_str())
                            .clicked()
                        {
                            picked_model = Some(model.name.clone());
                        }
                    }
                });

            ui.separator();
            for kind in ChatModeKind::ALL {
                if ui
                    .selectable_label(self.mode == kind, kind.display_name())
                    .clicked()
                    && self.mode != kind
                {
                    picked_mode = Some(kind);
                }
            }
        });

        if let Some(name) = picked_provider {
            if name != current_provider {
                self.select_provider(&name);
            }
        }
        if let Some(name) = picked_model {
            self.select_model(&name);
        }
        if let Some(mode) = picked_mode {
            self.select_mode(mode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::ProviderKind;
    use shared::settings::ProviderSettings;
    use shared::store::{KeyValueStore, MemoryStore};
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    fn provider(name: &str, models: &[&str], default: &str, configurable: bool) -> ProviderDescriptor {
        ProviderDescriptor {
            name: name.into(),
            kind: ProviderKind::OpenAiCompatible,
            static_models: models
                .iter()
                .map(|m| ModelDescriptor::new(m, &m.to_uppercase(), name, 8000))
                .collect(),
            default_model: default.into(),
            configurable,
            local: false,
            dynamic_models: true,
            api_token_key: None,
            base_url_key: None,
            default_base_url: None,
            settings: ProviderSettings::default(),
        }
    }

    struct Harness {
        selector: ModelSelector,
        stores: Arc<SettingsStores>,
        refreshed: Rc<RefCell<Vec<String>>>,
        modes: Rc<RefCell<Vec<ChatModeKind>>>,
    }

    fn harness() -> Harness {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let providers = vec![
            provider("Open", &["o-1", "o-2"], "o-2", false),
            provider("NoDefault", &["n-1", "n-2"], "", false),
            provider("Locked", &["l-1"], "l-1", true),
            provider("Local", &[], "", false),
            provider("Off", &["x-1"], "x-1", false),
        ];
        let mut defaults: BTreeMap<String, ProviderSettings> = providers
            .iter()
            .map(|p| (p.name.clone(), ProviderSettings::enabled()))
            .collect();
        defaults.insert("Off".into(), ProviderSettings::default());
        let stores = Arc::new(SettingsStores::load(store, defaults));
        let refreshed = Rc::new(RefCell::new(Vec::new()));
        let modes = Rc::new(RefCell::new(Vec::new()));
        let r = refreshed.clone();
        let m = modes.clone();
        let selector = ModelSelector::new(
            stores.clone(),
            providers,
            move |p| r.borrow_mut().push(p.name.clone()),
            move |mode| m.borrow_mut().push(mode),
        );
        Harness {
            selector,
            stores,
            refreshed,
            modes,
        }
    }

    #[test]
    fn test_select_provider_writes_default_model_and_refreshes_once() {
        let mut h = harness();
        assert!(h.selector.select_provider("Open"));
        assert_eq!(h.stores.selected_provider.get(), "Open");
        assert_eq!(h.stores.selected_model.get(), "o-2");
        assert_eq!(*h.refreshed.borrow(), vec!["Open".to_string()]);

        assert!(h.selector.select_provider("NoDefault"));
        assert_eq!(h.stores.selected_model.get(), "n-1");
        assert_eq!(h.refreshed.borrow().len(), 2);
    }

    #[test]
    fn test_select_model_writes_only_model() {
        let mut h = harness();
        h.selector.select_provider("Open");
        h.selector.select_model("o-1");
        assert_eq!(h.stores.selected_provider.get(), "Open");
        assert_eq!(h.stores.selected_model.get(), "o-1");
        assert_eq!(h.refreshed.borrow().len(), 1);
    }

    #[test]
    fn test_inert_provider_changes_nothing() {
        let mut h = harness();
        let before = (h.stores.selected_provider.get(), h.stores.selected_model.get());
        assert!(!h.selector.select_provider("Locked"));
        assert!(!h.selector.select_provider("Off"));
        assert!(!h.selector.select_provider("Missing"));
        assert_eq!(
            (h.stores.selected_provider.get(), h.stores.selected_model.get()),
            before
        );
        assert!(h.refreshed.borrow().is_empty());
    }

    #[test]
    fn test_credentials_unlock_provider() {
        let mut h = harness();
        h.stores
            .update_provider_settings(
                "Locked",
                ProviderSettings {
                    enabled: true,
                    api_key: Some("sk-test".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(h.selector.select_provider("Locked"));
        assert_eq!(h.stores.selected_model.get(), "l-1");
    }

    #[test]
    fn test_mode_change_notifies() {
        let mut h = harness();
        h.selector.select_mode(ChatModeKind::Discuss);
        assert_eq!(h.selector.mode(), ChatModeKind::Discuss);
        assert_eq!(*h.modes.borrow(), vec![ChatModeKind::Discuss]);
    }

    #[test]
    fn test_search_is_case_insensitive_and_models_follow_selection() {
        let mut h = harness();
        h.selector.select_provider("Open");
        h.selector.set_models(
            "Open",
            vec![
                ModelDescriptor::new("gpt-4o", "GPT-4o", "Open", 8000),
                ModelDescriptor::new("llama3", "Llama 3", "Open", 8000),
            ],
        );
        h.selector.set_search("LLAMA");
        let names: Vec<_> = h.selector.filtered_models().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["llama3"]);

        h.selector.set_models("NoDefault", Vec::new());
        assert_eq!(h.selector.models().len(), 2);
    }

    #[test]
    fn test_disabled_provider_stays_inert_with_key() {
        let mut h = harness();
        h.stores
            .update_provider_settings(
                "Locked",
                ProviderSettings {
                    enabled: false,
                    api_key: Some("sk-test".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        let locked = h.selector.providers()[2].clone();
        assert!(!h.selector.is_selectable(&locked));
        assert!(!h.selector.select_provider("Locked"));
        assert!(h.refreshed.borrow().is_empty());
    }

    #[test]
    fn test_provider_without_static_models_takes_first_live_model() {
        let mut h = harness();
        h.selector.select_provider("Open");
        assert!(h.selector.select_provider("Local"));
        assert_eq!(h.stores.selected_provider.get(), "Local");
        assert!(h.selector.models().is_empty());
        assert_eq!(h.refreshed.borrow().last().map(String::as_str), Some("Local"));

        h.selector.set_models(
            "Local",
            vec![
                ModelDescriptor::new("llama3", "Llama 3", "Local", 8000),
                ModelDescriptor::new("qwen2", "Qwen 2", "Local", 8000),
            ],
        );
        assert_eq!(h.stores.selected_model.get(), "llama3");

        h.selector.select_model("qwen2");
        h.selector.set_models(
            "Local",
            vec![
                ModelDescriptor::new("llama3", "Llama 3", "Local", 8000),
                ModelDescriptor::new("qwen2", "Qwen 2", "Local", 8000),
            ],
        );
        assert_eq!(h.stores.selected_model.get(), "qwen2");
    }
}
