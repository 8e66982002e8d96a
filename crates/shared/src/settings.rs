//! Persisted settings containers.
//!
//! Each logical setting group lives in a [`PersistedCell`] under a fixed key.
//! A cell is initialized from the store (falling back to its default when the
//! entry is missing or malformed) and written back on every update.

use crate::shortcuts::{self, Shortcut};
use crate::store::{KeyValueStore, StoreError};
use crate::tabs::{self, TabConfig};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_PROVIDER: &str = "Anthropic";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
pub const DEFAULT_PROMPT_ID: &str = "default";

pub mod keys {
    pub const PROVIDER_SETTINGS: &str = "codesmith_provider_settings";
    pub const SELECTED_PROVIDER: &str = "codesmith_selected_provider";
    pub const SELECTED_MODEL: &str = "codesmith_selected_model";
    pub const CONTEXT_OPTIMIZATION: &str = "codesmith_context_optimization";
    pub const AUTO_SELECT_TEMPLATE: &str = "codesmith_auto_select_template";
    pub const DEVELOPER_MODE: &str = "codesmith_developer_mode";
    pub const PROMPT_ID: &str = "codesmith_prompt_id";
    pub const LATEST_BRANCH: &str = "codesmith_latest_branch";
    pub const TAB_CONFIGURATION: &str = "codesmith_tab_configuration";
    pub const SHORTCUTS: &str = "codesmith_shortcuts";
}

/// User-editable part of a provider descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Set once a provider without an API key (e.g. a local server) has been
    /// pointed at a working endpoint.
    #[serde(default)]
    pub configured: bool,
}

impl ProviderSettings {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.configured
            || self
                .api_key
                .as_deref()
                .map(|k| !k.trim().is_empty())
                .unwrap_or(false)
    }
}

pub type SubscriptionId = u64;
type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct CellState<T> {
    value: T,
    subscribers: Vec<(SubscriptionId, Subscriber<T>)>,
    next_id: SubscriptionId,
}

/// A single persisted value with read / write / subscribe operations.
pub struct PersistedCell<T> {
    key: &'static str,
    store: Arc<dyn KeyValueStore>,
    state: Mutex<CellState<T>>,
}

impl<T> PersistedCell<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + 'static,
{
    /// Load the persisted value, else `default`.
    pub fn load(store: Arc<dyn KeyValueStore>, key: &'static str, default: T) -> Self {
        let value = read_value(store.as_ref(), key).unwrap_or(default);
        Self::with_value(store, key, value)
    }

    /// Wrap an already-resolved value without writing it.
    pub fn with_value(store: Arc<dyn KeyValueStore>, key: &'static str, value: T) -> Self {
        Self {
            key,
            store,
            state: Mutex::new(CellState {
                value,
                subscribers: Vec::new(),
                next_id: 0,
            }),
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn get(&self) -> T {
        self.state.lock().value.clone()
    }

    /// Read without cloning the whole value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.state.lock().value)
    }

    pub fn set(&self, value: T) -> Result<(), StoreError> {
        self.update(|v| *v = value)
    }

    /// Mutate in place, persist, then notify subscribers.
    ///
    /// The in-memory value is updated even when the persistence write fails.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> Result<(), StoreError> {
        let (snapshot, subscribers) = {
            let mut state = self.state.lock();
            f(&mut state.value);
            let subs: Vec<Subscriber<T>> =
                state.subscribers.iter().map(|(_, s)| s.clone()).collect();
            (state.value.clone(), subs)
        };

        let persisted = serde_json::to_string(&snapshot)
            .map_err(StoreError::from)
            .and_then(|json| self.store.set(self.key, &json));
        if let Err(e) = &persisted {
            tracing::warn!(key = self.key, error = %e, "failed to persist setting");
        }

        for sub in subscribers {
            sub(&snapshot);
        }
        persisted
    }

    pub fn subscribe(&self, f: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push((id, Arc::new(f)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|(sid, _)| *sid != id);
        state.subscribers.len() != before
    }
}

/// Parse a stored value; missing or malformed entries yield `None`.
fn read_value<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str::<T>(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(key, error = %e, "stored setting is malformed, using default");
            None
        }
    }
}

/// Every persisted settings group, loaded in a fixed order.
pub struct SettingsStores {
    pub providers: PersistedCell<BTreeMap<String, ProviderSettings>>,
    pub selected_provider: PersistedCell<String>,
    pub selected_model: PersistedCell<String>,
    pub context_optimization: PersistedCell<bool>,
    pub auto_select_template: PersistedCell<bool>,
    pub developer_mode: PersistedCell<bool>,
    pub prompt_id: PersistedCell<String>,
    pub latest_branch: PersistedCell<bool>,
    pub tabs: PersistedCell<Vec<TabConfig>>,
    pub shortcuts: PersistedCell<BTreeMap<String, Shortcut>>,
}

impl SettingsStores {
    /// `provider_defaults` seeds providers the user has never touched.
    pub fn load(
        store: Arc<dyn KeyValueStore>,
        provider_defaults: BTreeMap<String, ProviderSettings>,
    ) -> Self {
        let mut providers = provider_defaults;
        if let Some(persisted) =
            read_value::<BTreeMap<String, ProviderSettings>>(store.as_ref(), keys::PROVIDER_SETTINGS)
        {
            providers.extend(persisted);
        }

        let tabs = tabs::merge_with_defaults(
            read_value(store.as_ref(), keys::TAB_CONFIGURATION).unwrap_or_default(),
        );
        let shortcuts = shortcuts::merge_with_defaults(
            read_value(store.as_ref(), keys::SHORTCUTS).unwrap_or_default(),
        );

        Self {
            providers: PersistedCell::with_value(store.clone(), keys::PROVIDER_SETTINGS, providers),
            selected_provider: PersistedCell::load(
                store.clone(),
                keys::SELECTED_PROVIDER,
                DEFAULT_PROVIDER.to_string(),
            ),
            selected_model: PersistedCell::load(
                store.clone(),
                keys::SELECTED_MODEL,
                DEFAULT_MODEL.to_string(),
            ),
            context_optimization: PersistedCell::load(
                store.clone(),
                keys::CONTEXT_OPTIMIZATION,
                true,
            ),
            auto_select_template: PersistedCell::load(
                store.clone(),
                keys::AUTO_SELECT_TEMPLATE,
                true,
            ),
            developer_mode: PersistedCell::load(store.clone(), keys::DEVELOPER_MODE, false),
            prompt_id: PersistedCell::load(
                store.clone(),
                keys::PROMPT_ID,
                DEFAULT_PROMPT_ID.to_string(),
            ),
            latest_branch: PersistedCell::load(store.clone(), keys::LATEST_BRANCH, false),
            tabs: PersistedCell::with_value(store.clone(), keys::TAB_CONFIGURATION, tabs),
            shortcuts: PersistedCell::with_value(store, keys::SHORTCUTS, shortcuts),
        }
    }

    pub fn provider_settings(&self, provider: &str) -> ProviderSettings {
        self.providers
            .with(|map| map.get(provider).cloned())
            .unwrap_or_default()
    }

    pub fn update_provider_settings(
        &self,
        provider: &str,
        settings: ProviderSettings,
    ) -> Result<(), StoreError> {
        tracing::info!(provider, enabled = settings.enabled, "provider settings updated");
        self.providers.update(|map| {
            map.insert(provider.to_string(), settings);
        })
    }

    /// Write provider and model together.
    ///
    /// Both cells are written even if the first write fails; the first error wins.
    pub fn set_selection(&self, provider: &str, model: &str) -> Result<(), StoreError> {
        let provider_written = self.selected_provider.set(provider.to_string());
        let model_written = self.selected_model.set(model.to_string());
        provider_written.and(model_written)
    }

    pub fn set_model(&self, model: &str) -> Result<(), StoreError> {
        self.selected_model.set(model.to_string())
    }

    pub fn set_context_optimization(&self, enabled: bool) -> Result<(), StoreError> {
        self.context_optimization.set(enabled)
    }

    pub fn set_auto_select_template(&self, enabled: bool) -> Result<(), StoreError> {
        self.auto_select_template.set(enabled)
    }

    pub fn set_developer_mode(&self, enabled: bool) -> Result<(), StoreError> {
        self.developer_mode.set(enabled)
    }

    pub fn set_prompt_id(&self, id: &str) -> Result<(), StoreError> {
        self.prompt_id.set(id.to_string())
    }

    pub fn set_latest_branch(&self, enabled: bool) -> Result<(), StoreError> {
        self.latest_branch.set(enabled)
    }

    pub fn update_tab_configuration(&self, tab: TabConfig) -> Result<(), StoreError> {
        self.tabs.update(|list| tabs::upsert(list, tab))
    }

    pub fn reset_tab_configuration(&self) -> Result<(), StoreError> {
        self.tabs.set(tabs::default_tabs())
    }

    pub fn update_shortcut(&self, id: &str, shortcut: Shortcut) -> Result<(), StoreError> {
        self.shortcuts.update(|map| {
            map.insert(id.to_string(), shortcut);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn memory() -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryStore::new())
    }

    fn provider_defaults() -> BTreeMap<String, ProviderSettings> {
        let mut map = BTreeMap::new();
        map.insert("Anthropic".to_string(), ProviderSettings::enabled());
        map.insert("Ollama".to_string(), ProviderSettings::default());
        map
    }

    #[test]
    fn test_defaults_when_store_empty() {
        let stores = SettingsStores::load(memory(), provider_defaults());
        assert_eq!(stores.selected_provider.get(), DEFAULT_PROVIDER);
        assert_eq!(stores.selected_model.get(), DEFAULT_MODEL);
        assert!(stores.context_optimization.get());
        assert_eq!(stores.prompt_id.get(), DEFAULT_PROMPT_ID);
        assert!(stores.provider_settings("Anthropic").enabled);
        assert!(!stores.provider_settings("Ollama").enabled);
    }

    #[test]
    fn test_settings_survive_reload() {
        let store = memory();
        let stores = SettingsStores::load(store.clone(), provider_defaults());
        stores.set_selection("OpenAI", "gpt-4o").unwrap();
        stores.set_context_optimization(false).unwrap();
        stores
            .update_provider_settings(
                "Ollama",
                ProviderSettings {
                    enabled: true,
                    base_url: Some("http://10.0.0.2:11434".into()),
                    configured: true,
                    ..Default::default()
                },
            )
            .unwrap();

        let reloaded = SettingsStores::load(store, provider_defaults());
        assert_eq!(reloaded.selected_provider.get(), "OpenAI");
        assert_eq!(reloaded.selected_model.get(), "gpt-4o");
        assert!(!reloaded.context_optimization.get());
        let ollama = reloaded.provider_settings("Ollama");
        assert!(ollama.enabled && ollama.configured);
        assert!(reloaded.provider_settings("Anthropic").enabled);
    }

    #[test]
    fn test_malformed_entry_falls_back_to_default() {
        let store = memory();
        store.set(keys::CONTEXT_OPTIMIZATION, "not-a-bool").unwrap();
        store.set(keys::PROVIDER_SETTINGS, "{broken").unwrap();
        store.set(keys::TAB_CONFIGURATION, "[{").unwrap();

        let stores = SettingsStores::load(store, provider_defaults());
        assert!(stores.context_optimization.get());
        assert!(stores.provider_settings("Anthropic").enabled);
        assert_eq!(stores.tabs.get(), tabs::default_tabs());
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let cell = PersistedCell::load(memory(), keys::DEVELOPER_MODE, false);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let id = cell.subscribe(move |v: &bool| {
            if *v {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        cell.set(true).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(cell.unsubscribe(id));
        cell.set(true).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!cell.unsubscribe(id));
    }

    #[test]
    fn test_tab_update_and_reset() {
        let stores = SettingsStores::load(memory(), provider_defaults());
        let mut debug = stores
            .tabs
            .with(|t| t.iter().find(|t| t.id == "debug").cloned())
            .unwrap();
        debug.visible = false;
        stores.update_tab_configuration(debug).unwrap();
        assert!(stores
            .tabs
            .with(|t| t.iter().any(|t| t.id == "debug" && !t.visible)));

        stores.reset_tab_configuration().unwrap();
        assert_eq!(stores.tabs.get(), tabs::default_tabs());
    }

    /// Rejects writes to one key, accepts everything else.
    struct FailingStore {
        inner: MemoryStore,
        failing_key: &'static str,
    }

    impl KeyValueStore for FailingStore {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            if key == self.failing_key {
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only",
                )));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_set_selection_writes_model_when_provider_write_fails() {
        let inner = Arc::new(FailingStore {
            inner: MemoryStore::new(),
            failing_key: keys::SELECTED_PROVIDER,
        });
        let store: Arc<dyn KeyValueStore> = inner.clone();
        let stores = SettingsStores::load(store, provider_defaults());

        let err = stores.set_selection("OpenAI", "gpt-4o").unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(stores.selected_provider.get(), "OpenAI");
        assert_eq!(stores.selected_model.get(), "gpt-4o");
        assert!(inner.get(keys::SELECTED_PROVIDER).is_none());
        assert_eq!(
            inner.get(keys::SELECTED_MODEL).as_deref(),
            Some("\"gpt-4o\"")
        );
    }

    #[test]
    fn test_has_credentials() {
        assert!(!ProviderSettings::enabled().has_credentials());
        let blank = ProviderSettings {
            api_key: Some("  ".into()),
            ..Default::default()
        };
        assert!(!blank.has_credentials());
        let keyed = ProviderSettings {
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        assert!(keyed.has_credentials());
    }
}
