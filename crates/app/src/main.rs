use chat_host::{ChatHost, ChatRequest};
use eframe::egui;
use providers::{ModelCatalog, ProviderDescriptor, ProviderRegistry};
use shared::agent_api::{ChatMessage, ChatModeKind, Role, StreamChunk};
use shared::settings::SettingsStores;
use shared::shortcuts::{find_match, KeyPress, Platform};
use shared::store::{FileStore, KeyValueStore, MemoryStore};
use shared::tabs::visible_tabs;
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod selector;
mod worker;

use selector::ModelSelector;
use worker::WorkerEvent;

const MAX_CONSOLE_LINES: usize = 200;

enum SelectorSignal {
    Refresh(String),
    Mode(ChatModeKind),
}

fn open_store() -> Arc<dyn KeyValueStore> {
    match FileStore::open_default() {
        Ok(store) => {
            tracing::info!(path = %store.path().display(), "loaded settings");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "no settings directory, settings will not persist");
            Arc::new(MemoryStore::new())
        }
    }
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let registry = ProviderRegistry::new();
    let stores = Arc::new(SettingsStores::load(open_store(), registry.default_settings()));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([720.0, 480.0]),
        vsync: true,
        ..Default::default()
    };
    eframe::run_native(
        "Codesmith",
        options,
        Box::new(move |cc| Box::new(CodesmithApp::new(cc, stores, registry))),
    )
}

struct CodesmithApp {
    stores: Arc<SettingsStores>,
    host: Arc<ChatHost>,
    selector: ModelSelector,
    signals: Receiver<SelectorSignal>,
    events_tx: Sender<WorkerEvent>,
    events_rx: Receiver<WorkerEvent>,
    history: Vec<ChatMessage>,
    input: String,
    /// Request id and partial reply of the call in flight.
    pending: Option<(String, String)>,
    status: Option<String>,
    last_system_prompt: Option<String>,
    console: Vec<String>,
    show_console: bool,
    show_settings: bool,
    settings_tab: String,
    dark_mode: bool,
    key_inputs: BTreeMap<String, String>,
    url_inputs: BTreeMap<String, String>,
}

impl CodesmithApp {
    fn new(cc: &eframe::CreationContext<'_>, stores: Arc<SettingsStores>, registry: ProviderRegistry) -> Self {
        let providers: Vec<ProviderDescriptor> = registry.providers().to_vec();
        let host = Arc::new(ChatHost::new(Arc::new(registry)));
        let (signal_tx, signals) = mpsc::channel();
        let (events_tx, events_rx) = mpsc::channel();

        let refresh_tx = signal_tx.clone();
        let selector = ModelSelector::new(
            stores.clone(),
            providers,
            move |provider| {
                let _ = refresh_tx.send(SelectorSignal::Refresh(provider.name.clone()));
            },
            move |mode| {
                let _ = signal_tx.send(SelectorSignal::Mode(mode));
            },
        );

        let mut app = Self {
            stores,
            host,
            selector,
            signals,
            events_tx,
            events_rx,
            history: Vec::new(),
            input: String::new(),
            pending: None,
            status: None,
            last_system_prompt: None,
            console: Vec::new(),
            show_console: false,
            show_settings: false,
            settings_tab: "settings".to_string(),
            dark_mode: true,
            key_inputs: BTreeMap::new(),
            url_inputs: BTreeMap::new(),
        };
        let current = app.stores.selected_provider.get();
        app.refresh_models(&cc.egui_ctx, current);
        app
    }

    fn log(&mut self, line: impl Into<String>) {
        self.console.push(line.into());
        if self.console.len() > MAX_CONSOLE_LINES {
            let overflow = self.console.len() - MAX_CONSOLE_LINES;
            self.console.drain(..overflow);
        }
    }

    fn refresh_models(&mut self, ctx: &egui::Context, provider: String) {
        self.log(format!("refreshing models for {}", provider));
        let credentials = providers::Credentials::with_settings(self.stores.providers.get());
        worker::refresh_models(
            self.host.clone(),
            provider,
            credentials,
            self.events_tx.clone(),
            ctx.clone(),
        );
    }

    fn send(&mut self, ctx: &egui::Context) {
        let text = self.input.trim().to_string();
        if text.is_empty() || self.pending.is_some() {
            return;
        }
        self.input.clear();
        self.history.push(ChatMessage::user(text));

        let mut request = ChatRequest::from_settings(&self.stores, self.history.clone());
        request.chat_mode = self.selector.mode();
        let request_id = uuid::Uuid::new_v4().to_string();
        self.pending = Some((request_id.clone(), String::new()));
        self.status = None;
        worker::run_chat(
            self.host.clone(),
            request_id,
            request,
            self.events_tx.clone(),
            ctx.clone(),
        );
    }

    fn poll(&mut self, ctx: &egui::Context) {
        while let Ok(signal) = self.signals.try_recv() {
            match signal {
                SelectorSignal::Refresh(provider) => self.refresh_models(ctx, provider),
                SelectorSignal::Mode(mode) => self.log(format!("chat mode: {}", mode.as_str())),
            }
        }

        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                WorkerEvent::Models { provider, models } => {
                    self.log(format!("{}: {} models", provider, models.len()));
                    self.selector.set_models(&provider, models);
                }
                WorkerEvent::Prepared {
                    request_id,
                    provider,
                    model,
                    system,
                    warning,
                } => {
                    if !self.is_pending(&request_id) {
                        continue;
                    }
                    self.log(format!("request {} → {} / {}", request_id, provider, model));
                    if let Some(warning) = warning {
                        self.log(warning.clone());
                        self.status = Some(warning);
                    }
                    self.last_system_prompt = Some(system);
                }
                WorkerEvent::Chunk { request_id, chunk } => {
                    if !self.is_pending(&request_id) {
                        continue;
                    }
                    match chunk {
                        StreamChunk::Text(text) => {
                            if let Some((_, reply)) = self.pending.as_mut() {
                                reply.push_str(&text);
                            }
                        }
                        StreamChunk::Done { stop_reason } => {
                            self.log(format!("stop reason: {}", stop_reason.unwrap_or_default()));
                        }
                        StreamChunk::Error(e) => {
                            self.log(format!("error: {}", e));
                            self.status = Some(e);
                        }
                    }
                }
                WorkerEvent::Finished { request_id, error } => {
                    if !self.is_pending(&request_id) {
                        continue;
                    }
                    if let Some((_, reply)) = self.pending.take() {
                        if !reply.is_empty() {
                            self.history.push(ChatMessage::assistant(reply));
                        }
                    }
                    if let Some(e) = error {
                        if self.status.is_none() {
                            self.status = Some(e.clone());
                        }
                        tracing::warn!(error = %e, "chat request failed");
                    }
                }
            }
        }
    }

    fn is_pending(&self, request_id: &str) -> bool {
        self.pending
            .as_ref()
            .map(|(id, _)| id == request_id)
            .unwrap_or(false)
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let presses: Vec<KeyPress> = ctx.input(|i| {
            i.events
                .iter()
                .filter_map(|event| match event {
                    egui::Event::Key {
                        key,
                        pressed: true,
                        modifiers,
                        ..
                    } => Some(KeyPress {
                        key: key.symbol_or_name().to_string(),
                        ctrl: modifiers.ctrl,
                        shift: modifiers.shift,
                        alt: modifiers.alt,
                        meta: modifiers.mac_cmd,
                    }),
                    _ => None,
                })
                .collect()
        });
        if presses.is_empty() {
            return;
        }

        let shortcuts = self.stores.shortcuts.get();
        for press in presses {
            match find_match(&shortcuts, &press, Platform::current()) {
                Some("toggle_theme") => self.dark_mode = !self.dark_mode,
                Some("toggle_terminal") => self.show_console = !self.show_console,
                Some("open_settings") => self.show_settings = !self.show_settings,
                _ => {}
            }
        }
    }

    fn chat_panel(&mut self, ui: &mut egui::Ui) {
        let input_height = 70.0;
        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .max_height(ui.available_height() - input_height)
            .show(ui, |ui| {
                for message in &self.history {
                    let (who, color) = match message.role {
                        Role::User => ("You", egui::Color32::from_rgb(120, 170, 255)),
                        Role::Assistant => ("Codesmith", egui::Color32::from_rgb(140, 210, 140)),
                        Role::System => ("System", egui::Color32::GRAY),
                    };
                    ui.label(egui::RichText::new(who).strong().color(color));
                    ui.label(message.content.as_str());
                    ui.add_space(8.0);
                }
                if let Some((_, reply)) = &self.pending {
                    ui.label(egui::RichText::new("Codesmith").strong());
                    if reply.is_empty() {
                        ui.spinner();
                    } else {
                        ui.label(reply.as_str());
                    }
                }
            });

        if let Some(status) = &self.status {
            ui.label(egui::RichText::new(status.as_str()).color(egui::Color32::from_rgb(220, 140, 60)));
        }

        ui.horizontal(|ui| {
            let edit = egui::TextEdit::multiline(&mut self.input)
                .desired_rows(2)
                .desired_width(ui.available_width() - 80.0)
                .hint_text("How can Codesmith help you today?");
            let response = ui.add(edit);
            let enter = response.has_focus()
                && ui.input(|i| i.key_pressed(egui::Key::Enter) && !i.modifiers.shift);
            let clicked = ui
                .add_enabled(self.pending.is_none(), egui::Button::new("Send"))
                .clicked();
            if enter || clicked {
                let ctx = ui.ctx().clone();
                self.send(&ctx);
            }
        });
    }

    fn settings_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_settings;
        egui::Window::new("Settings")
            .open(&mut open)
            .default_width(520.0)
            .show(ctx, |ui| {
                let developer_mode = self.stores.developer_mode.get();
                let tabs = self.stores.tabs.get();
                ui.horizontal_wrapped(|ui| {
                    for tab in visible_tabs(&tabs, developer_mode) {
                        if ui
                            .selectable_label(self.settings_tab == tab.id, tab.label())
                            .clicked()
                        {
                            self.settings_tab = tab.id.clone();
                        }
                    }
                });
                ui.separator();

                match self.settings_tab.as_str() {
                    "settings" | "features" => self.features_tab(ui),
                    "cloud-providers" => self.providers_tab(ui, false),
                    "local-providers" => self.providers_tab(ui, true),
                    "shortcuts" => self.shortcuts_tab(ui),
                    "event-logs" | "debug" => self.console_tab(ui),
                    _ => {
                        ui.label(egui::RichText::new("Nothing to configure here yet.").weak());
                    }
                }
            });
        self.show_settings = open;
    }

    fn features_tab(&mut self, ui: &mut egui::Ui) {
        let toggles: [(&str, bool, fn(&SettingsStores, bool) -> Result<(), shared::store::StoreError>); 4] = [
            (
                "Context optimization",
                self.stores.context_optimization.get(),
                SettingsStores::set_context_optimization,
            ),
            (
                "Auto-select starter template",
                self.stores.auto_select_template.get(),
                SettingsStores::set_auto_select_template,
            ),
            (
                "Use latest branch",
                self.stores.latest_branch.get(),
                SettingsStores::set_latest_branch,
            ),
            (
                "Developer mode",
                self.stores.developer_mode.get(),
                SettingsStores::set_developer_mode,
            ),
        ];
        for (label, mut value, setter) in toggles {
            if ui.checkbox(&mut value, label).changed() {
                if let Err(e) = setter(self.stores.as_ref(), value) {
                    self.status = Some(format!("Failed to save settings: {}", e));
                }
            }
        }

        ui.add_space(6.0);
        let current = self.stores.prompt_id.get();
        let mut picked: Option<&'static str> = None;
        egui::ComboBox::from_label("System prompt")
            .selected_text(current.as_str())
            .show_ui(ui, |ui| {
                for entry in self.host.library().list() {
                    if ui
                        .selectable_label(current == entry.id, entry.label)
                        .on_hover_text(entry.description)
                        .clicked()
                    {
                        picked = Some(entry.id);
                    }
                }
            });
        if let Some(id) = picked {
            if let Err(e) = self.stores.set_prompt_id(id) {
                self.status = Some(format!("Failed to save settings: {}", e));
            }
        }

        if self.stores.developer_mode.get() && ui.button("Reset tab layout").clicked() {
            if let Err(e) = self.stores.reset_tab_configuration() {
                self.status = Some(format!("Failed to save settings: {}", e));
            }
        }
    }

    fn providers_tab(&mut self, ui: &mut egui::Ui, local: bool) {
        let providers: Vec<ProviderDescriptor> = self
            .selector
            .providers()
            .iter()
            .filter(|p| p.local == local)
            .cloned()
            .collect();

        for provider in providers {
            let mut settings = self.stores.provider_settings(&provider.name);
            ui.horizontal(|ui| {
                ui.strong(provider.name.as_str());
                if provider.is_selectable(&settings) {
                    ui.label(egui::RichText::new("✓ ready").color(egui::Color32::from_rgb(100, 180, 100)));
                }
            });

            let mut changed = ui.checkbox(&mut settings.enabled, "Enabled").changed();
            if local || provider.base_url_key.is_some() {
                let input = self
                    .url_inputs
                    .entry(provider.name.clone())
                    .or_insert_with(|| settings.base_url.clone().unwrap_or_default());
                ui.horizontal(|ui| {
                    ui.label("Base URL:");
                    let hint = provider.default_base_url.clone().unwrap_or_default();
                    ui.add(egui::TextEdit::singleline(input).hint_text(hint));
                    if ui.button("Save").clicked() {
                        let url = input.trim().to_string();
                        settings.configured = local && !url.is_empty();
                        settings.base_url = (!url.is_empty()).then_some(url);
                        changed = true;
                    }
                });
            }
            if provider.api_token_key.is_some() {
                let input = self.key_inputs.entry(provider.name.clone()).or_default();
                ui.horizontal(|ui| {
                    ui.label("API key:");
                    ui.add(egui::TextEdit::singleline(input).password(true));
                    if ui.button("Save").clicked() {
                        let key = input.trim().to_string();
                        settings.api_key = (!key.is_empty()).then_some(key);
                        input.clear();
                        changed = true;
                    }
                });
            }

            if changed {
                if let Err(e) = self.stores.update_provider_settings(&provider.name, settings) {
                    self.status = Some(format!("Failed to save settings: {}", e));
                }
                self.host.catalog().clear_cache();
                if provider.name == self.stores.selected_provider.get() {
                    self.refresh_models(ui.ctx(), provider.name.clone());
                }
            }
            ui.separator();
        }
    }

    fn shortcuts_tab(&mut self, ui: &mut egui::Ui) {
        let platform = Platform::current();
        for (id, shortcut) in self.stores.shortcuts.get() {
            let mut keys = Vec::new();
            if shortcut.ctrl_or_meta_key {
                keys.push(if platform == Platform::Mac { "Cmd" } else { "Ctrl" });
            }
            if shortcut.ctrl_key {
                keys.push("Ctrl");
            }
            if shortcut.meta_key {
                keys.push("Cmd");
            }
            if shortcut.alt_key {
                keys.push("Alt");
            }
            if shortcut.shift_key {
                keys.push("Shift");
            }
            let key = shortcut.key.to_uppercase();
            keys.push(key.as_str());
            let combo = keys.join("+");
            ui.horizontal(|ui| {
                ui.monospace(combo);
                ui.label(if shortcut.description.is_empty() {
                    id.as_str()
                } else {
                    shortcut.description.as_str()
                });
            });
        }
    }

    fn console_tab(&mut self, ui: &mut egui::Ui) {
        if let Some(system) = &self.last_system_prompt {
            ui.collapsing("Last system prompt", |ui| {
                egui::ScrollArea::vertical().max_height(200.0).show(ui, |ui| {
                    ui.monospace(system.as_str());
                });
            });
        }
        egui::ScrollArea::vertical()
            .id_source("console_lines")
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &self.console {
                    ui.monospace(line.as_str());
                }
            });
    }
}

impl eframe::App for CodesmithApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll(ctx);
        self.handle_shortcuts(ctx);
        ctx.set_visuals(if self.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        });

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Codesmith");
                ui.separator();
                self.selector.show(ui);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("⚙").on_hover_text("Settings").clicked() {
                        self.show_settings = !self.show_settings;
                    }
                });
            });
        });

        if self.show_console {
            egui::TopBottomPanel::bottom("console")
                .resizable(true)
                .default_height(160.0)
                .show(ctx, |ui| self.console_tab(ui));
        }

        egui::CentralPanel::default().show(ctx, |ui| self.chat_panel(ui));

        if self.show_settings {
            self.settings_window(ctx);
        }
    }
}
