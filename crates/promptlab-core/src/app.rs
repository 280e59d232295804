//! Application context: owns the bus and mounts every state holder on it.

use std::sync::{Arc, Mutex, PoisonError};

use crate::bus::{BusEvent, EventBus, EventName, Subscription};
use crate::chat::ChatSession;
use crate::config::LabConfig;
use crate::error::LabResult;
use crate::export::{DirectoryDownloadSink, MemoryClipboard};
use crate::models::{ModelPicker, ModelSelection};
use crate::parameters::ParameterState;
use crate::preferences::{PreferenceStore, SledPreferenceStore};
use crate::templates::TemplateStore;
use crate::theme::ThemeManager;

/// Everything one UI session needs, wired to a single bus.
pub struct LabContext {
    pub bus: EventBus,
    pub parameters: ParameterState,
    pub models: ModelSelection,
    pub picker: Mutex<ModelPicker>,
    pub templates: TemplateStore,
    pub theme: ThemeManager,
    pub chat: ChatSession,
    pub clipboard: MemoryClipboard,
    pub downloads: DirectoryDownloadSink,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl LabContext {
    /// Opens the Sled preference store under `config.storage_path` and mounts the session.
    pub fn open(config: &LabConfig) -> LabResult<Self> {
        let store = SledPreferenceStore::open_path(config.preferences_path())?;
        Ok(Self::mount(config, Arc::new(store)))
    }

    /// Mounts all holders on a fresh bus. The theme is read immediately; storage failures
    /// surface as holder error state rather than failing the mount.
    pub fn mount(config: &LabConfig, store: Arc<dyn PreferenceStore>) -> Self {
        let bus = EventBus::new();

        let subscriptions = vec![
            bus.subscribe(EventName::ModelChange, |event| {
                if let BusEvent::ModelChange(id) = event {
                    tracing::info!(model = %id, "selected model");
                }
            }),
            bus.subscribe(EventName::ParamsChanged, |event| {
                if let BusEvent::ParamsChanged(params) = event {
                    tracing::info!(?params, "parameters updated");
                }
            }),
        ];

        let parameters = ParameterState::new(bus.clone());
        let chat = ChatSession::new(
            bus.clone(),
            parameters.get_parameters(),
            config.response_delay(),
            config.overlap_policy,
        );
        let theme = ThemeManager::new(Arc::clone(&store), bus.clone());
        theme.load();

        tracing::info!(
            storage_path = %config.storage_path,
            delay_ms = config.response_delay_ms,
            policy = ?config.overlap_policy,
            "PromptLab session mounted"
        );

        Self {
            models: ModelSelection::new(bus.clone()),
            picker: Mutex::new(ModelPicker::new()),
            templates: TemplateStore::open(store, bus.clone()),
            clipboard: MemoryClipboard::new(),
            downloads: DirectoryDownloadSink::new(&config.export_dir),
            subscriptions: Mutex::new(subscriptions),
            parameters,
            theme,
            chat,
            bus,
        }
    }

    /// Runs `f` with the model picker and the selection it commits to.
    pub fn with_picker<R>(&self, f: impl FnOnce(&mut ModelPicker, &ModelSelection) -> R) -> R {
        let mut picker = self.picker.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut picker, &self.models)
    }
}

impl Drop for LabContext {
    fn drop(&mut self) {
        let subs = std::mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for sub in subs {
            self.bus.unsubscribe(sub);
        }
    }
}
