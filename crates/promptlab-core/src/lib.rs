//! promptlab-core: state synchronization layer for the PromptLab chat shell.
//!
//! Independent UI regions (parameter panel, model selector, theme toggle, template manager,
//! chat surface) stay consistent through a synchronous broadcast bus instead of sharing
//! state directly. Responses are mocked; there is no model backend.

mod app;
mod bus;
mod chat;
mod config;
mod error;
mod export;
mod models;
mod parameters;
mod preferences;
mod shared;
mod templates;
mod theme;

pub use shared::{
    ChatMessage, GenerationParameters, ModelOption, ParameterKey, PromptTemplate, Role,
    ThemePreference, MAX_TOKENS_MAX, MAX_TOKENS_MIN, MAX_TOKENS_STEP, MODEL_OPTIONS,
    TEMPLATES_KEY, THEME_KEY,
};

pub use error::{LabError, LabResult, LastError};

// Broadcast bus
pub use bus::{BusEvent, EventBus, EventName, Handler, Subscription};

// Persistence and export sinks
pub use export::{
    output_file_name, ClipboardSink, DirectoryDownloadSink, DownloadSink, MemoryClipboard,
    OutputExport, PARAMS_FILE_NAME,
};
pub use preferences::{InMemoryPreferenceStore, PreferenceStore, SledPreferenceStore};

// State holders
pub use chat::{
    ChatSession, ChatState, OverlapPolicy, DEFAULT_RESPONSE_DELAY, GREETING, MOCK_RESPONSE,
};
pub use models::{ModelPicker, ModelSelection, PickerKey, PickerOutcome};
pub use parameters::ParameterState;
pub use templates::{TemplateDraft, TemplateStore};
pub use theme::{ThemeManager, ThemeState};

pub use app::LabContext;
pub use crate::config::LabConfig;
