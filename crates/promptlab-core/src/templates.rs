//! Template store: ordered, append-only prompt templates persisted under `promptTemplates`.
//!
//! Every mutation rewrites the whole collection. A failed startup read is recoverable:
//! the store comes up empty and reports the failure through `load_error`.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::bus::{BusEvent, EventBus};
use crate::error::{LastError, LabError, LabResult};
use crate::preferences::PreferenceStore;
use crate::shared::{PromptTemplate, TEMPLATES_KEY};

/// Input buffers of the "new template" form. Cleared after a successful save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateDraft {
    pub title: String,
    pub content: String,
}

impl TemplateDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.content.is_empty()
    }
}

pub struct TemplateStore {
    bus: EventBus,
    store: Arc<dyn PreferenceStore>,
    templates: RwLock<Vec<PromptTemplate>>,
    active_prompt: RwLock<Option<String>>,
    /// Last issued id in milliseconds; ids are strictly increasing within a session.
    last_id: Mutex<i64>,
    load_error: Option<String>,
    last_error: LastError,
}

impl TemplateStore {
    /// Reads the saved collection. Never fails: unreadable data yields an empty list.
    pub fn open(store: Arc<dyn PreferenceStore>, bus: EventBus) -> Self {
        let last_error = LastError::default();
        let (templates, load_error) = match read_templates(store.as_ref()) {
            Ok(list) => {
                tracing::info!(count = list.len(), "prompt templates loaded");
                (list, None)
            }
            Err(e) => {
                let message = format!("Failed to load saved templates: {}", e);
                tracing::warn!(error = %e, "prompt templates unreadable; starting empty");
                last_error.set(message.clone());
                (Vec::new(), Some(message))
            }
        };
        let last_id = templates
            .iter()
            .filter_map(|t| t.id.parse::<i64>().ok())
            .max()
            .unwrap_or(0);
        Self {
            bus,
            store,
            templates: RwLock::new(templates),
            active_prompt: RwLock::new(None),
            last_id: Mutex::new(last_id),
            load_error,
            last_error,
        }
    }

    /// Templates in insertion order.
    pub fn list(&self) -> Vec<PromptTemplate> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a template and writes the whole collection back.
    ///
    /// Title and content must be non-blank. If the write fails the template stays in the
    /// in-memory list and the storage error is returned.
    pub fn add(&self, title: &str, content: &str) -> LabResult<PromptTemplate> {
        if title.trim().is_empty() || content.trim().is_empty() {
            return self.last_error.record(Err(LabError::Validation(
                "Both title and content are required.".to_string(),
            )));
        }
        let template = PromptTemplate {
            id: self.next_id().to_string(),
            title: title.to_string(),
            content: content.to_string(),
        };

        let persisted = {
            let mut templates = self.templates.write().unwrap_or_else(PoisonError::into_inner);
            templates.push(template.clone());
            write_templates(self.store.as_ref(), &templates)
        };
        self.last_error.record(persisted)?;
        tracing::info!(id = %template.id, title = %template.title, "prompt template saved");
        Ok(template)
    }

    /// `add` with the form buffers; clears them only when the save succeeds.
    pub fn save_draft(&self, draft: &mut TemplateDraft) -> LabResult<PromptTemplate> {
        let template = self.add(&draft.title, &draft.content)?;
        draft.title.clear();
        draft.content.clear();
        Ok(template)
    }

    /// Makes the template the active prompt and publishes `promptLoaded` with its content.
    /// Unknown ids do nothing.
    pub fn load(&self, id: &str) -> Option<PromptTemplate> {
        let found = self
            .templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|t| t.id == id)
            .cloned();
        let Some(template) = found else {
            tracing::debug!(id, "load ignored: no such template");
            return None;
        };
        *self.active_prompt.write().unwrap_or_else(PoisonError::into_inner) =
            Some(template.content.clone());
        tracing::info!(id, "prompt template loaded");
        self.bus.publish(BusEvent::PromptLoaded(template.content.clone()));
        Some(template)
    }

    pub fn active_prompt(&self) -> Option<String> {
        self.active_prompt
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Message describing why the saved collection could not be read at startup.
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.get()
    }

    fn next_id(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let mut last = self.last_id.lock().unwrap_or_else(PoisonError::into_inner);
        *last = now.max(*last + 1);
        *last
    }
}

fn read_templates(store: &dyn PreferenceStore) -> LabResult<Vec<PromptTemplate>> {
    match store.get(TEMPLATES_KEY)? {
        Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
        _ => Ok(Vec::new()),
    }
}

fn write_templates(store: &dyn PreferenceStore, templates: &[PromptTemplate]) -> LabResult<()> {
    let json = serde_json::to_string(templates)?;
    store.set(TEMPLATES_KEY, &json)
}
