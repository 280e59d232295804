//! Model selection: the selected `ModelOption` plus the dropdown picker state machine.

use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

use crate::bus::{BusEvent, EventBus};
use crate::error::{LastError, LabError, LabResult};
use crate::shared::{ModelOption, MODEL_OPTIONS};

/// Owns the selected model. Every commit publishes `modelChange`, even when the
/// selection does not change.
pub struct ModelSelection {
    bus: EventBus,
    selected: RwLock<usize>,
    last_error: LastError,
}

impl ModelSelection {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            selected: RwLock::new(0),
            last_error: LastError::default(),
        }
    }

    pub fn options(&self) -> &'static [ModelOption] {
        MODEL_OPTIONS
    }

    pub fn current(&self) -> ModelOption {
        let index = *self.selected.read().unwrap_or_else(PoisonError::into_inner);
        MODEL_OPTIONS[index.min(MODEL_OPTIONS.len() - 1)]
    }

    pub fn select(&self, model_id: &str) -> LabResult<ModelOption> {
        let found = MODEL_OPTIONS
            .iter()
            .position(|m| m.id == model_id.trim())
            .ok_or_else(|| LabError::Validation(format!("unknown model '{}'", model_id.trim())));
        let index = self.last_error.record(found)?;
        Ok(self.commit(index))
    }

    fn commit(&self, index: usize) -> ModelOption {
        let model = MODEL_OPTIONS[index];
        let previous = {
            let mut selected = self.selected.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *selected, index)
        };
        if previous == index {
            tracing::debug!(model = model.id, "model re-selected");
        } else {
            tracing::info!(model = model.id, "model selected");
        }
        self.bus.publish(BusEvent::ModelChange(model.id.to_string()));
        model
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.get()
    }
}

/// Keys the picker reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerKey {
    Enter,
    Space,
    ArrowDown,
    ArrowUp,
    Escape,
    Other,
}

impl FromStr for PickerKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "enter" | "return" => PickerKey::Enter,
            "space" | " " => PickerKey::Space,
            "down" | "arrowdown" => PickerKey::ArrowDown,
            "up" | "arrowup" => PickerKey::ArrowUp,
            "escape" | "esc" => PickerKey::Escape,
            _ => PickerKey::Other,
        })
    }
}

/// What a picker input did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerOutcome {
    Ignored,
    Opened,
    /// Highlight moved to this index.
    Moved(usize),
    Committed(ModelOption),
    /// Closed without committing.
    Closed,
}

/// Dropdown state: closed, or open with a highlighted row.
#[derive(Debug, Clone, Default)]
pub struct ModelPicker {
    open: bool,
    highlighted: usize,
}

impl ModelPicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn highlighted(&self) -> usize {
        self.highlighted
    }

    pub fn handle_key(&mut self, key: PickerKey, selection: &ModelSelection) -> PickerOutcome {
        let len = MODEL_OPTIONS.len();
        if !self.open {
            return match key {
                PickerKey::Enter | PickerKey::Space | PickerKey::ArrowDown => {
                    self.open = true;
                    self.highlighted = 0;
                    PickerOutcome::Opened
                }
                _ => PickerOutcome::Ignored,
            };
        }
        match key {
            PickerKey::ArrowDown => {
                self.highlighted = (self.highlighted + 1) % len;
                PickerOutcome::Moved(self.highlighted)
            }
            PickerKey::ArrowUp => {
                self.highlighted = (self.highlighted + len - 1) % len;
                PickerOutcome::Moved(self.highlighted)
            }
            PickerKey::Enter | PickerKey::Space => {
                self.open = false;
                PickerOutcome::Committed(selection.commit(self.highlighted))
            }
            PickerKey::Escape => {
                self.open = false;
                PickerOutcome::Closed
            }
            PickerKey::Other => PickerOutcome::Ignored,
        }
    }

    /// Click on the dropdown button.
    pub fn click_trigger(&mut self) -> PickerOutcome {
        self.open = !self.open;
        if self.open {
            PickerOutcome::Opened
        } else {
            PickerOutcome::Closed
        }
    }

    /// Click on a row of the open list.
    pub fn click_option(&mut self, index: usize, selection: &ModelSelection) -> PickerOutcome {
        if !self.open || index >= MODEL_OPTIONS.len() {
            return PickerOutcome::Ignored;
        }
        self.open = false;
        self.highlighted = index;
        PickerOutcome::Committed(selection.commit(index))
    }

    /// Pointer press anywhere outside the open list.
    pub fn click_outside(&mut self) -> PickerOutcome {
        if !self.open {
            return PickerOutcome::Ignored;
        }
        self.open = false;
        PickerOutcome::Closed
    }
}
