//! Theme manager: Loading → Dark/Light, with a terminal Error state.
//!
//! The manager is the only writer of the theme; the rendering surface reads `current()`.

use std::sync::{Arc, PoisonError, RwLock};

use crate::bus::{BusEvent, EventBus};
use crate::preferences::PreferenceStore;
use crate::shared::{ThemePreference, THEME_KEY};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeState {
    Loading,
    Dark,
    Light,
    /// Storage failed. No retry for the rest of the session.
    Error(String),
}

impl From<ThemePreference> for ThemeState {
    fn from(theme: ThemePreference) -> Self {
        match theme {
            ThemePreference::Dark => ThemeState::Dark,
            ThemePreference::Light => ThemeState::Light,
        }
    }
}

pub struct ThemeManager {
    bus: EventBus,
    store: Arc<dyn PreferenceStore>,
    state: RwLock<ThemeState>,
}

impl ThemeManager {
    /// Starts in `Loading`; call `load` once the store is reachable.
    pub fn new(store: Arc<dyn PreferenceStore>, bus: EventBus) -> Self {
        Self {
            bus,
            store,
            state: RwLock::new(ThemeState::Loading),
        }
    }

    /// Reads the stored theme (unset means dark). Only acts while `Loading`.
    pub fn load(&self) -> ThemeState {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if *state != ThemeState::Loading {
            return state.clone();
        }
        *state = match self.store.get(THEME_KEY) {
            Ok(stored) => {
                let theme = stored
                    .as_deref()
                    .map(ThemePreference::from_stored)
                    .unwrap_or_default();
                tracing::info!(theme = %theme, "theme loaded");
                theme.into()
            }
            Err(e) => {
                tracing::warn!(error = %e, "theme preference unreadable");
                ThemeState::Error("Failed to load theme preference.".to_string())
            }
        };
        state.clone()
    }

    /// Flips dark/light, persists it and publishes `themeChange`.
    /// Returns the new theme, or `None` when nothing happened (Loading, Error, or write failure).
    pub fn toggle(&self) -> Option<ThemePreference> {
        let next = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let current = match *state {
                ThemeState::Dark => ThemePreference::Dark,
                ThemeState::Light => ThemePreference::Light,
                ThemeState::Loading | ThemeState::Error(_) => return None,
            };
            let next = current.flipped();
            if let Err(e) = self.store.set(THEME_KEY, next.as_str()) {
                tracing::warn!(error = %e, "theme preference could not be saved");
                *state = ThemeState::Error("Failed to apply theme.".to_string());
                return None;
            }
            *state = next.into();
            next
        };
        tracing::info!(theme = %next, "theme toggled");
        self.bus.publish(BusEvent::ThemeChange);
        Some(next)
    }

    pub fn state(&self) -> ThemeState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Theme for the rendering surface; `None` while loading or after an error.
    pub fn current(&self) -> Option<ThemePreference> {
        match self.state() {
            ThemeState::Dark => Some(ThemePreference::Dark),
            ThemeState::Light => Some(ThemePreference::Light),
            ThemeState::Loading | ThemeState::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<String> {
        match self.state() {
            ThemeState::Error(message) => Some(message),
            _ => None,
        }
    }
}
