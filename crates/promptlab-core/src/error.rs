//! Error taxonomy shared by every state holder.
//!
//! Holders return `LabResult<T>` and also keep the rendered message as their `last_error`
//! so the rendering surface can show it next to the control that failed. A missing id is
//! not an error; lookups return `Option`.

use std::sync::{PoisonError, RwLock};

use crate::shared::ParameterKey;

/// Result type for state-holder operations.
pub type LabResult<T> = Result<T, LabError>;

/// Errors produced at the boundary of a state holder.
#[derive(Debug, thiserror::Error)]
pub enum LabError {
    #[error("Invalid value for {key}: {reason}")]
    InvalidParameter { key: ParameterKey, reason: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Scheduler unavailable: {0}")]
    Scheduler(String),
}

impl From<sled::Error> for LabError {
    fn from(e: sled::Error) -> Self {
        LabError::Storage(e.to_string())
    }
}

/// "Last error" slot a holder shows next to its control. Success clears it.
#[derive(Debug, Default)]
pub struct LastError {
    message: RwLock<Option<String>>,
}

impl LastError {
    pub fn get(&self) -> Option<String> {
        self.message
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, message: impl Into<String>) {
        *self.message.write().unwrap_or_else(PoisonError::into_inner) = Some(message.into());
    }

    pub fn clear(&self) {
        *self.message.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Passes `result` through, storing the error message or clearing the slot.
    pub fn record<T>(&self, result: LabResult<T>) -> LabResult<T> {
        match &result {
            Ok(_) => self.clear(),
            Err(e) => {
                tracing::warn!(error = %e, "state holder operation failed");
                self.set(e.to_string());
            }
        }
        result
    }
}
