//! Parameter state holder: the authoritative `GenerationParameters`.
//!
//! Every accepted change replaces the held value and publishes `paramsChanged` with the
//! full new object. Rejected changes leave state untouched and publish nothing.

use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use crate::bus::{BusEvent, EventBus};
use crate::error::{LastError, LabResult};
use crate::export::{to_pretty_json, ClipboardSink, DownloadSink, PARAMS_FILE_NAME};
use crate::shared::{GenerationParameters, ParameterKey};

pub struct ParameterState {
    bus: EventBus,
    current: RwLock<GenerationParameters>,
    last_error: LastError,
}

impl ParameterState {
    /// Starts from the defaults (0.7 / 500 / 1.0).
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            current: RwLock::new(GenerationParameters::default()),
            last_error: LastError::default(),
        }
    }

    pub fn get_parameters(&self) -> GenerationParameters {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates `value` for `key`, swaps in the new object and broadcasts it.
    pub fn set_parameter(&self, key: ParameterKey, value: f64) -> LabResult<GenerationParameters> {
        let result = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            current.with_value(key, value).map(|next| {
                *current = next;
                next
            })
        };
        let next = self.last_error.record(result)?;
        tracing::info!(parameter = %key, value, "generation parameter updated");
        self.bus.publish(BusEvent::ParamsChanged(next));
        Ok(next)
    }

    /// Replaces all three fields at once; one event on success.
    pub fn set_parameters(&self, params: GenerationParameters) -> LabResult<GenerationParameters> {
        self.last_error.record(params.validate())?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = params;
        tracing::info!(?params, "generation parameters replaced");
        self.bus.publish(BusEvent::ParamsChanged(params));
        Ok(params)
    }

    /// Copies the current parameters to the clipboard as pretty JSON.
    pub fn copy_parameters(&self, clipboard: &dyn ClipboardSink) -> LabResult<()> {
        let params = self.get_parameters();
        let result = to_pretty_json(&params).and_then(|json| clipboard.write_text(&json));
        self.last_error.record(result)
    }

    /// Writes the current parameters as `params.json`.
    pub fn download_parameters(&self, sink: &dyn DownloadSink) -> LabResult<PathBuf> {
        let params = self.get_parameters();
        let result = to_pretty_json(&params).and_then(|json| sink.save(PARAMS_FILE_NAME, json.as_bytes()));
        self.last_error.record(result)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventName;
    use crate::error::LabError;
    use crate::export::MemoryClipboard;
    use std::sync::{Arc, Mutex};

    fn captured(bus: &EventBus) -> Arc<Mutex<Vec<GenerationParameters>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _sub = bus.subscribe(EventName::ParamsChanged, move |event| {
            if let BusEvent::ParamsChanged(p) = event {
                s.lock().unwrap().push(*p);
            }
        });
        seen
    }

    #[test]
    fn valid_update_publishes_exactly_once_with_new_object() {
        let bus = EventBus::new();
        let seen = captured(&bus);
        let state = ParameterState::new(bus);

        let next = state.set_parameter(ParameterKey::Temperature, 0.3).unwrap();
        assert_eq!(state.get_parameters(), next);
        assert_eq!(next.temperature, 0.3);
        assert_eq!(*seen.lock().unwrap(), vec![next]);
    }

    #[test]
    fn out_of_range_is_rejected_without_event() {
        let bus = EventBus::new();
        let seen = captured(&bus);
        let state = ParameterState::new(bus);
        let before = state.get_parameters();

        let err = state.set_parameter(ParameterKey::Temperature, 1.5).unwrap_err();
        assert!(matches!(err, LabError::InvalidParameter { key: ParameterKey::Temperature, .. }));
        assert_eq!(state.get_parameters(), before);
        assert!(seen.lock().unwrap().is_empty());
        assert!(state.last_error().unwrap().contains("temperature"));
    }

    #[test]
    fn success_clears_last_error() {
        let state = ParameterState::new(EventBus::new());
        let _ = state.set_parameter(ParameterKey::MaxTokens, 10.0);
        assert!(state.last_error().is_some());
        state.set_parameter(ParameterKey::MaxTokens, 1000.0).unwrap();
        assert!(state.last_error().is_none());
        assert_eq!(state.get_parameters().max_tokens, 1000);
    }

    #[test]
    fn set_parameters_is_all_or_nothing() {
        let bus = EventBus::new();
        let seen = captured(&bus);
        let state = ParameterState::new(bus);

        let bad = GenerationParameters::new(0.5, 100, 2.0);
        assert!(state.set_parameters(bad).is_err());
        assert_eq!(state.get_parameters(), GenerationParameters::default());
        assert!(seen.lock().unwrap().is_empty());

        let good = GenerationParameters::new(0.5, 100, 0.9);
        state.set_parameters(good).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![good]);
    }

    #[test]
    fn subscriber_may_read_state_during_dispatch() {
        let bus = EventBus::new();
        let state = Arc::new(ParameterState::new(bus.clone()));
        let observed = Arc::new(Mutex::new(None));
        let (s, o) = (Arc::clone(&state), Arc::clone(&observed));
        let _sub = bus.subscribe(EventName::ParamsChanged, move |_| {
            *o.lock().unwrap() = Some(s.get_parameters());
        });

        state.set_parameter(ParameterKey::TopP, 0.4).unwrap();
        assert_eq!(observed.lock().unwrap().unwrap().top_p, 0.4);
    }

    #[test]
    fn copy_parameters_writes_json() {
        let state = ParameterState::new(EventBus::new());
        let clipboard = MemoryClipboard::new();
        state.copy_parameters(&clipboard).unwrap();
        let text = clipboard.contents().unwrap();
        let back: GenerationParameters = serde_json::from_str(&text).unwrap();
        assert_eq!(back, state.get_parameters());
    }

    struct BrokenClipboard;

    impl ClipboardSink for BrokenClipboard {
        fn write_text(&self, _text: &str) -> LabResult<()> {
            Err(LabError::Clipboard("permission denied".into()))
        }
    }

    #[test]
    fn clipboard_failure_is_recorded_not_fatal() {
        let state = ParameterState::new(EventBus::new());
        assert!(state.copy_parameters(&BrokenClipboard).is_err());
        assert!(state.last_error().unwrap().contains("permission denied"));
        assert!(state.set_parameter(ParameterKey::TopP, 0.5).is_ok());
    }
}
