//! Chat session: append-only message log with a mocked, delayed assistant reply.
//!
//! `send` appends the user message right away with a snapshot of the session's parameters,
//! then schedules the reply on the Tokio runtime. The reply carries the snapshot taken at
//! send time, not whatever parameters are current when the timer fires.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::bus::{BusEvent, EventBus, EventName, Subscription};
use crate::error::{LastError, LabError, LabResult};
use crate::export::{output_file_name, to_pretty_json, ClipboardSink, DownloadSink, OutputExport};
use crate::shared::{ChatMessage, GenerationParameters};

pub const GREETING: &str = "Hello! How can I help you today?";
pub const MOCK_RESPONSE: &str = "This is a mock response with animations :)";
pub const DEFAULT_RESPONSE_DELAY: Duration = Duration::from_millis(1500);

/// What happens to a reply still pending when the next message is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Every pending reply is delivered.
    #[default]
    AllowOverlap,
    /// A new send aborts replies that have not arrived yet.
    CancelPrevious,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    AwaitingResponse,
}

struct Inner {
    messages: Vec<ChatMessage>,
    params: GenerationParameters,
    input: String,
    /// Reply timers not yet fired, tagged with their ticket.
    pending: Vec<(u64, JoinHandle<()>)>,
    next_ticket: u64,
}

fn cancel_pending(inner: &mut Inner) {
    for (ticket, handle) in inner.pending.drain(..) {
        handle.abort();
        tracing::debug!(ticket, "pending reply cancelled by new send");
    }
}

fn lock(inner: &Mutex<Inner>) -> std::sync::MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ChatSession {
    inner: Arc<Mutex<Inner>>,
    delay: Duration,
    policy: OverlapPolicy,
    bus: EventBus,
    subscriptions: Mutex<Vec<Subscription>>,
    last_error: LastError,
}

impl ChatSession {
    /// Creates the session with the greeting message and subscribes to `paramsChanged`
    /// and `promptLoaded`. Subscriptions are removed when the session is dropped.
    pub fn new(
        bus: EventBus,
        params: GenerationParameters,
        delay: Duration,
        policy: OverlapPolicy,
    ) -> Self {
        let inner = Arc::new(Mutex::new(Inner {
            messages: vec![ChatMessage::assistant(GREETING, params)],
            params,
            input: String::new(),
            pending: Vec::new(),
            next_ticket: 0,
        }));

        let weak = Arc::downgrade(&inner);
        let params_sub = bus.subscribe(EventName::ParamsChanged, move |event| {
            if let (BusEvent::ParamsChanged(next), Some(inner)) = (event, weak.upgrade()) {
                lock(&inner).params = *next;
            }
        });
        let weak = Arc::downgrade(&inner);
        let prompt_sub = bus.subscribe(EventName::PromptLoaded, move |event| {
            if let (BusEvent::PromptLoaded(content), Some(inner)) = (event, weak.upgrade()) {
                lock(&inner).input = content.clone();
            }
        });

        Self {
            inner,
            delay,
            policy,
            bus,
            subscriptions: Mutex::new(vec![params_sub, prompt_sub]),
            last_error: LastError::default(),
        }
    }

    /// Appends `text` as a user message and schedules the mock reply.
    ///
    /// Blank input returns `Ok(None)` and changes nothing. Must run inside a Tokio runtime;
    /// otherwise nothing is appended and `Scheduler` is returned.
    pub fn send(&self, text: &str) -> LabResult<Option<ChatMessage>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let runtime = self.last_error.record(
            tokio::runtime::Handle::try_current().map_err(|e| LabError::Scheduler(e.to_string())),
        )?;

        let mut inner = lock(&self.inner);
        if self.policy == OverlapPolicy::CancelPrevious {
            cancel_pending(&mut inner);
        }

        let snapshot = inner.params;
        let message = ChatMessage::user(text, snapshot);
        inner.messages.push(message.clone());

        let ticket = inner.next_ticket;
        inner.next_ticket += 1;
        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        let delay = self.delay;
        // The timer needs this lock to finish, so it cannot fire before it is registered.
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut inner = lock(&inner);
            // A timer already past its sleep cannot be aborted; a missing ticket means cancelled.
            let Some(pos) = inner.pending.iter().position(|(t, _)| *t == ticket) else {
                tracing::debug!(ticket, "cancelled reply discarded");
                return;
            };
            inner.pending.remove(pos);
            inner.messages.push(ChatMessage::assistant(MOCK_RESPONSE, snapshot));
            tracing::debug!(ticket, pending = inner.pending.len(), "mock reply delivered");
        });
        inner.pending.push((ticket, handle));
        tracing::info!(
            message_id = %message.id,
            ticket,
            pending = inner.pending.len(),
            "user message sent"
        );
        Ok(Some(message))
    }

    /// Sends the input buffer and clears it when something was sent.
    pub fn send_input(&self) -> LabResult<Option<ChatMessage>> {
        let text = self.input();
        let sent = self.send(&text)?;
        if sent.is_some() {
            lock(&self.inner).input.clear();
        }
        Ok(sent)
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        lock(&self.inner).messages.clone()
    }

    pub fn message(&self, id: &str) -> Option<ChatMessage> {
        lock(&self.inner).messages.iter().find(|m| m.id == id).cloned()
    }

    /// Local copy of the parameters, kept in sync through `paramsChanged`.
    pub fn parameters(&self) -> GenerationParameters {
        lock(&self.inner).params
    }

    pub fn input(&self) -> String {
        lock(&self.inner).input.clone()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        lock(&self.inner).input = text.into();
    }

    pub fn state(&self) -> ChatState {
        if lock(&self.inner).pending.is_empty() {
            ChatState::Idle
        } else {
            ChatState::AwaitingResponse
        }
    }

    /// The "assistant is typing" indicator.
    pub fn is_typing(&self) -> bool {
        self.state() == ChatState::AwaitingResponse
    }

    pub fn pending_responses(&self) -> usize {
        lock(&self.inner).pending.len()
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    pub fn copy_message(&self, id: &str, clipboard: &dyn ClipboardSink) -> LabResult<()> {
        let result = self
            .require_message(id)
            .and_then(|m| clipboard.write_text(&m.content));
        self.last_error.record(result)
    }

    /// Writes `output-<id>.json` with the text, parameter snapshot and export time.
    pub fn download_message(&self, id: &str, sink: &dyn DownloadSink) -> LabResult<PathBuf> {
        let result = self.require_message(id).and_then(|m| {
            let export = OutputExport::now(&m.id, &m.content, m.params);
            let json = to_pretty_json(&export)?;
            sink.save(&output_file_name(&m.id), json.as_bytes())
        });
        self.last_error.record(result)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.get()
    }

    fn require_message(&self, id: &str) -> LabResult<ChatMessage> {
        self.message(id)
            .ok_or_else(|| LabError::Validation(format!("no message with id '{}'", id)))
    }
}

impl Drop for ChatSession {
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
        for (_, handle) in lock(&self.inner).pending.drain(..) {
            handle.abort();
        }
    }
}
