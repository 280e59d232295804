//! Broadcast bus: in-process publish/subscribe keyed by event name.
//!
//! Delivery is synchronous and in subscription order. `publish` clones the handler list for
//! the event under the read lock, releases the lock, then calls each handler, so a handler
//! may publish, subscribe or unsubscribe while being dispatched. Events published with no
//! subscriber are dropped. A panicking handler is isolated; later handlers still run.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::shared::GenerationParameters;

/// Named event channels carried by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    ParamsChanged,
    ModelChange,
    PromptLoaded,
    ThemeChange,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::ParamsChanged => "paramsChanged",
            EventName::ModelChange => "modelChange",
            EventName::PromptLoaded => "promptLoaded",
            EventName::ThemeChange => "themeChange",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event plus its payload. Subscribers match on the variant they registered for.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    /// Full replacement parameter set.
    ParamsChanged(GenerationParameters),
    /// Id of the committed model.
    ModelChange(String),
    /// Content of the loaded template.
    PromptLoaded(String),
    /// Signal only; read the theme from the theme manager.
    ThemeChange,
}

impl BusEvent {
    pub fn name(&self) -> EventName {
        match self {
            BusEvent::ParamsChanged(_) => EventName::ParamsChanged,
            BusEvent::ModelChange(_) => EventName::ModelChange,
            BusEvent::PromptLoaded(_) => EventName::PromptLoaded,
            BusEvent::ThemeChange => EventName::ThemeChange,
        }
    }
}

/// Subscriber callback.
pub type Handler = Arc<dyn Fn(&BusEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    handlers: RwLock<HashMap<EventName, Vec<(u64, Handler)>>>,
}

impl Registry {
    fn remove(&self, event: EventName, id: u64) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let Some(list) = handlers.get_mut(&event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(hid, _)| *hid != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(&event);
        }
        removed
    }
}

/// Process-wide broadcast channel. Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Registry>,
}

/// Capability returned by `subscribe`; pass it back to remove the handler.
/// Dropping it leaves the handler registered.
#[derive(Debug)]
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    event: EventName,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn event(&self) -> EventName {
        self.event
    }

    /// Removes the handler. Returns false if it was already gone or the bus no longer exists.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.event, self.id),
            None => false,
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `event`, after every handler already registered for it.
    pub fn subscribe<F>(&self, event: EventName, handler: F) -> Subscription
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let mut handlers = self
            .registry
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        handlers
            .entry(event)
            .or_default()
            .push((id, Arc::new(handler)));
        tracing::trace!(event = %event, subscriber_id = id, "bus subscribe");
        Subscription {
            id,
            event,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Same as `Subscription::unsubscribe`, but only for subscriptions issued by this bus.
    /// A subscription from another bus is left untouched and yields false.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        if !Weak::ptr_eq(&subscription.registry, &Arc::downgrade(&self.registry)) {
            tracing::debug!(event = %subscription.event, "unsubscribe ignored: foreign subscription");
            return false;
        }
        subscription.unsubscribe()
    }

    /// Delivers `event` to the handlers registered for its name at the time of the call.
    /// Returns how many handlers completed without panicking.
    pub fn publish(&self, event: BusEvent) -> usize {
        let name = event.name();
        let snapshot: Vec<Handler> = {
            let handlers = self
                .registry
                .handlers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            handlers
                .get(&name)
                .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };

        if snapshot.is_empty() {
            tracing::debug!(event = %name, "bus publish dropped: no subscribers");
            return 0;
        }
        tracing::debug!(event = %name, handlers = snapshot.len(), "bus publish");

        let mut delivered = 0;
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    tracing::warn!(event = %name, panic = %message, "bus subscriber panicked");
                }
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, event: EventName) -> usize {
        self.registry
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self
            .registry
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<EventName, usize> =
            handlers.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventBus").field("subscribers", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&BusEvent) + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let make = move |tag: &str| {
            let l = Arc::clone(&l);
            let tag = tag.to_string();
            Box::new(move |_: &BusEvent| l.lock().unwrap().push(tag.clone()))
                as Box<dyn Fn(&BusEvent) + Send + Sync>
        };
        (log, make)
    }

    #[test]
    fn delivers_in_subscription_order() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let _a = bus.subscribe(EventName::ThemeChange, make("a"));
        let _b = bus.subscribe(EventName::ThemeChange, make("b"));
        let _c = bus.subscribe(EventName::ThemeChange, make("c"));

        assert_eq!(bus.publish(BusEvent::ThemeChange), 3);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn events_without_subscribers_are_dropped() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(BusEvent::ModelChange("grok".into())), 0);

        let (log, make) = recorder();
        let _s = bus.subscribe(EventName::ModelChange, make("late"));
        assert!(log.lock().unwrap().is_empty(), "nothing is buffered for late subscribers");
    }

    #[test]
    fn names_are_isolated() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let _s = bus.subscribe(EventName::PromptLoaded, make("prompt"));
        bus.publish(BusEvent::ThemeChange);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn unsubscribe_removes_only_that_handler() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let a = bus.subscribe(EventName::ThemeChange, make("a"));
        let _b = bus.subscribe(EventName::ThemeChange, make("b"));

        assert!(a.unsubscribe());
        bus.publish(BusEvent::ThemeChange);
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
        assert_eq!(bus.subscriber_count(EventName::ThemeChange), 1);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let _a = bus.subscribe(EventName::ThemeChange, make("before"));
        let _boom = bus.subscribe(EventName::ThemeChange, |_| panic!("subscriber failure"));
        let _c = bus.subscribe(EventName::ThemeChange, make("after"));

        assert_eq!(bus.publish(BusEvent::ThemeChange), 2);
        assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);
    }

    #[test]
    fn handler_can_publish_reentrantly() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let _theme = bus.subscribe(EventName::ThemeChange, make("theme"));

        let inner = bus.clone();
        let _model = bus.subscribe(EventName::ModelChange, move |_| {
            inner.publish(BusEvent::ThemeChange);
        });

        bus.publish(BusEvent::ModelChange("claude".into()));
        assert_eq!(*log.lock().unwrap(), vec!["theme"]);
    }

    #[test]
    fn subscribe_during_dispatch_applies_to_next_publish() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let inner = bus.clone();
        let late = Arc::new(Mutex::new(Some(make("late"))));
        let _first = bus.subscribe(EventName::ThemeChange, move |_| {
            if let Some(h) = late.lock().unwrap().take() {
                let _ = inner.subscribe(EventName::ThemeChange, h);
            }
        });

        bus.publish(BusEvent::ThemeChange);
        assert!(log.lock().unwrap().is_empty(), "snapshot excludes handlers added mid-dispatch");
        bus.publish(BusEvent::ThemeChange);
        assert_eq!(*log.lock().unwrap(), vec!["late"]);
    }

    #[test]
    fn unsubscribe_ignores_subscriptions_from_other_buses() {
        let bus_a = EventBus::new();
        let bus_b = EventBus::new();
        let (log, make) = recorder();
        let from_a = bus_a.subscribe(EventName::ThemeChange, make("a"));
        let _from_b = bus_b.subscribe(EventName::ThemeChange, make("b"));

        assert!(!bus_b.unsubscribe(from_a));
        assert_eq!(bus_b.subscriber_count(EventName::ThemeChange), 1);
        assert_eq!(bus_a.subscriber_count(EventName::ThemeChange), 1);
        assert_eq!(bus_b.publish(BusEvent::ThemeChange), 1);
        assert_eq!(*log.lock().unwrap(), vec!["b"]);

        let again = bus_a.subscribe(EventName::ModelChange, |_| {});
        assert!(bus_a.unsubscribe(again));
        assert_eq!(bus_a.subscriber_count(EventName::ModelChange), 0);
    }

    #[test]
    fn unsubscribe_during_dispatch_applies_to_next_publish() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&victim);
        let inner = bus.clone();
        let _first = bus.subscribe(EventName::ThemeChange, move |_| {
            if let Some(sub) = slot.lock().unwrap().take() {
                assert!(inner.unsubscribe(sub));
            }
        });
        *victim.lock().unwrap() = Some(bus.subscribe(EventName::ThemeChange, make("second")));

        assert_eq!(bus.publish(BusEvent::ThemeChange), 2);
        assert_eq!(*log.lock().unwrap(), vec!["second"], "snapshot still holds the removed handler");
        assert_eq!(bus.subscriber_count(EventName::ThemeChange), 1);

        bus.publish(BusEvent::ThemeChange);
        assert_eq!(*log.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn unsubscribe_after_bus_dropped_is_harmless() {
        let bus = EventBus::new();
        let sub = bus.subscribe(EventName::ThemeChange, |_| {});
        drop(bus);
        assert!(!sub.unsubscribe());
    }
}
