//! In-process publish/subscribe hub for [`AppEvent`]s.
//!
//! Dispatch is synchronous and runs on the calling thread: [`EventBus::emit`]
//! invokes every current subscriber for the event's kind in registration
//! order before returning. The handler list is snapshotted first, so
//! subscriptions added or removed during dispatch do not affect the pass in
//! flight; a handler may itself emit (nested synchronous dispatch). A failing
//! handler is logged and skipped; it neither stops later handlers nor
//! reaches the emitter. One-shot handlers are dropped after their single
//! invocation even when they failed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::event::{AppEvent, EventKind};

/// Identifier returned by a subscription, usable to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Arc<dyn Fn(&AppEvent) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    id: HandlerId,
    once: bool,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    handlers: HashMap<EventKind, Vec<Registration>>,
    next_id: u64,
}

/// Synchronous event bus shared via cheap clones (`Arc` inside).
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a persistent handler for one event kind.
    ///
    /// Handlers run in registration order on the emitting thread. Returns an
    /// id usable with [`off`](Self::off).
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&AppEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(handler), false)
    }

    /// Subscribes a handler that is removed after its first invocation.
    pub fn once<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&AppEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(handler), true)
    }

    fn register(&self, kind: EventKind, handler: Handler, once: bool) -> HandlerId {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        let id = HandlerId(inner.next_id);
        inner.next_id += 1;
        inner
            .handlers
            .entry(kind)
            .or_default()
            .push(Registration { id, once, handler });
        id
    }

    /// Removes one subscription. Returns whether anything was removed.
    pub fn off(&self, kind: EventKind, id: HandlerId) -> bool {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        let Some(registrations) = inner.handlers.get_mut(&kind) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        let removed = registrations.len() != before;
        if registrations.is_empty() {
            inner.handlers.remove(&kind);
        }
        removed
    }

    /// Removes every subscription for one event kind.
    pub fn off_all(&self, kind: EventKind) -> bool {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        inner.handlers.remove(&kind).is_some()
    }

    /// Removes every subscription on the bus.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        inner.handlers.clear();
    }

    /// Publishes an event to all current subscribers of its kind.
    ///
    /// Returns false when nobody was subscribed. The lock is released while
    /// handlers run, so handlers may subscribe, unsubscribe, or emit.
    pub fn emit(&self, event: AppEvent) -> bool {
        let kind = event.kind();
        let snapshot: Vec<Registration> = {
            let inner = self.inner.lock().expect("event bus lock poisoned");
            match inner.handlers.get(&kind) {
                Some(registrations) => registrations.clone(),
                None => return false,
            }
        };

        let mut spent = Vec::new();
        for registration in &snapshot {
            if let Err(error) = (registration.handler)(&event) {
                tracing::warn!(?kind, %error, "event handler failed");
            }
            if registration.once {
                spent.push(registration.id);
            }
        }

        for id in spent {
            self.off(kind, id);
        }

        true
    }

    /// Number of current subscribers for one event kind.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        let inner = self.inner.lock().expect("event bus lock poisoned");
        inner.handlers.get(&kind).map_or(0, Vec::len)
    }

    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.listener_count(kind) > 0
    }

    /// Event kinds that currently have at least one subscriber.
    pub fn event_kinds(&self) -> Vec<EventKind> {
        let inner = self.inner.lock().expect("event bus lock poisoned");
        inner.handlers.keys().copied().collect()
    }

    /// Creates a scope that tracks its own subscriptions for bulk removal.
    pub fn scope(&self, label: impl Into<String>) -> BusScope {
        BusScope {
            bus: self.clone(),
            label: label.into(),
            ids: Mutex::new(Vec::new()),
        }
    }
}

/// A subscription group, the typed equivalent of a namespaced sub-bus.
///
/// Components subscribe through their scope and call
/// [`detach_all`](Self::detach_all) on teardown instead of bookkeeping
/// individual handler ids.
pub struct BusScope {
    bus: EventBus,
    label: String,
    ids: Mutex<Vec<(EventKind, HandlerId)>>,
}

impl BusScope {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&AppEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.bus.on(kind, handler);
        self.ids.lock().expect("scope lock poisoned").push((kind, id));
        id
    }

    pub fn once<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&AppEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.bus.once(kind, handler);
        self.ids.lock().expect("scope lock poisoned").push((kind, id));
        id
    }

    pub fn emit(&self, event: AppEvent) -> bool {
        self.bus.emit(event)
    }

    /// Removes every subscription made through this scope.
    pub fn detach_all(&self) {
        let ids: Vec<_> = self
            .ids
            .lock()
            .expect("scope lock poisoned")
            .drain(..)
            .collect();
        for (kind, id) in ids {
            self.bus.off(kind, id);
        }
    }
}

impl Drop for BusScope {
    fn drop(&mut self) {
        self.detach_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{LogoutReason, NoticeLevel};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn notify() -> AppEvent {
        AppEvent::notify(NoticeLevel::Info, "hello")
    }

    #[test]
    fn test_emit_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = order.clone();
        bus.on(EventKind::Notify, move |_| {
            o.lock().unwrap().push("a");
            Ok(())
        });
        let o = order.clone();
        bus.on(EventKind::Notify, move |_| {
            o.lock().unwrap().push("b");
            Ok(())
        });

        assert!(bus.emit(notify()));
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_once_then_persistent() {
        let bus = EventBus::new();
        let a_calls = Arc::new(AtomicUsize::new(0));
        let b_calls = Arc::new(AtomicUsize::new(0));

        let a = a_calls.clone();
        bus.once(EventKind::Notify, move |_| {
            a.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let b = b_calls.clone();
        bus.on(EventKind::Notify, move |_| {
            b.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.emit(notify());
        bus.emit(notify());

        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failing_handler_does_not_stop_dispatch() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        bus.on(EventKind::Notify, |_| anyhow::bail!("boom"));
        let c = calls.clone();
        bus.on(EventKind::Notify, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(bus.emit(notify()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_once_removed_even_after_failure() {
        let bus = EventBus::new();
        bus.once(EventKind::Notify, |_| anyhow::bail!("boom"));
        bus.emit(notify());
        assert!(!bus.has_listeners(EventKind::Notify));
    }

    #[test]
    fn test_off_by_id() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let id = bus.on(EventKind::Notify, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(bus.off(EventKind::Notify, id));
        assert!(!bus.off(EventKind::Notify, id));
        assert!(!bus.emit(notify()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscription_during_dispatch_not_invoked_this_pass() {
        let bus = EventBus::new();
        let late_calls = Arc::new(AtomicUsize::new(0));

        let bus_clone = bus.clone();
        let late = late_calls.clone();
        bus.on(EventKind::Notify, move |_| {
            let late = late.clone();
            bus_clone.on(EventKind::Notify, move |_| {
                late.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            Ok(())
        });

        bus.emit(notify());
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);

        bus.emit(notify());
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_nested_emit_from_handler() {
        let bus = EventBus::new();
        let logouts = Arc::new(AtomicUsize::new(0));

        let bus_clone = bus.clone();
        bus.on(EventKind::SessionExpired, move |_| {
            bus_clone.emit(AppEvent::Logout {
                reason: LogoutReason::SessionExpired,
            });
            Ok(())
        });
        let l = logouts.clone();
        bus.on(EventKind::Logout, move |_| {
            l.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.emit(AppEvent::SessionExpired);
        assert_eq!(logouts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scope_detach_all() {
        let bus = EventBus::new();
        let scope = bus.scope("detail-view");
        scope.on(EventKind::PlanUpdated, |_| Ok(()));
        scope.on(EventKind::PlanDeleted, |_| Ok(()));
        assert!(bus.has_listeners(EventKind::PlanUpdated));

        scope.detach_all();
        assert!(!bus.has_listeners(EventKind::PlanUpdated));
        assert!(!bus.has_listeners(EventKind::PlanDeleted));
    }

    #[test]
    fn test_off_all_and_clear() {
        let bus = EventBus::new();
        bus.on(EventKind::Notify, |_| Ok(()));
        bus.on(EventKind::Logout, |_| Ok(()));

        assert!(bus.off_all(EventKind::Notify));
        assert!(!bus.off_all(EventKind::Notify));

        bus.clear();
        assert!(bus.event_kinds().is_empty());
    }
}
