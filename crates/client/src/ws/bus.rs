//! Typed publish/subscribe registry for server-pushed events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use getyourshare_shared::{EventType, ServerEvent};
use serde_json::Value;

pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

struct Registration {
    id: u64,
    event: EventType,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    /// Kept in registration order.
    entries: Mutex<Vec<Registration>>,
}

impl Registry {
    fn contains(&self, id: u64) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.iter().any(|r| r.id == id))
            .unwrap_or(false)
    }

    fn remove(&self, id: u64) -> bool {
        match self.entries.lock() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|r| r.id != id);
                entries.len() != before
            }
            Err(_) => false,
        }
    }
}

/// Handlers per event type, invoked in registration order.
///
/// The registry lock is never held while a handler runs, so handlers may
/// subscribe or unsubscribe (themselves included) freely.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Registry>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`. The registration lives as long as the
    /// returned [`Subscription`].
    pub fn on(
        &self,
        event: EventType,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut entries) = self.registry.entries.lock() {
            entries.push(Registration {
                id,
                event,
                handler: Arc::new(handler),
            });
        }
        Subscription {
            registry: Arc::downgrade(&self.registry),
            id,
            event,
        }
    }

    /// Deliver `event` to its handlers. Returns how many ran.
    pub fn dispatch(&self, event: &ServerEvent) -> usize {
        let targets: Vec<(u64, Handler)> = match self.registry.entries.lock() {
            Ok(entries) => entries
                .iter()
                .filter(|r| r.event == event.kind)
                .map(|r| (r.id, r.handler.clone()))
                .collect(),
            Err(_) => return 0,
        };

        let mut delivered = 0;
        for (id, handler) in targets {
            // Removed by an earlier handler of this same dispatch
            if !self.registry.contains(id) {
                continue;
            }
            handler(&event.data);
            delivered += 1;
        }
        delivered
    }

    pub fn handler_count(&self, event: EventType) -> usize {
        self.registry
            .entries
            .lock()
            .map(|entries| entries.iter().filter(|r| r.event == event).count())
            .unwrap_or(0)
    }
}

/// One registration. Dropping it, or calling [`Subscription::unsubscribe`],
/// removes exactly this handler.
#[must_use = "dropping a Subscription unregisters its handler"]
pub struct Subscription {
    registry: Weak<Registry>,
    id: u64,
    event: EventType,
}

impl Subscription {
    pub fn event(&self) -> EventType {
        self.event
    }

    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .map(|r| r.contains(self.id))
            .unwrap_or(false)
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event", &self.event)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Box<dyn Fn(&Value) + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = log.clone();
        let make = move |name: &'static str| {
            let log = log2.clone();
            Box::new(move |_: &Value| log.lock().unwrap().push(name.to_string()))
                as Box<dyn Fn(&Value) + Send + Sync>
        };
        (log, make)
    }

    fn sale() -> ServerEvent {
        ServerEvent::new(EventType::SaleCreated, json!({"amount": 10}))
    }

    #[test]
    fn test_delivers_in_registration_order() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let _a = bus.on(EventType::SaleCreated, make("a"));
        let _other = bus.on(EventType::PaymentCreated, make("other"));
        let _b = bus.on(EventType::SaleCreated, make("b"));

        assert_eq!(bus.dispatch(&sale()), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_registration() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let a = bus.on(EventType::SaleCreated, make("a"));
        let _a2 = bus.on(EventType::SaleCreated, make("a"));

        a.unsubscribe();
        assert_eq!(bus.handler_count(EventType::SaleCreated), 1);
        bus.dispatch(&sale());
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_dropped_subscription_gets_nothing() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        {
            let _scoped = bus.on(EventType::SaleCreated, make("scoped"));
        }
        assert_eq!(bus.dispatch(&sale()), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_handler_removed_mid_dispatch_is_skipped() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let slot = victim.clone();
        let _killer = bus.on(EventType::SaleCreated, move |_| {
            slot.lock().unwrap().take();
        });
        *victim.lock().unwrap() = Some(bus.on(EventType::SaleCreated, make("victim")));

        assert_eq!(bus.dispatch(&sale()), 1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_subscription_outliving_bus() {
        let bus = EventBus::new();
        let sub = bus.on(EventType::DashboardUpdate, |_| {});
        assert!(sub.is_active());
        drop(bus);
        assert!(!sub.is_active());
        drop(sub);
    }
}
