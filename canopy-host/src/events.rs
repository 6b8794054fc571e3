//! Named-topic publish/subscribe between extensions.
//!
//! Topics carry no payload; subscribers re-query what they need. Delivery
//! is synchronous and in subscription order, to the subscribers present
//! when `emit` starts. A subscriber added during an emit waits for the
//! next one; one removed during an emit is not called again.

use canopy_types::ExtensionId;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Underlying data changed; views should re-query.
pub const DATA_CHANGED: &str = "data:changed";
/// The set of active extensions changed.
pub const EXTENSIONS_CHANGED: &str = "extensions:changed";
/// An extension failed to load or activate.
pub const EXTENSION_FAILED: &str = "extensions:failed";

type Callback = Arc<dyn Fn(&str) + Send + Sync>;

struct Subscriber {
    id: u64,
    topic: String,
    owner: Option<ExtensionId>,
    active: Arc<AtomicBool>,
    callback: Callback,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

/// The host's event bus. Clones share subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribes `callback` to `topic`.
    pub fn on(&self, topic: &str, callback: impl Fn(&str) + Send + Sync + 'static) -> Subscription {
        self.subscribe(topic, None, Arc::new(callback))
    }

    fn subscribe(&self, topic: &str, owner: Option<ExtensionId>, callback: Callback) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.subscribers.push(Subscriber {
            id,
            topic: topic.to_string(),
            owner,
            active: Arc::clone(&active),
            callback,
        });
        Subscription {
            id,
            active,
            bus: self.clone(),
        }
    }

    /// Calls every current subscriber of `topic`. Returns how many ran.
    pub fn emit(&self, topic: &str) -> usize {
        let snapshot: Vec<(Arc<AtomicBool>, Callback)> = self
            .lock()
            .subscribers
            .iter()
            .filter(|s| s.topic == topic)
            .map(|s| (Arc::clone(&s.active), Arc::clone(&s.callback)))
            .collect();

        let mut delivered = 0;
        for (active, callback) in snapshot {
            if active.load(Ordering::SeqCst) {
                callback(topic);
                delivered += 1;
            }
        }
        delivered
    }

    /// Drops every subscription made on behalf of `owner`.
    pub fn remove_owner(&self, owner: &ExtensionId) -> usize {
        let mut inner = self.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|s| {
            let owned = s.owner.as_ref() == Some(owner);
            if owned {
                s.active.store(false, Ordering::SeqCst);
            }
            !owned
        });
        before - inner.subscribers.len()
    }

    fn remove(&self, id: u64) {
        self.lock().subscribers.retain(|s| s.id != id);
    }

    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock()
            .subscribers
            .iter()
            .filter(|s| s.topic == topic)
            .count()
    }

    /// A view of the bus whose subscriptions are tagged with `owner`.
    #[must_use]
    pub fn scoped(&self, owner: ExtensionId) -> ScopedEventBus {
        ScopedEventBus {
            bus: self.clone(),
            owner,
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.lock().subscribers.len())
            .finish()
    }
}

/// Handle returned by [`EventBus::on`].
///
/// Dropping it does not unsubscribe; call [`Subscription::unsubscribe`].
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    bus: EventBus,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.active.store(false, Ordering::SeqCst);
        self.bus.remove(self.id);
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// The bus as seen by one extension. Its subscriptions are swept when the
/// extension is unregistered.
#[derive(Clone, Debug)]
pub struct ScopedEventBus {
    bus: EventBus,
    owner: ExtensionId,
}

impl ScopedEventBus {
    pub fn on(&self, topic: &str, callback: impl Fn(&str) + Send + Sync + 'static) -> Subscription {
        self.bus
            .subscribe(topic, Some(self.owner.clone()), Arc::new(callback))
    }

    pub fn emit(&self, topic: &str) -> usize {
        self.bus.emit(topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Arc<dyn Fn(&str) + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let make = move |name: &str| -> Arc<dyn Fn(&str) + Send + Sync> {
            let l = Arc::clone(&l);
            let name = name.to_string();
            Arc::new(move |topic: &str| l.lock().unwrap().push(format!("{name}:{topic}")))
        };
        (log, make)
    }

    #[test]
    fn delivers_in_subscription_order() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let a = make("a");
        let b = make("b");
        let _s1 = bus.on(DATA_CHANGED, move |t| a(t));
        let _s2 = bus.on(DATA_CHANGED, move |t| b(t));

        assert_eq!(bus.emit(DATA_CHANGED), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a:data:changed", "b:data:changed"]);
    }

    #[test]
    fn other_topics_are_not_delivered() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let a = make("a");
        let _s = bus.on(DATA_CHANGED, move |t| a(t));

        assert_eq!(bus.emit(EXTENSIONS_CHANGED), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let a = make("a");
        let sub = bus.on(DATA_CHANGED, move |t| a(t));
        sub.unsubscribe();

        assert_eq!(bus.emit(DATA_CHANGED), 0);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(bus.subscriber_count(DATA_CHANGED), 0);
    }

    #[test]
    fn subscriber_added_during_emit_waits_for_next_emit() {
        let bus = EventBus::new();
        let late_calls = Arc::new(Mutex::new(0));
        let added = Arc::new(Mutex::new(Vec::new()));

        let bus2 = bus.clone();
        let late = Arc::clone(&late_calls);
        let added2 = Arc::clone(&added);
        let _s = bus.on(DATA_CHANGED, move |_| {
            let late = Arc::clone(&late);
            let sub = bus2.on(DATA_CHANGED, move |_| *late.lock().unwrap() += 1);
            added2.lock().unwrap().push(sub);
        });

        assert_eq!(bus.emit(DATA_CHANGED), 1);
        assert_eq!(*late_calls.lock().unwrap(), 0);

        bus.emit(DATA_CHANGED);
        assert_eq!(*late_calls.lock().unwrap(), 1);
    }

    #[test]
    fn subscriber_removed_during_emit_is_skipped() {
        let bus = EventBus::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let v = Arc::clone(&victim);
        let c1 = Arc::clone(&calls);
        let _first = bus.on(DATA_CHANGED, move |_| {
            c1.lock().unwrap().push("first");
            if let Some(sub) = v.lock().unwrap().take() {
                sub.unsubscribe();
            }
        });
        let c2 = Arc::clone(&calls);
        *victim.lock().unwrap() = Some(bus.on(DATA_CHANGED, move |_| c2.lock().unwrap().push("second")));

        assert_eq!(bus.emit(DATA_CHANGED), 1);
        assert_eq!(*calls.lock().unwrap(), vec!["first"]);
    }

    #[test]
    fn remove_owner_sweeps_scoped_subscriptions() {
        let bus = EventBus::new();
        let owner = ExtensionId::parse("goals").unwrap();
        let scoped = bus.scoped(owner.clone());
        let (log, make) = recorder();
        let a = make("scoped");
        let b = make("host");
        let sub = scoped.on(DATA_CHANGED, move |t| a(t));
        let _host = bus.on(DATA_CHANGED, move |t| b(t));

        assert_eq!(bus.remove_owner(&owner), 1);
        assert!(!sub.is_active());
        scoped.emit(DATA_CHANGED);
        assert_eq!(*log.lock().unwrap(), vec!["host:data:changed"]);
    }
}
