//! Notification bus for session events.
//!
//! Presentation collaborators observe the session controller in one of two
//! ways:
//!
//! - **Listeners** registered with [`EventBus::subscribe`] (one event kind)
//!   or [`EventBus::subscribe_all`] are called synchronously, in
//!   publication order. Registration returns a [`Subscription`] guard;
//!   dropping the guard deregisters the listener, so a collaborator's
//!   subscriptions end with it.
//! - **Channel receivers** from [`EventBus::receiver`] get every event
//!   through a [`tokio::sync::broadcast`] channel. A receiver that falls
//!   behind by more than the channel capacity skips to the newest events.
//!
//! Publication is fire-and-forget. The registry lock is never held while a
//! listener runs, so listeners may subscribe, unsubscribe, or report finds
//! back to the session from inside a callback.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use hideout_types::{EventKind, SessionEvent};
use tokio::sync::broadcast;

/// Capacity of the broadcast channel for session events.
const BROADCAST_CAPACITY: usize = 256;

/// A synchronous observer of session events.
pub trait SessionListener: Send + Sync {
    /// Called once for every event the listener is subscribed to.
    fn on_event(&self, event: &SessionEvent);
}

impl<F> SessionListener for F
where
    F: Fn(&SessionEvent) + Send + Sync,
{
    fn on_event(&self, event: &SessionEvent) {
        self(event);
    }
}

/// Identifier of a listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

/// One registered listener.
struct Registration {
    /// `None` receives every kind.
    filter: Option<EventKind>,
    listener: Arc<dyn SessionListener>,
}

/// Listener table shared by the bus and its subscription guards.
#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    listeners: RwLock<BTreeMap<SubscriptionId, Registration>>,
}

impl Registry {
    fn insert(&self, filter: Option<EventKind>, listener: Arc<dyn SessionListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Registration { filter, listener });
        id
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    /// Listeners interested in `kind`, in registration order.
    fn matching(&self, kind: EventKind) -> Vec<Arc<dyn SessionListener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|registration| registration.filter.is_none_or(|filter| filter == kind))
            .map(|registration| Arc::clone(&registration.listener))
            .collect()
    }

    fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry").field("listeners", &self.len()).finish()
    }
}

/// Publish/subscribe hub for [`SessionEvent`]s.
///
/// Cloning the bus yields another handle to the same registry and channel.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<Registry>,
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            registry: Arc::new(Registry::default()),
            tx,
        }
    }

    /// Register a listener for one kind of event.
    pub fn subscribe(&self, kind: EventKind, listener: Arc<dyn SessionListener>) -> Subscription {
        self.register(Some(kind), listener)
    }

    /// Register a listener for every event.
    pub fn subscribe_all(&self, listener: Arc<dyn SessionListener>) -> Subscription {
        self.register(None, listener)
    }

    fn register(&self, filter: Option<EventKind>, listener: Arc<dyn SessionListener>) -> Subscription {
        let id = self.registry.insert(filter, listener);
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
            detached: false,
        }
    }

    /// Subscribe to every event through the broadcast channel.
    ///
    /// Dropping the receiver ends the subscription.
    pub fn receiver(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Deliver an event to matching listeners, then to channel receivers.
    ///
    /// Returns the number of listeners called.
    pub fn publish(&self, event: &SessionEvent) -> usize {
        let listeners = self.registry.matching(event.kind());
        for listener in &listeners {
            listener.on_event(event);
        }
        // No receivers is not an error for fire-and-forget delivery.
        let _ = self.tx.send(event.clone());
        listeners.len()
    }

    /// Publish a batch of events in order.
    pub fn publish_all(&self, events: &[SessionEvent]) {
        for event in events {
            let _ = self.publish(event);
        }
    }

    /// Number of registered listeners (channel receivers not included).
    pub fn listener_count(&self) -> usize {
        self.registry.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.registry.len())
            .field("receivers", &self.tx.receiver_count())
            .finish()
    }
}

/// Guard for a listener registration.
///
/// The listener stays registered until the guard is dropped or
/// [`unsubscribe`](Self::unsubscribe) is called, unless the guard is
/// [`detach`](Self::detach)ed.
#[derive(Debug)]
#[must_use = "dropping a Subscription immediately unregisters the listener"]
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<Registry>,
    detached: bool,
}

impl Subscription {
    /// The registration id.
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Deregister the listener now.
    ///
    /// Returns `false` if it was already gone (or the bus was dropped).
    pub fn unsubscribe(mut self) -> bool {
        self.detached = true;
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.remove(self.id))
    }

    /// Keep the listener registered for the lifetime of the bus.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            let _ = registry.remove(self.id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use hideout_types::ObjectId;

    use super::*;

    /// Listener that records every event it sees.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<SessionEvent>>,
    }

    impl SessionListener for Recorder {
        fn on_event(&self, event: &SessionEvent) {
            self.seen.lock().unwrap().push(event.clone());
        }
    }

    impl Recorder {
        fn seen(&self) -> Vec<SessionEvent> {
            self.seen.lock().unwrap().clone()
        }
    }

    fn found(id: u32) -> SessionEvent {
        SessionEvent::ObjectFound {
            found_count: 1,
            total_count: 2,
            object_id: ObjectId(id),
        }
    }

    #[test]
    fn kind_filter_limits_delivery() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder::default());
        let _sub = bus.subscribe(EventKind::AllFound, recorder.clone());

        bus.publish_all(&[found(1), SessionEvent::AllFound]);
        assert_eq!(recorder.seen(), vec![SessionEvent::AllFound]);
    }

    #[test]
    fn subscribe_all_preserves_order() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder::default());
        let _sub = bus.subscribe_all(recorder.clone());

        let events = vec![
            SessionEvent::TimeElapsed {
                remaining_seconds: 3,
            },
            found(1),
            SessionEvent::AllFound,
            SessionEvent::GameComplete { success: true },
        ];
        bus.publish_all(&events);
        assert_eq!(recorder.seen(), events);
    }

    #[test]
    fn dropping_the_guard_unsubscribes() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder::default());
        let sub = bus.subscribe_all(recorder.clone());
        assert_eq!(bus.listener_count(), 1);

        drop(sub);
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(bus.publish(&SessionEvent::AllFound), 0);
        assert!(recorder.seen().is_empty());
    }

    #[test]
    fn explicit_unsubscribe_reports_removal() {
        let bus = EventBus::new();
        let sub = bus.subscribe_all(Arc::new(|_: &SessionEvent| {}));
        assert!(sub.unsubscribe());
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn detached_listener_outlives_its_guard() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder::default());
        bus.subscribe_all(recorder.clone()).detach();

        assert_eq!(bus.publish(&SessionEvent::AllFound), 1);
        assert_eq!(recorder.seen().len(), 1);
    }

    #[test]
    fn guard_outliving_bus_is_harmless() {
        let bus = EventBus::new();
        let sub = bus.subscribe_all(Arc::new(|_: &SessionEvent| {}));
        drop(bus);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn listener_may_unsubscribe_others_during_delivery() {
        let bus = EventBus::new();
        let victim = Arc::new(Mutex::new(None::<Subscription>));
        let victim_slot = Arc::clone(&victim);
        let _killer = bus.subscribe_all(Arc::new(move |_: &SessionEvent| {
            if let Some(sub) = victim_slot.lock().unwrap().take() {
                let _ = sub.unsubscribe();
            }
        }));
        *victim.lock().unwrap() = Some(bus.subscribe_all(Arc::new(|_: &SessionEvent| {})));
        assert_eq!(bus.listener_count(), 2);

        let _ = bus.publish(&SessionEvent::AllFound);
        assert_eq!(bus.listener_count(), 1);
    }

    #[tokio::test]
    async fn channel_receivers_get_every_event() {
        let bus = EventBus::new();
        let mut rx = bus.receiver();
        bus.publish_all(&[found(4), SessionEvent::AllFound]);

        assert_eq!(rx.recv().await.unwrap(), found(4));
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::AllFound);
    }
}
