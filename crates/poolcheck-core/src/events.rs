//! Observer registration for pool events.
//!
//! Pools own an `EventHub` and dispatch a `PoolEvent` at each extensibility
//! point. Observers are registered with `subscribe()`, which returns a
//! `SubscriptionToken` the caller later hands to `unsubscribe()`.
//!
//! Observers hold their own state; the hub never captures caller variables.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

/// The kinds of events a pool can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GetItem,
    SaveItem,
    SaveDeferredItem,
    CommitItem,
    DeleteItem,
    Clear,
    GetAllItems,
    GetItemsByTags,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::GetItem => "CacheGetItem",
            EventKind::SaveItem => "CacheSaveItem",
            EventKind::SaveDeferredItem => "CacheSaveDeferredItem",
            EventKind::CommitItem => "CacheCommitItem",
            EventKind::DeleteItem => "CacheDeleteItem",
            EventKind::Clear => "CacheClearItem",
            EventKind::GetAllItems => "CacheGetAllItems",
            EventKind::GetItemsByTags => "CacheGetItemsByTags",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent<'a> {
    GetItem { key: &'a str },
    SaveItem { key: &'a str },
    SaveDeferredItem { key: &'a str },
    CommitItem { keys: &'a [String] },
    DeleteItem { key: &'a str },
    Clear,
    /// Fired from inside the bulk-retrieval path, at the moment the pool
    /// invokes its internal key scan.
    GetAllItems { pattern: &'a str },
    GetItemsByTags { tags: &'a [String] },
}

impl PoolEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            PoolEvent::GetItem { .. } => EventKind::GetItem,
            PoolEvent::SaveItem { .. } => EventKind::SaveItem,
            PoolEvent::SaveDeferredItem { .. } => EventKind::SaveDeferredItem,
            PoolEvent::CommitItem { .. } => EventKind::CommitItem,
            PoolEvent::DeleteItem { .. } => EventKind::DeleteItem,
            PoolEvent::Clear => EventKind::Clear,
            PoolEvent::GetAllItems { .. } => EventKind::GetAllItems,
            PoolEvent::GetItemsByTags { .. } => EventKind::GetItemsByTags,
        }
    }
}

/// Which events an observer wants to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    Every,
    Only(EventKind),
}

impl EventFilter {
    fn accepts(self, kind: EventKind) -> bool {
        match self {
            EventFilter::Every => true,
            EventFilter::Only(k) => k == kind,
        }
    }
}

/// Receives pool events.
pub trait PoolObserver: Send + Sync {
    fn notify(&self, event: &PoolEvent<'_>);
}

/// Handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

struct Subscription {
    token: SubscriptionToken,
    filter: EventFilter,
    observer: Arc<dyn PoolObserver>,
}

/// Registry of observers for one pool.
#[derive(Default)]
pub struct EventHub {
    next: AtomicU64,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, filter: EventFilter, observer: Arc<dyn PoolObserver>) -> SubscriptionToken {
        let token = SubscriptionToken(self.next.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Subscription { token, filter, observer });
        token
    }

    /// Subscribe for the lifetime of the returned guard.
    pub fn subscribe_scoped(
        &self,
        filter: EventFilter,
        observer: Arc<dyn PoolObserver>,
    ) -> ScopedSubscription<'_> {
        ScopedSubscription {
            hub: self,
            token: self.subscribe(filter, observer),
        }
    }

    /// Remove a subscription. Returns false if the token was unknown.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut subs = self.lock();
        let before = subs.len();
        subs.retain(|s| s.token != token);
        subs.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `event` to every matching observer, in subscription order.
    ///
    /// Observers are called outside the registry lock so they may subscribe
    /// or unsubscribe from within `notify`.
    pub fn dispatch(&self, event: &PoolEvent<'_>) {
        let kind = event.kind();
        let targets: Vec<Arc<dyn PoolObserver>> = self
            .lock()
            .iter()
            .filter(|s| s.filter.accepts(kind))
            .map(|s| Arc::clone(&s.observer))
            .collect();

        trace!(event = %kind, observers = targets.len(), "dispatching pool event");
        for observer in targets {
            observer.notify(event);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// A subscription removed from its hub when dropped.
#[derive(Debug)]
pub struct ScopedSubscription<'a> {
    hub: &'a EventHub,
    token: SubscriptionToken,
}

impl ScopedSubscription<'_> {
    pub fn token(&self) -> SubscriptionToken {
        self.token
    }
}

impl Drop for ScopedSubscription<'_> {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.token);
    }
}

/// Observer that counts how many times it was notified.
///
/// Used to prove an extensibility point actually fired: subscribe it, run
/// the operation, then read `invocations()`.
#[derive(Debug, Default)]
pub struct InvocationProbe {
    invocations: AtomicU64,
}

impl InvocationProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn fired(&self) -> bool {
        self.invocations() > 0
    }
}

impl PoolObserver for InvocationProbe {
    fn notify(&self, _event: &PoolEvent<'_>) {
        self.invocations.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recorder(Mutex<Vec<EventKind>>);

    impl PoolObserver for Recorder {
        fn notify(&self, event: &PoolEvent<'_>) {
            self.0.lock().unwrap().push(event.kind());
        }
    }

    #[test]
    fn filtered_observer_only_sees_its_kind() {
        let hub = EventHub::new();
        let probe = Arc::new(InvocationProbe::new());
        hub.subscribe(EventFilter::Only(EventKind::GetAllItems), probe.clone());

        hub.dispatch(&PoolEvent::GetItem { key: "k" });
        assert!(!probe.fired());

        hub.dispatch(&PoolEvent::GetAllItems { pattern: "" });
        assert_eq!(probe.invocations(), 1);
    }

    #[test]
    fn every_filter_sees_all_events_in_order() {
        let hub = EventHub::new();
        let recorder = Arc::new(Recorder(Mutex::new(vec![])));
        hub.subscribe(EventFilter::Every, recorder.clone());

        hub.dispatch(&PoolEvent::Clear);
        hub.dispatch(&PoolEvent::SaveItem { key: "a" });

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![EventKind::Clear, EventKind::SaveItem]
        );
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let hub = EventHub::new();
        let probe = Arc::new(InvocationProbe::new());
        let token = hub.subscribe(EventFilter::Every, probe.clone());

        assert!(hub.unsubscribe(token));
        assert!(!hub.unsubscribe(token), "second unsubscribe must report unknown token");
        assert_eq!(hub.observer_count(), 0);

        hub.dispatch(&PoolEvent::Clear);
        assert!(!probe.fired());
    }

    #[test]
    fn scoped_subscription_ends_on_drop() {
        let hub = EventHub::new();
        let probe = Arc::new(InvocationProbe::new());
        {
            let scoped = hub.subscribe_scoped(EventFilter::Every, probe.clone());
            hub.dispatch(&PoolEvent::Clear);
            assert_eq!(hub.observer_count(), 1);
            assert!(!hub.unsubscribe(SubscriptionToken(scoped.token().0 + 1)));
        }
        assert_eq!(hub.observer_count(), 0);
        hub.dispatch(&PoolEvent::Clear);
        assert_eq!(probe.invocations(), 1);
    }

    #[test]
    fn tokens_are_distinct() {
        let hub = EventHub::new();
        let a = hub.subscribe(EventFilter::Every, Arc::new(InvocationProbe::new()));
        let b = hub.subscribe(EventFilter::Every, Arc::new(InvocationProbe::new()));
        assert_ne!(a, b);
    }

    #[test]
    fn event_names() {
        assert_eq!(EventKind::GetAllItems.to_string(), "CacheGetAllItems");
        assert_eq!(PoolEvent::CommitItem { keys: &[] }.kind(), EventKind::CommitItem);
    }
}
