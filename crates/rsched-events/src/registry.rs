use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, warn};

use crate::types::{DispatchReport, Subscriber, SubscriptionId, WebhookEvent, DATA_EVENT};

struct Entry {
    id: SubscriptionId,
    /// Removed by the dispatch that delivers to it.
    once: bool,
    subscriber: Arc<dyn Subscriber>,
}

/// Ordered registry of `data` subscribers.
///
/// One per client; share it as `Arc<EventRegistry>` between the client and
/// its webhook listener.
pub struct EventRegistry {
    /// Registration order is dispatch order.
    entries: RwLock<Vec<Entry>>,
    next_id: AtomicU64,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a subscriber for every future event.
    pub fn subscribe<S: Subscriber + 'static>(&self, subscriber: S) -> SubscriptionId {
        self.insert(Arc::new(subscriber), false)
    }

    /// Register an already shared subscriber. The same `Arc` may be
    /// registered more than once; each registration is delivered to.
    pub fn subscribe_arc(&self, subscriber: Arc<dyn Subscriber>) -> SubscriptionId {
        self.insert(subscriber, false)
    }

    /// Register a subscriber that is removed after its first event.
    pub fn once<S: Subscriber + 'static>(&self, subscriber: S) -> SubscriptionId {
        self.insert(Arc::new(subscriber), true)
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() < before;
        if removed {
            debug!(subscription = %id, "subscriber removed");
        }
        removed
    }

    /// Remove every subscription, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut entries = self.write();
        let n = entries.len();
        entries.clear();
        n
    }

    pub fn listener_count(&self) -> usize {
        self.read().len()
    }

    /// Current subscriptions in dispatch order.
    pub fn listeners(&self) -> Vec<SubscriptionId> {
        self.read().iter().map(|e| e.id).collect()
    }

    /// Deliver an event to every current subscriber, in registration order.
    ///
    /// A subscriber that returns an error or panics is logged and skipped;
    /// the rest still receive the event. With no subscribers the event is
    /// dropped.
    pub fn dispatch(&self, event: &WebhookEvent) -> DispatchReport {
        let targets = self.snapshot();
        let mut report = DispatchReport::default();

        if targets.is_empty() {
            debug!(event = DATA_EVENT, id = %event.id, "no subscribers, event dropped");
            return report;
        }

        for (id, subscriber) in targets {
            match catch_unwind(AssertUnwindSafe(|| subscriber.on_event(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    warn!(subscription = %id, event_id = %event.id, error = %e, "subscriber failed");
                    report.failed += 1;
                }
                Err(_) => {
                    error!(subscription = %id, event_id = %event.id, "subscriber panicked");
                    report.failed += 1;
                }
            }
        }

        debug!(
            event = DATA_EVENT,
            id = %event.id,
            delivered = report.delivered,
            failed = report.failed,
            "event dispatched"
        );
        report
    }

    fn insert(&self, subscriber: Arc<dyn Subscriber>, once: bool) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write().push(Entry { id, once, subscriber });
        debug!(subscription = %id, once, "subscriber added");
        id
    }

    /// Copy the targets out so no lock is held while subscribers run; they
    /// are free to subscribe or unsubscribe from inside the callback.
    ///
    /// Once-entries are claimed under the write lock so that concurrent
    /// dispatches deliver each of them exactly once. Only entries this
    /// snapshot saw can be claimed; one registered in between waits for the
    /// next dispatch.
    fn snapshot(&self) -> Vec<(SubscriptionId, Arc<dyn Subscriber>)> {
        let targets: Vec<_> = self
            .read()
            .iter()
            .map(|e| (e.id, e.once, Arc::clone(&e.subscriber)))
            .collect();

        let seen_once: HashSet<SubscriptionId> = targets
            .iter()
            .filter(|(_, once, _)| *once)
            .map(|(id, _, _)| *id)
            .collect();
        if seen_once.is_empty() {
            return targets.into_iter().map(|(id, _, s)| (id, s)).collect();
        }

        let claimed: HashSet<SubscriptionId> = {
            let mut entries = self.write();
            let claimed = entries
                .iter()
                .filter(|e| e.once && seen_once.contains(&e.id))
                .map(|e| e.id)
                .collect::<HashSet<_>>();
            entries.retain(|e| !claimed.contains(&e.id));
            claimed
        };

        targets
            .into_iter()
            .filter(|(id, once, _)| !once || claimed.contains(id))
            .map(|(id, _, s)| (id, s))
            .collect()
    }

    // Subscribers run outside the lock, so poisoning can only come from a
    // panic inside our own short critical sections; the Vec is still valid.
    fn read(&self) -> RwLockReadGuard<'_, Vec<Entry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Entry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("listeners", &self.listeners())
            .finish()
    }
}
