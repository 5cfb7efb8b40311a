//! Downstream subscriber registry
//!
//! Every connected client is held as an `Arc<dyn Subscriber>` keyed by a
//! process-unique [`SubscriberId`]. Registration hands back a
//! [`SubscriptionGuard`]; dropping it removes the subscriber whatever the
//! upstream connection is doing.
//!
//! Broadcasts copy the current set out of the map first and send to that
//! snapshot, so registrations and removals that race a broadcast never see a
//! torn map and never block behind a slow client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use dashmap::DashMap;
use relay_types::ids::SubscriberId;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One upstream frame, serialized once and shared by every recipient.
///
/// Always valid UTF-8. Cloning bumps a refcount; the bytes are never copied.
pub type Payload = Bytes;

// ---------------------------------------------------------------------------
// Subscriber
// ---------------------------------------------------------------------------

/// Why a send to one subscriber failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("subscriber queue is full")]
    Full,
    #[error("subscriber is closed")]
    Closed,
}

/// A downstream connection able to receive relayed payloads.
pub trait Subscriber: Send + Sync {
    /// Whether the connection can still accept messages.
    fn is_open(&self) -> bool;

    /// Queue `payload` without blocking.
    fn send(&self, payload: &Payload) -> Result<(), SendError>;
}

/// Subscriber backed by a bounded channel drained by the client's socket task.
#[derive(Debug, Clone)]
pub struct ChannelSubscriber {
    tx: mpsc::Sender<Payload>,
}

impl ChannelSubscriber {
    pub fn new(tx: mpsc::Sender<Payload>) -> Self {
        Self { tx }
    }

    /// Subscriber plus the receiving half its writer should drain.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

impl Subscriber for ChannelSubscriber {
    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, payload: &Payload) -> Result<(), SendError> {
        self.tx.try_send(payload.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Subscribers that were already closed.
    pub skipped: usize,
    /// Subscribers whose send failed.
    pub failed: usize,
}

#[derive(Default)]
struct RegistryInner {
    subscribers: DashMap<SubscriberId, Arc<dyn Subscriber>>,
    next_id: AtomicU64,
}

/// Concurrent set of live subscribers. Cloning shares the same set.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. It stays registered until the guard is dropped.
    pub fn register(&self, subscriber: Arc<dyn Subscriber>) -> SubscriptionGuard {
        let id = SubscriberId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.inner.subscribers.insert(id, subscriber);
        debug!(subscriber = %id, total = self.len(), "Subscriber registered");
        SubscriptionGuard {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a subscriber by id. Returns whether it was present.
    pub fn remove(&self, id: SubscriberId) -> bool {
        self.inner.subscribers.remove(&id).is_some()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.inner.subscribers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.subscribers.is_empty()
    }

    /// Send `payload` to every open subscriber in a snapshot of the set.
    ///
    /// A failing subscriber is logged and skipped; the rest still receive
    /// the payload.
    pub fn broadcast(&self, payload: &Payload) -> BroadcastReport {
        let snapshot: Vec<(SubscriberId, Arc<dyn Subscriber>)> = self
            .inner
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        let mut report = BroadcastReport::default();
        for (id, subscriber) in snapshot {
            if !subscriber.is_open() {
                report.skipped += 1;
                continue;
            }
            match subscriber.send(payload) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(subscriber = %id, error = %e, "Failed to relay payload to subscriber");
                }
            }
        }
        report
    }
}

/// Removes its subscriber from the registry when dropped.
#[must_use = "dropping the guard unregisters the subscriber"]
pub struct SubscriptionGuard {
    id: SubscriberId,
    registry: Weak<RegistryInner>,
}

impl SubscriptionGuard {
    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            if inner.subscribers.remove(&self.id).is_some() {
                debug!(subscriber = %self.id, "Subscriber removed");
            }
        }
    }
}

impl std::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionGuard").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicBool;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<Payload>>,
        closed: AtomicBool,
        failing: AtomicBool,
    }

    impl Subscriber for Recording {
        fn is_open(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }

        fn send(&self, payload: &Payload) -> Result<(), SendError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(SendError::Full);
            }
            self.sent.lock().push(payload.clone());
            Ok(())
        }
    }

    fn payload(s: &str) -> Payload {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn test_broadcast_reaches_every_subscriber() {
        let registry = SubscriberRegistry::new();
        let subs: Vec<Arc<Recording>> = (0..3).map(|_| Arc::new(Recording::default())).collect();
        let _guards: Vec<_> = subs
            .iter()
            .map(|s| registry.register(s.clone() as Arc<dyn Subscriber>))
            .collect();

        let report = registry.broadcast(&payload(r#"{"event_type":"book"}"#));
        assert_eq!(report.delivered, 3);

        for sub in &subs {
            let sent = sub.sent.lock();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0], r#"{"event_type":"book"}"#);
        }
    }

    #[test]
    fn test_dropping_guard_unregisters() {
        let registry = SubscriberRegistry::new();
        let subs: Vec<Arc<Recording>> = (0..3).map(|_| Arc::new(Recording::default())).collect();
        let mut guards: Vec<_> = subs
            .iter()
            .map(|s| registry.register(s.clone() as Arc<dyn Subscriber>))
            .collect();

        let dropped = guards.remove(1);
        let dropped_id = dropped.id();
        drop(dropped);
        assert!(!registry.contains(dropped_id));
        assert_eq!(registry.len(), 2);

        let report = registry.broadcast(&payload("{}"));
        assert_eq!(report.delivered, 2);
        assert!(subs[1].sent.lock().is_empty());
    }

    #[test]
    fn test_closed_subscriber_skipped() {
        let registry = SubscriberRegistry::new();
        let open = Arc::new(Recording::default());
        let closed = Arc::new(Recording::default());
        closed.closed.store(true, Ordering::SeqCst);
        let _a = registry.register(open.clone());
        let _b = registry.register(closed.clone());

        let report = registry.broadcast(&payload("[]"));
        assert_eq!(
            report,
            BroadcastReport {
                delivered: 1,
                skipped: 1,
                failed: 0
            }
        );
        assert!(closed.sent.lock().is_empty());
    }

    #[test]
    fn test_failing_subscriber_does_not_abort_broadcast() {
        let registry = SubscriberRegistry::new();
        let subs: Vec<Arc<Recording>> = (0..4).map(|_| Arc::new(Recording::default())).collect();
        subs[0].failing.store(true, Ordering::SeqCst);
        let _guards: Vec<_> = subs
            .iter()
            .map(|s| registry.register(s.clone() as Arc<dyn Subscriber>))
            .collect();

        let report = registry.broadcast(&payload("{}"));
        assert_eq!(report.delivered, 3);
        assert_eq!(report.failed, 1);
        for sub in &subs[1..] {
            assert_eq!(sub.sent.lock().len(), 1);
        }
    }

    #[test]
    fn test_broadcast_shares_one_buffer() {
        let registry = SubscriberRegistry::new();
        let subs: Vec<Arc<Recording>> = (0..3).map(|_| Arc::new(Recording::default())).collect();
        let _guards: Vec<_> = subs
            .iter()
            .map(|s| registry.register(s.clone() as Arc<dyn Subscriber>))
            .collect();

        let frame = payload(r#"{"event_type":"price_change"}"#);
        registry.broadcast(&frame);

        for sub in &subs {
            assert_eq!(sub.sent.lock()[0].as_ptr(), frame.as_ptr());
        }
    }

    #[test]
    fn test_empty_registry_broadcast() {
        let registry = SubscriberRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.broadcast(&payload("{}")), BroadcastReport::default());
    }

    #[test]
    fn test_ids_are_unique() {
        let registry = SubscriberRegistry::new();
        let a = registry.register(Arc::new(Recording::default()));
        let b = registry.register(Arc::new(Recording::default()));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_guard_outliving_registry_is_harmless() {
        let registry = SubscriberRegistry::new();
        let guard = registry.register(Arc::new(Recording::default()));
        drop(registry);
        drop(guard);
    }

    #[tokio::test]
    async fn test_channel_subscriber() {
        let (sub, mut rx) = ChannelSubscriber::channel(1);
        assert!(sub.is_open());

        sub.send(&payload("a")).unwrap();
        assert_eq!(sub.send(&payload("b")), Err(SendError::Full));
        assert_eq!(rx.recv().await.unwrap(), "a");

        drop(rx);
        assert!(!sub.is_open());
        assert_eq!(sub.send(&payload("c")), Err(SendError::Closed));
    }
}
