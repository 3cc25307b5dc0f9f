//! Subscriber registry and fan-out.
//!
//! The broadcaster owns the subscriber set exclusively. Each subscriber has
//! its own unbounded queue; the lock guarding the set is never held across
//! an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use panel_core::{new_subscriber_id, SubscriberId, Timestamp};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::event::DashboardEvent;

#[derive(Debug)]
struct Subscriber {
    id: SubscriberId,
    tx: mpsc::UnboundedSender<DashboardEvent>,
    connected_at: Timestamp,
}

#[derive(Debug, Default)]
struct Registry {
    /// Ordered by connection time, oldest first.
    subscribers: Vec<Subscriber>,
    latest_update: Option<DashboardEvent>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

fn remove(registry: &Mutex<Registry>, id: SubscriberId) -> bool {
    let mut guard = lock(registry);
    let before = guard.subscribers.len();
    guard.subscribers.retain(|s| s.id != id);
    guard.subscribers.len() != before
}

/// Deliver `event` to every subscriber held by `registry`, dropping closed
/// queues. The guard is released before logging.
fn fan_out(mut registry: MutexGuard<'_, Registry>, event: DashboardEvent) -> usize {
    let event_type = event.event_type();
    let before = registry.subscribers.len();
    registry.subscribers.retain(|s| match s.tx.send(event.clone()) {
        Ok(()) => true,
        Err(_) => {
            debug!(subscriber_id = %s.id, "Dropping disconnected subscriber");
            false
        }
    });
    let delivered = registry.subscribers.len();
    drop(registry);

    if delivered < before {
        warn!(
            event_type = event_type,
            dropped = before - delivered,
            "Removed subscribers during publish"
        );
    }
    debug!(event_type = event_type, receivers = delivered, "Broadcast event");
    delivered
}

/// Public view of a connected subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriberInfo {
    pub id: SubscriberId,
    pub connected_at: Timestamp,
}

/// Fan-out of [`DashboardEvent`]s to every connected subscriber.
///
/// Cloning is cheap and every clone shares the same subscriber set.
#[derive(Debug, Clone, Default)]
pub struct Broadcaster {
    registry: Arc<Mutex<Registry>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    ///
    /// If a manual update has been recorded, it is queued before any live
    /// message so the subscriber sees it first.
    pub fn subscribe(&self) -> SubscriberHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = new_subscriber_id();

        let mut registry = lock(&self.registry);
        if let Some(latest) = &registry.latest_update {
            // The receiver is alive, so this cannot fail.
            let _ = tx.send(latest.clone());
        }
        registry.subscribers.push(Subscriber {
            id,
            tx,
            connected_at: Utc::now(),
        });
        let count = registry.subscribers.len();
        drop(registry);

        info!(subscriber_id = %id, subscribers = count, "Subscriber connected");
        SubscriberHandle {
            id,
            rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Enqueue `event` on every subscriber. Returns the number of
    /// subscribers it was delivered to.
    ///
    /// Subscribers whose queue is closed are removed; delivery to the rest
    /// continues.
    pub fn publish(&self, event: DashboardEvent) -> usize {
        let registry = lock(&self.registry);
        fan_out(registry, event)
    }

    /// Record `event` as the latest manual update, then publish it.
    ///
    /// Both happen under one lock, so a concurrent `subscribe` gets the
    /// event either as its replay or as a live message, never both.
    pub fn publish_latest(&self, event: DashboardEvent) -> usize {
        let mut registry = lock(&self.registry);
        registry.latest_update = Some(event.clone());
        fan_out(registry, event)
    }

    pub fn latest_update(&self) -> Option<DashboardEvent> {
        lock(&self.registry).latest_update.clone()
    }

    /// Remove a subscriber. Removing an unknown id is a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = remove(&self.registry, id);
        if removed {
            info!(subscriber_id = %id, "Subscriber disconnected");
        }
        removed
    }

    /// Drop the oldest subscribers until at most `max` remain. Their
    /// streams end once their queues drain. Returns the number evicted.
    pub fn evict_oldest(&self, max: usize) -> usize {
        let mut registry = lock(&self.registry);
        let excess = registry.subscribers.len().saturating_sub(max);
        if excess == 0 {
            return 0;
        }
        registry.subscribers.drain(..excess);
        drop(registry);

        warn!(evicted = excess, max_clients = max, "Evicted oldest subscribers");
        excess
    }

    pub fn len(&self) -> usize {
        lock(&self.registry).subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Connected subscribers, oldest first.
    pub fn subscribers(&self) -> Vec<SubscriberInfo> {
        lock(&self.registry)
            .subscribers
            .iter()
            .map(|s| SubscriberInfo {
                id: s.id,
                connected_at: s.connected_at,
            })
            .collect()
    }
}

/// Receiving end of one subscriber's queue.
///
/// Dropping the handle unsubscribes it.
#[derive(Debug)]
pub struct SubscriberHandle {
    id: SubscriberId,
    rx: mpsc::UnboundedReceiver<DashboardEvent>,
    registry: Weak<Mutex<Registry>>,
}

impl SubscriberHandle {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait up to `wait` for the next event.
    ///
    /// Returns a heartbeat if nothing arrives in time, and `None` once the
    /// subscriber has been evicted and its queue is drained.
    pub async fn next_event(&mut self, wait: Duration) -> Option<DashboardEvent> {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(event) => event,
            Err(_) => Some(DashboardEvent::heartbeat()),
        }
    }

    /// Take a queued event without waiting.
    pub fn try_next(&mut self) -> Option<DashboardEvent> {
        self.rx.try_recv().ok()
    }

    /// Stop accepting events. The next publish removes this subscriber.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if remove(&registry, self.id) {
                debug!(subscriber_id = %self.id, "Subscriber handle dropped");
            }
        }
    }
}
