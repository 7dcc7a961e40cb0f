//! Event bus for pub/sub messaging
//!
//! Subscribers get their own unbounded channel; publishing never blocks the
//! tick that produced the event.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;

use super::events::MusicEvent;

/// Subscriber ID for tracking subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

struct Subscriber {
    id: SubscriberId,
    sender: Sender<MusicEvent>,
}

/// Broadcasts music events to every subscriber. Clones share subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
    next_id: Arc<AtomicUsize>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events, returns a receiver and subscription ID
    pub fn subscribe(&self) -> (Receiver<MusicEvent>, SubscriberId) {
        let (sender, rx) = unbounded();
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push(Subscriber { id, sender });
        (rx, id)
    }

    /// Unsubscribe from events
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.write().retain(|s| s.id != id);
    }

    /// Publish an event to all subscribers, dropping those whose receiver is gone
    pub fn publish(&self, event: MusicEvent) {
        let mut disconnected = Vec::new();
        for subscriber in self.subscribers.read().iter() {
            if let Err(TrySendError::Disconnected(_)) = subscriber.sender.try_send(event.clone()) {
                disconnected.push(subscriber.id);
            }
        }

        if !disconnected.is_empty() {
            tracing::debug!("Dropping {} closed event subscribers", disconnected.len());
            self.subscribers
                .write()
                .retain(|s| !disconnected.contains(&s.id));
        }
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Clear all subscribers
    pub fn clear(&self) {
        self.subscribers.write().clear();
    }
}
