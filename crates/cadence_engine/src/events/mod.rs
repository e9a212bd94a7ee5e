//! Engine lifecycle signals
//!
//! A [`Signal`] is a synchronous multicast callback list. Subscribers are
//! notified in subscription order and keep their slot until unsubscribed.

use slotmap::{new_key_type, SlotMap};
use std::fmt;

new_key_type! {
    /// Handle returned by [`Signal::subscribe`]
    pub struct SubscriptionId;
}

/// Multicast callback list carrying a `Copy` payload
pub struct Signal<T: Copy> {
    subscribers: SlotMap<SubscriptionId, Box<dyn FnMut(T)>>,
    order: Vec<SubscriptionId>,
}

impl<T: Copy> Signal<T> {
    /// Create a signal with no subscribers
    pub fn new() -> Self {
        Self {
            subscribers: SlotMap::with_key(),
            order: Vec::new(),
        }
    }

    /// Register a subscriber
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(T) + 'static,
    {
        let id = self.subscribers.insert(Box::new(handler));
        self.order.push(id);
        id
    }

    /// Remove a subscriber; returns whether it was registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.order.retain(|other| *other != id);
        self.subscribers.remove(id).is_some()
    }

    /// Number of subscribers
    pub fn count(&self) -> usize {
        self.subscribers.len()
    }

    /// Notify every subscriber
    pub fn dispatch(&mut self, payload: T) {
        for id in &self.order {
            if let Some(handler) = self.subscribers.get_mut(*id) {
                handler(payload);
            }
        }
    }
}

impl<T: Copy> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal").field("subscribers", &self.count()).finish()
    }
}
