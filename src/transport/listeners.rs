//! Listener registry for broadcasting channel events.

use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::events::{ChannelEvent, DropReason, ListenerConfig, ListenerHandle, ListenerId};

/// Internal listener state.
struct Listener {
    config: ListenerConfig,
    sender: Sender<ChannelEvent>,
}

impl Listener {
    /// Try to send an event. Returns false if the buffer is full or the
    /// receiver is gone (listener will be dropped).
    fn try_send(&self, event: ChannelEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(crossbeam_channel::TrySendError::Full(_)) => false,
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => false,
        }
    }

    fn matches(&self, event: &ChannelEvent) -> bool {
        match event.kind() {
            Some(kind) => self.config.filter.matches(kind),
            None => false,
        }
    }
}

/// Registered listeners, fanned out to in registration order.
pub struct ListenerRegistry {
    /// Keyed by id, so iteration order is registration order.
    listeners: RwLock<BTreeMap<ListenerId, Listener>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener and return its receiving handle.
    pub fn listen(&self, config: ListenerConfig) -> ListenerHandle {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        self.listeners.write().insert(id, Listener { config, sender });

        ListenerHandle { id, receiver }
    }

    /// Deregister a listener. Returns false if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let removed = self.listeners.write().remove(&id);
        match removed {
            Some(listener) => {
                // Best effort; the receiver may already be gone
                let _ = listener.sender.try_send(ChannelEvent::Dropped {
                    reason: DropReason::Removed,
                });
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver `event` to every matching listener.
    ///
    /// One-shot listeners are removed after delivery; listeners that cannot
    /// accept the event are removed and told why.
    pub fn emit(&self, event: ChannelEvent) {
        let mut overflowed = Vec::new();
        let mut fired = Vec::new();

        {
            let listeners = self.listeners.read();
            for (id, listener) in listeners.iter() {
                if !listener.matches(&event) {
                    continue;
                }
                if !listener.try_send(event.clone()) {
                    overflowed.push(*id);
                } else if listener.config.once {
                    fired.push(*id);
                }
            }
        }

        if overflowed.is_empty() && fired.is_empty() {
            return;
        }

        let mut listeners = self.listeners.write();
        for id in overflowed {
            if let Some(listener) = listeners.remove(&id) {
                let _ = listener.sender.try_send(ChannelEvent::Dropped {
                    reason: DropReason::BufferOverflow,
                });
            }
        }
        for id in fired {
            if let Some(listener) = listeners.remove(&id) {
                let _ = listener.sender.try_send(ChannelEvent::Dropped {
                    reason: DropReason::Fired,
                });
            }
        }
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
