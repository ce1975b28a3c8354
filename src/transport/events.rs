//! Notification types emitted by channel handlers.

use serde::{Deserialize, Serialize};

/// Lifecycle notifications from a [`ChannelHandler`](super::ChannelHandler).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    Subscribed {
        channel: String,
    },
    Unsubscribed {
        channel: String,
    },
    Published {
        channel: String,
        message: String,
    },
    /// The listener itself was dropped; always the last event it sees.
    Dropped {
        reason: DropReason,
    },
}

impl ChannelEvent {
    /// Kind used for listener filtering. `Dropped` has none and is only
    /// ever sent directly to the listener concerned.
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            ChannelEvent::Connected => Some(EventKind::Connected),
            ChannelEvent::Disconnected => Some(EventKind::Disconnected),
            ChannelEvent::Subscribed { .. } => Some(EventKind::Subscribed),
            ChannelEvent::Unsubscribed { .. } => Some(EventKind::Unsubscribed),
            ChannelEvent::Published { .. } => Some(EventKind::Published),
            ChannelEvent::Dropped { .. } => None,
        }
    }
}

/// Event kinds a listener can register for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Connected,
    Disconnected,
    Subscribed,
    Unsubscribed,
    Published,
}

/// Why a listener was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly removed.
    Removed,
    /// One-shot listener already fired.
    Fired,
}

/// Filter criteria for listeners.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// Kinds to deliver (None = all kinds).
    pub kinds: Option<Vec<EventKind>>,
}

impl EventFilter {
    /// Every event kind.
    pub fn all() -> Self {
        Self::default()
    }

    /// A single event kind.
    pub fn only(kind: EventKind) -> Self {
        Self {
            kinds: Some(vec![kind]),
        }
    }

    pub fn kinds(kinds: Vec<EventKind>) -> Self {
        Self { kinds: Some(kinds) }
    }

    pub fn matches(&self, kind: EventKind) -> bool {
        match self.kinds {
            Some(ref kinds) => kinds.contains(&kind),
            None => true,
        }
    }
}

/// Configuration for a listener.
#[derive(Clone, Debug)]
pub struct ListenerConfig {
    /// Max buffered events before dropping the listener.
    /// Default: 256
    pub buffer_size: usize,

    /// Remove the listener after its first delivery.
    pub once: bool,

    pub filter: EventFilter,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            buffer_size: 256,
            once: false,
            filter: EventFilter::default(),
        }
    }
}

impl ListenerConfig {
    /// Listen for every occurrence of `kind`.
    pub fn on(kind: EventKind) -> Self {
        Self {
            filter: EventFilter::only(kind),
            ..Default::default()
        }
    }

    /// Listen for the next occurrence of `kind` only.
    pub fn once(kind: EventKind) -> Self {
        Self {
            filter: EventFilter::only(kind),
            once: true,
            ..Default::default()
        }
    }
}

/// Unique identifier for a listener. Ids grow with registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

/// Receiving end of a listener.
pub struct ListenerHandle {
    pub id: ListenerId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<ChannelEvent>,
}

impl ListenerHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<ChannelEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<ChannelEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<ChannelEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered, without blocking.
    pub fn drain(&self) -> Vec<ChannelEvent> {
        self.receiver.try_iter().collect()
    }
}
