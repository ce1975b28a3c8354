//! Pub/sub transports carrying action messages between replicas.
//!
//! - [`Transport`]: the contract a live store consumes
//! - [`ChannelHandler`]: connection/subscription state machine with mode
//!   gating, wrapping a [`ChannelBackend`]
//! - [`MemoryBus`]: in-process broker for tests and single-process setups
//!
//! Handler notifications are delivered through listener channels:
//!
//! ```ignore
//! let handler = ChannelHandler::new(bus.endpoint(), ChannelMode::Dual);
//! let events = handler.listen(ListenerConfig::on(EventKind::Published));
//!
//! handler.connect().await?;
//! handler.publish("CATALOG:products", "UPDATE:1").await?;
//!
//! assert!(matches!(events.try_recv(), Ok(ChannelEvent::Published { .. })));
//! ```

mod events;
mod handler;
mod listeners;
mod memory;

pub use events::{
    ChannelEvent, DropReason, EventFilter, EventKind, ListenerConfig, ListenerHandle, ListenerId,
};
pub use handler::{ChannelBackend, ChannelHandler, ChannelMode, ChannelState};
pub use listeners::ListenerRegistry;
pub use memory::{MemoryBackend, MemoryBus};

use crate::error::Result;
use async_trait::async_trait;

/// Inbound messages for one subscription, in per-channel publish order.
pub type MessageStream = tokio::sync::mpsc::UnboundedReceiver<String>;

/// What a live store needs from its invalidation bus.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Subscribe to `channel` and return the stream of its messages.
    async fn subscribe(&self, channel: &str) -> Result<MessageStream>;

    async fn publish(&self, channel: &str, message: &str) -> Result<()>;
}
