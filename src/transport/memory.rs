//! In-process message bus.

use crate::error::{CoherenceError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tracing::debug;

use super::handler::{ChannelBackend, ChannelHandler, ChannelMode};
use super::MessageStream;

/// Subscriber registered on a channel.
struct Subscriber {
    endpoint: u64,
    sender: UnboundedSender<String>,
}

#[derive(Default)]
struct BusInner {
    channels: RwLock<HashMap<String, Vec<Subscriber>>>,
    next_endpoint: AtomicU64,
}

/// Broker shared by every endpoint created from it. Cheap to clone.
///
/// Publishing delivers to every current subscriber of the channel,
/// including the publishing endpoint, in publish order.
#[derive(Clone, Default)]
pub struct MemoryBus {
    inner: Arc<BusInner>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new client endpoint on this bus.
    pub fn endpoint(&self) -> MemoryBackend {
        let endpoint = self.inner.next_endpoint.fetch_add(1, Ordering::SeqCst);
        MemoryBackend {
            bus: self.clone(),
            endpoint,
            connected: AtomicBool::new(false),
            failing: AtomicBool::new(false),
        }
    }

    /// Convenience: a handler over a fresh endpoint.
    pub fn handler(&self, mode: ChannelMode) -> ChannelHandler<MemoryBackend> {
        ChannelHandler::new(self.endpoint(), mode)
    }

    /// Number of live subscriptions on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.inner
            .channels
            .read()
            .get(channel)
            .map(|subs| subs.iter().filter(|s| !s.sender.is_closed()).count())
            .unwrap_or(0)
    }

    fn add_subscriber(&self, channel: &str, endpoint: u64) -> MessageStream {
        let (sender, receiver) = unbounded_channel();
        self.inner
            .channels
            .write()
            .entry(channel.to_string())
            .or_default()
            .push(Subscriber { endpoint, sender });
        receiver
    }

    fn remove_subscriber(&self, channel: &str, endpoint: u64) {
        let mut channels = self.inner.channels.write();
        if let Some(subs) = channels.get_mut(channel) {
            subs.retain(|s| s.endpoint != endpoint);
            if subs.is_empty() {
                channels.remove(channel);
            }
        }
    }

    fn remove_endpoint(&self, endpoint: u64) {
        let mut channels = self.inner.channels.write();
        for subs in channels.values_mut() {
            subs.retain(|s| s.endpoint != endpoint);
        }
        channels.retain(|_, subs| !subs.is_empty());
    }

    /// Deliver to all subscribers, pruning ones whose stream was dropped.
    fn deliver(&self, channel: &str, message: &str) -> usize {
        let mut channels = self.inner.channels.write();
        let Some(subs) = channels.get_mut(channel) else {
            return 0;
        };
        subs.retain(|s| s.sender.send(message.to_string()).is_ok());
        subs.len()
    }
}

/// One client endpoint on a [`MemoryBus`].
pub struct MemoryBackend {
    bus: MemoryBus,
    endpoint: u64,
    connected: AtomicBool,
    /// When set, every primitive fails as if the broker were unreachable.
    failing: AtomicBool,
}

impl MemoryBackend {
    /// Simulate a broken (or restored) connection to the broker.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoherenceError::Transport(format!(
                "endpoint {} cannot reach bus",
                self.endpoint
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelBackend for MemoryBackend {
    async fn connect(&self) -> Result<()> {
        self.check()?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.check()?;
        self.bus.remove_endpoint(self.endpoint);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<MessageStream> {
        self.check()?;
        Ok(self.bus.add_subscriber(channel, self.endpoint))
    }

    async fn unsubscribe(&self, channel: &str) -> Result<()> {
        self.check()?;
        self.bus.remove_subscriber(channel, self.endpoint);
        Ok(())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        self.check()?;
        let delivered = self.bus.deliver(channel, message);
        debug!(channel, message, delivered, "Delivered on memory bus");
        Ok(())
    }
}

impl Drop for MemoryBackend {
    fn drop(&mut self) {
        self.bus.remove_endpoint(self.endpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let bus = MemoryBus::new();
        let a = bus.endpoint();
        let b = bus.endpoint();

        let mut stream_a = a.subscribe("chan").await.unwrap();
        let mut stream_b = b.subscribe("chan").await.unwrap();
        assert_eq!(bus.subscriber_count("chan"), 2);

        a.publish("chan", "one").await.unwrap();
        a.publish("chan", "two").await.unwrap();

        assert_eq!(stream_a.recv().await.unwrap(), "one");
        assert_eq!(stream_a.recv().await.unwrap(), "two");
        assert_eq!(stream_b.recv().await.unwrap(), "one");
        assert_eq!(stream_b.recv().await.unwrap(), "two");
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let bus = MemoryBus::new();
        let a = bus.endpoint();
        let mut stream = a.subscribe("one").await.unwrap();

        a.publish("two", "hello").await.unwrap();
        assert!(stream.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_and_drop() {
        let bus = MemoryBus::new();
        let a = bus.endpoint();
        let b = bus.endpoint();

        let _sa = a.subscribe("chan").await.unwrap();
        let sb = b.subscribe("chan").await.unwrap();

        a.unsubscribe("chan").await.unwrap();
        assert_eq!(bus.subscriber_count("chan"), 1);

        drop(sb);
        assert_eq!(bus.subscriber_count("chan"), 0);

        drop(b);
        a.publish("chan", "x").await.unwrap();
    }

    #[tokio::test]
    async fn test_failing_endpoint() {
        let bus = MemoryBus::new();
        let a = bus.endpoint();
        a.set_failing(true);
        assert!(matches!(
            a.publish("chan", "x").await,
            Err(CoherenceError::Transport(_))
        ));
        a.set_failing(false);
        a.connect().await.unwrap();
        assert!(a.is_connected());
    }
}
