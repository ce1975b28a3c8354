//! Connection/subscription state machine shared by concrete transports.

use crate::error::{CoherenceError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use tracing::debug;

use super::events::{ChannelEvent, ListenerConfig, ListenerHandle, ListenerId};
use super::listeners::ListenerRegistry;
use super::{MessageStream, Transport};

/// Connection state, ordered so that "connected" means `>= Connected`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChannelState {
    Disconnected = 0,
    Connected = 1,
    Subscribed = 2,
}

/// Which operations a handler may perform. Fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelMode {
    /// Subscribe only.
    Sub,
    /// Publish only.
    Pub,
    /// Both.
    Dual,
}

impl ChannelMode {
    pub fn can_subscribe(self) -> bool {
        matches!(self, ChannelMode::Sub | ChannelMode::Dual)
    }

    pub fn can_publish(self) -> bool {
        matches!(self, ChannelMode::Pub | ChannelMode::Dual)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelMode::Sub => "SUB",
            ChannelMode::Pub => "PUB",
            ChannelMode::Dual => "DUAL",
        }
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primitives a concrete message-bus binding supplies.
///
/// The handler guarantees these are only called in a legal state and mode.
#[async_trait]
pub trait ChannelBackend: Send + Sync {
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// Start receiving messages published on `channel`.
    async fn subscribe(&self, channel: &str) -> Result<MessageStream>;

    async fn unsubscribe(&self, channel: &str) -> Result<()>;

    async fn publish(&self, channel: &str, message: &str) -> Result<()>;
}

/// A pub/sub endpoint gated by connection state and mode.
///
/// Every operation checks the gate, delegates to the backend primitive and
/// only then advances state and notifies listeners. A failing primitive
/// leaves the state untouched.
pub struct ChannelHandler<B> {
    backend: B,
    mode: ChannelMode,
    state: Mutex<ChannelState>,
    listeners: ListenerRegistry,
}

impl<B: ChannelBackend> ChannelHandler<B> {
    pub fn new(backend: B, mode: ChannelMode) -> Self {
        Self {
            backend,
            mode,
            state: Mutex::new(ChannelState::Disconnected),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    pub fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.state() >= ChannelState::Connected
    }

    pub fn is_subscribed(&self) -> bool {
        self.state() == ChannelState::Subscribed
    }

    fn set_state(&self, state: ChannelState) {
        *self.state.lock() = state;
    }

    fn connection_check(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(CoherenceError::NotConnected);
        }
        Ok(())
    }

    fn sub_mode_check(&self) -> Result<()> {
        if !self.mode.can_subscribe() {
            return Err(CoherenceError::ModeViolation {
                mode: self.mode.as_str(),
                operation: "subscribe",
            });
        }
        Ok(())
    }

    fn pub_mode_check(&self) -> Result<()> {
        if !self.mode.can_publish() {
            return Err(CoherenceError::ModeViolation {
                mode: self.mode.as_str(),
                operation: "publish",
            });
        }
        Ok(())
    }

    /// Connect. A no-op when already connected.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.backend.connect().await?;
        self.set_state(ChannelState::Connected);
        debug!(mode = %self.mode, "Channel connected");
        self.listeners.emit(ChannelEvent::Connected);
        Ok(())
    }

    /// Disconnect. A no-op when already disconnected.
    pub async fn disconnect(&self) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }
        self.backend.disconnect().await?;
        self.set_state(ChannelState::Disconnected);
        debug!(mode = %self.mode, "Channel disconnected");
        self.listeners.emit(ChannelEvent::Disconnected);
        Ok(())
    }

    pub async fn subscribe(&self, channel: &str) -> Result<MessageStream> {
        self.connection_check()?;
        self.sub_mode_check()?;
        let stream = self.backend.subscribe(channel).await?;
        self.set_state(ChannelState::Subscribed);
        debug!(channel, "Subscribed");
        self.listeners.emit(ChannelEvent::Subscribed {
            channel: channel.to_string(),
        });
        Ok(stream)
    }

    /// Unsubscribe from `channel`.
    ///
    /// State drops back to `Disconnected`, matching the primitive contract:
    /// callers reconnect before subscribing again.
    pub async fn unsubscribe(&self, channel: &str) -> Result<()> {
        self.connection_check()?;
        self.sub_mode_check()?;
        self.backend.unsubscribe(channel).await?;
        self.set_state(ChannelState::Disconnected);
        debug!(channel, "Unsubscribed");
        self.listeners.emit(ChannelEvent::Unsubscribed {
            channel: channel.to_string(),
        });
        Ok(())
    }

    pub async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        self.connection_check()?;
        self.pub_mode_check()?;
        self.backend.publish(channel, message).await?;
        self.listeners.emit(ChannelEvent::Published {
            channel: channel.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }

    // --- Listeners ---

    /// Register a listener for handler events.
    pub fn listen(&self, config: ListenerConfig) -> ListenerHandle {
        self.listeners.listen(config)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.listener_count()
    }
}

#[async_trait]
impl<B: ChannelBackend> Transport for ChannelHandler<B> {
    async fn subscribe(&self, channel: &str) -> Result<MessageStream> {
        ChannelHandler::subscribe(self, channel).await
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        ChannelHandler::publish(self, channel, message).await
    }
}
