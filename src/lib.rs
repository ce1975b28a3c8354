//! # Live Cache
//!
//! Hot in-process mirrors of cold-store data, kept coherent across
//! replicas by broadcasting small action messages over a pub/sub channel.
//!
//! ## Core Concepts
//!
//! - **Hot containers**: a sorted item [`Catalog`] and a versioned
//!   [`ConfigManager`] with at most one active config
//! - **Cold stores**: the durable source of truth, behind [`ColdStore`]
//! - **Transports**: a [`ChannelHandler`] state machine over a pub/sub
//!   backend such as the in-process [`MemoryBus`]
//! - **Live stores**: write to the cold store, broadcast `COMMAND:id`, and
//!   let every replica re-read what changed
//!
//! ## Example
//!
//! ```ignore
//! use livecache::{
//!     ChannelMode, ConfigDocument, ConfigManager, ConfigStatus, LiveConfig,
//!     LiveStoreConfig, MemoryBus, MemoryColdStore, Version,
//! };
//!
//! let bus = MemoryBus::new();
//! let transport = Arc::new(bus.handler(ChannelMode::Dual));
//! transport.connect().await?;
//!
//! let cold = Arc::new(MemoryColdStore::with_records(vec![
//!     ConfigDocument::new(1, ConfigStatus::Active),
//!     ConfigDocument::new(2, ConfigStatus::Inactive),
//! ]));
//!
//! let limits = Arc::new(
//!     LiveConfig::new(LiveStoreConfig::named("limits"), ConfigManager::new())?
//!         .with_cold_store(cold)
//!         .with_transport(transport),
//! );
//! limits.init().await?;
//! tokio::spawn(Arc::clone(&limits).run());
//!
//! limits.activate(Version(2)).await?;
//! ```

pub mod cold;
pub mod error;
pub mod hot;
pub mod live;
pub mod transport;
pub mod types;

// Re-exports
pub use cold::{ColdStore, ConfigColdStore, MemoryColdStore};
pub use error::{CoherenceError, Result};
pub use hot::{Catalog, ConfigManager, HotStore};
pub use live::{
    ActionMessage, Command, Defaults, LiveCatalog, LiveConfig, LiveStore, LiveStoreConfig,
    StoreKind,
};
pub use transport::{
    ChannelBackend, ChannelEvent, ChannelHandler, ChannelMode, ChannelState, DropReason,
    EventFilter, EventKind, ListenerConfig, ListenerHandle, ListenerId, ListenerRegistry,
    MemoryBackend, MemoryBus, MessageStream, Transport,
};
pub use types::*;
