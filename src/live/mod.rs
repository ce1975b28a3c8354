//! Live stores: hot containers kept coherent with a cold store.
//!
//! A live store binds one hot container, one cold store and one transport
//! channel named `KIND:name`. Mutations are written to the cold store first
//! and then announced with an action message; every replica (the writer
//! included) applies that message to its own hot container.
//!
//! # Example
//!
//! ```ignore
//! let bus = MemoryBus::new();
//! let transport = Arc::new(bus.handler(ChannelMode::Dual));
//! transport.connect().await?;
//!
//! let products = LiveCatalog::new(LiveStoreConfig::named("products"), Catalog::new())?
//!     .with_cold_store(Arc::new(MemoryColdStore::new()))
//!     .with_transport(transport);
//! products.init().await?;
//!
//! products.create_new(&Document::new(1)).await?;
//! products.drain().await?;
//! assert!(products.find_by_id(ItemId(1))?.is_some());
//! ```

mod catalog;
mod config;
mod message;
mod store;

pub use catalog::LiveCatalog;
pub use config::LiveConfig;
pub use message::{ActionMessage, Command, StoreKind};
pub use store::{Defaults, LiveStore, LiveStoreConfig};
