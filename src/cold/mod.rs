//! Cold store contract: the durable source of truth behind a live store.
//!
//! Live stores only read from the cold store while bootstrapping or when an
//! action message tells them to; every mutation is written here first.
//! Backends report their own failures as `CoherenceError::ColdStore`.

mod memory;

pub use memory::MemoryColdStore;

use crate::error::Result;
use crate::types::{Config, Record, Version};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Durable storage for one record kind.
#[async_trait]
pub trait ColdStore<R: Record>: Send + Sync {
    /// Backend-specific partial update accepted by [`update`](Self::update).
    type Query: Send + Sync;

    async fn find(&self, key: R::Key) -> Result<Option<R>>;

    async fn find_all(&self) -> Result<Vec<R>>;

    async fn remove(&self, key: R::Key) -> Result<()>;

    async fn insert(&self, record: &R) -> Result<()>;

    async fn update(&self, key: R::Key, query: &Self::Query) -> Result<()>;
}

/// Durable storage for configs, with status-aware writes.
#[async_trait]
pub trait ConfigColdStore<C: Config>: ColdStore<C> {
    async fn update_field(&self, version: Version, field: &str, value: Value) -> Result<()>;

    async fn update_fields(&self, version: Version, values: &Map<String, Value>) -> Result<()>;

    /// Mark `activate` active and `deactivate` inactive in one durable write.
    async fn flip_status(&self, activate: Version, deactivate: Option<Version>) -> Result<()>;
}
