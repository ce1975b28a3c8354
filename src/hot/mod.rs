//! Hot containers: in-memory mirrors served to readers.
//!
//! Two containers are provided:
//! - [`Catalog`]: items kept sorted by id, no duplicates
//! - [`ConfigManager`]: versioned configs with at most one active version
//!
//! Values are cloned whenever they cross a container boundary, in or out,
//! so callers never share memory with the container.
//!
//! Live stores drive either container through the [`HotStore`] capability
//! trait; the containers can also be used on their own.

mod catalog;
mod config;

pub use catalog::Catalog;
pub use config::ConfigManager;

use crate::error::Result;
use crate::live::StoreKind;
use crate::types::{Record, RecordKey};

/// Operations a live store needs from its hot container.
///
/// `load` is the strict path used for caller-provided defaults; `refresh`
/// is the upsert path used for records re-read from the cold store.
pub trait HotStore: Send + Sync + 'static {
    type Key: RecordKey;
    type Record: Record<Key = Self::Key>;

    /// Which flavour of live store this container backs.
    const KIND: StoreKind;

    /// Insert a record, failing on duplicates.
    fn load(&mut self, record: Self::Record) -> Result<()>;

    /// Insert or replace a record re-read from the cold store.
    fn refresh(&mut self, record: Self::Record) -> Result<()>;

    /// Drop a record locally. Absent keys are a no-op.
    fn evict(&mut self, key: Self::Key) -> Result<()>;

    /// Make `key` the active record. Only meaningful for configs.
    fn activate(&mut self, key: Self::Key) -> Result<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
