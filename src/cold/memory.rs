//! In-memory cold store for tests and standalone use.

use crate::cold::{ColdStore, ConfigColdStore};
use crate::error::{CoherenceError, Result};
use crate::types::{Config, ConfigStatus, Record, Version};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Cold store backed by a map. Persists nothing.
///
/// Partial updates are JSON objects merged field by field into the stored
/// record; they may not change the record's key.
pub struct MemoryColdStore<R: Record> {
    records: RwLock<BTreeMap<R::Key, R>>,
    /// When set, every operation fails as if the backend were down.
    unavailable: AtomicBool,
    /// Number of successful writes.
    writes: AtomicU64,
}

impl<R> MemoryColdStore<R>
where
    R: Record + Serialize + DeserializeOwned,
{
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            unavailable: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        }
    }

    /// Create a store pre-filled with `records`. Later keys win.
    pub fn with_records(records: impl IntoIterator<Item = R>) -> Self {
        let store = Self::new();
        {
            let mut map = store.records.write();
            for record in records {
                map.insert(record.key(), record);
            }
        }
        store
    }

    /// Simulate an outage (or recovery) of the backend.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Synchronous peek for assertions.
    pub fn snapshot(&self, key: R::Key) -> Option<R> {
        self.records.read().get(&key).cloned()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoherenceError::ColdStore("backend unavailable".to_string()));
        }
        Ok(())
    }

    fn committed(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn patch(record: &R, values: &Map<String, Value>) -> Result<R> {
        let mut value = serde_json::to_value(record)?;
        let object = value.as_object_mut().ok_or_else(|| {
            CoherenceError::Serialization("record does not serialize to an object".to_string())
        })?;
        for (field, field_value) in values {
            object.insert(field.clone(), field_value.clone());
        }

        let patched: R = serde_json::from_value(value)?;
        if patched.key() != record.key() {
            return Err(CoherenceError::ColdStore(format!(
                "update cannot change key {}",
                record.key()
            )));
        }
        Ok(patched)
    }

    fn apply_patch(
        &self,
        key: R::Key,
        values: &Map<String, Value>,
        check: impl FnOnce(&R, &R) -> Result<()>,
    ) -> Result<()> {
        let mut records = self.records.write();
        // Missing keys are a silent no-op, like an update matching nothing.
        if let Some(existing) = records.get(&key) {
            let patched = Self::patch(existing, values)?;
            check(existing, &patched)?;
            records.insert(key, patched);
            self.committed();
        }
        Ok(())
    }
}

impl<R> Default for MemoryColdStore<R>
where
    R: Record + Serialize + DeserializeOwned,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R> ColdStore<R> for MemoryColdStore<R>
where
    R: Record + Serialize + DeserializeOwned,
{
    type Query = Map<String, Value>;

    async fn find(&self, key: R::Key) -> Result<Option<R>> {
        self.check_available()?;
        Ok(self.records.read().get(&key).cloned())
    }

    async fn find_all(&self) -> Result<Vec<R>> {
        self.check_available()?;
        Ok(self.records.read().values().cloned().collect())
    }

    async fn remove(&self, key: R::Key) -> Result<()> {
        self.check_available()?;
        if self.records.write().remove(&key).is_some() {
            self.committed();
        }
        Ok(())
    }

    async fn insert(&self, record: &R) -> Result<()> {
        self.check_available()?;
        let mut records = self.records.write();
        let key = record.key();
        if records.contains_key(&key) {
            return Err(CoherenceError::ColdStore(format!("duplicate key {}", key)));
        }
        records.insert(key, record.clone());
        self.committed();
        Ok(())
    }

    async fn update(&self, key: R::Key, query: &Map<String, Value>) -> Result<()> {
        self.check_available()?;
        self.apply_patch(key, query, |_, _| Ok(()))
    }
}

#[async_trait]
impl<C> ConfigColdStore<C> for MemoryColdStore<C>
where
    C: Config + Serialize + DeserializeOwned,
{
    async fn update_field(&self, version: Version, field: &str, value: Value) -> Result<()> {
        self.check_available()?;
        let mut values = Map::new();
        values.insert(field.to_string(), value);
        self.apply_patch(version, &values, status_unchanged)
    }

    async fn update_fields(&self, version: Version, values: &Map<String, Value>) -> Result<()> {
        self.check_available()?;
        self.apply_patch(version, values, status_unchanged)
    }

    async fn flip_status(&self, activate: Version, deactivate: Option<Version>) -> Result<()> {
        self.check_available()?;
        let mut records = self.records.write();
        if !records.contains_key(&activate) {
            return Err(CoherenceError::ColdStore(format!(
                "no config for version {}",
                activate
            )));
        }

        if let Some(previous) = deactivate {
            if let Some(config) = records.get_mut(&previous) {
                config.set_status(ConfigStatus::Inactive);
            }
        }
        if let Some(config) = records.get_mut(&activate) {
            config.set_status(ConfigStatus::Active);
        }
        self.committed();
        Ok(())
    }
}

/// Field writes never change status; only `flip_status` does.
fn status_unchanged<C: Config>(existing: &C, patched: &C) -> Result<()> {
    if patched.status() != existing.status() {
        return Err(CoherenceError::StatusWrite(existing.version()));
    }
    Ok(())
}
