//! Sorted, deduplicated item catalog.

use crate::error::{CoherenceError, Result};
use crate::hot::HotStore;
use crate::live::StoreKind;
use crate::types::{Item, ItemId};

/// In-memory catalog of items ordered by id.
///
/// Lookups are binary searches over a sorted vector: O(log n) to find,
/// O(n) to shift on insert or remove. Every item handed in is cloned
/// before it is stored and every item handed out is a fresh clone.
#[derive(Clone, Debug)]
pub struct Catalog<T> {
    /// Items sorted ascending by id, ids unique.
    items: Vec<T>,
}

impl<T: Item> Catalog<T> {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Create a catalog pre-seeded with `items`.
    ///
    /// Seeding goes through [`insert`](Self::insert), so a malformed or
    /// duplicate id fails the whole construction.
    pub fn with_items<'a>(items: impl IntoIterator<Item = &'a T>) -> Result<Self> {
        let mut catalog = Self::new();
        for item in items {
            catalog.insert(item)?;
        }
        Ok(catalog)
    }

    /// `Ok(index)` when present, `Err(insertion point)` when absent.
    fn position(&self, id: ItemId) -> std::result::Result<usize, usize> {
        self.items.binary_search_by_key(&id, |item| item.id())
    }

    fn insert_owned(&mut self, item: T) -> Result<()> {
        let id = item.id().validate()?;
        match self.position(id) {
            Ok(_) => Err(CoherenceError::DuplicateId(id)),
            Err(pos) => {
                self.items.insert(pos, item);
                Ok(())
            }
        }
    }

    fn upsert_owned(&mut self, item: T) -> Result<()> {
        let id = item.id().validate()?;
        match self.position(id) {
            Ok(index) => self.items[index] = item,
            Err(pos) => self.items.insert(pos, item),
        }
        Ok(())
    }

    /// Insert a copy of `item`.
    pub fn insert(&mut self, item: &T) -> Result<()> {
        self.insert_owned(item.clone())
    }

    /// Replace the stored record with a copy of `item`.
    ///
    /// This is a whole-record replace: fields absent from `item` do not
    /// survive from the previous version.
    pub fn update(&mut self, item: &T) -> Result<()> {
        let id = item.id().validate()?;
        match self.position(id) {
            Ok(index) => {
                self.items[index] = item.clone();
                Ok(())
            }
            Err(_) => Err(CoherenceError::NotFound(id)),
        }
    }

    /// Insert a copy of `item`, replacing any record with the same id.
    pub fn upsert(&mut self, item: &T) -> Result<()> {
        self.upsert_owned(item.clone())
    }

    /// Get a copy of the item with `id`, if present.
    pub fn find_by_id(&self, id: ItemId) -> Result<Option<T>> {
        let id = id.validate()?;
        Ok(self.position(id).ok().map(|index| self.items[index].clone()))
    }

    /// Check presence without cloning.
    pub fn contains(&self, id: ItemId) -> bool {
        self.position(id).is_ok()
    }

    /// Remove the item with `id`. Absent ids are a no-op.
    pub fn remove(&mut self, id: ItemId) -> Result<()> {
        let id = id.validate()?;
        if let Ok(index) = self.position(id) {
            self.items.remove(index);
        }
        Ok(())
    }

    /// Copy of every item, in id order.
    pub fn fetch_all(&self) -> Vec<T> {
        self.items.clone()
    }

    /// Borrowing iterator in id order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Item> Default for Catalog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Item> HotStore for Catalog<T> {
    type Key = ItemId;
    type Record = T;

    const KIND: StoreKind = StoreKind::Catalog;

    fn load(&mut self, record: T) -> Result<()> {
        self.insert_owned(record)
    }

    fn refresh(&mut self, record: T) -> Result<()> {
        self.upsert_owned(record)
    }

    fn evict(&mut self, key: ItemId) -> Result<()> {
        self.remove(key)
    }

    fn activate(&mut self, _key: ItemId) -> Result<()> {
        Err(CoherenceError::BadCommand("ACTIVATE".to_string()))
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
