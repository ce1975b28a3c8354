//! Catalog-flavoured live store.

use crate::cold::ColdStore;
use crate::error::Result;
use crate::hot::Catalog;
use crate::types::{Item, ItemId};

use super::message::{ActionMessage, Command};
use super::store::LiveStore;

/// Live store over a [`Catalog`]; channel prefix `CATALOG`.
pub type LiveCatalog<T, S> = LiveStore<Catalog<T>, S>;

impl<T, S> LiveStore<Catalog<T>, S>
where
    T: Item,
    S: ColdStore<T> + ?Sized,
{
    // --- Reads (hot container only) ---

    pub fn find_by_id(&self, id: ItemId) -> Result<Option<T>> {
        self.hot.read().find_by_id(id)
    }

    pub fn fetch_all(&self) -> Vec<T> {
        self.hot.read().fetch_all()
    }

    pub fn size(&self) -> usize {
        self.hot.read().len()
    }

    // --- Mutators (cold store first, then broadcast) ---

    /// Insert `item` into the cold store and announce it.
    pub async fn create_new(&self, item: &T) -> Result<()> {
        let ready = self.ready()?;
        let id = item.id().validate()?;
        ready.cold.insert(item).await?;
        self.broadcast(ready.transport, ActionMessage::with_id(Command::Update, id.0))
            .await
    }

    /// Apply a backend-specific partial update and announce it.
    pub async fn update_one(&self, id: ItemId, query: &S::Query) -> Result<()> {
        let ready = self.ready()?;
        let id = id.validate()?;
        ready.cold.update(id, query).await?;
        self.broadcast(ready.transport, ActionMessage::with_id(Command::Update, id.0))
            .await
    }

    /// Delete from the cold store and announce the removal.
    pub async fn remove(&self, id: ItemId) -> Result<()> {
        let ready = self.ready()?;
        let id = id.validate()?;
        ready.cold.remove(id).await?;
        self.broadcast(ready.transport, ActionMessage::with_id(Command::Remove, id.0))
            .await
    }

    /// Ask every replica to resynchronise the whole catalog.
    pub async fn resync_all(&self) -> Result<()> {
        let ready = self.ready()?;
        self.broadcast(ready.transport, ActionMessage::new(Command::Update, None))
            .await
    }
}
