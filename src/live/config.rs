//! Configuration-flavoured live store.

use crate::cold::ConfigColdStore;
use crate::error::{CoherenceError, Result};
use crate::hot::ConfigManager;
use crate::types::{Config, ConfigStatus, Version};
use serde_json::{Map, Value};
use tracing::debug;

use super::message::{ActionMessage, Command};
use super::store::LiveStore;

/// Live store over a [`ConfigManager`]; channel prefix `CONFIG`.
pub type LiveConfig<C, S> = LiveStore<ConfigManager<C>, S>;

impl<C, S> LiveStore<ConfigManager<C>, S>
where
    C: Config,
    S: ConfigColdStore<C> + ?Sized,
{
    // --- Reads ---

    /// The active config, if any.
    pub fn active(&self) -> Option<C> {
        self.hot.read().active()
    }

    pub fn get(&self, version: Version) -> Result<Option<C>> {
        self.hot.read().get(version)
    }

    pub fn active_version(&self) -> Option<Version> {
        self.hot.read().active_version()
    }

    pub fn size(&self) -> usize {
        self.hot.read().len()
    }

    // --- Mutators ---

    pub async fn create_new(&self, config: &C) -> Result<()> {
        let ready = self.ready()?;
        let version = config.version().validate()?;
        ready.cold.insert(config).await?;
        self.broadcast(ready.transport, ActionMessage::with_id(Command::Update, version.0))
            .await
    }

    /// Delete an inactive version.
    ///
    /// The locally active version is refused before the cold store is
    /// touched, since no replica could apply the removal.
    pub async fn remove(&self, version: Version) -> Result<()> {
        let ready = self.ready()?;
        let version = version.validate()?;
        if self.active_version() == Some(version) {
            return Err(CoherenceError::RemovingActiveConfig(version));
        }
        ready.cold.remove(version).await?;
        self.broadcast(ready.transport, ActionMessage::with_id(Command::Remove, version.0))
            .await
    }

    /// Overwrite one field. The status field is refused; see [`activate`](Self::activate).
    pub async fn update_field(&self, version: Version, field: &str, value: Value) -> Result<()> {
        let ready = self.ready()?;
        let version = version.validate()?;
        if field == C::STATUS_FIELD {
            return Err(CoherenceError::StatusWrite(version));
        }
        ready.cold.update_field(version, field, value).await?;
        self.broadcast(ready.transport, ActionMessage::with_id(Command::Update, version.0))
            .await
    }

    pub async fn update_fields(&self, version: Version, values: &Map<String, Value>) -> Result<()> {
        let ready = self.ready()?;
        let version = version.validate()?;
        if values.contains_key(C::STATUS_FIELD) {
            return Err(CoherenceError::StatusWrite(version));
        }
        ready.cold.update_fields(version, values).await?;
        self.broadcast(ready.transport, ActionMessage::with_id(Command::Update, version.0))
            .await
    }

    /// Store `config` as a new inactive version one above its own.
    ///
    /// Returns the new version. Activation stays a separate step.
    pub async fn publish_revision(&self, config: &C) -> Result<Version> {
        let version = config.version().validate()?.next()?;
        let mut revision = config.clone();
        revision.set_version(version);
        revision.set_status(ConfigStatus::Inactive);
        self.create_new(&revision).await?;
        Ok(version)
    }

    /// Make `version` the active config everywhere.
    ///
    /// The cold store flips both statuses in one write before the single
    /// `ACTIVATE` broadcast, so at no point are two versions durably active.
    pub async fn activate(&self, version: Version) -> Result<()> {
        let ready = self.ready()?;
        let version = version.validate()?;

        let (known, previous) = {
            let hot = self.hot.read();
            (hot.contains(version), hot.active_version())
        };
        if !known {
            return Err(CoherenceError::NoConfig(version));
        }
        if previous == Some(version) {
            debug!(store = %self.name(), %version, "Already active");
            return Ok(());
        }

        ready.cold.flip_status(version, previous).await?;
        self.broadcast(ready.transport, ActionMessage::with_id(Command::Activate, version.0))
            .await
    }
}
