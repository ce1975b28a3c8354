//! Versioned config container with a single active version.

use crate::error::{CoherenceError, Result};
use crate::hot::HotStore;
use crate::live::StoreKind;
use crate::types::{Config, ConfigStatus, Version};
use std::collections::BTreeMap;

/// In-memory config manager.
///
/// At most one stored config has `ConfigStatus::Active` at any time, and
/// `active` always names it. Only [`activate`](Self::activate) moves the
/// active pointer.
#[derive(Clone, Debug)]
pub struct ConfigManager<C> {
    configs: BTreeMap<Version, C>,
    active: Option<Version>,
}

impl<C: Config> ConfigManager<C> {
    pub fn new() -> Self {
        Self {
            configs: BTreeMap::new(),
            active: None,
        }
    }

    /// Create a manager pre-seeded through [`add`](Self::add).
    pub fn with_configs<'a>(configs: impl IntoIterator<Item = &'a C>) -> Result<Self> {
        let mut manager = Self::new();
        for config in configs {
            manager.add(config)?;
        }
        Ok(manager)
    }

    fn add_owned(&mut self, config: C) -> Result<()> {
        let version = config.version().validate()?;
        let status = config.status();

        if status.is_active() {
            if let Some(active) = self.active {
                return Err(CoherenceError::ActiveOverwrite {
                    active,
                    attempted: version,
                });
            }
        }
        if self.configs.contains_key(&version) {
            return Err(CoherenceError::DuplicateVersion(version));
        }

        self.configs.insert(version, config);
        if status.is_active() {
            self.active = Some(version);
        }
        Ok(())
    }

    /// Store a copy of `config`.
    ///
    /// An active config becomes the active version; adding a second active
    /// config fails with `ActiveOverwrite`.
    pub fn add(&mut self, config: &C) -> Result<()> {
        self.add_owned(config.clone())
    }

    /// Copy of the active config, if any.
    pub fn active(&self) -> Option<C> {
        self.active
            .and_then(|version| self.configs.get(&version))
            .cloned()
    }

    /// Copy of the config at `version`, if present.
    pub fn get(&self, version: Version) -> Result<Option<C>> {
        let version = version.validate()?;
        Ok(self.configs.get(&version).cloned())
    }

    pub fn contains(&self, version: Version) -> bool {
        self.configs.contains_key(&version)
    }

    /// Remove an inactive config. Absent versions are a no-op.
    pub fn remove(&mut self, version: Version) -> Result<()> {
        let version = version.validate()?;
        if !self.configs.contains_key(&version) {
            return Ok(());
        }
        if self.active == Some(version) {
            return Err(CoherenceError::RemovingActiveConfig(version));
        }
        self.configs.remove(&version);
        Ok(())
    }

    /// Make `version` the active config.
    ///
    /// The previous active config, if any, is flipped to inactive in the
    /// same call. Activating the current active version is a no-op.
    pub fn activate(&mut self, version: Version) -> Result<()> {
        let version = version.validate()?;
        if !self.configs.contains_key(&version) {
            return Err(CoherenceError::NoConfig(version));
        }
        if self.active == Some(version) {
            return Ok(());
        }

        if let Some(previous) = self.active {
            if let Some(config) = self.configs.get_mut(&previous) {
                config.set_status(ConfigStatus::Inactive);
            }
        }
        if let Some(config) = self.configs.get_mut(&version) {
            config.set_status(ConfigStatus::Active);
        }
        self.active = Some(version);
        Ok(())
    }

    /// Insert or replace a config re-read from the cold store.
    ///
    /// The locally tracked status wins for existing versions unless the
    /// incoming record is active, in which case it is activated. New
    /// versions are stored inactive and then activated if needed, so the
    /// single-active invariant holds even if the cold store disagrees.
    pub fn refresh(&mut self, mut config: C) -> Result<()> {
        let version = config.version().validate()?;
        let wants_active = config.status().is_active();

        let local_status = self
            .configs
            .get(&version)
            .map(|existing| existing.status())
            .unwrap_or(ConfigStatus::Inactive);
        config.set_status(local_status);
        self.configs.insert(version, config);

        if wants_active {
            self.activate(version)?;
        }
        Ok(())
    }

    /// Stored versions in ascending order.
    pub fn versions(&self) -> impl Iterator<Item = Version> + '_ {
        self.configs.keys().copied()
    }

    pub fn active_version(&self) -> Option<Version> {
        self.active
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

impl<C: Config> Default for ConfigManager<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Config> HotStore for ConfigManager<C> {
    type Key = Version;
    type Record = C;

    const KIND: StoreKind = StoreKind::Config;

    fn load(&mut self, record: C) -> Result<()> {
        self.add_owned(record)
    }

    fn refresh(&mut self, record: C) -> Result<()> {
        ConfigManager::refresh(self, record)
    }

    fn evict(&mut self, key: Version) -> Result<()> {
        self.remove(key)
    }

    fn activate(&mut self, key: Version) -> Result<()> {
        ConfigManager::activate(self, key)
    }

    fn len(&self) -> usize {
        self.configs.len()
    }
}
