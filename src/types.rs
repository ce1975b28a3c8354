//! Core types for hot containers and live stores.

use crate::error::{CoherenceError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::hash::Hash;

/// Integer key shared by action messages and containers.
///
/// Action messages carry keys as raw base-10 integers; this trait converts
/// between that raw form and the typed key of a record kind.
pub trait RecordKey:
    Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    fn from_raw(raw: i64) -> Self;
    fn raw(self) -> i64;
}

/// Unique identifier for a catalog item.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl ItemId {
    /// Ids start at 1.
    pub fn validate(self) -> Result<Self> {
        if self.0 < 1 {
            return Err(CoherenceError::InvalidId(self.0));
        }
        Ok(self)
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RecordKey for ItemId {
    fn from_raw(raw: i64) -> Self {
        ItemId(raw)
    }

    fn raw(self) -> i64 {
        self.0
    }
}

/// Configuration version number.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Version(pub i64);

impl Version {
    /// Versions are non-negative; 0 is a valid version.
    pub fn validate(self) -> Result<Self> {
        if self.0 < 0 {
            return Err(CoherenceError::InvalidVersion(self.0));
        }
        Ok(self)
    }

    /// The following version. Fails for the last representable one.
    pub fn next(self) -> Result<Self> {
        self.0
            .checked_add(1)
            .map(Version)
            .ok_or(CoherenceError::InvalidVersion(self.0))
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RecordKey for Version {
    fn from_raw(raw: i64) -> Self {
        Version(raw)
    }

    fn raw(self) -> i64 {
        self.0
    }
}

/// Anything a hot container can hold.
///
/// Cloning is the copy step at every container boundary, so `Clone` must
/// produce a fully independent value (no shared interior mutability).
pub trait Record: Clone + Send + Sync + 'static {
    type Key: RecordKey;

    fn key(&self) -> Self::Key;
}

/// Marker for records held by a [`Catalog`](crate::hot::Catalog).
pub trait Item: Record<Key = ItemId> {
    fn id(&self) -> ItemId {
        self.key()
    }
}

impl<T: Record<Key = ItemId>> Item for T {}

/// Activation status of a config version.
///
/// Encoded as `0` (inactive) and `1` (active) on the wire and in documents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "i64", into = "i64")]
pub enum ConfigStatus {
    #[default]
    Inactive,
    Active,
}

impl ConfigStatus {
    pub fn is_active(self) -> bool {
        self == ConfigStatus::Active
    }
}

impl TryFrom<i64> for ConfigStatus {
    type Error = CoherenceError;

    fn try_from(raw: i64) -> Result<Self> {
        match raw {
            0 => Ok(ConfigStatus::Inactive),
            1 => Ok(ConfigStatus::Active),
            other => Err(CoherenceError::InvalidStatus(other)),
        }
    }
}

impl From<ConfigStatus> for i64 {
    fn from(status: ConfigStatus) -> Self {
        match status {
            ConfigStatus::Inactive => 0,
            ConfigStatus::Active => 1,
        }
    }
}

/// A versioned configuration record.
pub trait Config: Record<Key = Version> {
    /// Serialized name of the status field. Field writes may not touch it.
    const STATUS_FIELD: &'static str = "status";

    fn version(&self) -> Version {
        self.key()
    }

    fn status(&self) -> ConfigStatus;

    fn set_status(&mut self, status: ConfigStatus);

    fn set_version(&mut self, version: Version);
}

/// Catalog item with free-form JSON fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: ItemId,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: i64) -> Self {
        Self {
            id: ItemId(id),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl Record for Document {
    type Key = ItemId;

    fn key(&self) -> ItemId {
        self.id
    }
}

/// Configuration version with free-form JSON fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub version: Version,
    pub status: ConfigStatus,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ConfigDocument {
    pub fn new(version: i64, status: ConfigStatus) -> Self {
        Self {
            version: Version(version),
            status,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl Record for ConfigDocument {
    type Key = Version;

    fn key(&self) -> Version {
        self.version
    }
}

impl Config for ConfigDocument {
    fn status(&self) -> ConfigStatus {
        self.status
    }

    fn set_status(&mut self, status: ConfigStatus) {
        self.status = status;
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_id_validation() {
        assert!(ItemId(1).validate().is_ok());
        assert!(matches!(ItemId(0).validate(), Err(CoherenceError::InvalidId(0))));
        assert!(matches!(ItemId(-1).validate(), Err(CoherenceError::InvalidId(-1))));
    }

    #[test]
    fn test_version_validation() {
        assert!(Version(0).validate().is_ok());
        assert!(Version(7).validate().is_ok());
        assert!(matches!(
            Version(-1).validate(),
            Err(CoherenceError::InvalidVersion(-1))
        ));
    }

    #[test]
    fn test_status_from_raw() {
        assert_eq!(ConfigStatus::try_from(0).unwrap(), ConfigStatus::Inactive);
        assert_eq!(ConfigStatus::try_from(1).unwrap(), ConfigStatus::Active);
        assert!(matches!(
            ConfigStatus::try_from(2),
            Err(CoherenceError::InvalidStatus(2))
        ));
        assert!(matches!(
            ConfigStatus::try_from(-1),
            Err(CoherenceError::InvalidStatus(-1))
        ));
    }

    #[test]
    fn test_document_flattens_fields() {
        let doc = Document::new(3).with_field("obj", json!({"x": 1}));
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value, json!({"id": 3, "obj": {"x": 1}}));

        let back: Document = serde_json::from_value(value).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_config_document_rejects_bad_status() {
        let result: std::result::Result<ConfigDocument, _> =
            serde_json::from_value(json!({"version": 3, "status": 2, "obj": {"x": 1}}));
        assert!(result.is_err());

        let ok: ConfigDocument =
            serde_json::from_value(json!({"version": 3, "status": 1})).unwrap();
        assert_eq!(ok.status, ConfigStatus::Active);
        assert_eq!(ok.version(), Version(3));
    }
}
