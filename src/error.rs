//! Error types for the coherence layer.

use crate::types::{ItemId, Version};
use thiserror::Error;

/// Main error type for hot containers, live stores and transports.
#[derive(Debug, Error)]
pub enum CoherenceError {
    // --- Validation ---
    #[error("Invalid item id: {0} (ids start at 1)")]
    InvalidId(i64),

    #[error("Invalid config version: {0} (versions run from 0 to i64::MAX)")]
    InvalidVersion(i64),

    #[error("Invalid config status: expected 0 (inactive) or 1 (active), got {0}")]
    InvalidStatus(i64),

    // --- Invariants ---
    #[error("Item with id {0} already exists")]
    DuplicateId(ItemId),

    #[error("No item found for id {0}")]
    NotFound(ItemId),

    #[error("Config with version {0} already present")]
    DuplicateVersion(Version),

    #[error("Cannot add active config {attempted}: version {active} is already active")]
    ActiveOverwrite { active: Version, attempted: Version },

    #[error("Cannot remove active config version {0}")]
    RemovingActiveConfig(Version),

    #[error("No config found for version {0}")]
    NoConfig(Version),

    #[error("Status of config version {0} only changes through activate")]
    StatusWrite(Version),

    // --- State ---
    #[error("Live store not initialized: {0}")]
    NotInitialized(&'static str),

    #[error("Transport is not connected")]
    NotConnected,

    #[error("Transport in {mode} mode cannot {operation}")]
    ModeViolation {
        mode: &'static str,
        operation: &'static str,
    },

    // --- Protocol ---
    #[error("Bad command in action message: {0:?}")]
    BadCommand(String),

    #[error("Bad id in action message: {0:?}")]
    BadId(String),

    // --- Collaborators ---
    #[error("Cold store error: {0}")]
    ColdStore(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CoherenceError {
    fn from(e: serde_json::Error) -> Self {
        CoherenceError::Serialization(e.to_string())
    }
}

/// Result type for coherence operations.
pub type Result<T> = std::result::Result<T, CoherenceError>;
