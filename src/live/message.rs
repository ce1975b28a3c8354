//! Action messages broadcast on a live store's channel.
//!
//! Wire format is ASCII `COMMAND` or `COMMAND:ID`, where `ID` is a base-10
//! integer. Surrounding whitespace is ignored.

use crate::error::{CoherenceError, Result};
use std::fmt;
use std::str::FromStr;

/// Flavour of live store, which also names its channel prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Catalog,
    Config,
}

impl StoreKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKind::Catalog => "CATALOG",
            StoreKind::Config => "CONFIG",
        }
    }

    /// Channel name for a store of this kind called `name`.
    pub fn channel_name(self, name: &str) -> String {
        format!("{}:{}", self.as_str(), name)
    }

    /// Whether stores of this kind act on `command`.
    pub fn supports(self, command: Command) -> bool {
        match command {
            Command::Update | Command::Add | Command::Remove => true,
            Command::Activate => self == StoreKind::Config,
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command token of an action message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    /// Re-read one record (with id) or everything (without).
    Update,
    /// Same handling as `Update`.
    Add,
    /// Drop a record locally.
    Remove,
    /// Make a config version active.
    Activate,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Update => "UPDATE",
            Command::Add => "ADD",
            Command::Remove => "REMOVE",
            Command::Activate => "ACTIVATE",
        }
    }
}

impl FromStr for Command {
    type Err = CoherenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "UPDATE" => Ok(Command::Update),
            "ADD" => Ok(Command::Add),
            "REMOVE" => Ok(Command::Remove),
            "ACTIVATE" => Ok(Command::Activate),
            other => Err(CoherenceError::BadCommand(other.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded action message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionMessage {
    pub command: Command,
    /// Item id or config version, as carried on the wire.
    pub id: Option<i64>,
}

impl ActionMessage {
    pub fn new(command: Command, id: Option<i64>) -> Self {
        Self { command, id }
    }

    pub fn with_id(command: Command, id: i64) -> Self {
        Self {
            command,
            id: Some(id),
        }
    }

    /// Parse a raw message.
    ///
    /// An unknown command token fails with `BadCommand`; an id segment that
    /// is not a base-10 integer (including an empty one) fails with `BadId`.
    pub fn decode(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (command, id) = match raw.split_once(':') {
            Some((command, id)) => (command, Some(id)),
            None => (raw, None),
        };

        let command = command.parse::<Command>()?;
        let id = match id {
            Some(segment) => Some(
                segment
                    .parse::<i64>()
                    .map_err(|_| CoherenceError::BadId(segment.to_string()))?,
            ),
            None => None,
        };

        Ok(Self { command, id })
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ActionMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{}:{}", self.command, id),
            None => write!(f, "{}", self.command),
        }
    }
}

impl FromStr for ActionMessage {
    type Err = CoherenceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_with_id() {
        let msg = ActionMessage::decode("REMOVE:5").unwrap();
        assert_eq!(msg.command, Command::Remove);
        assert_eq!(msg.id, Some(5));
    }

    #[test]
    fn test_decode_without_id() {
        let msg = ActionMessage::decode("UPDATE").unwrap();
        assert_eq!(msg.command, Command::Update);
        assert_eq!(msg.id, None);
    }

    #[test]
    fn test_decode_trims_whitespace() {
        let msg = ActionMessage::decode("  ACTIVATE:12\n").unwrap();
        assert_eq!(msg, ActionMessage::with_id(Command::Activate, 12));
    }

    #[test]
    fn test_decode_unknown_command() {
        assert!(matches!(
            ActionMessage::decode("FOO:5"),
            Err(CoherenceError::BadCommand(ref c)) if c == "FOO"
        ));
        assert!(matches!(
            ActionMessage::decode("update:5"),
            Err(CoherenceError::BadCommand(_))
        ));
    }

    #[test]
    fn test_decode_bad_id() {
        assert!(matches!(
            ActionMessage::decode("REMOVE:abc"),
            Err(CoherenceError::BadId(_))
        ));
        assert!(matches!(
            ActionMessage::decode("REMOVE:"),
            Err(CoherenceError::BadId(_))
        ));
        assert!(matches!(
            ActionMessage::decode("REMOVE:1:2"),
            Err(CoherenceError::BadId(_))
        ));
    }

    #[test]
    fn test_encode() {
        assert_eq!(ActionMessage::with_id(Command::Update, 7).encode(), "UPDATE:7");
        assert_eq!(ActionMessage::new(Command::Update, None).encode(), "UPDATE");
        let decoded: ActionMessage = "ACTIVATE:3".parse().unwrap();
        assert_eq!(decoded.encode(), "ACTIVATE:3");
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(StoreKind::Catalog.channel_name("products"), "CATALOG:products");
        assert_eq!(StoreKind::Config.channel_name("flags"), "CONFIG:flags");
    }

    #[test]
    fn test_supported_commands() {
        assert!(!StoreKind::Catalog.supports(Command::Activate));
        assert!(StoreKind::Catalog.supports(Command::Remove));
        assert!(StoreKind::Config.supports(Command::Activate));
    }
}
