//! Entity identity - prefixed ULID identifiers
//!
//! Every record carries an ID of the form `PREFIX-ULID`, e.g.
//! `BWL-01KDGJC92W6EBFGZ5SJW6MFGW6`. The prefix names the record type so IDs
//! stay readable when they show up in KV keys and CLI output.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// Record type prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityPrefix {
    /// Bowler scorecard
    Bwl,
    /// Metric row inside a bowler
    Met,
    /// A3 problem-solving case
    A3,
    /// Action plan item inside an A3
    Act,
    /// Scheduled email job
    Mail,
}

impl EntityPrefix {
    /// All known prefixes
    pub fn all() -> &'static [EntityPrefix] {
        &[
            EntityPrefix::Bwl,
            EntityPrefix::Met,
            EntityPrefix::A3,
            EntityPrefix::Act,
            EntityPrefix::Mail,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityPrefix::Bwl => "BWL",
            EntityPrefix::Met => "MET",
            EntityPrefix::A3 => "A3",
            EntityPrefix::Act => "ACT",
            EntityPrefix::Mail => "MAIL",
        }
    }
}

impl fmt::Display for EntityPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityPrefix {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BWL" => Ok(EntityPrefix::Bwl),
            "MET" => Ok(EntityPrefix::Met),
            "A3" => Ok(EntityPrefix::A3),
            "ACT" => Ok(EntityPrefix::Act),
            "MAIL" => Ok(EntityPrefix::Mail),
            _ => Err(IdParseError::UnknownPrefix(s.to_string())),
        }
    }
}

/// Errors from parsing an entity ID
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdParseError {
    #[error("Missing '-' separator in ID: {0}")]
    MissingSeparator(String),

    #[error("Unknown entity prefix: {0}")]
    UnknownPrefix(String),

    #[error("Invalid ULID in ID: {0}")]
    InvalidUlid(String),
}

/// A prefixed, time-sortable identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    prefix: EntityPrefix,
    ulid: Ulid,
}

impl EntityId {
    /// Generate a fresh ID with the given prefix
    pub fn new(prefix: EntityPrefix) -> Self {
        Self {
            prefix,
            ulid: Ulid::new(),
        }
    }

    pub fn prefix(&self) -> EntityPrefix {
        self.prefix
    }

    pub fn ulid(&self) -> Ulid {
        self.ulid
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.ulid)
    }
}

impl FromStr for EntityId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, rest) = s
            .split_once('-')
            .ok_or_else(|| IdParseError::MissingSeparator(s.to_string()))?;
        let prefix: EntityPrefix = prefix.parse()?;
        let ulid = Ulid::from_string(rest).map_err(|_| IdParseError::InvalidUlid(s.to_string()))?;
        Ok(Self { prefix, ulid })
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_has_prefix() {
        let id = EntityId::new(EntityPrefix::Bwl);
        let s = id.to_string();
        assert!(s.starts_with("BWL-"));
        assert_eq!(s.len(), 4 + 26);
    }

    #[test]
    fn test_id_parse_roundtrip() {
        let id = EntityId::new(EntityPrefix::A3);
        let parsed: EntityId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert_eq!(parsed.prefix(), EntityPrefix::A3);
    }

    #[test]
    fn test_id_parse_errors() {
        assert_eq!(
            "BWL01ABC".parse::<EntityId>(),
            Err(IdParseError::MissingSeparator("BWL01ABC".to_string()))
        );
        assert!(matches!(
            "XYZ-01KDGJC92W6EBFGZ5SJW6MFGW6".parse::<EntityId>(),
            Err(IdParseError::UnknownPrefix(_))
        ));
        assert!(matches!(
            "BWL-notaulid".parse::<EntityId>(),
            Err(IdParseError::InvalidUlid(_))
        ));
    }

    #[test]
    fn test_prefix_is_case_insensitive() {
        assert_eq!("bwl".parse::<EntityPrefix>().unwrap(), EntityPrefix::Bwl);
        assert_eq!("a3".parse::<EntityPrefix>().unwrap(), EntityPrefix::A3);
    }

    #[test]
    fn test_id_serializes_as_string() {
        let id: EntityId = "MET-01KDGJC92W6EBFGZ5SJW6MFGW6".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"MET-01KDGJC92W6EBFGZ5SJW6MFGW6\"");
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
