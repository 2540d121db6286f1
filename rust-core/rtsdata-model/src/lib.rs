// SPDX-License-Identifier: PMPL-1.0-or-later
//! rtsdata Model
//!
//! Reference data (wells, tags, discrete labels) and observation records
//! (numeric readings and discrete interval rows) shared by every rtsdata
//! crate.

pub mod time;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use time::{
    format_bound, format_record_time, from_micros, parse_query_time, to_micros,
    FILE_TIMESTAMP_FORMAT, QUERY_TIMESTAMP_FORMAT, RECORD_TIMESTAMP_FORMAT,
};

/// Model errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid timestamp '{value}': expected {format}")]
    InvalidTimestamp { value: String, format: &'static str },

    #[error("Invalid well role: {0}")]
    InvalidRole(String),

    #[error("Timestamp out of range: {0}")]
    TimestampOutOfRange(String),
}

macro_rules! identity {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw integer value
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

identity!(
    /// Stable identity of a well
    WellId
);
identity!(
    /// Stable identity of an instrument tag
    TagId
);
identity!(
    /// Stable identity of a discrete event label
    LabelId
);

/// Role a well plays in the field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WellRole {
    Producer,
    Injector,
}

impl WellRole {
    pub fn as_str(self) -> &'static str {
        match self {
            WellRole::Producer => "producer",
            WellRole::Injector => "injector",
        }
    }
}

impl fmt::Display for WellRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WellRole {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "producer" => Ok(WellRole::Producer),
            "injector" => Ok(WellRole::Injector),
            other => Err(ModelError::InvalidRole(other.to_string())),
        }
    }
}

/// A physical injection or production site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Well {
    pub id: WellId,
    /// Display tag, e.g. `RJS739`
    pub name: String,
    pub role: WellRole,
    /// Opaque descriptive document
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// A well that has not been assigned an identity yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWell {
    pub name: String,
    pub role: WellRole,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Whether a tag is a primary channel or mirrors one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TagRole {
    Primary,
    Backup {
        /// Name of the non-backup tag this one mirrors
        primary_tag: String,
    },
}

impl TagRole {
    pub fn is_backup(&self) -> bool {
        matches!(self, TagRole::Backup { .. })
    }

    /// The mirrored tag name; `None` for primary tags
    pub fn primary_tag(&self) -> Option<&str> {
        match self {
            TagRole::Primary => None,
            TagRole::Backup { primary_tag } => Some(primary_tag),
        }
    }
}

/// Descriptive metadata attached to a tag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagMetadata {
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub units: String,
    /// Reading counts seen at load time: `numeric` plus one entry per label
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub streaming_tags: BTreeMap<String, u64>,
}

/// A named instrument channel belonging to exactly one well
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub well: WellId,
    pub name: String,
    pub role: TagRole,
    pub metadata: TagMetadata,
}

impl Tag {
    pub fn is_backup(&self) -> bool {
        self.role.is_backup()
    }

    pub fn main_tag(&self) -> Option<&str> {
        self.role.primary_tag()
    }
}

/// A tag that has not been assigned an identity yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTag {
    pub well: WellId,
    pub name: String,
    pub role: TagRole,
    pub metadata: TagMetadata,
}

/// A symbolic event label, deduplicated across all tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscreteLabel {
    pub id: LabelId,
    pub name: String,
}

/// One numeric observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRecord {
    pub well: WellId,
    pub tag: TagId,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// One row of a discrete channel's step function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalRecord {
    pub well: WellId,
    pub tag: TagId,
    pub label: LabelId,
    pub timestamp: DateTime<Utc>,
    /// 0 (OFF) or 1 (ON)
    pub value: u8,
}

impl IntervalRecord {
    pub fn is_on(&self) -> bool {
        self.value != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_role_parse() {
        assert_eq!("producer".parse::<WellRole>().unwrap(), WellRole::Producer);
        assert_eq!(" Injector ".parse::<WellRole>().unwrap(), WellRole::Injector);
        assert!(matches!(
            "observer".parse::<WellRole>(),
            Err(ModelError::InvalidRole(_))
        ));
    }

    #[test]
    fn test_tag_role_accessors() {
        let primary = TagRole::Primary;
        assert!(!primary.is_backup());
        assert_eq!(primary.primary_tag(), None);

        let backup = TagRole::Backup {
            primary_tag: "T_A".to_string(),
        };
        assert!(backup.is_backup());
        assert_eq!(backup.primary_tag(), Some("T_A"));
    }

    #[test]
    fn test_tag_metadata_uses_type_key() {
        let metadata = TagMetadata {
            description: "Wellhead pressure".to_string(),
            kind: "analog".to_string(),
            units: "kPa".to_string(),
            streaming_tags: BTreeMap::new(),
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["type"], "analog");
        assert!(json.get("streaming_tags").is_none());
    }

    #[test]
    fn test_identity_serializes_as_integer() {
        let json = serde_json::to_string(&WellId(7)).unwrap();
        assert_eq!(json, "7");
        assert_eq!(TagId::from(3).get(), 3);
    }
}
