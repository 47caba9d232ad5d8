//! Portable document format.
//!
//! A document is an ordered list of leaf records under a single top-level
//! `keys` field:
//!
//! ```yaml
//! keys:
//! - key: secret/app/db
//!   values:
//!     username: app
//!     password: s3cr3t
//! - key: secret/app/old-cred
//!   state: absent
//! ```
//!
//! Record order is kept exactly as written. Field payloads are opaque and
//! passed through without any schema.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Field name to value mapping stored at a single leaf.
pub type Values = serde_json::Map<String, serde_json::Value>;

/// Errors that can occur while encoding or decoding a document.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Malformed document: {0}")]
    Malformed(#[source] serde_yaml::Error),

    #[error("Malformed document: record {index} has invalid key {key:?}: {reason}")]
    InvalidKey {
        index: usize,
        key: String,
        reason: &'static str,
    },

    #[error("Unable to serialize document: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

/// Desired state of a key when the document is replayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyState {
    #[default]
    Present,
    Absent,
}

impl KeyState {
    pub fn is_present(&self) -> bool {
        *self == KeyState::Present
    }

    fn as_str(&self) -> &'static str {
        match self {
            KeyState::Present => "present",
            KeyState::Absent => "absent",
        }
    }
}

impl std::fmt::Display for KeyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for KeyState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for KeyState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Older exports wrote an empty `state: ""` for every present key.
        match Option::<String>::deserialize(deserializer)?.as_deref() {
            None | Some("") | Some("present") => Ok(KeyState::Present),
            Some("absent") => Ok(KeyState::Absent),
            Some(other) => Err(serde::de::Error::unknown_variant(
                other,
                &["present", "absent"],
            )),
        }
    }
}

/// One entry of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeafRecord {
    /// Full path of the leaf in the store
    pub key: String,
    /// Whether the key should exist after replay
    #[serde(default, skip_serializing_if = "KeyState::is_present")]
    pub state: KeyState,
    /// Fields written to the key; ignored for absent keys
    #[serde(
        default,
        deserialize_with = "nullable_values",
        skip_serializing_if = "Values::is_empty"
    )]
    pub values: Values,
}

impl LeafRecord {
    /// Creates a record that writes `values` to `key`.
    pub fn present(key: impl Into<String>, values: Values) -> Self {
        Self {
            key: key.into(),
            state: KeyState::Present,
            values,
        }
    }

    /// Creates a record that deletes `key`.
    pub fn absent(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: KeyState::Absent,
            values: Values::new(),
        }
    }
}

fn nullable_values<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Values, D::Error> {
    Ok(Option::<Values>::deserialize(deserializer)?.unwrap_or_default())
}

/// Ordered sequence of leaf records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    #[serde(default)]
    pub keys: Vec<LeafRecord>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: LeafRecord) {
        self.keys.push(record);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn validate(&self) -> Result<(), CodecError> {
        for (index, record) in self.keys.iter().enumerate() {
            let reason = if record.key.is_empty() {
                "key must not be empty"
            } else if record.key.ends_with('/') {
                "key must not end with '/'"
            } else {
                continue;
            };
            return Err(CodecError::InvalidKey {
                index,
                key: record.key.clone(),
                reason,
            });
        }
        Ok(())
    }
}

/// Renders a document as YAML.
pub fn serialize(document: &Document) -> Result<Vec<u8>, CodecError> {
    serde_yaml::to_string(document)
        .map(String::into_bytes)
        .map_err(CodecError::Serialize)
}

/// Parses a YAML document.
///
/// An empty input (or one holding only comments) is an empty document.
pub fn deserialize(input: &[u8]) -> Result<Document, CodecError> {
    let root: serde_yaml::Value = serde_yaml::from_slice(input).map_err(CodecError::Malformed)?;
    if root.is_null() {
        return Ok(Document::default());
    }

    let document: Document = serde_yaml::from_slice(input).map_err(CodecError::Malformed)?;
    document.validate()?;
    Ok(document)
}
