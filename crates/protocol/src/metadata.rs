//! `Upload-Metadata` header codec.
//!
//! The header is a comma-separated list of `key base64(value)` pairs. Keys
//! are ASCII, non-empty and contain neither spaces nor commas. A pair with
//! an empty value is sent as the bare key.

use base64::{Engine, engine::general_purpose::STANDARD};

/// Errors produced while building or parsing upload metadata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata key is empty")]
    EmptyKey,

    #[error("invalid metadata key: {0:?}")]
    InvalidKey(String),

    #[error("invalid base64 value for key {key:?}")]
    InvalidValue { key: String },
}

/// Ordered key/value metadata attached to an upload.
///
/// Insertion order is preserved on the wire. Re-inserting an existing key
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `key`.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), MetadataError> {
        let key = key.into();
        validate_key(&key)?;
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        Ok(())
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encodes the metadata as an `Upload-Metadata` header value.
    pub fn encode(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{k} {}", STANDARD.encode(v.as_bytes()))
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parses an `Upload-Metadata` header value.
    ///
    /// Values that are not valid UTF-8 after decoding are replaced lossily;
    /// servers echo metadata back verbatim, so this only matters for
    /// metadata written by other clients.
    pub fn decode(header: &str) -> Result<Self, MetadataError> {
        let mut metadata = Metadata::new();
        for pair in header.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (key, encoded) = match pair.split_once(' ') {
                Some((k, v)) => (k, v.trim()),
                None => (pair, ""),
            };
            let value = if encoded.is_empty() {
                String::new()
            } else {
                let bytes = STANDARD
                    .decode(encoded)
                    .map_err(|_| MetadataError::InvalidValue {
                        key: key.to_string(),
                    })?;
                String::from_utf8_lossy(&bytes).into_owned()
            };
            metadata.insert(key, value)?;
        }
        Ok(metadata)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    /// Collects pairs, silently skipping invalid keys.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Metadata::new();
        for (k, v) in iter {
            let _ = metadata.insert(k, v);
        }
        metadata
    }
}

fn validate_key(key: &str) -> Result<(), MetadataError> {
    if key.is_empty() {
        return Err(MetadataError::EmptyKey);
    }
    let valid = key
        .bytes()
        .all(|b| b.is_ascii_graphic() && b != b',');
    if !valid {
        return Err(MetadataError::InvalidKey(key.to_string()));
    }
    Ok(())
}
