//! Identity types for migrated documents
//!
//! Every identifier here ends up as a single segment of a document-store
//! path, so construction is validated: an identifier can never smuggle a
//! `/` into a path and address a document outside its tenant.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::{CutoverResult, ValidationError};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// A stored document: an arbitrary field map.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Maximum byte length of a single path segment.
pub const MAX_SEGMENT_BYTES: usize = 1500;

/// Maximum length of a caller-supplied idempotency key.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 256;

/// Render a timestamp the way it is persisted in documents.
pub fn format_timestamp(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// SHA-256 fingerprint of a document, hex encoded.
///
/// `serde_json::Map` keeps keys sorted, so equal documents always hash
/// equally regardless of how the caller assembled them.
pub fn document_fingerprint(doc: &Document) -> String {
    let mut hasher = Sha256::new();
    // Serializing a Map of Values cannot fail.
    let bytes = serde_json::to_vec(doc).unwrap_or_default();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

/// Serde adapter persisting timestamps as RFC 3339 strings with millisecond
/// precision, e.g. `2026-02-15T12:00:00.000Z`.
pub mod timestamp_format {
    use super::{format_timestamp, Timestamp};
    use chrono::DateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&chrono::Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Validate a single path segment.
pub(crate) fn validate_segment(kind: &'static str, value: &str) -> CutoverResult<()> {
    let reason = if value.is_empty() {
        Some("must not be empty")
    } else if value.contains('/') {
        Some("must not contain '/'")
    } else if value == "." || value == ".." {
        Some("must not be '.' or '..'")
    } else if value.len() > MAX_SEGMENT_BYTES {
        Some("exceeds 1500 bytes")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ValidationError::InvalidPathSegment {
            kind,
            value: value.to_string(),
            reason: reason.to_string(),
        }
        .into()),
        None => Ok(()),
    }
}

macro_rules! define_segment_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(pub(crate) String);

        impl $name {
            /// Parse and validate an identifier.
            pub fn parse(value: impl Into<String>) -> CutoverResult<Self> {
                let value = value.into();
                validate_segment($kind, &value)?;
                Ok(Self(value))
            }

            /// Build from a compile-time constant known to be a valid segment.
            #[allow(dead_code)]
            pub(crate) fn from_static(value: &'static str) -> Self {
                debug_assert!(validate_segment($kind, value).is_ok());
                Self(value.to_string())
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = crate::CutoverError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

define_segment_id!(
    /// Tenant (organisation) identifier. The isolation boundary for all data.
    OrgId,
    "organisation id"
);

define_segment_id!(
    /// Module namespace that owns collections after migration.
    ModuleId,
    "module id"
);

define_segment_id!(
    /// Name of a tenant-scoped collection, e.g. `trainingRecords`.
    CollectionName,
    "collection"
);

define_segment_id!(
    /// Document identifier, shared by a legacy document and its module copy.
    DocumentId,
    "document id"
);

/// Caller-supplied token that deduplicates retried logical writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Parse an idempotency key: 1-256 characters and a valid path segment.
    pub fn parse(value: impl Into<String>) -> CutoverResult<Self> {
        let value = value.into();
        if value.is_empty() || value.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(ValidationError::InvalidIdempotencyKey {
                reason: "idempotency key must be 1-256 characters".to_string(),
            }
            .into());
        }
        validate_segment("idempotency key", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = crate::CutoverError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<IdempotencyKey> for String {
    fn from(key: IdempotencyKey) -> String {
        key.0
    }
}
