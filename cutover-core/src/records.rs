//! Typed records persisted by the engine: migration and retirement stamps,
//! idempotency ledger entries and telemetry events.
//!
//! Field names on the wire are camelCase to stay compatible with documents
//! written by the live application.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::timestamp_format;
use crate::{
    CollectionName, Document, DocumentId, StorageError, StorageMode, Timestamp, WriteTargets,
};

/// Field name of the stamp merged into backfilled module documents.
pub const MIGRATION_META_FIELD: &str = "migrationMeta";

/// Field name of the stamp merged into archive documents.
pub const RETIREMENT_META_FIELD: &str = "retirementMeta";

/// Source label recorded when the caller supplies none.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Serialize a record into a store document.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StorageError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(StorageError::Serialization {
            path: String::new(),
            reason: format!("expected an object, got {}", other),
        }),
        Err(e) => Err(StorageError::Serialization {
            path: String::new(),
            reason: e.to_string(),
        }),
    }
}

/// Stamp written by the backfill next to business fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationMeta {
    pub version: String,
    pub source_path: String,
    #[serde(with = "timestamp_format")]
    pub migrated_at: Timestamp,
}

/// Stamp written on archive copies of retired legacy documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementMeta {
    pub version: String,
    pub source_path: String,
    #[serde(with = "timestamp_format")]
    pub archived_at: Timestamp,
}

/// Kind of logical operation recorded in the ledger and telemetry.
///
/// Serialized as `{collection}Upsert`, e.g. `trainingRecordsUpsert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OperationType {
    Upsert { collection: CollectionName },
}

impl OperationType {
    pub fn upsert(collection: &CollectionName) -> Self {
        OperationType::Upsert {
            collection: collection.clone(),
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationType::Upsert { collection } => write!(f, "{}Upsert", collection),
        }
    }
}

impl From<OperationType> for String {
    fn from(op: OperationType) -> String {
        op.to_string()
    }
}

impl TryFrom<String> for OperationType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let collection = value
            .strip_suffix("Upsert")
            .ok_or_else(|| format!("unknown operation type '{}'", value))?;
        let collection = CollectionName::parse(collection).map_err(|e| e.to_string())?;
        Ok(OperationType::Upsert { collection })
    }
}

/// Idempotency ledger entry. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOperation {
    #[serde(rename = "type")]
    pub op_type: OperationType,
    pub record_id: DocumentId,
    pub read_mode: StorageMode,
    pub write_targets: WriteTargets,
    pub source: String,
    #[serde(with = "timestamp_format")]
    pub completed_at: Timestamp,
    /// SHA-256 of the payload the entry was written for. Absent on entries
    /// written by older clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_hash: Option<String>,
}

/// One write attempt's outcome, appended to the telemetry collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    #[serde(rename = "type")]
    pub op_type: OperationType,
    pub record_id: DocumentId,
    pub read_mode: StorageMode,
    pub write_targets: WriteTargets,
    pub skipped_by_idempotency: bool,
    pub source: String,
    #[serde(with = "timestamp_format")]
    pub created_at: Timestamp,
}
