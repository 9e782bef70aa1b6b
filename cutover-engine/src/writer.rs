//! Live-traffic idempotent upsert.
//!
//! One store transaction covers the ledger check, the fan-out merge to every
//! write target and the ledger entry itself, so two concurrent retries with
//! the same idempotency key cannot both apply.

use std::sync::Arc;

use chrono::Utc;
use cutover_core::{
    document_fingerprint, format_timestamp, to_document, CollectionName, CutoverResult, Document,
    DocumentId, DocumentPath, IdempotencyKey, MigrationConfig, MigrationOperation, OperationType,
    OrgId, PathResolver, StorageMode, TelemetryEvent, WriteTargets, UNKNOWN_SOURCE,
};
use cutover_storage::DocumentStore;
use serde::Serialize;
use serde_json::Value;

use crate::telemetry::TelemetryEmitter;

/// One logical write from the application.
#[derive(Debug, Clone)]
pub struct UpsertRequest {
    pub org_id: OrgId,
    pub record_id: DocumentId,
    pub payload: Document,
    pub idempotency_key: Option<IdempotencyKey>,
    pub source: Option<String>,
}

impl UpsertRequest {
    pub fn new(org_id: OrgId, record_id: DocumentId, payload: Document) -> Self {
        Self {
            org_id,
            record_id,
            payload,
            idempotency_key: None,
            source: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: IdempotencyKey) -> Self {
        self.idempotency_key = Some(key);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResult {
    pub record_id: DocumentId,
    pub read_mode: StorageMode,
    pub write_targets: WriteTargets,
    pub skipped_by_idempotency: bool,
}

enum TxOutcome {
    Applied,
    Skipped { prior_hash: Option<String> },
}

pub struct IdempotentWriter<S: DocumentStore> {
    store: Arc<S>,
    resolver: Arc<PathResolver>,
    collection: CollectionName,
    telemetry: TelemetryEmitter<S>,
}

impl<S: DocumentStore> IdempotentWriter<S> {
    pub fn new(store: Arc<S>, resolver: Arc<PathResolver>, config: &MigrationConfig) -> Self {
        let telemetry = TelemetryEmitter::new(store.clone(), resolver.clone());
        Self {
            store,
            resolver,
            collection: config.record_collection.clone(),
            telemetry,
        }
    }

    /// Merge `payload` into the record at every current write target.
    ///
    /// With an idempotency key, at most one call per key is ever applied;
    /// later calls report `skipped_by_idempotency` and write nothing.
    pub async fn upsert(&self, request: UpsertRequest) -> CutoverResult<UpsertResult> {
        let org = &request.org_id;
        let record_id = &request.record_id;
        let read_mode = self.resolver.resolve_read_mode();
        let write_targets = self.resolver.resolve_write_targets();
        let op_type = OperationType::upsert(&self.collection);
        let source = request
            .source
            .clone()
            .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());
        let payload_hash = document_fingerprint(&request.payload);
        let now = Utc::now();
        let stamp = Value::String(format_timestamp(now));

        let target_paths: Vec<DocumentPath> = write_targets
            .modes()
            .iter()
            .map(|mode| {
                self.resolver
                    .document_path(org, &self.collection, record_id, *mode)
            })
            .collect();

        let ledger = match &request.idempotency_key {
            Some(key) => {
                let entry = MigrationOperation {
                    op_type: op_type.clone(),
                    record_id: record_id.clone(),
                    read_mode,
                    write_targets: write_targets.clone(),
                    source: source.clone(),
                    completed_at: now,
                    payload_hash: Some(payload_hash.clone()),
                };
                Some((self.resolver.ledger_path(org, key), to_document(&entry)?))
            }
            None => None,
        };

        let payload = &request.payload;
        let outcome = self
            .store
            .run_transaction(|txn| {
                if let Some((ledger_path, _)) = &ledger {
                    if let Some(existing) = txn.get(ledger_path)? {
                        let prior_hash = existing
                            .get("payloadHash")
                            .and_then(Value::as_str)
                            .map(str::to_string);
                        return Ok(TxOutcome::Skipped { prior_hash });
                    }
                }

                let mut exists = Vec::with_capacity(target_paths.len());
                for path in &target_paths {
                    exists.push(txn.get(path)?.is_some());
                }

                for (path, existed) in target_paths.iter().zip(exists) {
                    let mut data = payload.clone();
                    data.insert("updatedAt".to_string(), stamp.clone());
                    if !existed {
                        data.insert("createdAt".to_string(), stamp.clone());
                    }
                    txn.set_merge(path.clone(), data);
                }

                if let Some((ledger_path, entry)) = &ledger {
                    txn.set(ledger_path.clone(), entry.clone());
                }
                Ok(TxOutcome::Applied)
            })
            .await?;

        let skipped = match outcome {
            TxOutcome::Applied => {
                tracing::debug!(
                    org_id = %org,
                    record_id = %record_id,
                    targets = write_targets.modes().len(),
                    "Applied record upsert"
                );
                false
            }
            TxOutcome::Skipped { prior_hash } => {
                match prior_hash {
                    Some(prior) if prior != payload_hash => tracing::warn!(
                        org_id = %org,
                        record_id = %record_id,
                        "Idempotency key replayed with a different payload"
                    ),
                    _ => tracing::debug!(
                        org_id = %org,
                        record_id = %record_id,
                        "Skipped replayed upsert"
                    ),
                }
                true
            }
        };

        let event = TelemetryEvent {
            op_type,
            record_id: record_id.clone(),
            read_mode,
            write_targets: write_targets.clone(),
            skipped_by_idempotency: skipped,
            source,
            created_at: now,
        };
        self.telemetry.emit(org, &event).await;

        Ok(UpsertResult {
            record_id: record_id.clone(),
            read_mode,
            write_targets,
            skipped_by_idempotency: skipped,
        })
    }
}
