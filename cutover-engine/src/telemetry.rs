//! Best-effort migration telemetry.
//!
//! Events are appended to the tenant's `_migrationTelemetry` collection under
//! a time-ordered id. A failed emission is logged and dropped; it never
//! reaches the caller.

use std::sync::Arc;

use cutover_core::{to_document, CutoverResult, DocumentId, OrgId, PathResolver, TelemetryEvent};
use cutover_storage::{DocumentStore, WriteBatch};
use uuid::Uuid;

pub struct TelemetryEmitter<S: DocumentStore> {
    store: Arc<S>,
    resolver: Arc<PathResolver>,
}

impl<S: DocumentStore> TelemetryEmitter<S> {
    pub fn new(store: Arc<S>, resolver: Arc<PathResolver>) -> Self {
        Self { store, resolver }
    }

    /// Append an event. Returns whether it was stored.
    pub async fn emit(&self, org: &OrgId, event: &TelemetryEvent) -> bool {
        match self.try_emit(org, event).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    org_id = %org,
                    record_id = %event.record_id,
                    error = %e,
                    "Failed to emit migration telemetry"
                );
                false
            }
        }
    }

    async fn try_emit(&self, org: &OrgId, event: &TelemetryEvent) -> CutoverResult<()> {
        let id = DocumentId::parse(Uuid::now_v7().to_string())?;
        let path = self.resolver.telemetry_collection(org).doc(&id);
        let data = to_document(event)?;
        let mut batch = WriteBatch::new();
        batch.set(path, data);
        self.store.commit(batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cutover_core::{MigrationConfig, OperationType, PhaseFlags, UNKNOWN_SOURCE};
    use cutover_storage::MemoryStore;

    fn event(resolver: &PathResolver) -> TelemetryEvent {
        TelemetryEvent {
            op_type: OperationType::upsert(&MigrationConfig::default().record_collection),
            record_id: DocumentId::parse("r1").unwrap(),
            read_mode: resolver.resolve_read_mode(),
            write_targets: resolver.resolve_write_targets(),
            skipped_by_idempotency: false,
            source: UNKNOWN_SOURCE.to_string(),
            created_at: Utc::now(),
        }
    }

    fn setup() -> (Arc<MemoryStore>, TelemetryEmitter<MemoryStore>, Arc<PathResolver>) {
        let store = Arc::new(MemoryStore::new());
        let resolver = Arc::new(PathResolver::new(
            MigrationConfig::default().module_id,
            PhaseFlags::default(),
        ));
        let emitter = TelemetryEmitter::new(store.clone(), resolver.clone());
        (store, emitter, resolver)
    }

    #[tokio::test]
    async fn test_emit_appends_event() {
        let (store, emitter, resolver) = setup();
        let org = OrgId::parse("orgA").unwrap();
        assert!(emitter.emit(&org, &event(&resolver)).await);
        assert!(emitter.emit(&org, &event(&resolver)).await);

        let prefix = resolver.telemetry_collection(&org).to_string();
        let paths = store.paths_with_prefix(&prefix);
        assert_eq!(paths.len(), 2);
        let stored = store.document(&paths[0]).unwrap();
        assert_eq!(stored["type"], serde_json::json!("trainingRecordsUpsert"));
        assert_eq!(stored["skippedByIdempotency"], serde_json::json!(false));
    }

    #[tokio::test]
    async fn test_emit_failure_is_swallowed() {
        let (store, emitter, resolver) = setup();
        let org = OrgId::parse("orgA").unwrap();
        store.fail_writes_under(resolver.telemetry_collection(&org).to_string());
        assert!(!emitter.emit(&org, &event(&resolver)).await);
        assert!(store.is_empty());
    }
}
