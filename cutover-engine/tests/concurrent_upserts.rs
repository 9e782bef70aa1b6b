//! Racing upserts that share one idempotency key.

use std::sync::Arc;

use cutover_core::{IdempotencyKey, MigrationConfig, PathResolver, PhaseFlags};
use cutover_engine::{IdempotentWriter, UpsertRequest};
use cutover_storage::{DocumentStore, LmdbStore};
use cutover_test_utils::{fixtures, DocumentId, MemoryStore};
use serde_json::json;
use tempfile::TempDir;

const WRITERS: usize = 32;

/// Fire `WRITERS` upserts under one key at once and check exactly one
/// payload landed at every write target.
async fn race_one_key<S: DocumentStore + 'static>(store: Arc<S>) {
    let config = MigrationConfig::default();
    let resolver = Arc::new(PathResolver::new(config.module_id.clone(), PhaseFlags::default()));
    let writer = Arc::new(IdempotentWriter::new(store.clone(), resolver.clone(), &config));
    let org = fixtures::org("orgA");
    let id = DocumentId::parse("r1").unwrap();
    let key = IdempotencyKey::parse("renewal-r1").unwrap();

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let writer = writer.clone();
            let status = format!("status_{}", i);
            let request = UpsertRequest::new(
                org.clone(),
                id.clone(),
                fixtures::doc(json!({"status": status.clone()})),
            )
            .with_idempotency_key(key.clone());
            tokio::spawn(async move {
                let result = writer.upsert(request).await.unwrap();
                (!result.skipped_by_idempotency).then_some(status)
            })
        })
        .collect();

    let mut applied = Vec::new();
    for handle in handles {
        if let Some(status) = handle.await.unwrap() {
            applied.push(status);
        }
    }
    assert_eq!(applied.len(), 1, "applied: {:?}", applied);

    for mode in resolver.resolve_write_targets().modes() {
        let path = resolver.document_path(&org, &config.record_collection, &id, *mode);
        let stored = store.get(&path).await.unwrap().unwrap();
        assert_eq!(stored["status"], json!(applied[0]));
    }
    assert!(store.get(&resolver.ledger_path(&org, &key)).await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_store_applies_shared_key_once() {
    race_one_key(Arc::new(MemoryStore::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lmdb_store_applies_shared_key_once() {
    let dir = TempDir::new().unwrap();
    race_one_key(Arc::new(LmdbStore::open(dir.path(), 16).unwrap())).await;
}
