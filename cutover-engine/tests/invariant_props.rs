//! Property tests for retirement ordering and idempotent writes.

use std::sync::Arc;

use cutover_core::{MigrationConfig, PathResolver, StorageMode, RETIREMENT_META_FIELD};
use cutover_engine::{IdempotentWriter, RetirementArchiver, RetirementOptions, UpsertRequest};
use cutover_test_utils::{fixtures, generators, DocumentId, MemoryStore};
use proptest::prelude::*;
use serde_json::json;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Whatever batch size and failure point, a legacy document is never
    /// gone from both the legacy and archive paths, and an archived copy
    /// carries the legacy content unchanged.
    #[test]
    fn prop_retirement_never_deletes_unarchived(
        count in 1usize..24,
        batch_size in 1usize..9,
        fail_at in proptest::option::of(1usize..6),
    ) {
        let store = Arc::new(MemoryStore::new());
        let org = fixtures::org("orgA");
        let ids = fixtures::seed_training_records(&store, &org, count);
        let config = Arc::new(MigrationConfig { batch_size, ..MigrationConfig::default() });
        let archiver = RetirementArchiver::new(store.clone(), config, "unknown");
        if let Some(n) = fail_at {
            store.fail_on_commit(n);
        }

        let options = RetirementOptions { force: true, ..Default::default() };
        let result = runtime().block_on(archiver.retire_legacy(Some(&org), &options));

        let legacy = "organisations/orgA/trainingRecords/";
        let archive = "organisations/orgA/modules/trainingTrack/_legacyArchive/trainingRecords/items/";
        for (i, id) in ids.iter().enumerate() {
            let original = fixtures::training_record(i);
            let in_legacy = store.document(&format!("{}{}", legacy, id));
            let in_archive = store.document(&format!("{}{}", archive, id));
            prop_assert!(in_legacy.is_some() || in_archive.is_some());
            if let Some(current) = &in_legacy {
                prop_assert_eq!(current, &original);
            }
            if let Some(mut archived) = in_archive {
                prop_assert!(archived.remove(RETIREMENT_META_FIELD).is_some());
                prop_assert_eq!(&archived, &original);
            }
        }
        if result.is_ok() {
            prop_assert!(store.paths_with_prefix(legacy).is_empty());
            prop_assert_eq!(store.paths_with_prefix(archive).len(), count);
        }
    }

    /// Under one key, only the first payload is ever applied.
    #[test]
    fn prop_idempotency_key_applies_once(
        key in generators::arb_idempotency_key(),
        flags in generators::arb_phase_flags(),
        statuses in proptest::collection::vec(generators::arb_status(), 1..6),
    ) {
        let config = MigrationConfig::default();
        let store = Arc::new(MemoryStore::new());
        let resolver = Arc::new(PathResolver::new(config.module_id.clone(), flags));
        let writer = IdempotentWriter::new(store.clone(), resolver.clone(), &config);
        let org = fixtures::org("orgA");
        let id = DocumentId::parse("r1").unwrap();

        let rt = runtime();
        let mut applied = 0;
        for status in &statuses {
            let request = UpsertRequest::new(
                org.clone(),
                id.clone(),
                fixtures::doc(json!({"status": status})),
            )
            .with_idempotency_key(key.clone());
            let result = rt.block_on(writer.upsert(request)).unwrap();
            if !result.skipped_by_idempotency {
                applied += 1;
            }
            prop_assert_eq!(&result.write_targets, &resolver.resolve_write_targets());
        }
        prop_assert_eq!(applied, 1);

        for mode in resolver.resolve_write_targets().modes() {
            let path = resolver.document_path(&org, &config.record_collection, &id, *mode);
            let stored = store.document(path.as_str()).unwrap();
            prop_assert_eq!(&stored["status"], &json!(statuses[0]));
        }
        if !resolver.resolve_write_targets().contains(StorageMode::Legacy) {
            let legacy = resolver.document_path(&org, &config.record_collection, &id, StorageMode::Legacy);
            prop_assert!(store.document(legacy.as_str()).is_none());
        }
    }
}
