//! End-to-end cutover scenarios against the in-memory store.

use std::sync::Arc;

use cutover_core::{MigrationConfig, PathResolver, PhaseFlags, StorageMode};
use cutover_engine::{
    BackfillOptions, BackfillRunner, IdempotentWriter, ParityOptions, ParityReporter, Reader,
    RetirementArchiver, RetirementOptions, SeedLayout, StagingSeeder, UpsertRequest,
};
use cutover_test_utils::{assertions, fixtures, DocumentId, IdempotencyKey, MemoryStore};
use serde_json::json;

fn config() -> Arc<MigrationConfig> {
    Arc::new(MigrationConfig::default())
}

#[tokio::test]
async fn test_backfill_twelve_records() {
    let store = Arc::new(MemoryStore::new());
    let org = fixtures::org("orgA");
    fixtures::seed_training_records(&store, &org, 12);

    let report = BackfillRunner::new(store.clone(), config())
        .run(Some(&org), &BackfillOptions::default())
        .await
        .unwrap();

    let records = &report.orgs[0].collections[1];
    assert_eq!(records.collection.as_str(), "trainingRecords");
    assert_eq!(records.source_count, 12);
    assert_eq!(records.write_count, 12);
    assert_eq!(records.target_count, 12);
    assert_eq!(records.missing_target_count, 0);
    assert_eq!(records.sample_checked, 10);
    assert_eq!(records.sample_mismatch_count, 0);
    assert!(!report.has_parity_issues());
    assert_eq!(report.orgs[0].totals.write_count, 12);
}

#[tokio::test]
async fn test_idempotent_replay_keeps_first_payload() {
    let store = Arc::new(MemoryStore::new());
    let config = MigrationConfig::default();
    let resolver = Arc::new(PathResolver::new(config.module_id.clone(), PhaseFlags::default()));
    let writer = IdempotentWriter::new(store.clone(), resolver.clone(), &config);
    let org = fixtures::org("orgA");
    let id = DocumentId::parse("r1").unwrap();
    let key = IdempotencyKey::parse("k1").unwrap();

    let first = writer
        .upsert(
            UpsertRequest::new(org.clone(), id.clone(), fixtures::doc(json!({"status": "valid"})))
                .with_idempotency_key(key.clone()),
        )
        .await
        .unwrap();
    let second = writer
        .upsert(
            UpsertRequest::new(org.clone(), id.clone(), fixtures::doc(json!({"status": "expired"})))
                .with_idempotency_key(key),
        )
        .await
        .unwrap();

    assert!(!first.skipped_by_idempotency);
    assert!(second.skipped_by_idempotency);
    assert_eq!(second.write_targets, first.write_targets);

    let read = Reader::new(store.clone(), resolver.clone(), &config)
        .get(&org, &id)
        .await
        .unwrap();
    assert_eq!(read.mode, StorageMode::Module);
    assert!(read.exists);
    assert_eq!(read.data.unwrap()["status"], json!("valid"));

    // Both calls emit telemetry.
    assertions::assert_doc_count(
        &store,
        &format!("{}/", resolver.telemetry_collection(&org)),
        2,
    );
}

#[tokio::test]
async fn test_backfill_then_report_is_clean() {
    let store = Arc::new(MemoryStore::new());
    let org = fixtures::org("orgA");
    fixtures::register_org(&store, &org);
    fixtures::seed_training_records(&store, &org, 7);

    BackfillRunner::new(store.clone(), config())
        .run(None, &BackfillOptions::default())
        .await
        .unwrap();
    let report = ParityReporter::new(store.clone(), config(), "schooltrack-stg")
        .read_cutover_report(None, &ParityOptions::default())
        .await
        .unwrap();

    assert_eq!(report.org_count, 1);
    assert_eq!(report.orgs[0].legacy_count, 7);
    assert_eq!(report.orgs[0].module_count, 7);
    assert_eq!(report.orgs[0].sample_checked, 7);
    assert!(!report.has_issues);
}

#[tokio::test]
async fn test_report_flags_unmigrated_tenant() {
    let store = Arc::new(MemoryStore::new());
    let migrated = fixtures::org("orgA");
    let pending = fixtures::org("orgB");
    for org in [&migrated, &pending] {
        fixtures::register_org(&store, org);
        fixtures::seed_training_records(&store, org, 3);
    }
    BackfillRunner::new(store.clone(), config())
        .run(Some(&migrated), &BackfillOptions::default())
        .await
        .unwrap();

    let report = ParityReporter::new(store.clone(), config(), "unknown")
        .read_cutover_report(None, &ParityOptions::default())
        .await
        .unwrap();
    assert_eq!(report.org_count, 2);
    assert!(!report.orgs[0].has_issues());
    assert_eq!(report.orgs[1].missing_in_module_count, 3);
    assert!(report.has_issues);
}

#[tokio::test]
async fn test_archive_only_keeps_legacy() {
    let store = Arc::new(MemoryStore::new());
    let org = fixtures::org("orgA");
    fixtures::seed_legacy(&store, &org, "trainingTypes", "tt_", 5, |i| {
        fixtures::doc(json!({"name": format!("Type {}", i)}))
    });

    let options = RetirementOptions {
        archive_only: true,
        ..Default::default()
    };
    let report = RetirementArchiver::new(store.clone(), config(), "unknown")
        .retire_legacy(Some(&org), &options)
        .await
        .unwrap();

    assert!(!report.force_delete);
    let types = &report.orgs[0].collections[0];
    assert_eq!(types.archived_count, 5);
    assert_eq!(types.deleted_count, 0);
    assertions::assert_doc_count(&store, "organisations/orgA/trainingTypes/", 5);
    assertions::assert_doc_count(
        &store,
        "organisations/orgA/modules/trainingTrack/_legacyArchive/trainingTypes/items/",
        5,
    );
}

#[tokio::test]
async fn test_retirement_gate_rejects_bare_invocation() {
    let store = Arc::new(MemoryStore::new());
    let org = fixtures::org("orgA");
    fixtures::seed_training_records(&store, &org, 2);

    let result = RetirementArchiver::new(store.clone(), config(), "unknown")
        .retire_legacy(Some(&org), &RetirementOptions::default())
        .await;
    assertions::assert_unsafe_retirement(&result);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_seeded_legacy_layout_rehearses_full_cutover() {
    let store = Arc::new(MemoryStore::new());
    let org = fixtures::org("stgPilotOrgA");
    StagingSeeder::new(store.clone(), config(), "stg")
        .seed(&org, SeedLayout::Legacy, false)
        .await
        .unwrap();

    let backfill = BackfillRunner::new(store.clone(), config())
        .run(None, &BackfillOptions::default())
        .await
        .unwrap();
    assert_eq!(backfill.org_count, 1);
    assert_eq!(backfill.orgs[0].totals.source_count, 15);
    assert!(!backfill.has_parity_issues());

    let parity = ParityReporter::new(store.clone(), config(), "stg")
        .read_cutover_report(None, &ParityOptions::default())
        .await
        .unwrap();
    assert!(!parity.has_issues);

    let options = RetirementOptions {
        force: true,
        ..Default::default()
    };
    let retired = RetirementArchiver::new(store.clone(), config(), "stg")
        .retire_legacy(None, &options)
        .await
        .unwrap();
    assert_eq!(retired.orgs[0].totals.deleted_count, 15);
    assertions::assert_doc_count(&store, "organisations/stgPilotOrgA/trainingRecords/", 0);
    assertions::assert_doc_count(
        &store,
        "organisations/stgPilotOrgA/modules/trainingTrack/trainingRecords/",
        11,
    );
}
