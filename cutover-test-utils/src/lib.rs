//! Cutover Test Utilities
//!
//! Shared test infrastructure for the cutover workspace:
//! - Proptest generators for identifiers, flags and records
//! - Fixtures for populating legacy collections
//! - Assertions for cutover error variants and store contents

pub use cutover_storage::MemoryStore;

pub use cutover_core::{
    CollectionName, CollectionPath, ConfigError, CutoverError, CutoverResult, Document,
    DocumentId, DocumentPath, IdempotencyKey, MigrationConfig, OrgId, PhaseFlags, StorageError,
    ValidationError,
};

use serde_json::{json, Value};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for cutover types.

    use super::*;
    use proptest::prelude::*;

    /// A path segment that passes validation.
    pub fn arb_segment() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9][a-zA-Z0-9_-]{0,23}"
    }

    pub fn arb_org_id() -> impl Strategy<Value = OrgId> {
        arb_segment().prop_filter_map("valid org id", |s| OrgId::parse(s).ok())
    }

    pub fn arb_document_id() -> impl Strategy<Value = DocumentId> {
        arb_segment().prop_filter_map("valid document id", |s| DocumentId::parse(s).ok())
    }

    pub fn arb_idempotency_key() -> impl Strategy<Value = IdempotencyKey> {
        "[a-z0-9:-]{1,64}".prop_filter_map("valid key", |s| IdempotencyKey::parse(s).ok())
    }

    /// Any flag combination the phase model accepts.
    pub fn arb_phase_flags() -> impl Strategy<Value = PhaseFlags> {
        any::<(bool, bool, bool)>().prop_filter_map("consistent phase", |(dual, read, disabled)| {
            PhaseFlags::new(dual, read, disabled).ok()
        })
    }

    pub fn arb_status() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("valid"), Just("expiring"), Just("expired")]
    }

    /// A training record payload with the fields parity compares.
    pub fn arb_training_record() -> impl Strategy<Value = Document> {
        (
            0u32..8,
            prop_oneof![
                Just("tt_safeguarding"),
                Just("tt_first_aid"),
                Just("tt_fire_safety")
            ],
            arb_status(),
            -400i64..1100,
            proptest::option::of("[A-Za-z ]{1,16}"),
        )
            .prop_map(|(staff, kind, status, days, notes)| {
                let mut record = super::fixtures::doc(json!({
                    "staffId": format!("staff_{}", staff),
                    "trainingTypeId": kind,
                    "status": status,
                    "daysToExpiry": days,
                    "provider": "EduSafe UK",
                }));
                if let Some(notes) = notes {
                    record.insert("notes".to_string(), Value::String(notes));
                }
                record
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Builders for stores populated with legacy tenant data.

    use super::*;

    /// Unwrap a JSON object literal into a document.
    #[track_caller]
    pub fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("Expected a JSON object, got: {}", other),
        }
    }

    #[track_caller]
    pub fn org(id: &str) -> OrgId {
        OrgId::parse(id).unwrap_or_else(|e| panic!("Invalid org id {:?}: {}", id, e))
    }

    #[track_caller]
    pub fn collection(name: &str) -> CollectionName {
        CollectionName::parse(name).unwrap_or_else(|e| panic!("Invalid collection {:?}: {}", name, e))
    }

    pub fn legacy_path(org: &OrgId, name: &str) -> CollectionPath {
        CollectionPath::tenant_root(org, &collection(name))
    }

    pub fn module_path(org: &OrgId, name: &str) -> CollectionPath {
        CollectionPath::module(org, &MigrationConfig::default().module_id, &collection(name))
    }

    /// A training record numbered `n`.
    pub fn training_record(n: usize) -> Document {
        doc(json!({
            "staffId": format!("staff_{}", n % 4),
            "schoolId": if n % 2 == 0 { "school_north" } else { "school_south" },
            "trainingTypeId": "tt_safeguarding",
            "issuedAt": "2025-12-01T00:00:00.000Z",
            "expiresAt": "2026-12-01T00:00:00.000Z",
            "provider": "EduSafe UK",
            "status": "valid",
            "daysToExpiry": 290,
            "notes": format!("Record {}", n),
        }))
    }

    /// Register `org` so tenant discovery finds it.
    pub fn register_org(store: &MemoryStore, org: &OrgId) {
        store
            .insert(&DocumentPath::organisation(org), doc(json!({"status": "active"})))
            .unwrap_or_else(|e| panic!("Failed to register {}: {}", org, e));
    }

    /// Put `count` documents built by `make` under the legacy `collection`.
    /// Ids are `{prefix}{index:03}` so listing order matches index order.
    pub fn seed_legacy<F>(
        store: &MemoryStore,
        org: &OrgId,
        collection: &str,
        prefix: &str,
        count: usize,
        make: F,
    ) -> Vec<DocumentId>
    where
        F: Fn(usize) -> Document,
    {
        let path = legacy_path(org, collection);
        (0..count)
            .map(|i| {
                let id = DocumentId::parse(format!("{}{:03}", prefix, i))
                    .unwrap_or_else(|e| panic!("Invalid document id: {}", e));
                store
                    .insert(&path.doc(&id), make(i))
                    .unwrap_or_else(|e| panic!("Failed to seed {}: {}", id, e));
                id
            })
            .collect()
    }

    /// Legacy `trainingRecords` with `count` numbered records.
    pub fn seed_training_records(store: &MemoryStore, org: &OrgId, count: usize) -> Vec<DocumentId> {
        seed_legacy(store, org, "trainingRecords", "rec_", count, training_record)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for cutover error variants and store contents.

    use super::*;

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &CutoverResult<T>) {
        match result {
            Err(CutoverError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_unsafe_retirement<T: std::fmt::Debug>(result: &CutoverResult<T>) {
        match result {
            Err(CutoverError::Validation(ValidationError::UnsafeRetirement)) => {}
            other => panic!("Expected UnsafeRetirement, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &CutoverResult<T>) {
        match result {
            Err(CutoverError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &CutoverResult<T>) {
        match result {
            Err(CutoverError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    /// Assert the number of documents directly or transitively under `prefix`.
    #[track_caller]
    pub fn assert_doc_count(store: &MemoryStore, prefix: &str, expected: usize) {
        let found = store.paths_with_prefix(prefix);
        assert_eq!(
            found.len(),
            expected,
            "Expected {} documents under {}, found {:?}",
            expected,
            prefix,
            found
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_seed_training_records_ordered_ids() {
        let store = MemoryStore::new();
        let org = fixtures::org("orgA");
        let ids = fixtures::seed_training_records(&store, &org, 12);
        assert_eq!(ids.len(), 12);
        assert_eq!(ids[0].as_str(), "rec_000");
        assert_eq!(ids[11].as_str(), "rec_011");
        assertions::assert_doc_count(&store, "organisations/orgA/trainingRecords/", 12);
    }

    #[test]
    fn test_register_org() {
        let store = MemoryStore::new();
        fixtures::register_org(&store, &fixtures::org("orgA"));
        assert!(store.document("organisations/orgA").is_some());
    }

    #[test]
    #[should_panic(expected = "Expected a JSON object")]
    fn test_doc_rejects_non_object() {
        fixtures::doc(json!([1, 2]));
    }

    #[test]
    fn test_assert_unsafe_retirement() {
        let result: CutoverResult<()> = Err(ValidationError::UnsafeRetirement.into());
        assertions::assert_unsafe_retirement(&result);
        assertions::assert_validation_error(&result);
    }

    mod prop_tests {
        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn prop_phase_flags_never_dual_and_disabled(flags in generators::arb_phase_flags()) {
                prop_assert!(!(flags.dual_write() && flags.legacy_write_disabled()));
            }

            #[test]
            fn prop_training_record_has_status(record in generators::arb_training_record()) {
                prop_assert!(record.get("status").and_then(Value::as_str).is_some());
            }
        }
    }
}
