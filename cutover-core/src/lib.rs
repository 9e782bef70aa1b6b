//! Cutover Core - Data Types and Path Policy
//!
//! Pure data for the tenant collection migration: validated identifiers,
//! the storage path contract, phase configuration, ledger and telemetry
//! records, reports and the comparison helpers shared by the offline tools.
//! No I/O happens in this crate.

pub mod compare;
pub mod config;
pub mod error;
pub mod identity;
pub mod paths;
pub mod records;
pub mod report;

pub use compare::{pick_sample, sample_indices, source_subset_matches_target, stable_fields_match};
pub use config::{
    CollectionPlan, DocumentFilter, MigrationConfig, PhaseFlags, StoreConfig, DEFAULT_BATCH_SIZE,
    DEFAULT_SAMPLE_SIZE, MAX_BATCH_SIZE,
};
pub use error::{ConfigError, CutoverError, CutoverResult, StorageError, ValidationError};
pub use identity::{
    document_fingerprint, format_timestamp, CollectionName, Document, DocumentId, IdempotencyKey,
    ModuleId, OrgId, Timestamp,
};
pub use paths::{CollectionPath, DocumentPath, PathResolver, StorageMode, WriteTargets};
pub use records::{
    to_document, MigrationMeta, MigrationOperation, OperationType, RetirementMeta,
    TelemetryEvent, MIGRATION_META_FIELD, RETIREMENT_META_FIELD, UNKNOWN_SOURCE,
};
pub use report::{
    BackfillReport, BackfillTotals, CollectionBackfillReport, CollectionRetirementReport,
    CutoverReport, OrgBackfillReport, OrgParityReport, OrgRetirementReport, Report,
    RetirementReport, RetirementTotals, SeedSummary, SeedTotals,
};
