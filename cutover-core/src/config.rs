//! Configuration for migration runs and the live write/read path.
//!
//! Nothing in this module reads process-global state implicitly: the
//! `from_env` constructors are called once at process start and the
//! resulting values are passed into the components that need them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::{CollectionName, ConfigError, CutoverResult, Document, ModuleId};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Largest number of operations the store accepts in one batch.
pub const MAX_BATCH_SIZE: usize = 500;

/// Operations per batch used by the offline tools.
pub const DEFAULT_BATCH_SIZE: usize = 400;

/// Default number of documents checked per collection.
pub const DEFAULT_SAMPLE_SIZE: usize = 10;

pub const ENV_DUAL_WRITE: &str = "CUTOVER_DUAL_WRITE";
pub const ENV_READ_FROM_MODULES: &str = "CUTOVER_READ_FROM_MODULES";
pub const ENV_LEGACY_WRITE_DISABLED: &str = "CUTOVER_LEGACY_WRITE_DISABLED";
pub const ENV_PROJECT_ID: &str = "CUTOVER_PROJECT_ID";
pub const ENV_STORE_PATH: &str = "CUTOVER_STORE_PATH";
pub const ENV_STORE_MAP_SIZE_MB: &str = "CUTOVER_STORE_MAP_SIZE_MB";

// ============================================================================
// PHASE FLAGS
// ============================================================================

/// The three migration-phase flags consumed by `PathResolver`.
///
/// Fields are private so that every instance has passed the consistency
/// checks in [`PhaseFlags::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseFlags {
    dual_write: bool,
    read_from_modules: bool,
    legacy_write_disabled: bool,
}

impl Default for PhaseFlags {
    /// The terminal phase: module-only writes, module reads.
    fn default() -> Self {
        Self {
            dual_write: false,
            read_from_modules: true,
            legacy_write_disabled: true,
        }
    }
}

impl PhaseFlags {
    /// Build a flag set, rejecting combinations the resolver cannot honour.
    pub fn new(
        dual_write: bool,
        read_from_modules: bool,
        legacy_write_disabled: bool,
    ) -> CutoverResult<Self> {
        if dual_write && legacy_write_disabled {
            return Err(ConfigError::IncompatibleOptions {
                option_a: ENV_DUAL_WRITE.to_string(),
                option_b: ENV_LEGACY_WRITE_DISABLED.to_string(),
            }
            .into());
        }
        // Legacy-only writes with module reads would hide every new write.
        if read_from_modules && !dual_write && !legacy_write_disabled {
            return Err(ConfigError::IncompatibleOptions {
                option_a: ENV_READ_FROM_MODULES.to_string(),
                option_b: format!("{}=false", ENV_LEGACY_WRITE_DISABLED),
            }
            .into());
        }
        Ok(Self {
            dual_write,
            read_from_modules,
            legacy_write_disabled,
        })
    }

    /// Load flags from the process environment.
    pub fn from_env() -> CutoverResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load flags through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> CutoverResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let dual_write = parse_bool_flag(ENV_DUAL_WRITE, lookup(ENV_DUAL_WRITE), defaults.dual_write)?;
        let read_from_modules = parse_bool_flag(
            ENV_READ_FROM_MODULES,
            lookup(ENV_READ_FROM_MODULES),
            defaults.read_from_modules,
        )?;
        let legacy_write_disabled = parse_bool_flag(
            ENV_LEGACY_WRITE_DISABLED,
            lookup(ENV_LEGACY_WRITE_DISABLED),
            defaults.legacy_write_disabled,
        )?;
        Self::new(dual_write, read_from_modules, legacy_write_disabled)
    }

    pub fn dual_write(&self) -> bool {
        self.dual_write
    }

    pub fn read_from_modules(&self) -> bool {
        self.read_from_modules
    }

    pub fn legacy_write_disabled(&self) -> bool {
        self.legacy_write_disabled
    }
}

fn parse_bool_flag(field: &str, raw: Option<String>, default: bool) -> CutoverResult<bool> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw,
            reason: "must be 'true' or 'false'".to_string(),
        }
        .into()),
    }
}

// ============================================================================
// STORE CONFIG
// ============================================================================

/// Store connection settings, built once at process start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Project label echoed in reports.
    pub project_id: String,
    /// LMDB environment directory.
    pub path: Option<PathBuf>,
    /// LMDB map size in megabytes.
    pub map_size_mb: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            project_id: "unknown".to_string(),
            path: None,
            map_size_mb: 1024,
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> CutoverResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> CutoverResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let project_id = lookup(ENV_PROJECT_ID)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.project_id);
        let path = lookup(ENV_STORE_PATH)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let map_size_mb = match lookup(ENV_STORE_MAP_SIZE_MB) {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                field: ENV_STORE_MAP_SIZE_MB.to_string(),
                value: raw.clone(),
                reason: "must be a positive integer".to_string(),
            })?,
            None => defaults.map_size_mb,
        };

        let config = Self {
            project_id,
            path,
            map_size_mb,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CutoverResult<()> {
        if self.map_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: ENV_STORE_MAP_SIZE_MB.to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        if self.map_size_bytes().is_none() {
            return Err(ConfigError::InvalidValue {
                field: ENV_STORE_MAP_SIZE_MB.to_string(),
                value: self.map_size_mb.to_string(),
                reason: "overflows the address space in bytes".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Map size in bytes, or `None` when it does not fit in `usize`.
    pub fn map_size_bytes(&self) -> Option<usize> {
        self.map_size_mb.checked_mul(1024 * 1024)
    }

    /// Store directory, required by the persistent backend.
    pub fn require_path(&self) -> CutoverResult<&PathBuf> {
        self.path.as_ref().ok_or_else(|| {
            ConfigError::MissingRequired {
                field: ENV_STORE_PATH.to_string(),
            }
            .into()
        })
    }
}

// ============================================================================
// COLLECTION PLANS
// ============================================================================

/// Predicate restricting which legacy documents a backfill moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DocumentFilter {
    /// Keep documents whose string field is one of the allowed values.
    FieldIn {
        field: String,
        values: BTreeSet<String>,
    },
}

impl DocumentFilter {
    pub fn field_in<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DocumentFilter::FieldIn {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            DocumentFilter::FieldIn { field, values } => match doc.get(field) {
                Some(Value::String(value)) => values.contains(value),
                _ => false,
            },
        }
    }
}

/// One collection to backfill, with an optional document filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionPlan {
    pub collection: CollectionName,
    pub filter: Option<DocumentFilter>,
}

impl CollectionPlan {
    pub fn all(collection: CollectionName) -> Self {
        Self {
            collection,
            filter: None,
        }
    }

    pub fn filtered(collection: CollectionName, filter: DocumentFilter) -> Self {
        Self {
            collection,
            filter: Some(filter),
        }
    }
}

// ============================================================================
// MIGRATION CONFIG
// ============================================================================

/// Module identity, version tags and collection plans for one migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    pub module_id: ModuleId,
    pub migration_version: String,
    pub report_version: String,
    pub retirement_version: String,
    pub seed_version: String,
    pub batch_size: usize,
    pub backfill_plan: Vec<CollectionPlan>,
    pub retirement_collections: Vec<CollectionName>,
    pub parity_collection: CollectionName,
    pub stable_fields: Vec<String>,
    /// Collection served by the live writer and reader.
    pub record_collection: CollectionName,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        let training_types = CollectionName::from_static("trainingTypes");
        let training_records = CollectionName::from_static("trainingRecords");
        let audit_logs = CollectionName::from_static("auditLogs");

        Self {
            module_id: ModuleId::from_static("trainingTrack"),
            migration_version: "2026-02-trainingtrack-modules-v1".to_string(),
            report_version: "2026-02-trainingtrack-read-cutover-v1".to_string(),
            retirement_version: "2026-02-trainingtrack-legacy-retirement-v1".to_string(),
            seed_version: "2026-02-trainingtrack-staging-seed-v1".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            backfill_plan: vec![
                CollectionPlan::all(training_types.clone()),
                CollectionPlan::all(training_records.clone()),
                CollectionPlan::filtered(
                    audit_logs.clone(),
                    DocumentFilter::field_in("entityType", ["trainingRecord", "trainingType"]),
                ),
            ],
            retirement_collections: vec![
                training_types,
                training_records.clone(),
                audit_logs,
            ],
            parity_collection: training_records.clone(),
            stable_fields: [
                "staffId",
                "schoolId",
                "trainingTypeId",
                "status",
                "provider",
                "notes",
                "issuedAt",
                "expiresAt",
                "daysToExpiry",
                "createdBy",
            ]
            .iter()
            .map(|f| f.to_string())
            .collect(),
            record_collection: training_records,
        }
    }
}

impl MigrationConfig {
    pub fn validate(&self) -> CutoverResult<()> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "batch_size".to_string(),
                value: self.batch_size.to_string(),
                reason: format!("must be between 1 and {}", MAX_BATCH_SIZE),
            }
            .into());
        }

        let versions = [
            ("migration_version", &self.migration_version),
            ("report_version", &self.report_version),
            ("retirement_version", &self.retirement_version),
            ("seed_version", &self.seed_version),
        ];
        for (field, value) in versions {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: field.to_string(),
                }
                .into());
            }
        }

        if self.backfill_plan.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "backfill_plan".to_string(),
            }
            .into());
        }
        if self.retirement_collections.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "retirement_collections".to_string(),
            }
            .into());
        }
        if self.stable_fields.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "stable_fields".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
