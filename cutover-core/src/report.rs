//! Structured reports printed by the offline tools.
//!
//! One document per invocation: a version tag, a per-tenant breakdown and
//! aggregate totals.

use serde::{Deserialize, Serialize};

use crate::identity::timestamp_format;
use crate::{CollectionName, OrgId, Timestamp};

// ============================================================================
// BACKFILL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionBackfillReport {
    pub collection: CollectionName,
    pub source_path: String,
    pub target_path: String,
    pub source_count: usize,
    pub target_count: usize,
    pub write_count: usize,
    pub missing_target_count: usize,
    pub sample_checked: usize,
    pub sample_mismatch_count: usize,
}

impl CollectionBackfillReport {
    pub fn has_issues(&self) -> bool {
        self.missing_target_count > 0 || self.sample_mismatch_count > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillTotals {
    pub source_count: usize,
    pub write_count: usize,
    pub missing_target_count: usize,
    pub sample_mismatch_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgBackfillReport {
    pub org_id: OrgId,
    pub collections: Vec<CollectionBackfillReport>,
    pub totals: BackfillTotals,
}

impl OrgBackfillReport {
    pub fn new(org_id: OrgId, collections: Vec<CollectionBackfillReport>) -> Self {
        let totals = collections
            .iter()
            .fold(BackfillTotals::default(), |mut acc, c| {
                acc.source_count += c.source_count;
                acc.write_count += c.write_count;
                acc.missing_target_count += c.missing_target_count;
                acc.sample_mismatch_count += c.sample_mismatch_count;
                acc
            });
        Self {
            org_id,
            collections,
            totals,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub migration_version: String,
    pub module_id: String,
    pub dry_run: bool,
    pub org_count: usize,
    pub orgs: Vec<OrgBackfillReport>,
    #[serde(with = "timestamp_format")]
    pub started_at: Timestamp,
    #[serde(with = "timestamp_format")]
    pub finished_at: Timestamp,
}

impl BackfillReport {
    /// Missing or mismatched documents in any tenant.
    ///
    /// Advisory during backfill: the run still completes, and only a
    /// non-dry-run invocation turns this into a failing exit status.
    pub fn has_parity_issues(&self) -> bool {
        self.orgs
            .iter()
            .any(|org| org.totals.missing_target_count > 0 || org.totals.sample_mismatch_count > 0)
    }
}

// ============================================================================
// READ CUTOVER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgParityReport {
    pub org_id: OrgId,
    pub legacy_count: usize,
    pub module_count: usize,
    pub missing_in_module_count: usize,
    pub module_only_count: usize,
    pub sample_checked: usize,
    pub sample_mismatch_count: usize,
}

impl OrgParityReport {
    /// Module-only documents are expected once writes land module-only and
    /// do not count as an issue.
    pub fn has_issues(&self) -> bool {
        self.missing_in_module_count > 0 || self.sample_mismatch_count > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CutoverReport {
    pub report_version: String,
    pub project_id: String,
    pub module_id: String,
    pub org_count: usize,
    pub orgs: Vec<OrgParityReport>,
    #[serde(with = "timestamp_format")]
    pub started_at: Timestamp,
    #[serde(with = "timestamp_format")]
    pub finished_at: Timestamp,
    pub has_issues: bool,
}

// ============================================================================
// RETIREMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRetirementReport {
    pub collection: CollectionName,
    pub source_count: usize,
    pub archived_count: usize,
    pub deleted_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementTotals {
    pub source_count: usize,
    pub archived_count: usize,
    pub deleted_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgRetirementReport {
    pub org_id: OrgId,
    pub collections: Vec<CollectionRetirementReport>,
    pub totals: RetirementTotals,
}

impl OrgRetirementReport {
    pub fn new(org_id: OrgId, collections: Vec<CollectionRetirementReport>) -> Self {
        let totals = collections
            .iter()
            .fold(RetirementTotals::default(), |mut acc, c| {
                acc.source_count += c.source_count;
                acc.archived_count += c.archived_count;
                acc.deleted_count += c.deleted_count;
                acc
            });
        Self {
            org_id,
            collections,
            totals,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementReport {
    pub version: String,
    pub project_id: String,
    pub dry_run: bool,
    pub archive_only: bool,
    pub force_delete: bool,
    pub org_count: usize,
    pub orgs: Vec<OrgRetirementReport>,
    #[serde(with = "timestamp_format")]
    pub started_at: Timestamp,
    #[serde(with = "timestamp_format")]
    pub finished_at: Timestamp,
}

// ============================================================================
// STAGING SEED
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedTotals {
    pub docs_prepared: usize,
    pub schools: usize,
    pub users: usize,
    pub staff: usize,
    pub training_types: usize,
    pub training_records: usize,
    pub audit_logs: usize,
    pub aggregates: usize,
    pub module_health: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedSummary {
    pub version: String,
    pub project_id: String,
    pub dry_run: bool,
    pub org_id: OrgId,
    pub totals: SeedTotals,
    #[serde(with = "timestamp_format")]
    pub written_at: Timestamp,
}

// ============================================================================
// ENVELOPE
// ============================================================================

/// Any report a tool can emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Report {
    Backfill(BackfillReport),
    ReadCutover(CutoverReport),
    Retirement(RetirementReport),
    Seed(SeedSummary),
}

impl Report {
    /// Pretty-printed JSON, as written to stdout.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
