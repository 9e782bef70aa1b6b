//! Bulk copy of legacy collections into their module counterparts.
//!
//! Each document is merged into the module path under the same id with a
//! `migrationMeta` stamp, in capped batches. After writing, the full module
//! collection is re-read to count missing ids, and a deterministic sample of
//! source documents is checked field by field.
//!
//! Writes are id-keyed merges, so re-running after a partial failure only
//! re-applies the same merges.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use cutover_core::{
    pick_sample, source_subset_matches_target, to_document, BackfillReport, CollectionBackfillReport,
    CollectionPath, CollectionPlan, CutoverResult, DocumentId, MigrationConfig, MigrationMeta,
    OrgBackfillReport, OrgId, DEFAULT_SAMPLE_SIZE, MIGRATION_META_FIELD,
};
use cutover_storage::{DocumentStore, StoredDocument, WriteOp};
use serde_json::Value;

use crate::batch::BatchWriter;
use crate::tenants::{for_each_tenant, resolve_tenants};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillOptions {
    pub dry_run: bool,
    pub sample_size: usize,
    /// Cap on documents moved per collection, for staged rollout.
    pub limit: Option<usize>,
    /// Tenants processed at once.
    pub concurrency: usize,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            sample_size: DEFAULT_SAMPLE_SIZE,
            limit: None,
            concurrency: 1,
        }
    }
}

pub struct BackfillRunner<S: DocumentStore> {
    store: Arc<S>,
    config: Arc<MigrationConfig>,
}

impl<S: DocumentStore> BackfillRunner<S> {
    pub fn new(store: Arc<S>, config: Arc<MigrationConfig>) -> Self {
        Self { store, config }
    }

    /// Backfill every planned collection for the selected tenants.
    pub async fn run(
        &self,
        org: Option<&OrgId>,
        options: &BackfillOptions,
    ) -> CutoverResult<BackfillReport> {
        let started_at = Utc::now();
        let orgs = resolve_tenants(self.store.as_ref(), org).await?;
        let org_count = orgs.len();

        let reports = for_each_tenant(orgs, options.concurrency, |org| async move {
            self.migrate_org(&org, options).await
        })
        .await?;

        let report = BackfillReport {
            migration_version: self.config.migration_version.clone(),
            module_id: self.config.module_id.to_string(),
            dry_run: options.dry_run,
            org_count,
            orgs: reports,
            started_at,
            finished_at: Utc::now(),
        };
        if report.has_parity_issues() {
            tracing::warn!(dry_run = options.dry_run, "Backfill finished with parity issues");
        } else {
            tracing::info!(org_count, dry_run = options.dry_run, "Backfill finished");
        }
        Ok(report)
    }

    /// Backfill every planned collection for one tenant, in plan order.
    pub async fn migrate_org(
        &self,
        org: &OrgId,
        options: &BackfillOptions,
    ) -> CutoverResult<OrgBackfillReport> {
        let mut collections = Vec::with_capacity(self.config.backfill_plan.len());
        for plan in &self.config.backfill_plan {
            collections.push(self.migrate_collection(org, plan, options).await?);
        }
        Ok(OrgBackfillReport::new(org.clone(), collections))
    }

    pub async fn migrate_collection(
        &self,
        org: &OrgId,
        plan: &CollectionPlan,
        options: &BackfillOptions,
    ) -> CutoverResult<CollectionBackfillReport> {
        let source = CollectionPath::tenant_root(org, &plan.collection);
        let target = CollectionPath::module(org, &self.config.module_id, &plan.collection);

        let mut source_docs = self.store.list(&source).await?;
        if let Some(filter) = &plan.filter {
            source_docs.retain(|doc| filter.matches(&doc.data));
        }
        if let Some(limit) = options.limit {
            source_docs.truncate(limit);
        }

        let write_count = if options.dry_run {
            0
        } else {
            self.write_targets(&target, &source_docs).await?
        };

        let target_docs = self.store.list(&target).await?;
        let target_count = target_docs.len();
        let target_by_id: BTreeMap<DocumentId, StoredDocument> = target_docs
            .into_iter()
            .map(|doc| (doc.id().clone(), doc))
            .collect();

        let missing_target_count = source_docs
            .iter()
            .filter(|doc| !target_by_id.contains_key(doc.id()))
            .count();

        let sample = pick_sample(&source_docs, options.sample_size);
        let sample_mismatch_count = sample
            .iter()
            .filter(|doc| match target_by_id.get(doc.id()) {
                Some(target_doc) => !source_subset_matches_target(&doc.data, &target_doc.data),
                None => true,
            })
            .count();

        tracing::info!(
            org_id = %org,
            collection = %plan.collection,
            source_count = source_docs.len(),
            target_count,
            write_count,
            missing_target_count,
            sample_checked = sample.len(),
            sample_mismatch_count,
            dry_run = options.dry_run,
            "Backfilled collection"
        );

        Ok(CollectionBackfillReport {
            collection: plan.collection.clone(),
            source_path: source.to_string(),
            target_path: target.to_string(),
            source_count: source_docs.len(),
            target_count,
            write_count,
            missing_target_count,
            sample_checked: sample.len(),
            sample_mismatch_count,
        })
    }

    async fn write_targets(
        &self,
        target: &CollectionPath,
        source_docs: &[StoredDocument],
    ) -> CutoverResult<usize> {
        let migrated_at = Utc::now();
        let mut writer = BatchWriter::new(self.store.as_ref(), self.config.batch_size);
        for doc in source_docs {
            let meta = MigrationMeta {
                version: self.config.migration_version.clone(),
                source_path: doc.path.to_string(),
                migrated_at,
            };
            let mut data = doc.data.clone();
            data.insert(
                MIGRATION_META_FIELD.to_string(),
                Value::Object(to_document(&meta)?),
            );
            writer
                .push(WriteOp::SetMerge {
                    path: target.doc(doc.id()),
                    data,
                })
                .await?;
        }
        writer.finish().await
    }
}
