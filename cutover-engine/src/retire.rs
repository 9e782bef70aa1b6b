//! Archive legacy documents into the module namespace and, when forced,
//! delete the originals.
//!
//! The archive write for a document and the delete of its original are
//! pushed as one group, so they always commit in the same batch.

use std::sync::Arc;

use chrono::Utc;
use cutover_core::{
    to_document, CollectionName, CollectionPath, CollectionRetirementReport, CutoverResult,
    MigrationConfig, OrgId, OrgRetirementReport, RetirementMeta, RetirementReport,
    ValidationError, RETIREMENT_META_FIELD,
};
use cutover_storage::{DocumentStore, WriteOp};
use serde_json::Value;

use crate::batch::BatchWriter;
use crate::tenants::{for_each_tenant, resolve_tenants};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetirementOptions {
    pub dry_run: bool,
    pub archive_only: bool,
    pub force: bool,
    pub limit: Option<usize>,
    pub concurrency: usize,
}

impl RetirementOptions {
    /// Refuse invocations that would delete without explicit consent.
    pub fn validate(&self) -> CutoverResult<()> {
        if !self.dry_run && !self.archive_only && !self.force {
            return Err(ValidationError::UnsafeRetirement.into());
        }
        Ok(())
    }

    /// Whether originals are deleted after archiving.
    pub fn deletes_originals(&self) -> bool {
        self.force && !self.archive_only
    }
}

pub struct RetirementArchiver<S: DocumentStore> {
    store: Arc<S>,
    config: Arc<MigrationConfig>,
    project_id: String,
}

impl<S: DocumentStore> RetirementArchiver<S> {
    pub fn new(store: Arc<S>, config: Arc<MigrationConfig>, project_id: impl Into<String>) -> Self {
        Self {
            store,
            config,
            project_id: project_id.into(),
        }
    }

    /// Retire every configured legacy collection for the selected tenants.
    ///
    /// Options are validated before any store access.
    pub async fn retire_legacy(
        &self,
        org: Option<&OrgId>,
        options: &RetirementOptions,
    ) -> CutoverResult<RetirementReport> {
        options.validate()?;

        let started_at = Utc::now();
        let orgs = resolve_tenants(self.store.as_ref(), org).await?;
        let org_count = orgs.len();

        let reports = for_each_tenant(orgs, options.concurrency, |org| async move {
            self.retire_org(&org, options).await
        })
        .await?;

        tracing::info!(
            org_count,
            dry_run = options.dry_run,
            archive_only = options.archive_only,
            force_delete = options.deletes_originals(),
            "Legacy retirement finished"
        );

        Ok(RetirementReport {
            version: self.config.retirement_version.clone(),
            project_id: self.project_id.clone(),
            dry_run: options.dry_run,
            archive_only: options.archive_only,
            force_delete: options.deletes_originals(),
            org_count,
            orgs: reports,
            started_at,
            finished_at: Utc::now(),
        })
    }

    pub async fn retire_org(
        &self,
        org: &OrgId,
        options: &RetirementOptions,
    ) -> CutoverResult<OrgRetirementReport> {
        options.validate()?;
        let mut collections = Vec::with_capacity(self.config.retirement_collections.len());
        for collection in &self.config.retirement_collections {
            collections.push(self.retire_collection(org, collection, options).await?);
        }
        Ok(OrgRetirementReport::new(org.clone(), collections))
    }

    pub async fn retire_collection(
        &self,
        org: &OrgId,
        collection: &CollectionName,
        options: &RetirementOptions,
    ) -> CutoverResult<CollectionRetirementReport> {
        options.validate()?;
        let source = CollectionPath::tenant_root(org, collection);
        let archive = CollectionPath::archive(org, &self.config.module_id, collection);

        let mut docs = self.store.list(&source).await?;
        if let Some(limit) = options.limit {
            docs.truncate(limit);
        }

        let mut archived_count = 0;
        let mut deleted_count = 0;
        if !options.dry_run {
            let archived_at = Utc::now();
            let delete = options.deletes_originals();
            let mut writer = BatchWriter::new(self.store.as_ref(), self.config.batch_size);
            for doc in &docs {
                let meta = RetirementMeta {
                    version: self.config.retirement_version.clone(),
                    source_path: doc.path.to_string(),
                    archived_at,
                };
                let mut data = doc.data.clone();
                data.insert(
                    RETIREMENT_META_FIELD.to_string(),
                    Value::Object(to_document(&meta)?),
                );

                let mut group = vec![WriteOp::SetMerge {
                    path: archive.doc(doc.id()),
                    data,
                }];
                archived_count += 1;
                if delete {
                    group.push(WriteOp::Delete {
                        path: doc.path.clone(),
                    });
                    deleted_count += 1;
                }
                writer.push_group(group).await?;
            }
            writer.finish().await?;
        }

        tracing::info!(
            org_id = %org,
            collection = %collection,
            source_count = docs.len(),
            archived_count,
            deleted_count,
            dry_run = options.dry_run,
            "Retired legacy collection"
        );

        Ok(CollectionRetirementReport {
            collection: collection.clone(),
            source_count: docs.len(),
            archived_count,
            deleted_count,
        })
    }
}
