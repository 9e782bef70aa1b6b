//! Read-only legacy/module comparison gating the read cutover.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use cutover_core::{
    pick_sample, stable_fields_match, CollectionName, CollectionPath, CutoverReport,
    CutoverResult, Document, DocumentId, MigrationConfig, OrgId, OrgParityReport,
    DEFAULT_SAMPLE_SIZE,
};
use cutover_storage::DocumentStore;

use crate::tenants::{for_each_tenant, resolve_tenants};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParityOptions {
    pub sample_size: usize,
    /// Compare this collection instead of the configured one.
    pub collection: Option<CollectionName>,
    pub concurrency: usize,
}

impl Default for ParityOptions {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            collection: None,
            concurrency: 1,
        }
    }
}

pub struct ParityReporter<S: DocumentStore> {
    store: Arc<S>,
    config: Arc<MigrationConfig>,
    project_id: String,
}

impl<S: DocumentStore> ParityReporter<S> {
    pub fn new(store: Arc<S>, config: Arc<MigrationConfig>, project_id: impl Into<String>) -> Self {
        Self {
            store,
            config,
            project_id: project_id.into(),
        }
    }

    pub async fn read_cutover_report(
        &self,
        org: Option<&OrgId>,
        options: &ParityOptions,
    ) -> CutoverResult<CutoverReport> {
        let started_at = Utc::now();
        let collection = options
            .collection
            .as_ref()
            .unwrap_or(&self.config.parity_collection);
        let orgs = resolve_tenants(self.store.as_ref(), org).await?;
        let org_count = orgs.len();

        let reports = for_each_tenant(orgs, options.concurrency, |org| async move {
            self.compare_org(&org, collection, options.sample_size).await
        })
        .await?;

        let has_issues = reports.iter().any(OrgParityReport::has_issues);
        if has_issues {
            tracing::warn!(org_count, "Read cutover report found parity issues");
        } else {
            tracing::info!(org_count, "Read cutover report is clean");
        }

        Ok(CutoverReport {
            report_version: self.config.report_version.clone(),
            project_id: self.project_id.clone(),
            module_id: self.config.module_id.to_string(),
            org_count,
            orgs: reports,
            started_at,
            finished_at: Utc::now(),
            has_issues,
        })
    }

    /// Compare one tenant's legacy and module copies of `collection`.
    pub async fn compare_org(
        &self,
        org: &OrgId,
        collection: &CollectionName,
        sample_size: usize,
    ) -> CutoverResult<OrgParityReport> {
        let legacy = self.load(&CollectionPath::tenant_root(org, collection)).await?;
        let module = self
            .load(&CollectionPath::module(org, &self.config.module_id, collection))
            .await?;

        let mut missing_in_module_count = 0;
        let mut common_ids = Vec::new();
        for id in legacy.keys() {
            if module.contains_key(id) {
                common_ids.push(id);
            } else {
                missing_in_module_count += 1;
            }
        }
        let module_only_count = module.keys().filter(|id| !legacy.contains_key(*id)).count();

        let sample = pick_sample(&common_ids, sample_size);
        let sample_mismatch_count = sample
            .iter()
            .filter(|id| match (legacy.get(**id), module.get(**id)) {
                (Some(l), Some(m)) => !stable_fields_match(l, m, &self.config.stable_fields),
                _ => true,
            })
            .count();

        let report = OrgParityReport {
            org_id: org.clone(),
            legacy_count: legacy.len(),
            module_count: module.len(),
            missing_in_module_count,
            module_only_count,
            sample_checked: sample.len(),
            sample_mismatch_count,
        };
        tracing::info!(
            org_id = %org,
            collection = %collection,
            legacy_count = report.legacy_count,
            module_count = report.module_count,
            missing_in_module_count,
            module_only_count,
            sample_mismatch_count,
            "Compared collection"
        );
        Ok(report)
    }

    async fn load(&self, collection: &CollectionPath) -> CutoverResult<BTreeMap<DocumentId, Document>> {
        Ok(self
            .store
            .list(collection)
            .await?
            .into_iter()
            .map(|doc| (doc.path.id().clone(), doc.data))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutover_storage::MemoryStore;
    use serde_json::{json, Value};

    fn put(store: &MemoryStore, path: CollectionPath, id: &str, data: Value) {
        store
            .insert(
                &path.doc(&DocumentId::parse(id).unwrap()),
                data.as_object().cloned().unwrap(),
            )
            .unwrap();
    }

    fn paths(org: &OrgId) -> (CollectionPath, CollectionPath) {
        let config = MigrationConfig::default();
        (
            CollectionPath::tenant_root(org, &config.parity_collection),
            CollectionPath::module(org, &config.module_id, &config.parity_collection),
        )
    }

    fn reporter(store: Arc<MemoryStore>) -> ParityReporter<MemoryStore> {
        ParityReporter::new(store, Arc::new(MigrationConfig::default()), "schooltrack-stg")
    }

    #[tokio::test]
    async fn test_counts_missing_and_module_only() {
        let store = Arc::new(MemoryStore::new());
        let org = OrgId::parse("orgA").unwrap();
        let (legacy, module) = paths(&org);
        put(&store, legacy.clone(), "r1", json!({"status": "valid"}));
        put(&store, legacy, "r2", json!({"status": "valid"}));
        put(&store, module.clone(), "r1", json!({"status": "valid", "migrationMeta": {}}));
        put(&store, module, "r3", json!({"status": "valid"}));

        let report = reporter(store)
            .read_cutover_report(Some(&org), &ParityOptions::default())
            .await
            .unwrap();
        let org_report = &report.orgs[0];
        assert_eq!(org_report.legacy_count, 2);
        assert_eq!(org_report.module_count, 2);
        assert_eq!(org_report.missing_in_module_count, 1);
        assert_eq!(org_report.module_only_count, 1);
        assert_eq!(org_report.sample_checked, 1);
        assert_eq!(org_report.sample_mismatch_count, 0);
        assert!(report.has_issues);
        assert_eq!(report.project_id, "schooltrack-stg");
    }

    #[tokio::test]
    async fn test_module_only_is_not_an_issue() {
        let store = Arc::new(MemoryStore::new());
        let org = OrgId::parse("orgA").unwrap();
        let (_, module) = paths(&org);
        put(&store, module, "r9", json!({"status": "valid"}));

        let report = reporter(store)
            .read_cutover_report(Some(&org), &ParityOptions::default())
            .await
            .unwrap();
        assert_eq!(report.orgs[0].module_only_count, 1);
        assert!(!report.has_issues);
    }

    #[tokio::test]
    async fn test_only_stable_fields_compared() {
        let store = Arc::new(MemoryStore::new());
        let org = OrgId::parse("orgA").unwrap();
        let (legacy, module) = paths(&org);
        put(&store, legacy.clone(), "r1", json!({"status": "valid", "updatedAt": "a"}));
        put(&store, module.clone(), "r1", json!({"status": "valid", "updatedAt": "b"}));
        put(&store, legacy, "r2", json!({"status": "valid"}));
        put(&store, module, "r2", json!({"status": "expired"}));

        let report = reporter(store)
            .read_cutover_report(Some(&org), &ParityOptions::default())
            .await
            .unwrap();
        assert_eq!(report.orgs[0].sample_mismatch_count, 1);
        assert!(report.has_issues);
    }

    #[tokio::test]
    async fn test_collection_override() {
        let store = Arc::new(MemoryStore::new());
        let org = OrgId::parse("orgA").unwrap();
        let types = CollectionName::parse("trainingTypes").unwrap();
        put(&store, CollectionPath::tenant_root(&org, &types), "tt1", json!({"name": "x"}));

        let options = ParityOptions {
            collection: Some(types),
            ..Default::default()
        };
        let report = reporter(store)
            .read_cutover_report(Some(&org), &options)
            .await
            .unwrap();
        assert_eq!(report.orgs[0].legacy_count, 1);
        assert_eq!(report.orgs[0].missing_in_module_count, 1);
    }
}
