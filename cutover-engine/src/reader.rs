//! Live-traffic read path: one source of truth per phase, no fan-out.

use std::sync::Arc;

use cutover_core::{
    CollectionName, CutoverResult, Document, DocumentId, MigrationConfig, OrgId, PathResolver,
    StorageMode,
};
use cutover_storage::DocumentStore;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResult {
    pub record_id: DocumentId,
    pub mode: StorageMode,
    pub exists: bool,
    pub data: Option<Document>,
}

pub struct Reader<S: DocumentStore> {
    store: Arc<S>,
    resolver: Arc<PathResolver>,
    collection: CollectionName,
}

impl<S: DocumentStore> Reader<S> {
    pub fn new(store: Arc<S>, resolver: Arc<PathResolver>, config: &MigrationConfig) -> Self {
        Self {
            store,
            resolver,
            collection: config.record_collection.clone(),
        }
    }

    pub async fn get(&self, org: &OrgId, record_id: &DocumentId) -> CutoverResult<ReadResult> {
        let mode = self.resolver.resolve_read_mode();
        let path = self
            .resolver
            .document_path(org, &self.collection, record_id, mode);
        let data = self.store.get(&path).await?;
        Ok(ReadResult {
            record_id: record_id.clone(),
            mode,
            exists: data.is_some(),
            data,
        })
    }
}
