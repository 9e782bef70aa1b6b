//! Cutover Storage - Document Store Abstraction
//!
//! The migration engine talks to a transactional document store through
//! [`DocumentStore`]. Two backends ship here: [`MemoryStore`] for tests and
//! rehearsals, and [`LmdbStore`] for persistent stores on local disk.

pub mod lmdb;
pub mod memory;

pub use lmdb::{LmdbStore, LmdbStoreError};
pub use memory::MemoryStore;

use async_trait::async_trait;
use cutover_core::{
    CollectionPath, CutoverResult, Document, DocumentId, DocumentPath, StorageError,
    MAX_BATCH_SIZE,
};

// ============================================================================
// WRITE OPERATIONS
// ============================================================================

/// A single staged write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Shallow merge: payload fields overwrite, other fields are preserved.
    /// Creates the document when absent.
    SetMerge { path: DocumentPath, data: Document },
    /// Replace the whole document.
    Set { path: DocumentPath, data: Document },
    /// Remove the document. Deleting an absent document is not an error.
    Delete { path: DocumentPath },
}

impl WriteOp {
    pub fn path(&self) -> &DocumentPath {
        match self {
            WriteOp::SetMerge { path, .. } | WriteOp::Set { path, .. } | WriteOp::Delete { path } => {
                path
            }
        }
    }
}

/// Writes committed together as one all-or-nothing unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_merge(&mut self, path: DocumentPath, data: Document) -> &mut Self {
        self.ops.push(WriteOp::SetMerge { path, data });
        self
    }

    pub fn set(&mut self, path: DocumentPath, data: Document) -> &mut Self {
        self.ops.push(WriteOp::Set { path, data });
        self
    }

    pub fn delete(&mut self, path: DocumentPath) -> &mut Self {
        self.ops.push(WriteOp::Delete { path });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    /// Reject batches larger than the store accepts.
    pub fn check_size(&self) -> CutoverResult<()> {
        if self.ops.len() > MAX_BATCH_SIZE {
            return Err(StorageError::Backend {
                reason: format!(
                    "batch of {} writes exceeds the limit of {}",
                    self.ops.len(),
                    MAX_BATCH_SIZE
                ),
            }
            .into());
        }
        Ok(())
    }
}

impl From<Vec<WriteOp>> for WriteBatch {
    fn from(ops: Vec<WriteOp>) -> Self {
        Self { ops }
    }
}

/// Apply a shallow merge of `patch` onto `existing`.
pub fn merge_documents(existing: Option<Document>, patch: &Document) -> Document {
    let mut merged = existing.unwrap_or_default();
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// A document read back from a collection listing.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub path: DocumentPath,
    pub data: Document,
}

impl StoredDocument {
    pub fn id(&self) -> &DocumentId {
        self.path.id()
    }
}

/// Read-then-write unit of work.
///
/// Reads observe the committed state as of the start of the transaction;
/// staged writes are not visible to later reads in the same transaction.
pub trait Transaction {
    fn get(&self, path: &DocumentPath) -> CutoverResult<Option<Document>>;

    fn stage(&mut self, op: WriteOp);

    fn set_merge(&mut self, path: DocumentPath, data: Document) {
        self.stage(WriteOp::SetMerge { path, data });
    }

    fn set(&mut self, path: DocumentPath, data: Document) {
        self.stage(WriteOp::Set { path, data });
    }

    fn delete(&mut self, path: DocumentPath) {
        self.stage(WriteOp::Delete { path });
    }
}

/// Transactional document store client.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document.
    async fn get(&self, path: &DocumentPath) -> CutoverResult<Option<Document>>;

    /// Direct children of a collection, ordered by document id.
    async fn list(&self, collection: &CollectionPath) -> CutoverResult<Vec<StoredDocument>>;

    /// Apply every write in the batch, or none of them.
    async fn commit(&self, batch: WriteBatch) -> CutoverResult<()>;

    /// Run `f` as a serializable transaction. Writes staged by `f` are
    /// applied atomically when it returns `Ok`, and discarded otherwise.
    async fn run_transaction<T, F>(&self, f: F) -> CutoverResult<T>
    where
        T: Send,
        F: FnOnce(&mut dyn Transaction) -> CutoverResult<T> + Send;
}

/// Storage key prefix for the direct children of a collection.
pub(crate) fn child_prefix(collection: &CollectionPath) -> String {
    format!("{}/", collection.as_str())
}

/// Document id of `key` when it is a direct child under `prefix`.
pub(crate) fn direct_child_id<'k>(key: &'k str, prefix: &str) -> Option<&'k str> {
    let rest = key.strip_prefix(prefix)?;
    if rest.is_empty() || rest.contains('/') {
        None
    } else {
        Some(rest)
    }
}
