//! In-memory document store for tests and rehearsals.
//!
//! Failures can be injected to exercise partial-batch behaviour: fail the
//! Nth `commit`, or fail every write that touches a path prefix.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use cutover_core::{
    CollectionPath, CutoverResult, Document, DocumentId, DocumentPath, StorageError,
    MAX_BATCH_SIZE,
};

use crate::{
    child_prefix, direct_child_id, merge_documents, DocumentStore, StoredDocument, Transaction,
    WriteBatch, WriteOp,
};

#[derive(Debug, Default)]
struct FaultPlan {
    /// 1-based index of the commit that fails.
    fail_commit_at: Option<usize>,
    /// Writes under this path prefix fail.
    fail_prefix: Option<String>,
}

/// Document store backed by an ordered map.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    docs: Arc<RwLock<BTreeMap<String, Document>>>,
    faults: Arc<Mutex<FaultPlan>>,
    commits: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`th call to `commit` (1-based, counting from now) fail
    /// without applying any of its writes.
    pub fn fail_on_commit(&self, n: usize) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.fail_commit_at = Some(self.commits.load(Ordering::SeqCst) + n);
        }
    }

    /// Make every batch or transaction that writes under `prefix` fail.
    pub fn fail_writes_under(&self, prefix: impl Into<String>) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.fail_prefix = Some(prefix.into());
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            *faults = FaultPlan::default();
        }
    }

    /// Number of `commit` calls seen so far, including failed ones.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Write a document directly, bypassing fault injection.
    pub fn insert(&self, path: &DocumentPath, data: Document) -> CutoverResult<()> {
        let mut docs = self.docs.write().map_err(|_| StorageError::LockPoisoned)?;
        docs.insert(path.as_str().to_string(), data);
        Ok(())
    }

    /// Raw lookup by path string.
    pub fn document(&self, path: &str) -> Option<Document> {
        self.docs.read().ok()?.get(path).cloned()
    }

    /// Every stored path starting with `prefix`, in key order.
    pub fn paths_with_prefix(&self, prefix: &str) -> Vec<String> {
        match self.docs.read() {
            Ok(docs) => docs
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_write_faults(&self, ops: &[WriteOp]) -> CutoverResult<()> {
        let faults = self.faults.lock().map_err(|_| StorageError::LockPoisoned)?;
        if let Some(prefix) = &faults.fail_prefix {
            if let Some(op) = ops.iter().find(|op| op.path().as_str().starts_with(prefix)) {
                return Err(StorageError::Backend {
                    reason: format!("injected write failure at {}", op.path()),
                }
                .into());
            }
        }
        Ok(())
    }

    fn apply(docs: &mut BTreeMap<String, Document>, ops: Vec<WriteOp>) {
        for op in ops {
            match op {
                WriteOp::SetMerge { path, data } => {
                    let key = path.as_str().to_string();
                    let merged = merge_documents(docs.remove(&key), &data);
                    docs.insert(key, merged);
                }
                WriteOp::Set { path, data } => {
                    docs.insert(path.as_str().to_string(), data);
                }
                WriteOp::Delete { path } => {
                    docs.remove(path.as_str());
                }
            }
        }
    }

    fn commit_sync(&self, batch: WriteBatch) -> CutoverResult<()> {
        let attempt = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        batch.check_size()?;
        {
            let faults = self.faults.lock().map_err(|_| StorageError::LockPoisoned)?;
            if faults.fail_commit_at == Some(attempt) {
                return Err(StorageError::Backend {
                    reason: format!("injected failure on commit {}", attempt),
                }
                .into());
            }
        }
        self.check_write_faults(batch.ops())?;

        let mut docs = self.docs.write().map_err(|_| StorageError::LockPoisoned)?;
        Self::apply(&mut docs, batch.into_ops());
        Ok(())
    }

    fn transact_sync<T, F>(&self, f: F) -> CutoverResult<T>
    where
        F: FnOnce(&mut dyn Transaction) -> CutoverResult<T>,
    {
        // Holding the write lock for the whole closure serializes transactions.
        let mut docs = self.docs.write().map_err(|_| StorageError::LockPoisoned)?;
        let mut txn = MemoryTransaction {
            docs: &docs,
            staged: Vec::new(),
        };
        let value = f(&mut txn)?;
        let staged = txn.staged;

        if staged.len() > MAX_BATCH_SIZE {
            return Err(StorageError::TransactionFailed {
                reason: format!("transaction staged {} writes", staged.len()),
            }
            .into());
        }
        self.check_write_faults(&staged)
            .map_err(|e| StorageError::TransactionFailed {
                reason: e.to_string(),
            })?;

        Self::apply(&mut docs, staged);
        Ok(value)
    }
}

struct MemoryTransaction<'a> {
    docs: &'a BTreeMap<String, Document>,
    staged: Vec<WriteOp>,
}

impl Transaction for MemoryTransaction<'_> {
    fn get(&self, path: &DocumentPath) -> CutoverResult<Option<Document>> {
        Ok(self.docs.get(path.as_str()).cloned())
    }

    fn stage(&mut self, op: WriteOp) {
        self.staged.push(op);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocumentPath) -> CutoverResult<Option<Document>> {
        let docs = self.docs.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(docs.get(path.as_str()).cloned())
    }

    async fn list(&self, collection: &CollectionPath) -> CutoverResult<Vec<StoredDocument>> {
        let prefix = child_prefix(collection);
        let docs = self.docs.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut out = Vec::new();
        for (key, data) in docs.range(prefix.clone()..) {
            if !key.starts_with(&prefix) {
                break;
            }
            if let Some(id) = direct_child_id(key, &prefix) {
                let id = DocumentId::parse(id)?;
                out.push(StoredDocument {
                    path: collection.doc(&id),
                    data: data.clone(),
                });
            }
        }
        Ok(out)
    }

    async fn commit(&self, batch: WriteBatch) -> CutoverResult<()> {
        self.commit_sync(batch)
    }

    async fn run_transaction<T, F>(&self, f: F) -> CutoverResult<T>
    where
        T: Send,
        F: FnOnce(&mut dyn Transaction) -> CutoverResult<T> + Send,
    {
        self.transact_sync(f)
    }
}
