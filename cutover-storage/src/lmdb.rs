//! LMDB-backed document store.
//!
//! Uses the heed crate (Rust bindings for LMDB). One unnamed database holds
//! every document: keys are UTF-8 document paths, values are the JSON
//! encoding of the document's field map.
//!
//! # Atomicity
//!
//! LMDB allows a single writer at a time, so a batch commit or a
//! transaction running inside one write transaction is both atomic and
//! serializable with respect to every other write.

use std::path::Path;

use async_trait::async_trait;
use cutover_core::{
    CollectionPath, CutoverError, CutoverResult, Document, DocumentId, DocumentPath,
    StorageError, MAX_BATCH_SIZE,
};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};

use crate::{
    child_prefix, direct_child_id, merge_documents, DocumentStore, StoredDocument, Transaction,
    WriteBatch, WriteOp,
};

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for CutoverError {
    fn from(e: LmdbStoreError) -> Self {
        match e {
            LmdbStoreError::Serialization(reason) => CutoverError::Storage(
                StorageError::Serialization {
                    path: String::new(),
                    reason,
                },
            ),
            other => CutoverError::Storage(StorageError::Backend {
                reason: other.to_string(),
            }),
        }
    }
}

/// Document store persisted in an LMDB environment.
#[derive(Debug)]
pub struct LmdbStore {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbStore {
    /// Open (or create) a store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `map_size_mb` - Maximum size of the database in megabytes
    pub fn open<P: AsRef<Path>>(path: P, map_size_mb: usize) -> Result<Self, LmdbStoreError> {
        let map_size = map_size_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            LmdbStoreError::EnvOpen(format!("map size of {} MB overflows", map_size_mb))
        })?;
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), map_size_mb, "Opened LMDB store");

        Ok(Self { env, db })
    }

    fn read(&self, txn: &RoTxn, path: &str) -> CutoverResult<Option<Document>> {
        let bytes = self
            .db
            .get(txn, path.as_bytes())
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        match bytes {
            Some(bytes) => decode(path, bytes).map(Some),
            None => Ok(None),
        }
    }

    fn apply(&self, wtxn: &mut RwTxn, ops: Vec<WriteOp>) -> CutoverResult<()> {
        for op in ops {
            match op {
                WriteOp::SetMerge { path, data } => {
                    let existing = self.read(wtxn, path.as_str())?;
                    let merged = merge_documents(existing, &data);
                    self.put(wtxn, &path, &merged)?;
                }
                WriteOp::Set { path, data } => {
                    self.put(wtxn, &path, &data)?;
                }
                WriteOp::Delete { path } => {
                    self.db
                        .delete(wtxn, path.as_str().as_bytes())
                        .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
                }
            }
        }
        Ok(())
    }

    fn put(&self, wtxn: &mut RwTxn, path: &DocumentPath, doc: &Document) -> CutoverResult<()> {
        let bytes = serde_json::to_vec(doc).map_err(|e| StorageError::Serialization {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        self.db
            .put(wtxn, path.as_str().as_bytes(), &bytes)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        Ok(())
    }

    fn commit_sync(&self, batch: WriteBatch) -> CutoverResult<()> {
        batch.check_size()?;
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        // Dropping the txn on error aborts it.
        self.apply(&mut wtxn, batch.into_ops())?;
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        Ok(())
    }

    fn transact_sync<T, F>(&self, f: F) -> CutoverResult<T>
    where
        F: FnOnce(&mut dyn Transaction) -> CutoverResult<T>,
    {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let (value, staged) = {
            let mut txn = LmdbTransaction {
                store: self,
                txn: &wtxn,
                staged: Vec::new(),
            };
            let value = f(&mut txn)?;
            (value, txn.staged)
        };

        if staged.len() > MAX_BATCH_SIZE {
            return Err(StorageError::TransactionFailed {
                reason: format!("transaction staged {} writes", staged.len()),
            }
            .into());
        }

        self.apply(&mut wtxn, staged)?;
        wtxn.commit().map_err(|e| StorageError::TransactionFailed {
            reason: e.to_string(),
        })?;
        Ok(value)
    }

    fn list_sync(&self, collection: &CollectionPath) -> CutoverResult<Vec<StoredDocument>> {
        let prefix = child_prefix(collection);
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        let iter = self
            .db
            .prefix_iter(&rtxn, prefix.as_bytes())
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let mut out = Vec::new();
        for result in iter {
            let (key, bytes) = result.map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            let Ok(key) = std::str::from_utf8(key) else {
                continue;
            };
            if let Some(id) = direct_child_id(key, &prefix) {
                let id = DocumentId::parse(id)?;
                out.push(StoredDocument {
                    path: collection.doc(&id),
                    data: decode(key, bytes)?,
                });
            }
        }
        Ok(out)
    }

    fn get_sync(&self, path: &DocumentPath) -> CutoverResult<Option<Document>> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        self.read(&rtxn, path.as_str())
    }
}

fn decode(path: &str, bytes: &[u8]) -> CutoverResult<Document> {
    serde_json::from_slice(bytes).map_err(|e| {
        StorageError::Serialization {
            path: path.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

struct LmdbTransaction<'s, 't, 'e> {
    store: &'s LmdbStore,
    txn: &'t RwTxn<'e>,
    staged: Vec<WriteOp>,
}

impl Transaction for LmdbTransaction<'_, '_, '_> {
    fn get(&self, path: &DocumentPath) -> CutoverResult<Option<Document>> {
        self.store.read(self.txn, path.as_str())
    }

    fn stage(&mut self, op: WriteOp) {
        self.staged.push(op);
    }
}

#[async_trait]
impl DocumentStore for LmdbStore {
    async fn get(&self, path: &DocumentPath) -> CutoverResult<Option<Document>> {
        self.get_sync(path)
    }

    async fn list(&self, collection: &CollectionPath) -> CutoverResult<Vec<StoredDocument>> {
        self.list_sync(collection)
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
