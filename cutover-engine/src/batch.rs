//! Capped batch writer shared by the offline tools.

use cutover_core::{CutoverError, CutoverResult, StorageError};
use cutover_storage::{DocumentStore, WriteBatch, WriteOp};

/// Accumulates writes and commits them in batches of at most `cap` groups'
/// worth of operations. A group of operations pushed together always lands
/// in the same batch.
pub struct BatchWriter<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    cap: usize,
    batch: WriteBatch,
    committed_batches: usize,
    committed_ops: usize,
}

impl<'a, S: DocumentStore + ?Sized> BatchWriter<'a, S> {
    pub fn new(store: &'a S, cap: usize) -> Self {
        Self {
            store,
            cap: cap.max(1),
            batch: WriteBatch::new(),
            committed_batches: 0,
            committed_ops: 0,
        }
    }

    /// Stage one operation, committing when the cap is reached.
    pub async fn push(&mut self, op: WriteOp) -> CutoverResult<()> {
        self.push_group(vec![op]).await
    }

    /// Stage operations that must commit atomically together.
    pub async fn push_group(&mut self, ops: Vec<WriteOp>) -> CutoverResult<()> {
        for op in ops {
            match op {
                WriteOp::SetMerge { path, data } => self.batch.set_merge(path, data),
                WriteOp::Set { path, data } => self.batch.set(path, data),
                WriteOp::Delete { path } => self.batch.delete(path),
            };
        }
        if self.batch.len() >= self.cap {
            self.flush().await?;
        }
        Ok(())
    }

    /// Commit whatever is staged.
    pub async fn flush(&mut self) -> CutoverResult<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.batch);
        let ops = batch.len();
        if let Err(e) = self.store.commit(batch).await {
            return Err(StorageError::CommitFailed {
                committed_batches: self.committed_batches,
                reason: describe(&e),
            }
            .into());
        }
        self.committed_batches += 1;
        self.committed_ops += ops;
        tracing::debug!(
            batch = self.committed_batches,
            ops,
            "Committed write batch"
        );
        Ok(())
    }

    /// Flush the trailing partial batch and return the number of committed
    /// operations.
    pub async fn finish(mut self) -> CutoverResult<usize> {
        self.flush().await?;
        Ok(self.committed_ops)
    }

    pub fn committed_batches(&self) -> usize {
        self.committed_batches
    }
}

fn describe(e: &CutoverError) -> String {
    match e {
        CutoverError::Storage(inner) => inner.to_string(),
        other => other.to_string(),
    }
}
