// SPDX-License-Identifier: PMPL-1.0-or-later
//
// redb-backed persistent storage backend for rtsdata.
//
// Uses redb (pure Rust, B-tree, ACID, single-file database) to provide
// durable key-value storage for a bulk-loaded dataset.
//
// # Design
//
// - Single redb `Database` file containing one main table.
// - Read transactions for all read operations (concurrent, lock-free).
// - Write transactions for put/batch (serialised by redb internally).
// - `scan_range` uses redb's double-ended `range()` iterator so descending
//   scans walk the B-tree backwards instead of collecting and reversing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use redb::{
    Database, ReadOnlyTable, ReadTransaction, ReadableDatabase, TableDefinition, TableError,
};
use tracing::debug;

use crate::backend::{is_empty_range, ScanOrder, StorageBackend};
use crate::error::StorageError;

/// Keys and values are byte slices, matching the `StorageBackend` trait's
/// opaque byte interface.
const MAIN_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("main");

/// A persistent storage backend powered by redb.
///
/// Thread-safe: `Database` is `Send + Sync` and handles internal locking.
/// Blocking redb calls run on tokio's blocking pool.
pub struct RedbBackend {
    db: Arc<Database>,
    path: PathBuf,
}

impl RedbBackend {
    /// Open or create a redb database at the given path.
    ///
    /// Creates the file and parent directories if they don't exist. The main
    /// table is created on first write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(StorageError::Io)?;
            }
        }

        let db = Database::create(&path).map_err(|e| {
            StorageError::BackendUnavailable(format!(
                "failed to open redb at {}: {}",
                path.display(),
                e
            ))
        })?;

        debug!(path = %path.display(), "opened redb backend");

        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// Return the filesystem path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The main table, or `None` before the first write created it.
fn open_main_table(
    txn: &ReadTransaction,
) -> Result<Option<ReadOnlyTable<&'static [u8], &'static [u8]>>, StorageError> {
    match txn.open_table(MAIN_TABLE) {
        Ok(table) => Ok(Some(table)),
        Err(TableError::TableDoesNotExist(_)) => Ok(None),
        Err(e) => Err(StorageError::CorruptedData(format!("open table: {e}"))),
    }
}

impl std::fmt::Debug for RedbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbBackend")
            .field("path", &self.path)
            .finish()
    }
}

#[async_trait]
impl StorageBackend for RedbBackend {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let db = Arc::clone(&self.db);
        let key = key.to_vec();

        tokio::task::spawn_blocking(move || -> Result<Option<Vec<u8>>, StorageError> {
            let txn = db.begin_read().map_err(|e| {
                StorageError::BackendUnavailable(format!("read txn: {e}"))
            })?;

            let Some(table) = open_main_table(&txn)? else {
                return Ok(None);
            };

            match table.get(key.as_slice()) {
                Ok(Some(value)) => Ok(Some(value.value().to_vec())),
                Ok(None) => Ok(None),
                Err(e) => Err(StorageError::CorruptedData(format!("get: {e}"))),
            }
        })
        .await
        .map_err(|e| StorageError::BackendUnavailable(format!("task join: {e}")))?
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.batch_put(&[(key, value)]).await
    }

    async fn batch_put(&self, entries: &[(&[u8], &[u8])]) -> Result<(), StorageError> {
        let db = Arc::clone(&self.db);
        let owned: Vec<(Vec<u8>, Vec<u8>)> = entries
            .iter()
            .map(|(k, v)| (k.to_vec(), v.to_vec()))
            .collect();

        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let txn = db.begin_write().map_err(|e| {
                StorageError::BackendUnavailable(format!("write txn: {e}"))
            })?;
            {
                let mut table = txn.open_table(MAIN_TABLE).map_err(|e| {
                    StorageError::BackendUnavailable(format!("open table: {e}"))
                })?;
                for (k, v) in &owned {
                    table.insert(k.as_slice(), v.as_slice()).map_err(|e| {
                        StorageError::CorruptedData(format!("batch insert: {e}"))
                    })?;
                }
            }
            // Dropping an uncommitted transaction aborts it, so an early
            // return above leaves the database untouched.
            txn.commit().map_err(|e| {
                StorageError::CorruptedData(format!("batch commit: {e}"))
            })?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::BackendUnavailable(format!("task join: {e}")))?
    }

    async fn scan_range(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        limit: usize,
        order: ScanOrder,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        if limit == 0 || is_empty_range(start, end) {
            return Ok(Vec::new());
        }

        let db = Arc::clone(&self.db);
        let start = start.to_vec();
        let end = end.map(|e| e.to_vec());

        tokio::task::spawn_blocking(move || -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
            let txn = db.begin_read().map_err(|e| {
                StorageError::BackendUnavailable(format!("read txn: {e}"))
            })?;
            let Some(table) = open_main_table(&txn)? else {
                return Ok(Vec::new());
            };

            let range = match &end {
                Some(end) => table.range(start.as_slice()..end.as_slice()),
                None => table.range(start.as_slice()..),
            }
            .map_err(|e| StorageError::CorruptedData(format!("range scan: {e}")))?;

            let entries: Box<dyn Iterator<Item = _> + '_> = match order {
                ScanOrder::Ascending => Box::new(range),
                ScanOrder::Descending => Box::new(range.rev()),
            };

            let mut results = Vec::new();
            for entry in entries.take(limit) {
                let (k, v) = entry.map_err(|e| {
                    StorageError::CorruptedData(format!("scan entry: {e}"))
                })?;
                results.push((k.value().to_vec(), v.value().to_vec()));
            }
            Ok(results)
        })
        .await
        .map_err(|e| StorageError::BackendUnavailable(format!("task join: {e}")))?
    }

    async fn flush(&self) -> Result<(), StorageError> {
        // Each committed write transaction is already durable.
        Ok(())
    }

    fn name(&self) -> &str {
        "redb"
    }

    async fn approximate_size(&self) -> Result<Option<u64>, StorageError> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(_) => Ok(None),
        }
    }
}
