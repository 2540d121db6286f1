// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Core storage backend trait for rtsdata.
//
// Defines the `StorageBackend` trait that all storage implementations must
// satisfy: an ordered key-value interface with atomic batch writes and
// bounded range scans in either direction. Backends are expected to be
// thread-safe (`Send + Sync`) and fully asynchronous.

use async_trait::async_trait;

use crate::error::StorageError;

/// Direction of a range scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    /// Lexicographically increasing keys.
    Ascending,
    /// Lexicographically decreasing keys.
    Descending,
}

/// A pluggable ordered key-value storage backend.
///
/// All keys and values are opaque byte slices. Keys are compared
/// lexicographically; [`crate::keys`] encodes rows so that this order is the
/// (well, tag, label, timestamp) order the query engine needs.
///
/// Implementations must be safe to share across threads and tokio tasks.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieve the value associated with `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist, rather than an error.
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store a key-value pair, overwriting any previous value for `key`.
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// Write multiple key-value pairs atomically.
    ///
    /// Either all entries are written or none are.
    async fn batch_put(&self, entries: &[(&[u8], &[u8])]) -> Result<(), StorageError>;

    /// Scan keys in `[start, end)` (or `[start, ..)` when `end` is `None`),
    /// returning up to `limit` pairs in the requested order.
    ///
    /// An empty or inverted range yields an empty result.
    async fn scan_range(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        limit: usize,
        order: ScanOrder,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;

    /// Scan all keys that start with `prefix`, returning up to `limit`
    /// (key, value) pairs in lexicographic order.
    async fn scan_prefix(
        &self,
        prefix: &[u8],
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let upper = prefix_upper_bound(prefix);
        self.scan_range(prefix, upper.as_deref(), limit, ScanOrder::Ascending)
            .await
    }

    /// Flush any buffered writes to durable storage.
    ///
    /// For in-memory backends this is a no-op.
    async fn flush(&self) -> Result<(), StorageError>;

    /// A human-readable name for this backend, used in logging.
    fn name(&self) -> &str;

    /// Return the approximate total size of stored data in bytes, if known.
    async fn approximate_size(&self) -> Result<Option<u64>, StorageError>;
}

/// Compute the exclusive upper bound for a prefix scan.
///
/// Given a prefix like `[0x61, 0x62]` ("ab"), returns the next key
/// after all keys starting with that prefix: `[0x61, 0x63]` ("ac").
/// Returns `None` if the prefix is empty or all 0xFF bytes (no upper bound).
pub fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.last_mut() {
        if *last < 0xFF {
            *last += 1;
            return Some(upper);
        }
        upper.pop();
    }
    None
}

/// True when `[start, end)` cannot contain any key.
pub(crate) fn is_empty_range(start: &[u8], end: Option<&[u8]>) -> bool {
    matches!(end, Some(end) if start >= end)
}
