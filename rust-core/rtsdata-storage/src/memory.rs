// SPDX-License-Identifier: PMPL-1.0-or-later
//
// In-memory storage backend for rtsdata.
//
// Uses a `BTreeMap` wrapped in a tokio `RwLock` for thread-safe, ordered
// key-value storage. The BTreeMap ordering gives range scans in both
// directions for free. Intended for tests and ephemeral serving sessions.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::{is_empty_range, ScanOrder, StorageBackend};
use crate::error::StorageError;

/// An in-memory storage backend backed by a sorted `BTreeMap`.
///
/// All data lives in process memory and is lost on drop. Clones share the
/// same map.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl InMemoryBackend {
    /// Create a new, empty in-memory backend.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Return the number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Return true if the store contains no keys.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let map = self.data.read().await;
        Ok(map.get(key).cloned())
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let mut map = self.data.write().await;
        map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn batch_put(&self, entries: &[(&[u8], &[u8])]) -> Result<(), StorageError> {
        // Holding the write guard for the whole batch makes it atomic to readers.
        let mut map = self.data.write().await;
        for (key, value) in entries {
            map.insert(key.to_vec(), value.to_vec());
        }
        Ok(())
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

        let map = self.data.read().await;
        let upper = match end {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        let range = map.range::<[u8], _>((Bound::Included(start), upper));

        let results = match order {
            ScanOrder::Ascending => range
                .take(limit)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            ScanOrder::Descending => range
                .rev()
                .take(limit)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        Ok(results)
    }

    async fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "in-memory"
    }

    async fn approximate_size(&self) -> Result<Option<u64>, StorageError> {
        let map = self.data.read().await;
        let size: u64 = map
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum();
        Ok(Some(size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_put() {
        let backend = InMemoryBackend::new();

        assert!(backend.is_empty().await);
        assert_eq!(backend.get(b"key1").await.unwrap(), None);

        backend.put(b"key1", b"value1").await.unwrap();
        assert_eq!(backend.get(b"key1").await.unwrap(), Some(b"value1".to_vec()));
        assert_eq!(backend.len().await, 1);

        // Overwrite.
        backend.put(b"key1", b"updated").await.unwrap();
        assert_eq!(backend.get(b"key1").await.unwrap(), Some(b"updated".to_vec()));
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_scan_range_both_directions() {
        let backend = InMemoryBackend::new();
        for key in [b"a1", b"a2", b"a3", b"b1"] {
            backend.put(key, b"").await.unwrap();
        }

        let asc = backend
            .scan_range(b"a2", Some(b"b1".as_slice()), 10, ScanOrder::Ascending)
            .await
            .unwrap();
        let keys: Vec<_> = asc.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"a2".to_vec(), b"a3".to_vec()]);

        let desc = backend
            .scan_range(b"a", None, 2, ScanOrder::Descending)
            .await
            .unwrap();
        let keys: Vec<_> = desc.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"b1".to_vec(), b"a3".to_vec()]);
    }

    #[tokio::test]
    async fn test_inverted_range_is_empty() {
        let backend = InMemoryBackend::new();
        backend.put(b"m", b"").await.unwrap();

        let results = backend
            .scan_range(b"z", Some(b"a".as_slice()), 10, ScanOrder::Ascending)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_scan_prefix() {
        let backend = InMemoryBackend::new();

        backend.put(b"user:1:name", b"Alice").await.unwrap();
        backend.put(b"user:1:age", b"30").await.unwrap();
        backend.put(b"user:2:name", b"Bob").await.unwrap();
        backend.put(b"post:1:title", b"Hello").await.unwrap();

        let results = backend.scan_prefix(b"user:1:", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, b"user:1:age".to_vec());
        assert_eq!(results[1].0, b"user:1:name".to_vec());

        let results = backend.scan_prefix(b"user:", 2).await.unwrap();
        assert_eq!(results.len(), 2);

        let results = backend.scan_prefix(b"missing:", 10).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_batch_put() {
        let backend = InMemoryBackend::new();

        backend
            .batch_put(&[
                (b"x" as &[u8], b"10" as &[u8]),
                (b"y", b"20"),
                (b"z", b"30"),
            ])
            .await
            .unwrap();

        assert_eq!(backend.len().await, 3);
        assert_eq!(backend.get(b"y").await.unwrap(), Some(b"20".to_vec()));
    }

    #[tokio::test]
    async fn test_approximate_size() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.approximate_size().await.unwrap(), Some(0));

        backend.put(b"abc", b"defgh").await.unwrap(); // 3 + 5
        assert_eq!(backend.approximate_size().await.unwrap(), Some(8));
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let backend = InMemoryBackend::new();
        let clone = backend.clone();

        backend.put(b"shared", b"data").await.unwrap();
        assert_eq!(clone.get(b"shared").await.unwrap(), Some(b"data".to_vec()));
        assert_eq!(clone.name(), "in-memory");
    }
}
