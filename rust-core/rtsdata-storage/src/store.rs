// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Typed measurement tables on top of a `StorageBackend`.
//
// Reference rows (wells, tags, labels) are JSON documents keyed by identity.
// Observation rows live under order-preserving keys (see `keys`), so range
// and bounds queries are bounded scans over a single channel prefix.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rtsdata_model::{
    from_micros, to_micros, DiscreteLabel, IntervalRecord, LabelId, NewTag, NewWell,
    NumericRecord, Tag, TagId, Well, WellId,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::backend::{prefix_upper_bound, ScanOrder, StorageBackend};
use crate::error::StorageError;
use crate::keys;
use crate::memory::InMemoryBackend;

/// Inclusive `[min, max]` timestamps of a channel
pub type Bounds = (DateTime<Utc>, DateTime<Utc>);

/// Typed access to wells, tags, labels and their observation rows.
///
/// Writes are serialised through an internal lock so identity allocation
/// stays gap-free; every insert call is one atomic backend batch.
pub struct MeasurementStore {
    backend: Arc<dyn StorageBackend>,
    write_lock: Mutex<()>,
}

impl MeasurementStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    /// Store backed by a fresh in-memory map
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()))
    }

    /// Store backed by a redb file, created if missing
    #[cfg(feature = "redb-backend")]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StorageError> {
        let backend = crate::redb_backend::RedbBackend::open(path)?;
        Ok(Self::new(Arc::new(backend)))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub async fn flush(&self) -> Result<(), StorageError> {
        self.backend.flush().await
    }

    pub async fn approximate_size(&self) -> Result<Option<u64>, StorageError> {
        self.backend.approximate_size().await
    }

    // ----- reference data -------------------------------------------------

    /// Register wells, assigning identities in input order.
    #[instrument(skip_all, fields(count = wells.len()))]
    pub async fn insert_wells(&self, wells: &[NewWell]) -> Result<Vec<Well>, StorageError> {
        let _guard = self.write_lock.lock().await;
        let first = self.next_id(keys::WELL).await?;

        let rows: Vec<Well> = wells
            .iter()
            .zip(first..)
            .map(|(new, id)| Well {
                id: WellId(id),
                name: new.name.clone(),
                role: new.role,
                metadata: new.metadata.clone(),
            })
            .collect();

        let mut batch = Vec::with_capacity(rows.len() + 1);
        for well in &rows {
            batch.push((keys::reference_key(keys::WELL, well.id.0), encode_json(well)?));
        }
        batch.push(sequence_entry(keys::WELL, first + rows.len() as u64));
        self.write(&batch).await?;

        debug!(count = rows.len(), "inserted wells");
        Ok(rows)
    }

    /// Register tags. Every tag must point at a stored well.
    #[instrument(skip_all, fields(count = tags.len()))]
    pub async fn insert_tags(&self, tags: &[NewTag]) -> Result<Vec<Tag>, StorageError> {
        let _guard = self.write_lock.lock().await;

        let mut known_wells = BTreeSet::new();
        for tag in tags {
            if known_wells.insert(tag.well) {
                self.get_well(tag.well)
                    .await?
                    .ok_or_else(|| missing("well", tag.well.0))?;
            }
        }

        let first = self.next_id(keys::TAG).await?;
        let rows: Vec<Tag> = tags
            .iter()
            .zip(first..)
            .map(|(new, id)| Tag {
                id: TagId(id),
                well: new.well,
                name: new.name.clone(),
                role: new.role.clone(),
                metadata: new.metadata.clone(),
            })
            .collect();

        let mut batch = Vec::with_capacity(rows.len() + 1);
        for tag in &rows {
            batch.push((keys::reference_key(keys::TAG, tag.id.0), encode_json(tag)?));
        }
        batch.push(sequence_entry(keys::TAG, first + rows.len() as u64));
        self.write(&batch).await?;

        debug!(count = rows.len(), "inserted tags");
        Ok(rows)
    }

    /// Register discrete labels by name.
    pub async fn insert_labels(
        &self,
        names: &[String],
    ) -> Result<Vec<DiscreteLabel>, StorageError> {
        let _guard = self.write_lock.lock().await;
        let first = self.next_id(keys::LABEL).await?;

        let rows: Vec<DiscreteLabel> = names
            .iter()
            .zip(first..)
            .map(|(name, id)| DiscreteLabel {
                id: LabelId(id),
                name: name.clone(),
            })
            .collect();

        let mut batch = Vec::with_capacity(rows.len() + 1);
        for label in &rows {
            batch.push((keys::reference_key(keys::LABEL, label.id.0), encode_json(label)?));
        }
        batch.push(sequence_entry(keys::LABEL, first + rows.len() as u64));
        self.write(&batch).await?;
        Ok(rows)
    }

    pub async fn get_well(&self, id: WellId) -> Result<Option<Well>, StorageError> {
        self.get_json(&keys::reference_key(keys::WELL, id.0)).await
    }

    pub async fn get_tag(&self, id: TagId) -> Result<Option<Tag>, StorageError> {
        self.get_json(&keys::reference_key(keys::TAG, id.0)).await
    }

    pub async fn get_label(&self, id: LabelId) -> Result<Option<DiscreteLabel>, StorageError> {
        self.get_json(&keys::reference_key(keys::LABEL, id.0)).await
    }

    pub async fn all_wells(&self) -> Result<Vec<Well>, StorageError> {
        self.scan_json(keys::WELL).await
    }

    pub async fn all_tags(&self) -> Result<Vec<Tag>, StorageError> {
        self.scan_json(keys::TAG).await
    }

    pub async fn all_labels(&self) -> Result<Vec<DiscreteLabel>, StorageError> {
        self.scan_json(keys::LABEL).await
    }

    // ----- observations ---------------------------------------------------

    /// Append numeric rows as one atomic batch; returns the row count.
    #[instrument(skip_all, fields(count = records.len()))]
    pub async fn insert_numeric(&self, records: &[NumericRecord]) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }
        let _guard = self.write_lock.lock().await;

        let mut checked = BTreeSet::new();
        for record in records {
            if checked.insert((record.well, record.tag)) {
                self.check_channel(record.well, record.tag).await?;
            }
        }

        let first = self.next_id(keys::NUMERIC).await?;
        let mut batch = Vec::with_capacity(records.len() + 1);
        for (record, row) in records.iter().zip(first..) {
            let prefix = keys::numeric_prefix(record.well, record.tag);
            let key = keys::observation_key(&prefix, to_micros(&record.timestamp), row);
            batch.push((key, record.value.to_be_bytes().to_vec()));
        }
        batch.push(sequence_entry(keys::NUMERIC, first + records.len() as u64));
        self.write(&batch).await?;
        Ok(records.len())
    }

    /// Append interval rows as one atomic batch and index their labels.
    #[instrument(skip_all, fields(count = records.len()))]
    pub async fn insert_intervals(
        &self,
        records: &[IntervalRecord],
    ) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }
        let _guard = self.write_lock.lock().await;

        let mut checked = BTreeSet::new();
        let mut labels = BTreeSet::new();
        for record in records {
            if checked.insert((record.well, record.tag)) {
                self.check_channel(record.well, record.tag).await?;
            }
            if labels.insert(record.label) {
                self.get_label(record.label)
                    .await?
                    .ok_or_else(|| missing("label", record.label.0))?;
            }
        }

        let first = self.next_id(keys::INTERVAL).await?;
        let mut batch = Vec::with_capacity(records.len() + 2);
        let mut indexed = BTreeSet::new();
        for (record, row) in records.iter().zip(first..) {
            if indexed.insert((record.well, record.tag, record.label)) {
                batch.push((
                    keys::label_index_key(record.well, record.tag, record.label),
                    Vec::new(),
                ));
            }
            let prefix = keys::interval_prefix(record.well, record.tag, record.label);
            let key = keys::observation_key(&prefix, to_micros(&record.timestamp), row);
            batch.push((key, vec![record.value]));
        }
        batch.push(sequence_entry(keys::INTERVAL, first + records.len() as u64));
        self.write(&batch).await?;
        Ok(records.len())
    }

    /// Labels that have interval rows for a (well, tag) channel
    pub async fn labels_for(&self, well: WellId, tag: TagId) -> Result<Vec<LabelId>, StorageError> {
        let prefix = keys::label_index_prefix(well, tag);
        self.backend
            .scan_prefix(&prefix, usize::MAX)
            .await?
            .iter()
            .map(|(key, _)| keys::decode_label_index_key(key))
            .collect()
    }

    /// Numeric rows in `[start, end]`, newest first, at most `limit`.
    pub async fn range_numeric(
        &self,
        well: WellId,
        tag: TagId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<NumericRecord>, StorageError> {
        let prefix = keys::numeric_prefix(well, tag);
        let (lo, hi) = window_keys(&prefix, to_micros(&start), to_micros(&end));
        let rows = self
            .backend
            .scan_range(&lo, hi.as_deref(), limit, ScanOrder::Descending)
            .await?;
        rows.iter().map(|(k, v)| decode_numeric(k, v)).collect()
    }

    /// Interval rows in `[start, end]`, newest first, at most `limit`.
    ///
    /// Without a label every label of the channel is scanned and the results
    /// are merged before the limit applies.
    pub async fn range_intervals(
        &self,
        well: WellId,
        tag: TagId,
        label: Option<LabelId>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<IntervalRecord>, StorageError> {
        let labels = match label {
            Some(label) => vec![label],
            None => self.labels_for(well, tag).await?,
        };

        let (start, end) = (to_micros(&start), to_micros(&end));
        let mut merged = Vec::new();
        for label in labels {
            let prefix = keys::interval_prefix(well, tag, label);
            let (lo, hi) = window_keys(&prefix, start, end);
            let rows = self
                .backend
                .scan_range(&lo, hi.as_deref(), limit, ScanOrder::Descending)
                .await?;
            for (key, value) in &rows {
                merged.push(decode_interval(key, value)?);
            }
        }

        merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        merged.truncate(limit);
        Ok(merged)
    }

    /// Last interval row of one label at or before `at`
    pub async fn interval_at(
        &self,
        well: WellId,
        tag: TagId,
        label: LabelId,
        at: DateTime<Utc>,
    ) -> Result<Option<IntervalRecord>, StorageError> {
        let prefix = keys::interval_prefix(well, tag, label);
        let (lo, hi) = window_keys(&prefix, i64::MIN, to_micros(&at));
        let rows = self
            .backend
            .scan_range(&lo, hi.as_deref(), 1, ScanOrder::Descending)
            .await?;
        rows.first()
            .map(|(key, value)| decode_interval(key, value))
            .transpose()
    }

    pub async fn numeric_bounds(
        &self,
        well: WellId,
        tag: TagId,
    ) -> Result<Option<Bounds>, StorageError> {
        let prefix = keys::numeric_prefix(well, tag);
        let Some((first, last)) = self.prefix_extremes(&prefix).await? else {
            return Ok(None);
        };
        let min = decode_numeric(&first, &[0; 8])?.timestamp;
        let max = decode_numeric(&last, &[0; 8])?.timestamp;
        Ok(Some((min, max)))
    }

    /// Interval bounds for one label, or across every label of the channel.
    pub async fn interval_bounds(
        &self,
        well: WellId,
        tag: TagId,
        label: Option<LabelId>,
    ) -> Result<Option<Bounds>, StorageError> {
        let labels = match label {
            Some(label) => vec![label],
            None => self.labels_for(well, tag).await?,
        };

        let mut bounds: Option<Bounds> = None;
        for label in labels {
            let prefix = keys::interval_prefix(well, tag, label);
            if let Some((first, last)) = self.prefix_extremes(&prefix).await? {
                let min = decode_interval(&first, &[0])?.timestamp;
                let max = decode_interval(&last, &[0])?.timestamp;
                bounds = Some(match bounds {
                    Some((lo, hi)) => (lo.min(min), hi.max(max)),
                    None => (min, max),
                });
            }
        }
        Ok(bounds)
    }

    // ----- helpers --------------------------------------------------------

    async fn check_channel(&self, well: WellId, tag: TagId) -> Result<(), StorageError> {
        let stored = self
            .get_tag(tag)
            .await?
            .ok_or_else(|| missing("tag", tag.0))?;
        if stored.well != well {
            return Err(StorageError::MissingReference(format!(
                "tag {} does not belong to well {}",
                tag, well
            )));
        }
        Ok(())
    }

    /// First and last key under a prefix
    async fn prefix_extremes(
        &self,
        prefix: &[u8],
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>, StorageError> {
        let upper = prefix_upper_bound(prefix);
        let first = self
            .backend
            .scan_range(prefix, upper.as_deref(), 1, ScanOrder::Ascending)
            .await?;
        let last = self
            .backend
            .scan_range(prefix, upper.as_deref(), 1, ScanOrder::Descending)
            .await?;
        Ok(match (first.into_iter().next(), last.into_iter().next()) {
            (Some((first, _)), Some((last, _))) => Some((first, last)),
            _ => None,
        })
    }

    async fn next_id(&self, namespace: u8) -> Result<u64, StorageError> {
        match self.backend.get(&keys::sequence_key(namespace)).await? {
            Some(bytes) => {
                let bytes: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StorageError::CorruptedData(format!("sequence {}", namespace as char))
                })?;
                Ok(u64::from_be_bytes(bytes))
            }
            None => Ok(1),
        }
    }

    async fn write(&self, batch: &[(Vec<u8>, Vec<u8>)]) -> Result<(), StorageError> {
        let entries: Vec<(&[u8], &[u8])> = batch
            .iter()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
            .collect();
        self.backend.batch_put(&entries).await
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, StorageError> {
        self.backend
            .get(key)
            .await?
            .map(|bytes| decode_json(&bytes))
            .transpose()
    }

    async fn scan_json<T: DeserializeOwned>(&self, namespace: u8) -> Result<Vec<T>, StorageError> {
        self.backend
            .scan_prefix(&[namespace], usize::MAX)
            .await?
            .iter()
            .map(|(_, value)| decode_json(value))
            .collect()
    }
}

impl std::fmt::Debug for MeasurementStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementStore")
            .field("backend", &self.backend.name())
            .finish()
    }
}

fn missing(kind: &str, id: u64) -> StorageError {
    StorageError::MissingReference(format!("{kind} {id}"))
}

fn sequence_entry(namespace: u8, next: u64) -> (Vec<u8>, Vec<u8>) {
    (keys::sequence_key(namespace), next.to_be_bytes().to_vec())
}

/// Scan keys for the inclusive window `[start, end]` of a channel.
fn window_keys(prefix: &[u8], start: i64, end: i64) -> (Vec<u8>, Option<Vec<u8>>) {
    let lo = keys::timestamp_floor(prefix, start);
    let hi = match end.checked_add(1) {
        Some(next) => Some(keys::timestamp_floor(prefix, next)),
        None => prefix_upper_bound(prefix),
    };
    (lo, hi)
}

fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value).map_err(|e| StorageError::SerializationError(e.to_string()))
}

fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::SerializationError(e.to_string()))
}

fn decode_time(micros: i64) -> Result<DateTime<Utc>, StorageError> {
    from_micros(micros).map_err(|e| StorageError::CorruptedData(e.to_string()))
}

fn decode_numeric(key: &[u8], value: &[u8]) -> Result<NumericRecord, StorageError> {
    let key = keys::decode_numeric_key(key)?;
    let bytes: [u8; 8] = value.try_into().map_err(|_| {
        StorageError::CorruptedData(format!("numeric value of {} bytes", value.len()))
    })?;
    Ok(NumericRecord {
        well: key.well,
        tag: key.tag,
        timestamp: decode_time(key.micros)?,
        value: f64::from_be_bytes(bytes),
    })
}

fn decode_interval(key: &[u8], value: &[u8]) -> Result<IntervalRecord, StorageError> {
    let key = keys::decode_interval_key(key)?;
    let value = match value {
        [v] => *v,
        _ => {
            return Err(StorageError::CorruptedData(format!(
                "interval value of {} bytes",
                value.len()
            )))
        }
    };
    Ok(IntervalRecord {
        well: key.well,
        tag: key.tag,
        label: key.label,
        timestamp: decode_time(key.micros)?,
        value,
    })
}

/// Row counts per reference table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceCounts {
    pub wells: usize,
    pub tags: usize,
    pub labels: usize,
}

impl MeasurementStore {
    pub async fn reference_counts(&self) -> Result<ReferenceCounts, StorageError> {
        let count = |namespace: u8| async move {
            self.backend
                .scan_prefix(&[namespace], usize::MAX)
                .await
                .map(|rows| rows.len())
        };
        Ok(ReferenceCounts {
            wells: count(keys::WELL).await?,
            tags: count(keys::TAG).await?,
            labels: count(keys::LABEL).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rtsdata_model::{TagMetadata, TagRole, WellRole};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
    }

    async fn seeded() -> (MeasurementStore, Well, Tag) {
        let store = MeasurementStore::in_memory();
        let wells = store
            .insert_wells(&[NewWell {
                name: "RJS739".to_string(),
                role: WellRole::Producer,
                metadata: serde_json::Value::Null,
            }])
            .await
            .unwrap();
        let tags = store
            .insert_tags(&[NewTag {
                well: wells[0].id,
                name: "T_A".to_string(),
                role: TagRole::Primary,
                metadata: TagMetadata::default(),
            }])
            .await
            .unwrap();
        (store, wells[0].clone(), tags[0].clone())
    }

    fn numeric(well: &Well, tag: &Tag, offset_secs: i64, value: f64) -> NumericRecord {
        NumericRecord {
            well: well.id,
            tag: tag.id,
            timestamp: t0() + Duration::seconds(offset_secs),
            value,
        }
    }

    #[tokio::test]
    async fn test_identities_start_at_one_and_increase() {
        let store = MeasurementStore::in_memory();
        let labels = store
            .insert_labels(&["HIGH".to_string(), "LOW".to_string()])
            .await
            .unwrap();
        assert_eq!(labels[0].id, LabelId(1));
        assert_eq!(labels[1].id, LabelId(2));

        let more = store.insert_labels(&["TRIP".to_string()]).await.unwrap();
        assert_eq!(more[0].id, LabelId(3));
        assert_eq!(store.all_labels().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_tag_requires_existing_well() {
        let store = MeasurementStore::in_memory();
        let err = store
            .insert_tags(&[NewTag {
                well: WellId(42),
                name: "T_X".to_string(),
                role: TagRole::Primary,
                metadata: TagMetadata::default(),
            }])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::MissingReference(_)));
        assert!(store.all_tags().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reference_rows_roundtrip() {
        let (store, well, tag) = seeded().await;
        assert_eq!(store.all_wells().await.unwrap(), vec![well.clone()]);
        assert_eq!(store.get_tag(tag.id).await.unwrap(), Some(tag));
        assert_eq!(store.get_well(WellId(99)).await.unwrap(), None);

        let counts = store.reference_counts().await.unwrap();
        assert_eq!(counts.wells, 1);
        assert_eq!(counts.tags, 1);
        assert_eq!(counts.labels, 0);
    }

    #[tokio::test]
    async fn test_numeric_range_is_inclusive_and_descending() {
        let (store, well, tag) = seeded().await;
        let rows: Vec<_> = (0..5).map(|i| numeric(&well, &tag, i, i as f64)).collect();
        assert_eq!(store.insert_numeric(&rows).await.unwrap(), 5);

        let (start, end) = (t0() + Duration::seconds(1), t0() + Duration::seconds(3));
        let result = store
            .range_numeric(well.id, tag.id, start, end, 100)
            .await
            .unwrap();
        let values: Vec<f64> = result.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![3.0, 2.0, 1.0]);

        let limited = store
            .range_numeric(well.id, tag.id, t0(), t0() + Duration::seconds(10), 2)
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].value, 4.0);
    }

    #[tokio::test]
    async fn test_numeric_rows_with_same_timestamp_are_kept() {
        let (store, well, tag) = seeded().await;
        store
            .insert_numeric(&[numeric(&well, &tag, 0, 1.0), numeric(&well, &tag, 0, 2.0)])
            .await
            .unwrap();
        let result = store
            .range_numeric(well.id, tag.id, t0(), t0(), 10)
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_numeric_rejects_tag_of_other_well() {
        let (store, well, tag) = seeded().await;
        let other = store
            .insert_wells(&[NewWell {
                name: "RJS742".to_string(),
                role: WellRole::Injector,
                metadata: serde_json::Value::Null,
            }])
            .await
            .unwrap();

        let mut record = numeric(&well, &tag, 0, 1.0);
        record.well = other[0].id;
        let err = store.insert_numeric(&[record]).await.unwrap_err();
        assert!(matches!(err, StorageError::MissingReference(_)));
    }

    #[tokio::test]
    async fn test_bounds_on_empty_channel() {
        let (store, well, tag) = seeded().await;
        assert_eq!(store.numeric_bounds(well.id, tag.id).await.unwrap(), None);
        assert_eq!(store.interval_bounds(well.id, tag.id, None).await.unwrap(), None);
        assert!(store.labels_for(well.id, tag.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_numeric_bounds() {
        let (store, well, tag) = seeded().await;
        store
            .insert_numeric(&[numeric(&well, &tag, 30, 1.0), numeric(&well, &tag, -30, 2.0)])
            .await
            .unwrap();
        let (min, max) = store.numeric_bounds(well.id, tag.id).await.unwrap().unwrap();
        assert_eq!(min, t0() - Duration::seconds(30));
        assert_eq!(max, t0() + Duration::seconds(30));
    }

    #[tokio::test]
    async fn test_intervals_merge_labels_and_index_them() {
        let (store, well, tag) = seeded().await;
        let labels = store
            .insert_labels(&["HIGH".to_string(), "LOW".to_string()])
            .await
            .unwrap();

        let row = |label: LabelId, secs: i64, value: u8| IntervalRecord {
            well: well.id,
            tag: tag.id,
            label,
            timestamp: t0() + Duration::seconds(secs),
            value,
        };
        store
            .insert_intervals(&[
                row(labels[0].id, 0, 1),
                row(labels[1].id, 1, 1),
                row(labels[0].id, 2, 0),
            ])
            .await
            .unwrap();

        let indexed = store.labels_for(well.id, tag.id).await.unwrap();
        assert_eq!(indexed, vec![labels[0].id, labels[1].id]);

        let all = store
            .range_intervals(well.id, tag.id, None, t0(), t0() + Duration::seconds(5), 10)
            .await
            .unwrap();
        let secs: Vec<i64> = all.iter().map(|r| (r.timestamp - t0()).num_seconds()).collect();
        assert_eq!(secs, vec![2, 1, 0]);

        let end = t0() + Duration::seconds(5);
        let high = store
            .range_intervals(well.id, tag.id, Some(labels[0].id), t0(), end, 10)
            .await
            .unwrap();
        assert_eq!(high.len(), 2);

        let (min, max) = store
            .interval_bounds(well.id, tag.id, Some(labels[1].id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(min, max);

        let state = store
            .interval_at(well.id, tag.id, labels[0].id, t0() + Duration::seconds(1))
            .await
            .unwrap()
            .unwrap();
        assert!(state.is_on());
    }

    #[tokio::test]
    async fn test_interval_requires_known_label() {
        let (store, well, tag) = seeded().await;
        let err = store
            .insert_intervals(&[IntervalRecord {
                well: well.id,
                tag: tag.id,
                label: LabelId(7),
                timestamp: t0(),
                value: 1,
            }])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::MissingReference(_)));
    }
}
