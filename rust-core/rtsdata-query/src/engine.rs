// SPDX-License-Identifier: PMPL-1.0-or-later
//! Range query engine over the measurement store.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rtsdata_model::{IntervalRecord, LabelId, NumericRecord, TagId, WellId};
use rtsdata_storage::{Bounds, MeasurementStore, StorageError};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::window::{RangeRequest, Window};

/// Query errors
#[derive(Error, Debug)]
pub enum QueryError {
    /// The channel holds no rows, so no window can be derived from it.
    #[error("no data for well {well}, pi_tag {tag}")]
    RangeUnavailable { well: WellId, tag: TagId },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl QueryError {
    pub fn is_range_unavailable(&self) -> bool {
        matches!(self, QueryError::RangeUnavailable { .. })
    }
}

/// Answers bounds and range queries for one store.
///
/// Cheap to clone; all clones share the store.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    store: Arc<MeasurementStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<MeasurementStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MeasurementStore> {
        &self.store
    }

    /// Earliest and latest numeric timestamps, `None` when the channel is empty
    pub async fn date_bounds(
        &self,
        well: WellId,
        tag: TagId,
    ) -> Result<Option<Bounds>, QueryError> {
        Ok(self.store.numeric_bounds(well, tag).await?)
    }

    /// Interval bounds for one label, or across every label of the channel
    pub async fn interval_bounds(
        &self,
        well: WellId,
        tag: TagId,
        label: Option<LabelId>,
    ) -> Result<Option<Bounds>, QueryError> {
        Ok(self.store.interval_bounds(well, tag, label).await?)
    }

    /// Resolve a numeric request window, failing when the channel is empty.
    pub async fn numeric_window(
        &self,
        well: WellId,
        tag: TagId,
        request: &RangeRequest,
    ) -> Result<Window, QueryError> {
        let bounds = self
            .date_bounds(well, tag)
            .await?
            .ok_or(QueryError::RangeUnavailable { well, tag })?;
        Ok(Window::resolve(request.start, request.end, bounds))
    }

    /// Resolve an interval request window, failing when there are no rows.
    pub async fn interval_window(
        &self,
        well: WellId,
        tag: TagId,
        label: Option<LabelId>,
        request: &RangeRequest,
    ) -> Result<Window, QueryError> {
        let bounds = self
            .interval_bounds(well, tag, label)
            .await?
            .ok_or(QueryError::RangeUnavailable { well, tag })?;
        Ok(Window::resolve(request.start, request.end, bounds))
    }

    /// Numeric rows inside the resolved window, newest first.
    ///
    /// An empty channel yields an empty result.
    #[instrument(skip(self))]
    pub async fn query_numeric(
        &self,
        well: WellId,
        tag: TagId,
        request: &RangeRequest,
    ) -> Result<Vec<NumericRecord>, QueryError> {
        let window = match self.numeric_window(well, tag, request).await {
            Ok(window) => window,
            Err(err) if err.is_range_unavailable() => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let records = self
            .store
            .range_numeric(well, tag, window.start, window.end, request.limit())
            .await?;
        debug!(rows = records.len(), "numeric query");
        Ok(records)
    }

    /// Interval rows inside the resolved window, newest first, across every
    /// label unless one is given.
    #[instrument(skip(self))]
    pub async fn query_intervals(
        &self,
        well: WellId,
        tag: TagId,
        label: Option<LabelId>,
        request: &RangeRequest,
    ) -> Result<Vec<IntervalRecord>, QueryError> {
        let window = match self.interval_window(well, tag, label, request).await {
            Ok(window) => window,
            Err(err) if err.is_range_unavailable() => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let records = self
            .store
            .range_intervals(well, tag, label, window.start, window.end, request.limit())
            .await?;
        debug!(rows = records.len(), "interval query");
        Ok(records)
    }

    /// Interval rows grouped by label, each group capped separately.
    ///
    /// The window is resolved against the bounds of all labels together.
    /// Labels without rows in the window are left out.
    #[instrument(skip(self))]
    pub async fn query_intervals_by_label(
        &self,
        well: WellId,
        tag: TagId,
        label: Option<LabelId>,
        request: &RangeRequest,
    ) -> Result<BTreeMap<LabelId, Vec<IntervalRecord>>, QueryError> {
        let mut grouped = BTreeMap::new();
        let window = match self.interval_window(well, tag, label, request).await {
            Ok(window) => window,
            Err(err) if err.is_range_unavailable() => return Ok(grouped),
            Err(err) => return Err(err),
        };

        let labels = match label {
            Some(label) => vec![label],
            None => self.store.labels_for(well, tag).await?,
        };
        for label in labels {
            let records = self
                .store
                .range_intervals(well, tag, Some(label), window.start, window.end, request.limit())
                .await?;
            if !records.is_empty() {
                grouped.insert(label, records);
            }
        }
        Ok(grouped)
    }

    /// Step value of one label at `at`: the value of the last row at or
    /// before it, `None` before the first row.
    pub async fn state_at(
        &self,
        well: WellId,
        tag: TagId,
        label: LabelId,
        at: DateTime<Utc>,
    ) -> Result<Option<u8>, QueryError> {
        let row = self.store.interval_at(well, tag, label, at).await?;
        Ok(row.map(|r| r.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rtsdata_model::{NewTag, NewWell, TagMetadata, TagRole, WellRole};

    struct Fixture {
        engine: QueryEngine,
        well: WellId,
        tag: TagId,
        empty_tag: TagId,
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MeasurementStore::in_memory());
        let wells = store
            .insert_wells(&[NewWell {
                name: "RJS739".to_string(),
                role: WellRole::Producer,
                metadata: serde_json::Value::Null,
            }])
            .await
            .unwrap();
        let well = wells[0].id;
        let tag = |name: &str| NewTag {
            well,
            name: name.to_string(),
            role: TagRole::Primary,
            metadata: TagMetadata::default(),
        };
        let tags = store.insert_tags(&[tag("T_A"), tag("T_EMPTY")]).await.unwrap();

        let records: Vec<NumericRecord> = (0..10)
            .map(|i| NumericRecord {
                well,
                tag: tags[0].id,
                timestamp: t0() + Duration::minutes(i),
                value: i as f64,
            })
            .collect();
        store.insert_numeric(&records).await.unwrap();

        Fixture {
            engine: QueryEngine::new(store),
            well,
            tag: tags[0].id,
            empty_tag: tags[1].id,
        }
    }

    fn minutes(records: &[NumericRecord]) -> Vec<i64> {
        records
            .iter()
            .map(|r| (r.timestamp - t0()).num_minutes())
            .collect()
    }

    #[tokio::test]
    async fn test_default_window_covers_everything() {
        let f = fixture().await;
        let records = f
            .engine
            .query_numeric(f.well, f.tag, &RangeRequest::default())
            .await
            .unwrap();
        assert_eq!(minutes(&records), vec![9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);
    }

    #[tokio::test]
    async fn test_window_and_limit() {
        let f = fixture().await;
        let request = RangeRequest::new(
            Some(t0() + Duration::minutes(2)),
            Some(t0() + Duration::minutes(6)),
            Some(3),
        );
        let records = f.engine.query_numeric(f.well, f.tag, &request).await.unwrap();
        assert_eq!(minutes(&records), vec![6, 5, 4]);
    }

    #[tokio::test]
    async fn test_swapped_and_zero_limit() {
        let f = fixture().await;
        let request = RangeRequest::new(
            Some(t0() + Duration::minutes(6)),
            Some(t0() + Duration::minutes(2)),
            Some(0),
        );
        let records = f.engine.query_numeric(f.well, f.tag, &request).await.unwrap();
        assert_eq!(minutes(&records), vec![6]);
    }

    #[tokio::test]
    async fn test_empty_channel_is_not_an_error() {
        let f = fixture().await;
        assert_eq!(f.engine.date_bounds(f.well, f.empty_tag).await.unwrap(), None);

        let records = f
            .engine
            .query_numeric(f.well, f.empty_tag, &RangeRequest::default())
            .await
            .unwrap();
        assert!(records.is_empty());

        let intervals = f
            .engine
            .query_intervals_by_label(f.well, f.empty_tag, None, &RangeRequest::default())
            .await
            .unwrap();
        assert!(intervals.is_empty());

        let err = f
            .engine
            .numeric_window(f.well, f.empty_tag, &RangeRequest::default())
            .await
            .unwrap_err();
        assert!(err.is_range_unavailable());
    }

    #[tokio::test]
    async fn test_state_at_follows_brackets() {
        let f = fixture().await;
        let store = f.engine.store();
        let labels = store.insert_labels(&["OPEN".to_string()]).await.unwrap();
        let label = labels[0].id;

        let rows: Vec<IntervalRecord> = [(-1, 0), (0, 1), (1, 1), (2, 0)]
            .into_iter()
            .map(|(offset, value)| IntervalRecord {
                well: f.well,
                tag: f.tag,
                label,
                timestamp: t0() + Duration::microseconds(offset),
                value,
            })
            .collect();
        store.insert_intervals(&rows).await.unwrap();

        let state = |t| f.engine.state_at(f.well, f.tag, label, t);
        assert_eq!(state(t0() - Duration::seconds(1)).await.unwrap(), None);
        assert_eq!(state(t0()).await.unwrap(), Some(1));
        assert_eq!(state(t0() + Duration::microseconds(1)).await.unwrap(), Some(1));
        assert_eq!(state(t0() + Duration::seconds(1)).await.unwrap(), Some(0));

        let grouped = f
            .engine
            .query_intervals_by_label(f.well, f.tag, None, &RangeRequest::default())
            .await
            .unwrap();
        assert_eq!(grouped.get(&label).map(Vec::len), Some(4));
    }
}
