// SPDX-License-Identifier: PMPL-1.0-or-later
//! Query window and record cap policy.
//!
//! Missing bounds default to the channel's extent, supplied bounds are
//! clamped into it and an inverted window is swapped. Nothing here rejects
//! a request.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Largest result set any query may return
pub const MAX_RECORDS: usize = 10_000;

/// Requested limit, floored at 1 and capped at [`MAX_RECORDS`].
pub fn clamp_limit(limit: Option<i64>) -> usize {
    match limit {
        None => MAX_RECORDS,
        Some(limit) => limit.clamp(1, MAX_RECORDS as i64) as usize,
    }
}

/// Inclusive time window of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// Resolve a requested window against the channel extent `[min, max]`.
    pub fn resolve(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        (min, max): (DateTime<Utc>, DateTime<Utc>),
    ) -> Self {
        let clamp = |t: DateTime<Utc>| t.clamp(min, max);
        let start = start.map_or(min, clamp);
        let end = end.map_or(max, clamp);
        if start > end {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn contains(&self, t: &DateTime<Utc>) -> bool {
        self.start <= *t && *t <= self.end
    }
}

/// Window and cap of one request, before resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeRequest {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl RangeRequest {
    pub fn new(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: Option<i64>,
    ) -> Self {
        Self { start, end, limit }
    }

    pub fn limit(&self) -> usize {
        clamp_limit(self.limit)
    }
}
