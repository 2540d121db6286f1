// SPDX-License-Identifier: PMPL-1.0-or-later
//! Interval expansion of discrete events.
//!
//! An event at `t` becomes four rows so that "last row at or before a
//! point" reconstructs the ON/OFF step function:
//!
//! | timestamp | value |
//! |-----------|-------|
//! | t - 1µs   | 0     |
//! | t         | 1     |
//! | t + 1µs   | 1     |
//! | t + 2µs   | 0     |
//!
//! Two events of the same label less than 2µs apart produce interleaved
//! rows; no attempt is made to repair that.

use chrono::{DateTime, Duration, Utc};
use rtsdata_model::{IntervalRecord, LabelId, TagId, WellId};

/// Microsecond offset and value of each bracket row
pub const BRACKET: [(i64, u8); 4] = [(-1, 0), (0, 1), (1, 1), (2, 0)];

/// Expand one event into its four bracket rows.
pub fn expand_event(
    well: WellId,
    tag: TagId,
    label: LabelId,
    timestamp: DateTime<Utc>,
) -> [IntervalRecord; 4] {
    BRACKET.map(|(offset, value)| IntervalRecord {
        well,
        tag,
        label,
        timestamp: timestamp + Duration::microseconds(offset),
        value,
    })
}

/// Expand an ordered event stream of one tag.
pub fn expand_events<I>(well: WellId, tag: TagId, events: I) -> Vec<IntervalRecord>
where
    I: IntoIterator<Item = (DateTime<Utc>, LabelId)>,
{
    let events = events.into_iter();
    let mut rows = Vec::with_capacity(events.size_hint().0 * BRACKET.len());
    for (timestamp, label) in events {
        rows.extend(expand_event(well, tag, label, timestamp));
    }
    rows
}
