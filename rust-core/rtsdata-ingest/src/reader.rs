// SPDX-License-Identifier: PMPL-1.0-or-later
//! Instrument export reader.
//!
//! Export files are `;`-delimited with a fixed preamble, then
//! `DD/MM/YYYY HH:MM:SS;reading;` rows. Readings use a decimal comma. A
//! reading that does not parse as a number is kept as a symbolic label.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use rtsdata_model::FILE_TIMESTAMP_FORMAT;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ParseError;

/// Lines discarded before the first data row
pub const PREAMBLE_LINES: usize = 4;

/// Key under which numeric readings are counted in a summary
pub const NUMERIC_COUNT_KEY: &str = "numeric";

/// Parsed value of one reading
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingValue {
    Numeric(f64),
    Symbolic(String),
}

/// One timestamped row of an export file
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    /// Reading column exactly as found in the file
    pub raw: String,
    pub value: ReadingValue,
}

impl Reading {
    pub fn is_numeric(&self) -> bool {
        matches!(self.value, ReadingValue::Numeric(_))
    }

    pub fn label(&self) -> Option<&str> {
        match &self.value {
            ReadingValue::Symbolic(label) => Some(label),
            ReadingValue::Numeric(_) => None,
        }
    }
}

/// Every reading of one file plus the rows that carried no reading at all
#[derive(Debug, Clone, Default)]
pub struct ReadingFile {
    pub readings: Vec<Reading>,
    pub skipped: usize,
}

impl ReadingFile {
    /// Numeric count plus one count per symbolic label
    pub fn summary(&self) -> ReadingSummary {
        ReadingSummary::from_readings(&self.readings)
    }
}

/// Reading counts of one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadingSummary {
    pub numeric: u64,
    pub labels: BTreeMap<String, u64>,
}

impl ReadingSummary {
    pub fn from_readings(readings: &[Reading]) -> Self {
        let mut summary = Self::default();
        for reading in readings {
            match &reading.value {
                ReadingValue::Numeric(_) => summary.numeric += 1,
                ReadingValue::Symbolic(label) => {
                    *summary.labels.entry(label.clone()).or_default() += 1;
                }
            }
        }
        summary
    }

    /// Flattened form stored in tag metadata: `numeric` plus every label
    pub fn streaming_tags(&self) -> BTreeMap<String, u64> {
        let mut tags = self.labels.clone();
        tags.insert(NUMERIC_COUNT_KEY.to_string(), self.numeric);
        tags
    }
}

/// Classify a reading token, reading a decimal comma as a period.
pub fn parse_reading_token(token: &str) -> ReadingValue {
    let normalized = token.trim().replace(',', ".");
    match normalized.parse::<f64>() {
        Ok(value) if !value.is_nan() => ReadingValue::Numeric(value),
        _ => ReadingValue::Symbolic(token.trim().to_string()),
    }
}

pub fn parse_file_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), FILE_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Read an export file from disk.
pub fn read_readings(path: &Path) -> Result<ReadingFile, ParseError> {
    let file = File::open(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = parse_readings(BufReader::new(file)).map_err(|err| match err {
        ParseError::Io { source, .. } => ParseError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })?;
    debug!(
        path = %path.display(),
        readings = parsed.readings.len(),
        skipped = parsed.skipped,
        "parsed export file"
    );
    Ok(parsed)
}

/// Parse export rows from any buffered source.
///
/// Rows without a reading are counted as skipped. A row with the wrong
/// number of columns or an unparseable timestamp fails the whole source.
pub fn parse_readings(reader: impl BufRead) -> Result<ReadingFile, ParseError> {
    let mut parsed = ReadingFile::default();
    let mut seen = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| ParseError::Io {
            path: Default::default(),
            source,
        })?;
        seen = index + 1;
        if index < PREAMBLE_LINES {
            continue;
        }

        let line_no = index + 1;
        let row = line.trim_end_matches(['\r', '\n']);
        if row.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = row.split(';').collect();
        if !(2..=3).contains(&fields.len()) {
            return Err(ParseError::ColumnCount {
                line: line_no,
                found: fields.len(),
            });
        }

        let timestamp =
            parse_file_timestamp(fields[0]).ok_or_else(|| ParseError::InvalidTimestamp {
                line: line_no,
                value: fields[0].to_string(),
            })?;

        let raw = fields[1].trim();
        if raw.is_empty() {
            warn!(line = line_no, "row without a reading skipped");
            parsed.skipped += 1;
            continue;
        }

        parsed.readings.push(Reading {
            timestamp,
            raw: raw.to_string(),
            value: parse_reading_token(raw),
        });
    }

    if seen < PREAMBLE_LINES {
        return Err(ParseError::TruncatedPreamble {
            expected: PREAMBLE_LINES,
        });
    }
    Ok(parsed)
}
