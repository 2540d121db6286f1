// SPDX-License-Identifier: PMPL-1.0-or-later
//! rtsdata Ingest
//!
//! Turns instrument exports into stored observations:
//!
//! - [`reader`] parses one export into numeric and symbolic readings.
//! - [`catalog`] builds the tag reference table and classifies tags.
//! - [`expand`] brackets each symbolic event into four interval rows.
//! - [`loader`] runs a manifest-driven bulk load over all of the above.

pub mod catalog;
pub mod error;
pub mod expand;
pub mod loader;
pub mod reader;

pub use catalog::{CatalogEntry, ClassifiedTag, TagCatalog, WellCatalog};
pub use error::{CatalogError, ClassificationError, LoadError, ParseError};
pub use expand::{expand_event, expand_events, BRACKET};
pub use loader::{
    default_jobs, LoadFailure, LoadOptions, LoadReport, Loader, Manifest, WellSource,
    DEFAULT_CHUNK_SIZE,
};
pub use reader::{
    parse_reading_token, parse_readings, read_readings, Reading, ReadingFile, ReadingSummary,
    ReadingValue,
};
