// SPDX-License-Identifier: PMPL-1.0-or-later
//! Ingestion errors, one enum per unit of work.

use std::path::PathBuf;

use rtsdata_model::ModelError;
use rtsdata_registry::RegistryError;
use rtsdata_storage::StorageError;
use thiserror::Error;

/// Structural problems with one export file. Fatal to that file only.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: expected 2 or 3 columns, found {found}")]
    ColumnCount { line: usize, found: usize },

    #[error("line {line}: invalid timestamp '{value}'")]
    InvalidTimestamp { line: usize, value: String },

    #[error("file ends inside the {expected}-line preamble")]
    TruncatedPreamble { expected: usize },
}

/// Problems building the tag reference table. Fatal to the load.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("cannot read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog {catalog} line {line}: expected 5 columns, found {found}")]
    ColumnCount {
        catalog: String,
        line: usize,
        found: usize,
    },

    #[error("pi_tag {tag} is listed by both {first} and {second}")]
    DuplicateTag {
        tag: String,
        first: String,
        second: String,
    },
}

/// Problems resolving one tag against the reference table. Fatal to that tag.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("pi_tag not found in any catalog: {0}")]
    UnknownTag(String),

    #[error("backup pi_tag {0} has no primary tag")]
    MissingPrimary(String),

    #[error("pi_tag {tag} belongs to {catalog_well}, found under {found_well}")]
    WellMismatch {
        tag: String,
        catalog_well: String,
        found_well: String,
    },
}

/// Errors that abort a bulk load
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("invalid manifest: {0}")]
    Manifest(String),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("worker task failed: {0}")]
    Worker(String),
}
