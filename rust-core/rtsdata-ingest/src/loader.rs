// SPDX-License-Identifier: PMPL-1.0-or-later
//! Manifest-driven bulk load.
//!
//! A load runs in three phases:
//!
//! 1. Read every well's catalog and merge them into one reference table.
//! 2. Parse each well's `*.csv` exports on the blocking pool, at most
//!    `jobs` files at a time. The file stem names the tag.
//! 3. Register wells, tags and labels, then append numeric rows and
//!    expanded interval rows in chunks.
//!
//! A file that fails to parse, or a tag that fails classification, is
//! recorded in the [`LoadReport`] and the rest of the batch continues.
//! Storage failures abort the load.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rtsdata_model::{LabelId, NewTag, NewWell, NumericRecord, WellRole};
use rtsdata_registry::IdentityRegistry;
use rtsdata_storage::MeasurementStore;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::catalog::{TagCatalog, WellCatalog};
use crate::error::{ClassificationError, LoadError, ParseError};
use crate::expand::expand_events;
use crate::reader::{read_readings, ReadingFile, ReadingValue};

/// Rows per storage batch
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Worker count used when none is configured: one less than the CPU count,
/// at least one.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Wells to load and where their catalogs and exports live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub wells: Vec<WellSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WellSource {
    pub name: String,
    pub role: WellRole,
    pub catalog: PathBuf,
    pub data_dir: PathBuf,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl Manifest {
    /// Read a JSON manifest. Relative paths resolve against its directory.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest = Self::from_json(&text)?;
        if let Some(base) = path.parent() {
            for well in &mut manifest.wells {
                well.catalog = base.join(&well.catalog);
                well.data_dir = base.join(&well.data_dir);
            }
        }
        Ok(manifest)
    }

    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        let manifest: Self =
            serde_json::from_str(text).map_err(|e| LoadError::Manifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), LoadError> {
        if self.wells.is_empty() {
            return Err(LoadError::Manifest("no wells listed".to_string()));
        }
        let mut names = BTreeSet::new();
        for well in &self.wells {
            if !names.insert(well.name.as_str()) {
                return Err(LoadError::Manifest(format!("well {} listed twice", well.name)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Files parsed concurrently
    pub jobs: usize,
    /// Rows per storage batch
    pub chunk_size: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// A unit of work that was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadFailure {
    pub subject: String,
    pub error: String,
}

/// Outcome of a bulk load
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub wells: usize,
    pub tags: usize,
    pub labels: usize,
    pub files_loaded: usize,
    pub numeric_rows: usize,
    pub interval_rows: usize,
    /// Rows without a reading
    pub skipped_rows: usize,
    pub file_failures: Vec<LoadFailure>,
    pub tag_failures: Vec<LoadFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.file_failures.is_empty() && self.tag_failures.is_empty()
    }
}

#[derive(Debug, Clone)]
struct FileJob {
    well: String,
    tag: String,
    path: PathBuf,
}

pub struct Loader {
    store: Arc<MeasurementStore>,
    options: LoadOptions,
}

impl Loader {
    pub fn new(store: Arc<MeasurementStore>, options: LoadOptions) -> Self {
        Self { store, options }
    }

    #[instrument(skip_all, fields(wells = manifest.wells.len()))]
    pub async fn load(&self, manifest: &Manifest) -> Result<LoadReport, LoadError> {
        let mut report = LoadReport::default();

        let catalogs = manifest
            .wells
            .iter()
            .map(|source| WellCatalog::from_path(&source.catalog, &source.name))
            .collect::<Result<Vec<_>, _>>()?;
        let catalog = TagCatalog::build(catalogs)?;
        info!(tags = catalog.len(), "reference table built");

        let mut jobs = Vec::new();
        for source in &manifest.wells {
            for path in discover_exports(&source.data_dir)? {
                let Some(tag) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                jobs.push(FileJob {
                    well: source.name.clone(),
                    tag: tag.to_string(),
                    path: path.clone(),
                });
            }
        }
        info!(files = jobs.len(), jobs = self.options.jobs, "parsing exports");

        let mut files: HashMap<String, ReadingFile> = HashMap::new();
        for (job, parsed) in self.parse_all(jobs).await? {
            let parsed = match parsed {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(path = %job.path.display(), error = %err, "export skipped");
                    report.file_failures.push(failure(job.path.display(), err));
                    continue;
                }
            };
            match catalog.classify(&job.tag) {
                Ok(tag) if tag.well != job.well => {
                    let err = ClassificationError::WellMismatch {
                        tag: job.tag.clone(),
                        catalog_well: tag.well,
                        found_well: job.well,
                    };
                    warn!(error = %err, "export skipped");
                    report.tag_failures.push(failure(&job.tag, err));
                }
                Ok(_) => {
                    files.insert(job.tag, parsed);
                }
                // Reported once, when the catalog's tags are registered.
                Err(ClassificationError::MissingPrimary(_)) => {}
                Err(err) => {
                    warn!(error = %err, "export skipped");
                    report.tag_failures.push(failure(&job.tag, err));
                }
            }
        }

        let mut registry = IdentityRegistry::snapshot(&self.store).await?;
        let new_wells: Vec<NewWell> = manifest
            .wells
            .iter()
            .map(|source| NewWell {
                name: source.name.clone(),
                role: source.role,
                metadata: source.metadata.clone().unwrap_or_else(|| {
                    serde_json::json!({ "desc": source.name, "type": source.role })
                }),
            })
            .collect();
        let well_ids = registry.register_wells(&self.store, &new_wells).await?;
        report.wells = well_ids.len();

        for (source, well_id) in manifest.wells.iter().zip(well_ids) {
            let mut new_tags = Vec::new();
            for name in catalog.tags_of(&source.name) {
                let mut tag = match catalog.classify(name) {
                    Ok(tag) => tag,
                    Err(err) => {
                        warn!(error = %err, "tag not registered");
                        report.tag_failures.push(failure(name, err));
                        continue;
                    }
                };
                if let Some(file) = files.get(name) {
                    tag.metadata.streaming_tags = file.summary().streaming_tags();
                }
                new_tags.push(NewTag {
                    well: well_id,
                    name: tag.name,
                    role: tag.role,
                    metadata: tag.metadata,
                });
            }
            report.tags += registry.register_tags(&self.store, &new_tags).await?.len();
        }

        let mut names: Vec<String> = files.keys().cloned().collect();
        names.sort();
        for name in names {
            let Some(file) = files.remove(&name) else {
                continue;
            };
            self.load_file(&mut registry, &name, file, &mut report).await?;
        }

        report.labels = registry.label_count();
        self.store.flush().await?;
        info!(
            wells = report.wells,
            tags = report.tags,
            numeric = report.numeric_rows,
            intervals = report.interval_rows,
            failures = report.file_failures.len() + report.tag_failures.len(),
            "load complete"
        );
        Ok(report)
    }

    /// Parse every export concurrently, preserving input order.
    async fn parse_all(
        &self,
        jobs: Vec<FileJob>,
    ) -> Result<Vec<(FileJob, Result<ReadingFile, ParseError>)>, LoadError> {
        let permits = Arc::new(Semaphore::new(self.options.jobs.max(1)));
        let tasks = jobs.into_iter().map(|job| {
            let permits = Arc::clone(&permits);
            async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| LoadError::Worker(e.to_string()))?;
                let path = job.path.clone();
                let parsed = tokio::task::spawn_blocking(move || read_readings(&path))
                    .await
                    .map_err(|e| LoadError::Worker(e.to_string()))?;
                Ok::<_, LoadError>((job, parsed))
            }
        });
        futures::future::try_join_all(tasks).await
    }

    async fn load_file(
        &self,
        registry: &mut IdentityRegistry,
        name: &str,
        file: ReadingFile,
        report: &mut LoadReport,
    ) -> Result<(), LoadError> {
        let (tag, well) = registry.resolve_tag(name)?;

        let mut labels: BTreeMap<String, LabelId> = BTreeMap::new();
        for reading in &file.readings {
            if let ReadingValue::Symbolic(label) = &reading.value {
                if !labels.contains_key(label) {
                    let id = registry.resolve_or_create_label(&self.store, label).await?;
                    labels.insert(label.clone(), id);
                }
            }
        }

        let mut numeric = Vec::new();
        let mut events = Vec::new();
        for reading in &file.readings {
            match &reading.value {
                ReadingValue::Numeric(value) => numeric.push(NumericRecord {
                    well,
                    tag,
                    timestamp: reading.timestamp,
                    value: *value,
                }),
                ReadingValue::Symbolic(label) => {
                    if let Some(id) = labels.get(label) {
                        events.push((reading.timestamp, *id));
                    }
                }
            }
        }
        let intervals = expand_events(well, tag, events);

        let chunk_size = self.options.chunk_size.max(1);
        for chunk in numeric.chunks(chunk_size) {
            report.numeric_rows += self.store.insert_numeric(chunk).await?;
        }
        for chunk in intervals.chunks(chunk_size) {
            report.interval_rows += self.store.insert_intervals(chunk).await?;
        }
        report.skipped_rows += file.skipped;
        report.files_loaded += 1;

        info!(
            pi_tag = name,
            measures = numeric.len(),
            control = intervals.len(),
            "export loaded"
        );
        Ok(())
    }
}

fn failure(subject: impl std::fmt::Display, error: impl std::fmt::Display) -> LoadFailure {
    LoadFailure {
        subject: subject.to_string(),
        error: error.to_string(),
    }
}

/// `*.csv` files of a directory, sorted by name
pub fn discover_exports(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let io_err = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
