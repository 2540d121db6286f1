// SPDX-License-Identifier: PMPL-1.0-or-later
//! Tag catalogs and the tag classifier.
//!
//! Each well ships a `;`-delimited datamap with a header row and the columns
//! `Tag Description;Type;Units;PI Tag (main);PI Tag (backup)`. A row names a
//! primary tag and optionally a backup tag that mirrors it.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rtsdata_model::{TagMetadata, TagRole};
use tracing::{debug, warn};

use crate::error::{CatalogError, ClassificationError};

const CATALOG_COLUMNS: usize = 5;

/// One tag entry of a well's catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub well: String,
    pub backup: bool,
    /// Tag mirrored by a backup entry; required when `backup` is set
    pub primary: Option<String>,
    pub description: String,
    pub kind: String,
    pub units: String,
}

/// A tag resolved against the reference table
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedTag {
    pub name: String,
    pub well: String,
    pub role: TagRole,
    pub metadata: TagMetadata,
}

impl ClassifiedTag {
    pub fn is_backup(&self) -> bool {
        self.role.is_backup()
    }

    pub fn main_tag(&self) -> Option<&str> {
        self.role.primary_tag()
    }
}

/// Catalog entries of one well, keyed by tag name
#[derive(Debug, Clone, Default)]
pub struct WellCatalog {
    pub well: String,
    pub entries: BTreeMap<String, CatalogEntry>,
}

fn is_blank_tag(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case("none") || value.eq_ignore_ascii_case("nan")
}

impl WellCatalog {
    pub fn from_path(path: &Path, well: &str) -> Result<Self, CatalogError> {
        let file = File::open(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(BufReader::new(file), well).map_err(|err| match err {
            CatalogError::Io { source, .. } => CatalogError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse a datamap. The first line is a header.
    ///
    /// Rows without a main tag are ignored unless they name a backup tag, in
    /// which case the backup is kept without a primary and rejected when it
    /// is classified. A tag listed twice is an error.
    pub fn parse(reader: impl BufRead, well: &str) -> Result<Self, CatalogError> {
        let mut catalog = Self {
            well: well.to_string(),
            entries: BTreeMap::new(),
        };

        for (index, line) in reader.lines().enumerate().skip(1) {
            let line = line.map_err(|source| CatalogError::Io {
                path: Default::default(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split(';').map(str::trim).collect();
            if fields.len() != CATALOG_COLUMNS {
                return Err(CatalogError::ColumnCount {
                    catalog: well.to_string(),
                    line: index + 1,
                    found: fields.len(),
                });
            }
            let (description, kind, units, main, backup) =
                (fields[0], fields[1], fields[2], fields[3], fields[4]);

            let entry = |backup: bool, primary: Option<&str>| CatalogEntry {
                well: well.to_string(),
                backup,
                primary: primary.map(str::to_string),
                description: description.to_string(),
                kind: kind.to_string(),
                units: units.to_string(),
            };

            let main = (!is_blank_tag(main)).then_some(main);
            if let Some(main) = main {
                catalog.insert(main, entry(false, None))?;
            }
            if !is_blank_tag(backup) {
                if main.is_none() {
                    warn!(well, tag = backup, "backup tag without a main tag");
                }
                catalog.insert(backup, entry(true, main))?;
            }
        }

        debug!(well, tags = catalog.entries.len(), "catalog parsed");
        Ok(catalog)
    }

    fn insert(&mut self, name: &str, entry: CatalogEntry) -> Result<(), CatalogError> {
        if self.entries.contains_key(name) {
            return Err(CatalogError::DuplicateTag {
                tag: name.to_string(),
                first: self.well.clone(),
                second: self.well.clone(),
            });
        }
        self.entries.insert(name.to_string(), entry);
        Ok(())
    }
}

/// System-wide reference table built from every well's catalog
#[derive(Debug, Clone, Default)]
pub struct TagCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl TagCatalog {
    /// Merge per-well catalogs. A tag name may appear in one catalog only.
    pub fn build(catalogs: impl IntoIterator<Item = WellCatalog>) -> Result<Self, CatalogError> {
        let mut entries: BTreeMap<String, CatalogEntry> = BTreeMap::new();
        for catalog in catalogs {
            for (name, entry) in catalog.entries {
                if let Some(existing) = entries.get(&name) {
                    return Err(CatalogError::DuplicateTag {
                        tag: name,
                        first: existing.well.clone(),
                        second: entry.well,
                    });
                }
                entries.insert(name, entry);
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tag names listed for one well
    pub fn tags_of<'a>(&'a self, well: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(_, entry)| entry.well == well)
            .map(|(name, _)| name.as_str())
    }

    /// Resolve a raw tag name to its well, role and metadata.
    pub fn classify(&self, name: &str) -> Result<ClassifiedTag, ClassificationError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| ClassificationError::UnknownTag(name.to_string()))?;

        let role = if entry.backup {
            let primary = entry
                .primary
                .clone()
                .ok_or_else(|| ClassificationError::MissingPrimary(name.to_string()))?;
            TagRole::Backup {
                primary_tag: primary,
            }
        } else {
            TagRole::Primary
        };

        Ok(ClassifiedTag {
            name: name.to_string(),
            well: entry.well.clone(),
            role,
            metadata: TagMetadata {
                description: entry.description.clone(),
                kind: entry.kind.clone(),
                units: entry.units.clone(),
                streaming_tags: BTreeMap::new(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "Tag Description;Type;Units;PI Tag (main);PI Tag (backup)\n";

    fn catalog(well: &str, rows: &str) -> Result<WellCatalog, CatalogError> {
        WellCatalog::parse(Cursor::new(format!("{HEADER}{rows}")), well)
    }

    #[test]
    fn test_backup_tag_classifies_with_main_tag() {
        let producer = catalog("RJS739", "Pressure;analog;kPa;T_A;T_B\n").unwrap();
        let table = TagCatalog::build([producer]).unwrap();

        let backup = table.classify("T_B").unwrap();
        assert!(backup.is_backup());
        assert_eq!(backup.main_tag(), Some("T_A"));
        assert_eq!(backup.well, "RJS739");
        assert_eq!(backup.metadata.units, "kPa");

        let primary = table.classify("T_A").unwrap();
        assert!(!primary.is_backup());
        assert_eq!(primary.main_tag(), None);
    }

    #[test]
    fn test_rows_without_main_tag_are_ignored() {
        let producer = catalog(
            "RJS739",
            "Unused;analog;-;none;\nEmpty;analog;-;;\nTemp;analog;C;T_C;\n",
        )
        .unwrap();
        assert_eq!(producer.entries.len(), 1);
        assert!(producer.entries.contains_key("T_C"));
    }

    #[test]
    fn test_backup_without_primary_fails_classification() {
        let producer = catalog("RJS739", "Orphan;analog;-;;T_ORPHAN\n").unwrap();
        let table = TagCatalog::build([producer]).unwrap();
        assert_eq!(
            table.classify("T_ORPHAN").unwrap_err(),
            ClassificationError::MissingPrimary("T_ORPHAN".to_string())
        );
    }

    #[test]
    fn test_unknown_tag() {
        let table = TagCatalog::default();
        assert!(table.is_empty());
        assert_eq!(
            table.classify("T_X").unwrap_err(),
            ClassificationError::UnknownTag("T_X".to_string())
        );
    }

    #[test]
    fn test_collision_across_catalogs_is_an_error() {
        let producer = catalog("RJS739", "A;analog;-;T_A;\n").unwrap();
        let injector = catalog("RJS742", "A;analog;-;T_A;\n").unwrap();
        let err = TagCatalog::build([producer, injector]).unwrap_err();
        match err {
            CatalogError::DuplicateTag { tag, first, second } => {
                assert_eq!(tag, "T_A");
                assert_eq!(first, "RJS739");
                assert_eq!(second, "RJS742");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_within_catalog_is_an_error() {
        let err = catalog("RJS739", "A;analog;-;T_A;\nB;analog;-;T_A;\n").unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateTag { .. }));
    }

    #[test]
    fn test_column_count_is_checked() {
        let err = catalog("RJS739", "A;analog;T_A\n").unwrap_err();
        assert!(matches!(err, CatalogError::ColumnCount { line: 2, found: 3, .. }));
    }

    #[test]
    fn test_tags_of_well() {
        let producer = catalog("RJS739", "A;analog;-;T_A;T_B\n").unwrap();
        let injector = catalog("RJS742", "I;analog;-;T_I;\n").unwrap();
        let table = TagCatalog::build([producer, injector]).unwrap();
        let tags: Vec<&str> = table.tags_of("RJS739").collect();
        assert_eq!(tags, vec!["T_A", "T_B"]);
        assert_eq!(table.len(), 3);
    }
}
