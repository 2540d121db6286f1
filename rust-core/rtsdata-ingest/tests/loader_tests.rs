// SPDX-License-Identifier: PMPL-1.0-or-later
//! End-to-end bulk load tests against an in-memory store

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use rtsdata_ingest::{LoadOptions, Loader, Manifest};
use rtsdata_registry::IdentityRegistry;
use rtsdata_storage::MeasurementStore;
use tempfile::TempDir;

const CATALOG_HEADER: &str = "Tag Description;Type;Units;PI Tag (main);PI Tag (backup)\n";
const PREAMBLE: &str = "PI export\nServer: historian\nInterval: raw\nTimestamp;Value;\n";

fn write(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, body).unwrap();
}

fn export(rows: &str) -> String {
    format!("{PREAMBLE}{rows}")
}

/// Two wells: a producer with numeric, discrete, backup and orphan tags and
/// an injector with a single numeric tag. A few exports are deliberately
/// broken.
fn fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write(
        &root.join("datamap_producer.csv"),
        &format!(
            "{CATALOG_HEADER}Pressure;analog;kPa;T_A;T_B\nValve;digital;-;T_V;\nOrphan;analog;-;;T_ORPHAN\n"
        ),
    );
    write(
        &root.join("datamap_injector.csv"),
        &format!("{CATALOG_HEADER}Rate;analog;m3/d;T_I;\n"),
    );

    write(
        &root.join("rjs739/T_A.csv"),
        &export("01/01/2024 10:00:00;12,5;\n01/01/2024 10:01:00;13,0;\n"),
    );
    write(
        &root.join("rjs739/T_V.csv"),
        &export("01/01/2024 10:00:00;OPEN;\n01/01/2024 10:05:00;CLOSED;\n01/01/2024 10:10:00;1,5;\n"),
    );
    write(&root.join("rjs739/T_B.csv"), &export("2024-01-01 10:00:00;1;\n"));
    write(&root.join("rjs739/T_UNKNOWN.csv"), &export("01/01/2024 10:00:00;1;\n"));
    write(&root.join("rjs739/notes.txt"), "not an export");

    write(&root.join("rjs742/T_I.csv"), &export("02/01/2024 00:00:00;250;\n"));
    write(&root.join("rjs742/T_A.csv"), &export("02/01/2024 00:00:00;1;\n"));

    write(
        &root.join("manifest.json"),
        r#"{"wells": [
            {"name": "RJS739", "role": "producer", "catalog": "datamap_producer.csv", "data_dir": "rjs739"},
            {"name": "RJS742", "role": "injector", "catalog": "datamap_injector.csv", "data_dir": "rjs742"}
        ]}"#,
    );
    dir
}

fn options() -> LoadOptions {
    LoadOptions {
        jobs: 2,
        chunk_size: 3,
    }
}

#[tokio::test]
async fn test_load_report_counts_rows_and_failures() {
    let dir = fixture();
    let manifest = Manifest::from_path(&dir.path().join("manifest.json")).unwrap();
    let store = Arc::new(MeasurementStore::in_memory());

    let report = Loader::new(Arc::clone(&store), options())
        .load(&manifest)
        .await
        .unwrap();

    assert_eq!(report.wells, 2);
    assert_eq!(report.tags, 4);
    assert_eq!(report.labels, 2);
    assert_eq!(report.files_loaded, 3);
    assert_eq!(report.numeric_rows, 4);
    assert_eq!(report.interval_rows, 8);
    assert!(!report.is_clean());

    assert_eq!(report.file_failures.len(), 1);
    assert!(report.file_failures[0].subject.ends_with("T_B.csv"));

    let failed_tags: Vec<&str> = report.tag_failures.iter().map(|f| f.subject.as_str()).collect();
    assert_eq!(failed_tags, vec!["T_UNKNOWN", "T_A", "T_ORPHAN"]);
}

#[tokio::test]
async fn test_loaded_data_is_queryable() {
    let dir = fixture();
    let manifest = Manifest::from_path(&dir.path().join("manifest.json")).unwrap();
    let store = Arc::new(MeasurementStore::in_memory());
    Loader::new(Arc::clone(&store), options())
        .load(&manifest)
        .await
        .unwrap();

    let registry = IdentityRegistry::snapshot(&store).await.unwrap();
    let (well, tag) = registry.resolve_channel("RJS739", "T_A").unwrap();

    let (min, max) = store.numeric_bounds(well, tag).await.unwrap().unwrap();
    assert_eq!(min, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
    assert_eq!(max, Utc.with_ymd_and_hms(2024, 1, 1, 10, 1, 0).unwrap());

    let rows = store.range_numeric(well, tag, min, max, 10).await.unwrap();
    let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![13.0, 12.5]);

    let backup = registry.tag(registry.resolve_tag("T_B").unwrap().0).unwrap();
    assert!(backup.is_backup());
    assert_eq!(backup.main_tag(), Some("T_A"));

    let (_, valve) = registry.resolve_channel("RJS739", "T_V").unwrap();
    let valve_tag = registry.tag(valve).unwrap();
    assert_eq!(valve_tag.metadata.streaming_tags.get("OPEN"), Some(&1));
    assert_eq!(valve_tag.metadata.streaming_tags.get("numeric"), Some(&1));

    let open = registry.resolve_label("OPEN").unwrap();
    let intervals = store
        .range_intervals(
            well,
            valve,
            Some(open),
            min - Duration::seconds(1),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            10,
        )
        .await
        .unwrap();
    let values: Vec<u8> = intervals.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![0, 1, 1, 0]);
}

#[tokio::test]
async fn test_missing_catalog_aborts_load() {
    let dir = fixture();
    fs::remove_file(dir.path().join("datamap_injector.csv")).unwrap();
    let manifest = Manifest::from_path(&dir.path().join("manifest.json")).unwrap();
    let store = Arc::new(MeasurementStore::in_memory());

    let result = Loader::new(Arc::clone(&store), options()).load(&manifest).await;
    assert!(result.is_err());
    assert!(store.all_wells().await.unwrap().is_empty());
}
