//! Integration tests for the manifest builder: priority selection,
//! deletion handling and mtime-based retention.

use std::fs::File;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, TimeZone, Utc};
use grid_processor::NormalizedGrid;
use sst_common::{ArtifactConfig, DataSource, ManifestConfig, ResolutionClass, TemperatureBand};
use storage::{ArtifactKey, ArtifactWriter, Manifest, ManifestBuilder};
use tempfile::TempDir;
use test_utils::{composite_source, test_source};

const DAY: Duration = Duration::from_secs(24 * 3600);

// ============================================================================
// Helper functions
// ============================================================================

fn grid() -> NormalizedGrid {
    NormalizedGrid::from_fahrenheit(
        vec![25.0, 24.0],
        vec![-98.0, -97.0],
        vec![70.0, 71.0, 72.0, 73.0],
        &TemperatureBand::default(),
    )
    .unwrap()
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
}

fn write(dir: &TempDir, source: &DataSource, ts: DateTime<Utc>) -> std::path::PathBuf {
    let writer = ArtifactWriter::new(dir.path(), ArtifactConfig::default());
    let key = ArtifactKey::for_source(source, &ts, source.composite);
    writer
        .write(&key, source, ts, &grid(), 1)
        .unwrap()
        .path()
        .to_path_buf()
}

fn builder(dir: &TempDir) -> ManifestBuilder {
    ManifestBuilder::new(dir.path(), ManifestConfig::default(), 14 * DAY)
}

fn set_age(path: &std::path::Path, age: Duration) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

// ============================================================================
// Priority
// ============================================================================

#[test]
fn test_blended_preferred_over_other_classes() {
    let dir = TempDir::new().unwrap();
    write(&dir, &test_source("hourly", ResolutionClass::Hourly), at(1, 18));
    write(&dir, &test_source("nrt", ResolutionClass::NearRealTime), at(1, 12));
    write(&dir, &test_source("blended", ResolutionClass::Blended), at(1, 12));

    let manifest = builder(&dir).build(Utc::now()).unwrap();
    let day = &manifest.dates["2024-06-01"];

    assert_eq!(day.entries.len(), 3);
    assert_eq!(day.best, "sst_blended_20240601.json");
    assert_eq!(day.entries[1].source_id, "nrt");
    assert_eq!(day.entries[2].source_id, "hourly");
    assert_eq!(day.best_entry().unwrap().bounds, [[23.5, -98.5], [25.5, -96.5]]);
    assert_eq!(day.best_entry().unwrap().temp_range, [70.0, 73.0]);
}

#[test]
fn test_configured_priority_and_composites() {
    let dir = TempDir::new().unwrap();
    write(&dir, &test_source("blended", ResolutionClass::Blended), at(2, 12));
    write(&dir, &test_source("hourly", ResolutionClass::Hourly), at(2, 22));
    write(&dir, &composite_source("hourly"), at(2, 21));

    let config = ManifestConfig {
        priority: vec![ResolutionClass::Hourly, ResolutionClass::Blended],
        ..ManifestConfig::default()
    };
    let manifest = ManifestBuilder::new(dir.path(), config, 14 * DAY)
        .build(Utc::now())
        .unwrap();

    let day = &manifest.dates["2024-06-02"];
    assert_eq!(day.best, "sst_hourly_20240602T210000_mean.json");
    assert_eq!(day.entries[1].file, "sst_hourly_20240602T220000.json");
    assert_eq!(day.entries[2].source_id, "blended");
}

#[test]
fn test_dates_and_latest() {
    let dir = TempDir::new().unwrap();
    let source = test_source("blended", ResolutionClass::Blended);
    write(&dir, &source, at(1, 12));
    write(&dir, &source, at(3, 12));

    let manifest = builder(&dir).rebuild(Utc::now()).unwrap();
    assert_eq!(manifest.dates.len(), 2);
    assert_eq!(manifest.latest.as_deref(), Some("2024-06-03"));

    let loaded = Manifest::load(&builder(&dir).manifest_path()).unwrap();
    assert_eq!(loaded, manifest);
    assert!(loaded.is_current(at(2, 0)));
    assert!(!loaded.is_current(at(4, 0)));
}

// ============================================================================
// Rebuild from disk
// ============================================================================

#[test]
fn test_deleted_artifact_drops_out() {
    let dir = TempDir::new().unwrap();
    let source = test_source("nrt", ResolutionClass::NearRealTime);
    let first = write(&dir, &source, at(1, 12));
    write(&dir, &source, at(2, 12));

    let before = builder(&dir).rebuild(Utc::now()).unwrap();
    assert_eq!(before.entry_count(), 2);

    std::fs::remove_file(&first).unwrap();
    let after = builder(&dir).rebuild(Utc::now()).unwrap();
    assert_eq!(after.entry_count(), 1);
    assert!(!after.dates.contains_key("2024-06-01"));
}

#[test]
fn test_empty_directory() {
    let dir = TempDir::new().unwrap();
    let manifest = builder(&dir).build(Utc::now()).unwrap();
    assert!(manifest.is_empty());
    assert_eq!(manifest.latest, None);

    let missing = ManifestBuilder::new(dir.path().join("absent"), ManifestConfig::default(), DAY);
    assert!(missing.build(Utc::now()).unwrap().is_empty());
}

// ============================================================================
// Retention
// ============================================================================

#[test]
fn test_retention_uses_mtime_not_filename() {
    let dir = TempDir::new().unwrap();
    let source = test_source("nrt", ResolutionClass::NearRealTime);

    // A recent date that was written long ago, and an old date written just now.
    let stale = write(&dir, &source, at(3, 12));
    let fresh = write(&dir, &source, at(1, 12));
    set_age(&stale, 20 * DAY);
    set_age(&stale.with_file_name("sst_nrt_20240603T120000.json.meta.json"), 20 * DAY);

    let purged = builder(&dir).purge_expired(SystemTime::now()).unwrap();
    assert_eq!(purged, 1);
    assert!(!stale.exists());
    assert!(!stale.with_file_name("sst_nrt_20240603T120000.json.meta.json").exists());
    assert!(fresh.exists());

    let manifest = builder(&dir).build(Utc::now()).unwrap();
    assert_eq!(manifest.latest.as_deref(), Some("2024-06-01"));
}

#[test]
fn test_retention_keeps_manifest_file() {
    let dir = TempDir::new().unwrap();
    write(&dir, &test_source("nrt", ResolutionClass::NearRealTime), at(1, 12));
    let b = builder(&dir);
    b.rebuild(Utc::now()).unwrap();
    set_age(&b.manifest_path(), 30 * DAY);

    b.rebuild(Utc::now()).unwrap();
    assert!(b.manifest_path().exists());
}

#[test]
fn test_sidecar_lives_as_long_as_its_artifact() {
    let dir = TempDir::new().unwrap();
    let source = test_source("nrt", ResolutionClass::NearRealTime);
    let artifact = write(&dir, &source, at(1, 12));
    let sidecar = artifact.with_file_name("sst_nrt_20240601T120000.json.meta.json");

    // The sidecar is written first, so it can cross the cutoff a run earlier.
    set_age(&sidecar, 20 * DAY);

    assert_eq!(builder(&dir).purge_expired(SystemTime::now()).unwrap(), 0);
    assert!(artifact.exists());
    assert!(sidecar.exists());
    assert_eq!(builder(&dir).build(Utc::now()).unwrap().entry_count(), 1);
}

#[test]
fn test_orphaned_sidecar_expires() {
    let dir = TempDir::new().unwrap();
    let source = test_source("nrt", ResolutionClass::NearRealTime);
    let artifact = write(&dir, &source, at(1, 12));
    let sidecar = artifact.with_file_name("sst_nrt_20240601T120000.json.meta.json");
    std::fs::remove_file(&artifact).unwrap();

    assert_eq!(builder(&dir).purge_expired(SystemTime::now()).unwrap(), 0);
    assert!(sidecar.exists(), "fresh orphan is kept");

    set_age(&sidecar, 20 * DAY);
    assert_eq!(builder(&dir).purge_expired(SystemTime::now()).unwrap(), 0);
    assert!(!sidecar.exists());
}
