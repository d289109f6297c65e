//! Date-indexed manifest of the artifacts on disk.
//!
//! The manifest is never patched. Every run purges expired artifacts and
//! rebuilds it from the sidecars whose artifact still exists, so manual
//! deletions and crashed runs cannot leave stale entries behind.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sst_common::{ManifestConfig, ResolutionClass};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::artifact::{ArtifactMeta, FILE_PREFIX, META_SUFFIX};
use crate::error::{Result, StorageError};
use crate::fsutil::{remove_if_exists, write_atomic};

/// One artifact as listed in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    pub file: String,
    pub source_id: String,
    pub source_name: String,
    /// `[[south, west], [north, east]]`
    pub bounds: [[f64; 2]; 2],
    /// `[min, max]` in °F
    pub temp_range: [f64; 2],
    pub resolution: ResolutionClass,
    pub timestamp: DateTime<Utc>,
    pub composite: bool,
}

impl From<&ArtifactMeta> for ManifestEntry {
    fn from(meta: &ArtifactMeta) -> Self {
        Self {
            date: meta.timestamp.format("%Y-%m-%d").to_string(),
            file: meta.file.clone(),
            source_id: meta.source_id.clone(),
            source_name: meta.source_name.clone(),
            bounds: meta.bounds,
            temp_range: meta.temp_range,
            resolution: meta.resolution,
            timestamp: meta.timestamp,
            composite: meta.composite,
        }
    }
}

/// Every artifact for one date, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayEntries {
    /// File name of the preferred entry.
    pub best: String,
    pub entries: Vec<ManifestEntry>,
}

impl DayEntries {
    pub fn best_entry(&self) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.file == self.best)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub generated_at: DateTime<Utc>,
    /// Most recent date with at least one artifact.
    pub latest: Option<String>,
    pub dates: BTreeMap<String, DayEntries>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| StorageError::io(path, e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.latest
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }

    pub fn entry_count(&self) -> usize {
        self.dates.values().map(|d| d.entries.len()).sum()
    }

    /// True when the newest listed date is on or after the date of `cutoff`.
    pub fn is_current(&self, cutoff: DateTime<Utc>) -> bool {
        self.latest_date()
            .is_some_and(|latest| latest >= cutoff.date_naive())
    }
}

/// Purges expired artifacts and rebuilds the manifest.
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    output_dir: PathBuf,
    config: ManifestConfig,
    max_age: Duration,
}

impl ManifestBuilder {
    pub fn new(output_dir: impl Into<PathBuf>, config: ManifestConfig, max_age: Duration) -> Self {
        Self {
            output_dir: output_dir.into(),
            config,
            max_age,
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join(&self.config.file_name)
    }

    /// Purge, rebuild and atomically replace the manifest file.
    pub fn rebuild(&self, now: DateTime<Utc>) -> Result<Manifest> {
        let purged = self.purge_expired(now.into())?;
        let manifest = self.build(now)?;

        write_atomic(&self.manifest_path(), &serde_json::to_vec_pretty(&manifest)?)?;

        info!(
            path = %self.manifest_path().display(),
            dates = manifest.dates.len(),
            entries = manifest.entry_count(),
            purged,
            latest = ?manifest.latest,
            "Rebuilt manifest"
        );
        Ok(manifest)
    }

    /// Delete artifacts (and their sidecars) whose modification time is
    /// older than the retention window. Returns the number of artifacts
    /// removed. The timestamp in the file name plays no part.
    ///
    /// A sidecar is only aged on its own once its artifact is gone.
    pub fn purge_expired(&self, now: SystemTime) -> Result<usize> {
        let mut purged = 0;

        for path in self.artifact_files() {
            if let Some(artifact) = artifact_for(&path) {
                if artifact.exists() {
                    continue;
                }
                if let Some(age) = self.expired_age(&path, now)? {
                    remove_if_exists(&path)?;
                    debug!(path = %path.display(), age_secs = age.as_secs(), "Purged orphaned sidecar");
                }
                continue;
            }

            let Some(age) = self.expired_age(&path, now)? else {
                continue;
            };
            if remove_if_exists(&path)? {
                purged += 1;
                debug!(path = %path.display(), age_secs = age.as_secs(), "Purged expired artifact");
                if let Some(sidecar) = sidecar_for(&path) {
                    remove_if_exists(&sidecar)?;
                }
            }
        }

        Ok(purged)
    }

    /// Age of `path` when it is past retention. Missing files are not expired.
    fn expired_age(&self, path: &Path, now: SystemTime) -> Result<Option<Duration>> {
        let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(path, e)),
        };

        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        Ok((age > self.max_age).then_some(age))
    }

    /// Build the manifest from disk without writing it.
    pub fn build(&self, now: DateTime<Utc>) -> Result<Manifest> {
        let mut by_date: BTreeMap<String, Vec<ManifestEntry>> = BTreeMap::new();

        for meta in self.scan()? {
            let entry = ManifestEntry::from(&meta);
            by_date.entry(entry.date.clone()).or_default().push(entry);
        }

        let dates: BTreeMap<String, DayEntries> = by_date
            .into_iter()
            .filter_map(|(date, mut entries)| {
                entries.sort_by(|a, b| self.compare(a, b));
                let best = entries.first()?.file.clone();
                Some((date, DayEntries { best, entries }))
            })
            .collect();

        Ok(Manifest {
            generated_at: now,
            latest: dates.keys().next_back().cloned(),
            dates,
        })
    }

    /// Sidecars whose artifact still exists.
    pub fn scan(&self) -> Result<Vec<ArtifactMeta>> {
        let mut metas = Vec::new();

        for path in self.artifact_files() {
            if !file_name(&path).is_some_and(|n| n.ends_with(META_SUFFIX)) {
                continue;
            }

            let bytes = std::fs::read(&path).map_err(|e| StorageError::io(&path, e))?;
            let meta: ArtifactMeta = match serde_json::from_slice(&bytes) {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable sidecar");
                    continue;
                }
            };

            if !self.output_dir.join(&meta.file).is_file() {
                debug!(file = %meta.file, "Artifact missing, leaving it out of the manifest");
                continue;
            }
            metas.push(meta);
        }

        Ok(metas)
    }

    /// Best-first ordering: configured class priority, composites before
    /// single passes, newest first, then file name.
    fn compare(&self, a: &ManifestEntry, b: &ManifestEntry) -> Ordering {
        self.config
            .rank(a.resolution)
            .cmp(&self.config.rank(b.resolution))
            .then_with(|| b.composite.cmp(&a.composite))
            .then_with(|| b.timestamp.cmp(&a.timestamp))
            .then_with(|| a.file.cmp(&b.file))
    }

    /// Pipeline-owned files in the output directory (artifacts and sidecars).
    fn artifact_files(&self) -> Vec<PathBuf> {
        if !self.output_dir.is_dir() {
            return Vec::new();
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&self.output_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Failed to read output directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| file_name(path).is_some_and(|n| n.starts_with(FILE_PREFIX)))
            .collect();

        files.sort();
        files
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// `sst_x_20240601.png` → `sst_x_20240601.png.meta.json`
fn sidecar_for(artifact: &Path) -> Option<PathBuf> {
    let name = file_name(artifact)?;
    Some(artifact.with_file_name(format!("{}{}", name, META_SUFFIX)))
}

/// Inverse of [`sidecar_for`]. `None` when `path` is not a sidecar.
fn artifact_for(sidecar: &Path) -> Option<PathBuf> {
    let name = file_name(sidecar)?.strip_suffix(META_SUFFIX)?;
    Some(sidecar.with_file_name(name))
}
