//! Artifact persistence.
//!
//! Each (source, timestamp) unit of work produces two files in the output
//! directory:
//!
//! ```text
//! sst_{source}_{stamp}[_mean].json | .png        artifact
//! sst_{source}_{stamp}[_mean].{ext}.meta.json    sidecar read by the manifest
//! ```
//!
//! Sidecars carry the artifact extension so point and raster artifacts of
//! the same key never share one.
//!
//! The artifact's existence is the cache key. The sidecar is written first
//! so an artifact on disk always has its metadata next to it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use grid_processor::NormalizedGrid;
use serde::{Deserialize, Serialize};
use sst_common::{stamp_for, ArtifactConfig, ArtifactMode, DataSource, ResolutionClass};
use tracing::{debug, info};

use crate::error::{Result, StorageError};
use crate::fsutil::write_atomic;

pub const FILE_PREFIX: &str = "sst_";
pub const META_SUFFIX: &str = ".meta.json";
const COMPOSITE_SUFFIX: &str = "_mean";

/// Artifact flavor on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Points,
    Raster,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Points => "json",
            ArtifactKind::Raster => "png",
        }
    }
}

impl From<ArtifactMode> for ArtifactKind {
    fn from(mode: ArtifactMode) -> Self {
        match mode {
            ArtifactMode::Points => ArtifactKind::Points,
            ArtifactMode::Raster => ArtifactKind::Raster,
        }
    }
}

/// Identity of one artifact: (source id, timestamp stamp, composite flag).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub source_id: String,
    pub stamp: String,
    pub composite: bool,
}

impl ArtifactKey {
    pub fn new(source_id: impl Into<String>, stamp: impl Into<String>, composite: bool) -> Self {
        Self {
            source_id: source_id.into(),
            stamp: stamp.into(),
            composite,
        }
    }

    /// Key for `source` at `timestamp`, stamped by the source's resolution.
    pub fn for_source(source: &DataSource, timestamp: &DateTime<Utc>, composite: bool) -> Self {
        Self::new(source.id.clone(), stamp_for(timestamp, source.resolution), composite)
    }

    /// Shared file name stem, e.g. `sst_noaacwBLENDEDsstDNDaily_20240601`.
    pub fn stem(&self) -> String {
        let suffix = if self.composite { COMPOSITE_SUFFIX } else { "" };
        format!("{}{}_{}{}", FILE_PREFIX, self.source_id, self.stamp, suffix)
    }

    pub fn file_name(&self, kind: ArtifactKind) -> String {
        format!("{}.{}", self.stem(), kind.extension())
    }

    pub fn meta_file_name(&self, kind: ArtifactKind) -> String {
        format!("{}{}", self.file_name(kind), META_SUFFIX)
    }
}

/// Sidecar metadata persisted next to every artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub source_id: String,
    pub source_name: String,
    pub resolution: ResolutionClass,
    pub timestamp: DateTime<Utc>,
    pub kind: ArtifactKind,
    /// Artifact file name, relative to the output directory.
    pub file: String,
    /// `[[south, west], [north, east]]`
    pub bounds: [[f64; 2]; 2],
    /// `[min, max]` in °F. Range of the emitted points, display range for
    /// rasters.
    pub temp_range: [f64; 2],
    /// Emitted points, or valid cells of the rendered grid.
    pub valid_cells: usize,
    pub composite: bool,
    /// Number of passes averaged into the artifact.
    pub members: usize,
}

/// Result of a write request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(PathBuf),
    /// Artifact already existed and force was off.
    Cached(PathBuf),
}

impl WriteOutcome {
    pub fn path(&self) -> &Path {
        match self {
            WriteOutcome::Written(p) | WriteOutcome::Cached(p) => p,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written(_))
    }
}

/// Point artifact: a GeoJSON FeatureCollection.
#[derive(Debug, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: PointGeometry,
    pub properties: PointProperties,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[lon, lat]`
    pub coordinates: [f64; 2],
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PointProperties {
    /// Temperature in °F, one decimal.
    pub t: f64,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Writes artifacts into one output directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
    config: ArtifactConfig,
    force: bool,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>, config: ArtifactConfig) -> Self {
        Self {
            output_dir: output_dir.into(),
            config,
            force: false,
        }
    }

    /// Overwrite existing artifacts instead of keeping the first write.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn kind(&self) -> ArtifactKind {
        self.config.mode.into()
    }

    pub fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        self.output_dir.join(key.file_name(self.kind()))
    }

    /// True when the artifact is on disk and would be kept as is.
    ///
    /// Callers check this before any network work.
    pub fn is_cached(&self, key: &ArtifactKey) -> bool {
        !self.force && self.path_for(key).is_file()
    }

    /// Persist `grid` under `key`.
    ///
    /// Existing artifacts are kept unless force is on. A fully masked grid,
    /// or a point grid whose valid cells all fall off the stride, is refused
    /// with [`StorageError::NoValidData`].
    pub fn write(
        &self,
        key: &ArtifactKey,
        source: &DataSource,
        timestamp: DateTime<Utc>,
        grid: &NormalizedGrid,
        members: usize,
    ) -> Result<WriteOutcome> {
        let path = self.path_for(key);
        if self.is_cached(key) {
            debug!(path = %path.display(), "Artifact exists, keeping first write");
            return Ok(WriteOutcome::Cached(path));
        }

        if grid.is_empty() {
            return Err(StorageError::NoValidData);
        }
        let bounds = grid.bounds().ok_or(StorageError::NoValidData)?;

        let kind = self.kind();
        let (bytes, temp_range, valid_cells) = match kind {
            ArtifactKind::Points => {
                let points = self.encode_points(grid)?;
                (points.bytes, points.temp_range, points.count)
            }
            ArtifactKind::Raster => {
                let image = renderer::render_raster(grid, &self.config.color_scale)?;
                (
                    image.png,
                    [round_to(image.scale.min, 1), round_to(image.scale.max, 1)],
                    grid.valid_count(),
                )
            }
        };

        let meta = ArtifactMeta {
            source_id: source.id.clone(),
            source_name: source.display_name.clone(),
            resolution: source.resolution,
            timestamp,
            kind,
            file: key.file_name(kind),
            bounds: bounds.corners(),
            temp_range,
            valid_cells,
            composite: key.composite,
            members,
        };

        let meta_path = self.output_dir.join(key.meta_file_name(kind));
        write_atomic(&meta_path, &serde_json::to_vec_pretty(&meta)?)?;
        write_atomic(&path, &bytes)?;

        info!(
            source = %source.id,
            file = %meta.file,
            valid = meta.valid_cells,
            bytes = bytes.len(),
            "Wrote artifact"
        );

        Ok(WriteOutcome::Written(path))
    }

    /// One feature per valid cell on the configured stride.
    fn encode_points(&self, grid: &NormalizedGrid) -> Result<EncodedPoints> {
        let stride = self.config.stride.max(1);

        let features: Vec<Feature> = grid
            .valid_cells()
            .filter(|cell| cell.row % stride == 0 && cell.col % stride == 0)
            .map(|cell| Feature {
                kind: "Feature".to_string(),
                geometry: PointGeometry {
                    kind: "Point".to_string(),
                    coordinates: [round_to(cell.lon, 4), round_to(cell.lat, 4)],
                },
                properties: PointProperties {
                    t: round_to(cell.value, 1),
                },
            })
            .collect();

        if features.is_empty() {
            return Err(StorageError::NoValidData);
        }

        let (min, max) = features
            .iter()
            .map(|f| f.properties.t)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| (lo.min(t), hi.max(t)));
        let count = features.len();

        let collection = FeatureCollection {
            kind: "FeatureCollection".to_string(),
            features,
        };
        Ok(EncodedPoints {
            bytes: serde_json::to_vec(&collection)?,
            temp_range: [min, max],
            count,
        })
    }
}

struct EncodedPoints {
    bytes: Vec<u8>,
    temp_range: [f64; 2],
    count: usize,
}
