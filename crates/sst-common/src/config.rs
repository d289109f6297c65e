//! Pipeline configuration.
//!
//! One immutable `PipelineConfig` is built per run and handed to every
//! component, so several independent runs can coexist in one process.
//! It is loaded from a YAML file:
//!
//! ```yaml
//! output_dir: data/sst
//! region: { south: 24.0, west: -98.0, north: 31.0, east: -80.0 }
//! valid_band: { min_f: 30.0, max_f: 100.0 }
//! lookback: { hours: 72 }
//! retention: { days: 14 }
//! artifact:
//!   mode: raster
//!   color_scale: { type: percentile, low: 2.0, high: 98.0 }
//! sources: []   # empty means the built-in registry
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bbox::BoundingBox;
use crate::error::{ConfigError, ConfigResult};
use crate::source::{DataSource, ResolutionClass, SourceRegistry, TemperatureBand};

/// Root configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_region")]
    pub region: BoundingBox,
    #[serde(default)]
    pub valid_band: TemperatureBand,
    #[serde(default)]
    pub lookback: LookbackConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub artifact: ArtifactConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub manifest: ManifestConfig,
    /// Empty means "use the built-in registry".
    #[serde(default)]
    pub sources: Vec<DataSource>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/sst")
}

fn default_region() -> BoundingBox {
    // Gulf of Mexico
    BoundingBox::new(24.0, -98.0, 31.0, -80.0)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            region: default_region(),
            valid_band: TemperatureBand::default(),
            lookback: LookbackConfig::default(),
            retention: RetentionConfig::default(),
            artifact: ArtifactConfig::default(),
            http: HttpConfig::default(),
            manifest: ManifestConfig::default(),
            sources: Vec::new(),
        }
    }
}

/// Trailing window of timestamps worth fetching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookbackConfig {
    /// Keep axis entries newer than `now - hours`.
    #[serde(default = "default_lookback_hours")]
    pub hours: u64,
    /// When set, keep the trailing `count` axis entries instead.
    #[serde(default)]
    pub count: Option<usize>,
}

fn default_lookback_hours() -> u64 {
    72
}

impl Default for LookbackConfig {
    fn default() -> Self {
        Self {
            hours: default_lookback_hours(),
            count: None,
        }
    }
}

/// Ten years. Larger windows overflow timestamp arithmetic.
pub const MAX_LOOKBACK_HOURS: u64 = 10 * 366 * 24;
pub const MAX_RETENTION_DAYS: u64 = 10 * 366;

impl LookbackConfig {
    /// Window length, capped at [`MAX_LOOKBACK_HOURS`].
    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::hours(self.hours.min(MAX_LOOKBACK_HOURS) as i64)
    }
}

/// Artifact retention, judged by file modification time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_retention_days")]
    pub days: u64,
}

fn default_retention_days() -> u64 {
    14
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: default_retention_days(),
        }
    }
}

impl RetentionConfig {
    /// Retention window, capped at [`MAX_RETENTION_DAYS`].
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.days.min(MAX_RETENTION_DAYS) * 24 * 3600)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactMode {
    /// GeoJSON point FeatureCollection.
    #[default]
    Points,
    /// RGBA PNG with transparent masked cells.
    Raster,
}

impl std::str::FromStr for ArtifactMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "points" | "geojson" => Ok(ArtifactMode::Points),
            "raster" | "png" => Ok(ArtifactMode::Raster),
            other => Err(format!("unknown artifact mode: {}", other)),
        }
    }
}

/// Color scale used for raster artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColorScaleConfig {
    /// Fixed display range in °F.
    Fixed { min: f64, max: f64 },
    /// Display range from percentiles of the valid cells.
    Percentile { low: f64, high: f64 },
}

impl Default for ColorScaleConfig {
    fn default() -> Self {
        ColorScaleConfig::Percentile {
            low: 2.0,
            high: 98.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    #[serde(default)]
    pub mode: ArtifactMode,
    /// Keep every n-th row and column in point mode.
    #[serde(default = "default_stride")]
    pub stride: usize,
    #[serde(default)]
    pub color_scale: ColorScaleConfig,
}

fn default_stride() -> usize {
    1
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            mode: ArtifactMode::default(),
            stride: default_stride(),
            color_scale: ColorScaleConfig::default(),
        }
    }
}

/// Network timeouts and retry budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout for grid downloads.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Timeout for time-axis and metadata queries.
    #[serde(default = "default_axis_timeout")]
    pub axis_timeout_secs: u64,
    /// Retries per candidate on transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,
}

fn default_request_timeout() -> u64 {
    60
}

fn default_axis_timeout() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_retry_delay() -> u64 {
    2000
}

fn default_max_retry_delay() -> u64 {
    30_000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            axis_timeout_secs: default_axis_timeout(),
            max_retries: default_max_retries(),
            initial_retry_delay_ms: default_initial_retry_delay(),
            max_retry_delay_ms: default_max_retry_delay(),
        }
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn axis_timeout(&self) -> Duration {
        Duration::from_secs(self.axis_timeout_secs)
    }

    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestConfig {
    #[serde(default = "default_manifest_file")]
    pub file_name: String,
    /// Best-entry order when several artifacts share a date.
    #[serde(default = "default_priority")]
    pub priority: Vec<ResolutionClass>,
}

fn default_manifest_file() -> String {
    "manifest.json".to_string()
}

fn default_priority() -> Vec<ResolutionClass> {
    ResolutionClass::ALL.to_vec()
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            file_name: default_manifest_file(),
            priority: default_priority(),
        }
    }
}

impl ManifestConfig {
    /// Rank of a class in the configured priority (lower wins).
    /// Classes missing from the list rank after every listed class.
    pub fn rank(&self, class: ResolutionClass) -> usize {
        self.priority
            .iter()
            .position(|c| *c == class)
            .unwrap_or(self.priority.len() + class as usize)
    }
}

impl PipelineConfig {
    /// Load a configuration from a YAML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: PipelineConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        config.validate()?;
        debug!(path = %path.display(), sources = config.sources.len(), "Loaded pipeline config");
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.region.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "region edges are inverted: {:?}",
                self.region
            )));
        }
        if self.valid_band.min_f >= self.valid_band.max_f {
            return Err(ConfigError::Invalid(format!(
                "valid_band min_f ({}) must be below max_f ({})",
                self.valid_band.min_f, self.valid_band.max_f
            )));
        }
        if self.artifact.stride == 0 {
            return Err(ConfigError::Invalid("artifact.stride must be >= 1".to_string()));
        }
        if let ColorScaleConfig::Percentile { low, high } = self.artifact.color_scale {
            if !(0.0..=100.0).contains(&low) || !(0.0..=100.0).contains(&high) || low >= high {
                return Err(ConfigError::Invalid(format!(
                    "percentile color scale needs 0 <= low < high <= 100, got {}..{}",
                    low, high
                )));
            }
        }
        if self.lookback.hours > MAX_LOOKBACK_HOURS {
            return Err(ConfigError::Invalid(format!(
                "lookback.hours must be <= {}, got {}",
                MAX_LOOKBACK_HOURS, self.lookback.hours
            )));
        }
        if self.retention.days > MAX_RETENTION_DAYS {
            return Err(ConfigError::Invalid(format!(
                "retention.days must be <= {}, got {}",
                MAX_RETENTION_DAYS, self.retention.days
            )));
        }
        if self.lookback.count == Some(0) {
            return Err(ConfigError::Invalid("lookback.count must be >= 1".to_string()));
        }
        for source in &self.sources {
            if source.base_urls.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "source {} has no base_urls",
                    source.id
                )));
            }
            if source.variable_names.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "source {} has no variable_names",
                    source.id
                )));
            }
        }
        Ok(())
    }

    /// Configured sources, or the built-in registry when none are listed.
    pub fn registry(&self) -> SourceRegistry {
        if self.sources.is_empty() {
            SourceRegistry::builtin()
        } else {
            SourceRegistry::new(self.sources.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config: PipelineConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.valid_band, TemperatureBand::new(30.0, 100.0));
        assert_eq!(config.lookback.hours, 72);
        assert_eq!(config.artifact.mode, ArtifactMode::Points);
        assert_eq!(config.registry().len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
output_dir: /tmp/sst
region: { south: 35.0, west: -76.0, north: 45.0, east: -65.0 }
valid_band: { min_f: 35.0, max_f: 95.0 }
lookback: { hours: 24, count: 3 }
artifact:
  mode: raster
  color_scale: { type: fixed, min: 40.0, max: 85.0 }
manifest:
  priority: [near_real_time, blended]
sources:
  - id: jplMURSST41
    display_name: "MUR SST"
    base_urls: ["https://coastwatch.pfeg.noaa.gov/erddap"]
    resolution: blended
    variable_names: [analysed_sst]
"#;

        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.valid_band.min_f, 35.0);
        assert_eq!(config.lookback.count, Some(3));
        assert_eq!(config.artifact.mode, ArtifactMode::Raster);
        assert_eq!(
            config.artifact.color_scale,
            ColorScaleConfig::Fixed { min: 40.0, max: 85.0 }
        );
        assert_eq!(config.manifest.rank(ResolutionClass::NearRealTime), 0);
        assert_eq!(config.manifest.rank(ResolutionClass::Blended), 1);
        assert!(config.manifest.rank(ResolutionClass::Hourly) > 1);

        let registry = config.registry();
        assert_eq!(registry.len(), 1);
        let mur = registry.get("jplMURSST41").unwrap();
        assert!(mur.enabled);
        assert!(!mur.composite);
    }

    #[test]
    fn test_validate_rejects_bad_band() {
        let config = PipelineConfig {
            valid_band: TemperatureBand::new(90.0, 40.0),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_oversized_windows() {
        let config: PipelineConfig =
            serde_yaml::from_str("lookback: { hours: 3000000000000 }").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        // Never panics, even unvalidated.
        assert_eq!(config.lookback.duration(), chrono::Duration::hours(MAX_LOOKBACK_HOURS as i64));
        let _ = chrono::Utc::now() - config.lookback.duration();

        let config: PipelineConfig = serde_yaml::from_str("retention: { days: 18446744073709551615 }").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert_eq!(config.retention.max_age(), Duration::from_secs(MAX_RETENTION_DAYS * 24 * 3600));

        let edge = PipelineConfig {
            lookback: LookbackConfig {
                hours: MAX_LOOKBACK_HOURS,
                count: None,
            },
            ..Default::default()
        };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "retention: {{ days: 3 }}").unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.retention.max_age(), Duration::from_secs(3 * 24 * 3600));

        let missing = PipelineConfig::load(Path::new("/nonexistent/sst.yaml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
