//! Common types and configuration shared across the SST pipeline crates.

pub mod bbox;
pub mod config;
pub mod error;
pub mod source;
pub mod time;

pub use bbox::BoundingBox;
pub use config::{
    ArtifactConfig, ArtifactMode, ColorScaleConfig, HttpConfig, LookbackConfig, ManifestConfig,
    PipelineConfig, RetentionConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use source::{DataSource, LatOrder, ResolutionClass, SourceRegistry, TemperatureBand};
pub use time::{format_iso, parse_iso, stamp_for};
