//! On-disk persistence for the SST pipeline.
//!
//! Provides:
//! - [`ArtifactWriter`]: point / raster artifacts with a metadata sidecar,
//!   keyed by (source, timestamp), written atomically
//! - [`ManifestBuilder`]: retention purge and a date-indexed catalog rebuilt
//!   from the output directory on every run

pub mod artifact;
pub mod error;
pub mod fsutil;
pub mod manifest;

pub use artifact::{ArtifactKey, ArtifactKind, ArtifactMeta, ArtifactWriter, WriteOutcome};
pub use error::{Result, StorageError};
pub use manifest::{DayEntries, Manifest, ManifestBuilder, ManifestEntry};
