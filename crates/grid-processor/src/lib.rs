//! Grid normalization and temporal aggregation for SST products.
//!
//! Providers disagree on variable names, packing, units and latitude
//! order. This crate reduces every decoded [`griddap_parser::GridPayload`]
//! to one canonical form:
//!
//! ```text
//! GridPayload
//!      │
//!      ├─► resolve variable (first acceptable name present)
//!      ├─► select first time slice
//!      ├─► unpack: raw * scale_factor + add_offset
//!      ├─► convert Kelvin / Celsius → °F
//!      ├─► flip rows so row 0 is the northernmost
//!      └─► mask non-finite and out-of-band cells
//!               │
//!               ▼
//!        NormalizedGrid ──► GridStack ──► aggregate() ──► NormalizedGrid
//! ```

pub mod aggregate;
pub mod error;
pub mod normalize;
pub mod types;
pub mod units;

// Re-export commonly used types at crate root
pub use aggregate::{aggregate, aggregate_grids};
pub use error::{GridProcessorError, Result};
pub use normalize::GridNormalizer;
pub use types::{GridStack, NormalizedGrid, ValidCell};
pub use units::TemperatureUnit;
