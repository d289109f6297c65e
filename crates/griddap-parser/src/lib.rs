//! Griddap response decoding for satellite SST products.
//!
//! This crate turns the raw bodies returned by a griddap server into typed
//! values:
//!
//! - time axis queries → ascending `Vec<DateTime<Utc>>`
//! - dataset info queries → [`DatasetMetadata`]
//! - grid subset queries → [`GridPayload`] (named arrays with attributes)
//!
//! Grid subsets can be requested in several file types; each is handled by
//! a [`GridDecoder`]. The JSON table decoder is always available. The
//! native NetCDF decoder is behind the `netcdf` feature because it links
//! against libnetcdf/libhdf5.

pub mod error;
#[cfg(feature = "netcdf")]
pub mod native;
pub mod payload;
pub mod table;

pub use error::{GriddapError, GriddapResult};
#[cfg(feature = "netcdf")]
pub use native::NetCdfDecoder;
pub use payload::{AttrValue, GridPayload, Variable};
pub use table::{parse_time_axis, DatasetMetadata, JsonTableDecoder, Table};

/// Decodes one grid response file type into a [`GridPayload`].
pub trait GridDecoder: Send + Sync {
    /// File type suffix used in the grid query (`json`, `nc`).
    fn file_type(&self) -> &'static str;

    /// Decode a complete response body.
    fn decode(&self, bytes: &[u8]) -> GriddapResult<GridPayload>;
}
