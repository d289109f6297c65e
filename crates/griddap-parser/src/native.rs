//! Native NetCDF decoding using the netcdf library.
//!
//! The netcdf library requires a file path (it wraps libnetcdf/HDF5 which
//! need file handles), so response bytes go through a temp file first. On
//! Linux `/dev/shm` is preferred to keep that round trip in memory.
//!
//! Values are read raw; `scale_factor`, `add_offset`, `_FillValue` and
//! `units` are copied onto the [`Variable`] so unpacking happens in one
//! place downstream regardless of file type.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::{GriddapError, GriddapResult};
use crate::payload::{AttrValue, GridPayload, Variable};
use crate::GridDecoder;

const LAT_NAMES: [&str; 2] = ["latitude", "lat"];
const LON_NAMES: [&str; 2] = ["longitude", "lon"];

/// Decodes `.nc` grid subsets.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetCdfDecoder;

impl GridDecoder for NetCdfDecoder {
    fn file_type(&self) -> &'static str {
        "nc"
    }

    fn decode(&self, bytes: &[u8]) -> GriddapResult<GridPayload> {
        let temp_file = get_optimal_temp_dir().join(generate_temp_filename());

        let mut file = std::fs::File::create(&temp_file)?;
        file.write_all(bytes)?;
        drop(file);

        let result = decode_file(&temp_file);
        let _ = std::fs::remove_file(&temp_file);
        result
    }
}

fn decode_file(path: &std::path::Path) -> GriddapResult<GridPayload> {
    let nc_file = netcdf::open(path)
        .map_err(|e| GriddapError::InvalidFormat(format!("Failed to open NetCDF: {}", e)))?;

    let lat = read_coordinate(&nc_file, &LAT_NAMES)?;
    let lon = read_coordinate(&nc_file, &LON_NAMES)?;

    let mut variables = Vec::new();
    for var in nc_file.variables() {
        let name = var.name();
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();

        // Coordinate and scalar variables are not grids.
        if dims.len() < 2 || dims.iter().any(|d| *d == name) {
            continue;
        }

        let data: Vec<f64> = var
            .get_values(..)
            .map_err(|e| GriddapError::InvalidFormat(format!("Failed to read {}: {}", name, e)))?;

        let mut variable = Variable::new(
            name.clone(),
            dims,
            var.dimensions().iter().map(|d| d.len()).collect(),
            data,
        );
        variable.attributes = read_attributes(var.attributes());
        variables.push(variable);
    }

    debug!(variables = variables.len(), nlat = lat.len(), nlon = lon.len(), "Decoded NetCDF grid");

    Ok(GridPayload {
        variables,
        lat,
        lon,
    })
}

fn read_coordinate(nc_file: &netcdf::File, names: &[&str]) -> GriddapResult<Vec<f64>> {
    let var = names
        .iter()
        .find_map(|n| nc_file.variable(n))
        .ok_or_else(|| GriddapError::MissingData(format!("{} variable", names[0])))?;

    var.get_values(..)
        .map_err(|e| GriddapError::InvalidFormat(format!("Failed to read {}: {}", names[0], e)))
}

fn read_attributes<'a>(
    attrs: impl Iterator<Item = netcdf::Attribute<'a>>,
) -> BTreeMap<String, AttrValue> {
    let mut out = BTreeMap::new();
    for attr in attrs {
        let Ok(value) = attr.value() else {
            continue;
        };
        let converted = match value {
            netcdf::AttributeValue::Str(s) => AttrValue::Text(s),
            other => match f64::try_from(other) {
                Ok(v) => AttrValue::Number(v),
                Err(_) => continue,
            },
        };
        out.insert(attr.name().to_string(), converted);
    }
    out
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Get the optimal temp directory for NetCDF file operations.
///
/// On Linux, uses /dev/shm (memory-backed tmpfs) if available.
fn get_optimal_temp_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let shm_path = std::path::Path::new("/dev/shm");
        if shm_path.is_dir() {
            let test_path = shm_path.join(format!(".sst_netcdf_test_{}", std::process::id()));
            if std::fs::write(&test_path, b"test").is_ok() {
                let _ = std::fs::remove_file(&test_path);
                return shm_path.to_path_buf();
            }
        }
    }

    std::env::temp_dir()
}

/// Unique temp file name per process and call.
fn generate_temp_filename() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let pid = std::process::id();
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("sst_grid_{}_{}.nc", pid, count)
}
