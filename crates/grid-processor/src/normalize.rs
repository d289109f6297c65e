//! Reduce provider payloads to north-first Fahrenheit grids.

use griddap_parser::{GridPayload, Variable};
use sst_common::TemperatureBand;
use tracing::{debug, warn};

use crate::error::{GridProcessorError, Result};
use crate::types::NormalizedGrid;
use crate::units::TemperatureUnit;

/// Normalizes payloads from any provider identically.
#[derive(Debug, Clone)]
pub struct GridNormalizer {
    band: TemperatureBand,
}

impl GridNormalizer {
    pub fn new(band: TemperatureBand) -> Self {
        Self { band }
    }

    pub fn band(&self) -> &TemperatureBand {
        &self.band
    }

    /// Normalize `payload` using the first acceptable variable it contains.
    pub fn normalize(&self, payload: &GridPayload, acceptable: &[String]) -> Result<NormalizedGrid> {
        let variable = resolve_variable(payload, acceptable)?;
        let nlat = payload.lat.len();
        let nlon = payload.lon.len();

        let plane = first_plane(variable, nlat, nlon)?;
        let unpacked = unpack(variable, plane);

        let unit = match variable.units().map(|u| (u, TemperatureUnit::classify(u))) {
            Some((_, Some(unit))) => unit,
            Some((declared, None)) => {
                let inferred = TemperatureUnit::infer_from_values(&unpacked);
                warn!(variable = %variable.name, units = %declared, ?inferred, "Unrecognized unit, inferring from magnitude");
                inferred
            }
            None => {
                let inferred = TemperatureUnit::infer_from_values(&unpacked);
                debug!(variable = %variable.name, ?inferred, "No declared unit, inferring from magnitude");
                inferred
            }
        };

        let mut values: Vec<f64> = unpacked.into_iter().map(|v| unit.to_fahrenheit(v)).collect();
        let mut lat = payload.lat.clone();

        if nlat > 1 && lat[0] < lat[nlat - 1] {
            flip_rows(&mut values, nlon);
            lat.reverse();
        }

        let grid = NormalizedGrid::from_fahrenheit(lat, payload.lon.clone(), values, &self.band)?;

        debug!(
            variable = %variable.name,
            ?unit,
            rows = grid.height(),
            cols = grid.width(),
            valid = grid.valid_count(),
            "Normalized grid"
        );

        Ok(grid)
    }
}

/// First acceptable name present in the payload.
fn resolve_variable<'a>(payload: &'a GridPayload, acceptable: &[String]) -> Result<&'a Variable> {
    acceptable
        .iter()
        .find_map(|name| payload.variable(name))
        .ok_or_else(|| GridProcessorError::VariableNotFound {
            tried: acceptable.to_vec(),
            available: payload.variable_names().map(String::from).collect(),
        })
}

/// The trailing (lat, lon) plane at index 0 of every leading axis.
fn first_plane(variable: &Variable, nlat: usize, nlon: usize) -> Result<&[f64]> {
    let shape = &variable.shape;
    if shape.len() < 2 {
        return Err(GridProcessorError::shape_mismatch(format!(
            "{} has {} dimensions, need at least 2",
            variable.name,
            shape.len()
        )));
    }

    let (rows, cols) = (shape[shape.len() - 2], shape[shape.len() - 1]);
    if rows != nlat || cols != nlon {
        return Err(GridProcessorError::shape_mismatch(format!(
            "{} is {}x{} but coordinates are {}x{}",
            variable.name, rows, cols, nlat, nlon
        )));
    }
    if variable.data.len() != variable.element_count() {
        return Err(GridProcessorError::shape_mismatch(format!(
            "{} has {} values for shape {:?}",
            variable.name,
            variable.data.len(),
            shape
        )));
    }

    let leading: usize = shape[..shape.len() - 2].iter().product();
    if leading > 1 {
        warn!(variable = %variable.name, slices = leading, "Payload has several time slices, using the first");
    }

    Ok(&variable.data[..rows * cols])
}

/// Apply `_FillValue`/`missing_value` masking and linear unpacking.
fn unpack(variable: &Variable, raw: &[f64]) -> Vec<f64> {
    let scale = variable.attr_f64("scale_factor").unwrap_or(1.0);
    let offset = variable.attr_f64("add_offset").unwrap_or(0.0);
    let fill = variable.attr_f64("_FillValue");
    let missing = variable.attr_f64("missing_value");

    raw.iter()
        .map(|&v| {
            if Some(v) == fill || Some(v) == missing {
                f64::NAN
            } else {
                v * scale + offset
            }
        })
        .collect()
}

/// Reverse row order in place.
fn flip_rows(values: &mut [f64], width: usize) {
    if width == 0 {
        return;
    }
    let height = values.len() / width;
    for row in 0..height / 2 {
        let mirror = height - 1 - row;
        let (top, bottom) = values.split_at_mut(mirror * width);
        top[row * width..(row + 1) * width].swap_with_slice(&mut bottom[..width]);
    }
}
