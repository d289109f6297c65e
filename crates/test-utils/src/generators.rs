//! Synthetic SST data for tests.
//!
//! Grids are row-major in whatever latitude order the caller passes, the
//! same way a provider would return them. JSON builders produce griddap
//! table bodies that the real decoders accept.

use griddap_parser::{AttrValue, GridPayload, Variable};
use serde_json::{json, Value};

/// Evenly spaced axis: `start, start + step, ...` with `n` samples.
///
/// # Example
///
/// ```
/// use test_utils::axis;
///
/// assert_eq!(axis(24.0, 0.5, 3), vec![24.0, 24.5, 25.0]);
/// ```
pub fn axis(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Creates a Celsius grid ranging from 20°C (first cell) to about 30°C.
///
/// Every value maps into the default 30–100°F band.
pub fn celsius_grid(width: usize, height: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x_factor = col as f64 / width.max(1) as f64;
            let y_factor = row as f64 / height.max(1) as f64;
            data.push(20.0 + x_factor * 5.0 + y_factor * 5.0);
        }
    }
    data
}

/// Same pattern as [`celsius_grid`], in Kelvin.
pub fn kelvin_grid(width: usize, height: usize) -> Vec<f64> {
    celsius_grid(width, height)
        .into_iter()
        .map(|c| c + 273.15)
        .collect()
}

/// Replace every `every`-th value with `fill` (cloud gaps).
pub fn with_gaps(mut values: Vec<f64>, every: usize, fill: f64) -> Vec<f64> {
    if every > 0 {
        for value in values.iter_mut().step_by(every) {
            *value = fill;
        }
    }
    values
}

/// A single-time-slice payload holding one variable.
pub fn sst_payload(
    variable: &str,
    units: Option<&str>,
    lat: Vec<f64>,
    lon: Vec<f64>,
    values: Vec<f64>,
) -> GridPayload {
    let shape = vec![1, lat.len(), lon.len()];
    let dims = vec![
        "time".to_string(),
        "latitude".to_string(),
        "longitude".to_string(),
    ];

    let mut var = Variable::new(variable, dims, shape, values);
    if let Some(units) = units {
        var = var.with_attr("units", AttrValue::Text(units.to_string()));
    }

    GridPayload {
        variables: vec![var],
        lat,
        lon,
    }
}

/// Body of a `.json?time` axis query.
pub fn time_axis_json(times: &[&str]) -> String {
    let rows: Vec<Value> = times.iter().map(|t| json!([t])).collect();
    json!({
        "table": {
            "columnNames": ["time"],
            "columnTypes": ["String"],
            "columnUnits": ["UTC"],
            "rows": rows,
        }
    })
    .to_string()
}

/// Body of an `/info/{dataset}/index.json` query declaring `variables`
/// with optional units.
pub fn info_json(variables: &[(&str, Option<&str>)]) -> String {
    let mut rows = vec![json!(["attribute", "NC_GLOBAL", "title", "String", "Synthetic SST"])];
    for (name, units) in variables {
        rows.push(json!(["variable", name, "", "float", "time, latitude, longitude"]));
        if let Some(units) = units {
            rows.push(json!(["attribute", name, "units", "String", units]));
        }
    }
    json!({
        "table": {
            "columnNames": ["Row Type", "Variable Name", "Attribute Name", "Data Type", "Value"],
            "rows": rows,
        }
    })
    .to_string()
}

/// Body of a `.json` grid subset query. Non-finite values become `null`.
pub fn grid_table_json(
    variable: &str,
    units: &str,
    time: &str,
    lat: &[f64],
    lon: &[f64],
    values: &[f64],
) -> String {
    let mut rows = Vec::with_capacity(lat.len() * lon.len());
    for (y, la) in lat.iter().enumerate() {
        for (x, lo) in lon.iter().enumerate() {
            let v = values[y * lon.len() + x];
            let cell = if v.is_finite() { json!(v) } else { Value::Null };
            rows.push(json!([time, la, lo, cell]));
        }
    }
    json!({
        "table": {
            "columnNames": ["time", "latitude", "longitude", variable],
            "columnUnits": ["UTC", "degrees_north", "degrees_east", units],
            "rows": rows,
        }
    })
    .to_string()
}
