//! Griddap JSON table responses.
//!
//! Every griddap JSON response shares one envelope:
//!
//! ```text
//! {"table": {"columnNames": [...], "columnUnits": [...], "rows": [[...], ...]}}
//! ```
//!
//! The same envelope carries the time axis (`.json?time`), the dataset
//! metadata (`/info/{id}/index.json`) and grid subsets (`.json?var[..]`).

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{GriddapError, GriddapResult};
use crate::payload::{AttrValue, GridPayload, Variable};
use crate::GridDecoder;

#[derive(Debug, Deserialize)]
struct TableEnvelope {
    table: Table,
}

/// A decoded griddap table.
#[derive(Debug, Clone, Deserialize)]
pub struct Table {
    #[serde(rename = "columnNames")]
    pub column_names: Vec<String>,
    #[serde(rename = "columnUnits", default)]
    pub column_units: Vec<Option<String>>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Parse a JSON table envelope.
    pub fn parse(bytes: &[u8]) -> GriddapResult<Self> {
        let envelope: TableEnvelope = serde_json::from_slice(bytes)?;
        Ok(envelope.table)
    }

    /// Index of the first column whose name matches any candidate (case-insensitive).
    pub fn column(&self, candidates: &[&str]) -> Option<usize> {
        self.column_names
            .iter()
            .position(|name| candidates.iter().any(|c| name.eq_ignore_ascii_case(c)))
    }

    pub fn unit(&self, column: usize) -> Option<&str> {
        self.column_units
            .get(column)
            .and_then(|u| u.as_deref())
            .filter(|u| !u.is_empty())
    }
}

fn cell_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn cell_str(value: &Value) -> Option<&str> {
    value.as_str()
}

fn cell_time(value: &Value) -> GriddapResult<DateTime<Utc>> {
    match value {
        Value::String(s) => sst_common::parse_iso(s)
            .map_err(|_| GriddapError::InvalidTimestamp(s.clone())),
        // Numeric time columns are seconds since 1970-01-01.
        Value::Number(n) => n
            .as_f64()
            .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single())
            .ok_or_else(|| GriddapError::InvalidTimestamp(n.to_string())),
        other => Err(GriddapError::InvalidTimestamp(other.to_string())),
    }
}

/// Parse a time-axis response into an ascending, de-duplicated list.
pub fn parse_time_axis(bytes: &[u8]) -> GriddapResult<Vec<DateTime<Utc>>> {
    let table = Table::parse(bytes)?;
    let column = table.column(&["time"]).unwrap_or(0);

    let mut times = table
        .rows
        .iter()
        .filter_map(|row| row.get(column))
        .map(cell_time)
        .collect::<GriddapResult<Vec<_>>>()?;

    times.sort();
    times.dedup();
    Ok(times)
}

/// Variable names and attributes from a dataset info query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetMetadata {
    /// Data variables in declaration order.
    pub variables: Vec<String>,
    /// Attributes per variable; global attributes live under `NC_GLOBAL`.
    pub attributes: BTreeMap<String, BTreeMap<String, AttrValue>>,
}

impl DatasetMetadata {
    /// Parse an `/info/{dataset}/index.json` response.
    pub fn parse(bytes: &[u8]) -> GriddapResult<Self> {
        let table = Table::parse(bytes)?;

        let row_type = table
            .column(&["Row Type"])
            .ok_or_else(|| GriddapError::MissingData("Row Type column".to_string()))?;
        let var_name = table
            .column(&["Variable Name"])
            .ok_or_else(|| GriddapError::MissingData("Variable Name column".to_string()))?;
        let attr_name = table.column(&["Attribute Name"]);
        let data_type = table.column(&["Data Type"]);
        let value_col = table.column(&["Value"]);

        let mut metadata = DatasetMetadata::default();

        for row in &table.rows {
            let kind = row.get(row_type).and_then(cell_str).unwrap_or_default();
            let Some(name) = row.get(var_name).and_then(cell_str) else {
                continue;
            };

            match kind {
                "variable" => metadata.variables.push(name.to_string()),
                "attribute" => {
                    let Some(attr) = attr_name.and_then(|c| row.get(c)).and_then(cell_str) else {
                        continue;
                    };
                    let raw = value_col.and_then(|c| row.get(c));
                    let numeric = data_type
                        .and_then(|c| row.get(c))
                        .and_then(cell_str)
                        .is_some_and(|t| !t.eq_ignore_ascii_case("string"));

                    let value = match raw {
                        Some(Value::Number(n)) => AttrValue::Number(n.as_f64().unwrap_or(f64::NAN)),
                        Some(Value::String(s)) if numeric => match s.trim().parse::<f64>() {
                            Ok(v) => AttrValue::Number(v),
                            Err(_) => AttrValue::Text(s.clone()),
                        },
                        Some(Value::String(s)) => AttrValue::Text(s.clone()),
                        _ => continue,
                    };

                    metadata
                        .attributes
                        .entry(name.to_string())
                        .or_default()
                        .insert(attr.to_string(), value);
                }
                _ => {}
            }
        }

        debug!(variables = metadata.variables.len(), "Parsed dataset metadata");
        Ok(metadata)
    }

    /// First acceptable name that the dataset actually declares.
    pub fn resolve_variable<'a>(&self, acceptable: &'a [String]) -> Option<&'a str> {
        acceptable
            .iter()
            .find(|name| self.variables.iter().any(|v| v == *name))
            .map(String::as_str)
    }

    pub fn attribute(&self, variable: &str, name: &str) -> Option<&AttrValue> {
        self.attributes.get(variable).and_then(|attrs| attrs.get(name))
    }

    pub fn units(&self, variable: &str) -> Option<&str> {
        self.attribute(variable, "units").and_then(AttrValue::as_str)
    }
}

/// Decodes `.json` grid subsets.
///
/// Griddap flattens a subset into one row per (time, lat, lon) with the
/// longitude varying fastest; this rebuilds the dense array. Values in the
/// table are already unpacked by the server, so no scale/offset attributes
/// are attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTableDecoder;

impl GridDecoder for JsonTableDecoder {
    fn file_type(&self) -> &'static str {
        "json"
    }

    fn decode(&self, bytes: &[u8]) -> GriddapResult<GridPayload> {
        let table = Table::parse(bytes)?;
        grid_from_table(&table)
    }
}

const AXIS_COLUMNS: [&str; 7] = [
    "time", "latitude", "lat", "longitude", "lon", "altitude", "depth",
];

/// Axis value lookup keyed by bit pattern (axis samples are exact repeats).
struct AxisIndex {
    values: Vec<f64>,
    index: HashMap<u64, usize>,
}

impl AxisIndex {
    fn new() -> Self {
        Self {
            values: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn slot(&mut self, value: f64) -> usize {
        *self.index.entry(value.to_bits()).or_insert_with(|| {
            self.values.push(value);
            self.values.len() - 1
        })
    }
}

fn grid_from_table(table: &Table) -> GriddapResult<GridPayload> {
    let lat_col = table
        .column(&["latitude", "lat"])
        .ok_or_else(|| GriddapError::MissingData("latitude column".to_string()))?;
    let lon_col = table
        .column(&["longitude", "lon"])
        .ok_or_else(|| GriddapError::MissingData("longitude column".to_string()))?;
    let time_col = table.column(&["time"]);

    let data_cols: Vec<usize> = (0..table.column_names.len())
        .filter(|&i| {
            !AXIS_COLUMNS
                .iter()
                .any(|axis| table.column_names[i].eq_ignore_ascii_case(axis))
        })
        .collect();
    if data_cols.is_empty() {
        return Err(GriddapError::MissingData("data variable column".to_string()));
    }

    let mut times: Vec<String> = Vec::new();
    let mut lats = AxisIndex::new();
    let mut lons = AxisIndex::new();
    let mut cells: Vec<(usize, usize, usize, &Vec<Value>)> = Vec::with_capacity(table.rows.len());

    for row in &table.rows {
        if row.len() != table.column_names.len() {
            return Err(GriddapError::InvalidFormat(format!(
                "row has {} cells, expected {}",
                row.len(),
                table.column_names.len()
            )));
        }

        let t = match time_col.and_then(|c| cell_str(&row[c])) {
            Some(ts) => match times.iter().position(|t| t == ts) {
                Some(i) => i,
                None => {
                    times.push(ts.to_string());
                    times.len() - 1
                }
            },
            None => 0,
        };

        let lat = cell_f64(&row[lat_col]);
        let lon = cell_f64(&row[lon_col]);
        if !lat.is_finite() || !lon.is_finite() {
            return Err(GriddapError::InvalidFormat(
                "non-numeric coordinate in grid row".to_string(),
            ));
        }

        cells.push((t, lats.slot(lat), lons.slot(lon), row));
    }

    let nt = times.len().max(1);
    let (nlat, nlon) = (lats.values.len(), lons.values.len());
    let plane = nlat * nlon;

    let mut dims = Vec::with_capacity(3);
    let mut shape = Vec::with_capacity(3);
    if time_col.is_some() {
        dims.push("time".to_string());
        shape.push(nt);
    }
    dims.push(table.column_names[lat_col].clone());
    dims.push(table.column_names[lon_col].clone());
    shape.push(nlat);
    shape.push(nlon);

    let variables = data_cols
        .iter()
        .map(|&col| {
            let mut data = vec![f64::NAN; nt * plane];
            for (t, y, x, row) in &cells {
                data[t * plane + y * nlon + x] = cell_f64(&row[col]);
            }

            let mut var = Variable::new(table.column_names[col].clone(), dims.clone(), shape.clone(), data);
            if let Some(units) = table.unit(col) {
                var = var.with_attr("units", AttrValue::Text(units.to_string()));
            }
            var
        })
        .collect();

    debug!(nt, nlat, nlon, "Decoded griddap JSON table");

    Ok(GridPayload {
        variables,
        lat: lats.values,
        lon: lons.values,
    })
}
