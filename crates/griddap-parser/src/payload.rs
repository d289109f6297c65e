//! In-memory representation of a decoded grid response.

use std::collections::BTreeMap;

/// A variable or global attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Number(f64),
    Text(String),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            AttrValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Number(_) => None,
        }
    }
}

/// One named n-dimensional array with its attributes.
///
/// `data` holds raw (still packed) values in row-major order over `shape`.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
    pub attributes: BTreeMap<String, AttrValue>,
}

impl Variable {
    pub fn new(name: impl Into<String>, dims: Vec<String>, shape: Vec<usize>, data: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            dims,
            shape,
            data,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn attr_f64(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).and_then(AttrValue::as_f64)
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(AttrValue::as_str)
    }

    /// Declared physical unit, if any.
    pub fn units(&self) -> Option<&str> {
        self.attr_str("units")
    }

    /// Number of elements implied by `shape`.
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }
}

/// A decoded grid response for one (source, timestamp).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridPayload {
    pub variables: Vec<Variable>,
    /// Latitude samples in provider storage order.
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
}

impl GridPayload {
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    /// Copy a unit onto a variable that arrived without one, e.g. from the
    /// dataset metadata query.
    pub fn fill_missing_units(&mut self, variable: &str, units: &str) {
        if let Some(var) = self.variables.iter_mut().find(|v| v.name == variable) {
            var.attributes
                .entry("units".to_string())
                .or_insert_with(|| AttrValue::Text(units.to_string()));
        }
    }
}
