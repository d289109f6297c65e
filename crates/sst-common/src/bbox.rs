//! Geographic bounding boxes.

use serde::{Deserialize, Serialize};

/// A geographic bounding box in WGS84 degrees.
///
/// Longitudes follow the provider's convention (-180..180 for every
/// configured source). Serialized field order matches the request order
/// used for grid queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Create a new bounding box from its edges.
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Parse a "south,west,north,east" string (used by the CLI override).
    pub fn from_csv(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(part.to_string()))?;
        }

        let bbox = Self::new(values[0], values[1], values[2], values[3]);
        if !bbox.is_valid() {
            return Err(BboxParseError::Inverted(s.to_string()));
        }
        Ok(bbox)
    }

    /// True when south <= north and west <= east.
    pub fn is_valid(&self) -> bool {
        self.south <= self.north && self.west <= self.east
    }

    /// Corners as `[[south, west], [north, east]]`, the layout map overlays expect.
    pub fn corners(&self) -> [[f64; 2]; 2] {
        [[self.south, self.west], [self.north, self.east]]
    }

    /// Pixel-edge extent of a regular grid whose samples sit at cell centers.
    ///
    /// Returns `None` for empty coordinate vectors.
    pub fn from_cell_centers(lat: &[f64], lon: &[f64]) -> Option<Self> {
        let (lat_min, lat_max) = min_max(lat)?;
        let (lon_min, lon_max) = min_max(lon)?;

        let half_lat = half_step(lat_min, lat_max, lat.len());
        let half_lon = half_step(lon_min, lon_max, lon.len());

        Some(Self::new(
            lat_min - half_lat,
            lon_min - half_lon,
            lat_max + half_lat,
            lon_max + half_lon,
        ))
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let mut iter = values.iter().copied().filter(|v| v.is_finite());
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

fn half_step(min: f64, max: f64, count: usize) -> f64 {
    if count < 2 {
        0.0
    } else {
        (max - min) / (count - 1) as f64 / 2.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid bounding box format: {0}. Expected 'south,west,north,east'")]
    InvalidFormat(String),

    #[error("Invalid number in bounding box: {0}")]
    InvalidNumber(String),

    #[error("Bounding box edges are inverted: {0}")]
    Inverted(String),
}
