//! Core types for grid processing.

use sst_common::{BoundingBox, TemperatureBand};

use crate::error::{GridProcessorError, Result};

/// Coordinate agreement tolerance for stacking grids, in degrees.
const COORD_TOLERANCE: f64 = 1e-6;

/// A 2D Fahrenheit grid with a validity mask.
///
/// Invariants, checked on construction:
/// - `values.len() == mask.len() == lat.len() * lon.len()`
/// - `lat` is north-first (row 0 is the northernmost row)
/// - every valid cell holds a finite value; masked cells hold NaN
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedGrid {
    lat: Vec<f64>,
    lon: Vec<f64>,
    values: Vec<f64>,
    mask: Vec<bool>,
}

/// One unmasked cell with its coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidCell {
    pub row: usize,
    pub col: usize,
    pub lat: f64,
    pub lon: f64,
    pub value: f64,
}

impl NormalizedGrid {
    /// Build a grid from north-first °F values, masking everything that is
    /// not finite or falls outside `band`.
    pub fn from_fahrenheit(
        lat: Vec<f64>,
        lon: Vec<f64>,
        mut values: Vec<f64>,
        band: &TemperatureBand,
    ) -> Result<Self> {
        check_shape(&lat, &lon, values.len())?;

        let mask: Vec<bool> = values.iter().map(|v| band.contains(*v)).collect();
        for (value, valid) in values.iter_mut().zip(&mask) {
            if !valid {
                *value = f64::NAN;
            }
        }

        Self::from_parts(lat, lon, values, mask)
    }

    /// Build a grid from already-masked parts.
    pub fn from_parts(lat: Vec<f64>, lon: Vec<f64>, values: Vec<f64>, mask: Vec<bool>) -> Result<Self> {
        check_shape(&lat, &lon, values.len())?;
        if mask.len() != values.len() {
            return Err(GridProcessorError::shape_mismatch(format!(
                "mask has {} cells, values have {}",
                mask.len(),
                values.len()
            )));
        }
        if lat.len() > 1 && lat[0] < lat[lat.len() - 1] {
            return Err(GridProcessorError::shape_mismatch(
                "latitude must be north-first",
            ));
        }
        if let Some(idx) = mask
            .iter()
            .zip(&values)
            .position(|(valid, v)| *valid && !v.is_finite())
        {
            return Err(GridProcessorError::shape_mismatch(format!(
                "cell {} is marked valid but not finite",
                idx
            )));
        }

        Ok(Self {
            lat,
            lon,
            values,
            mask,
        })
    }

    /// Number of columns (longitude samples).
    pub fn width(&self) -> usize {
        self.lon.len()
    }

    /// Number of rows (latitude samples).
    pub fn height(&self) -> usize {
        self.lat.len()
    }

    /// North-first latitudes.
    pub fn lat(&self) -> &[f64] {
        &self.lat
    }

    pub fn lon(&self) -> &[f64] {
        &self.lon
    }

    /// Row-major °F values; masked cells are NaN.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Row-major validity mask.
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Value at (row, col), `None` if masked or out of range.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.height() || col >= self.width() {
            return None;
        }
        let idx = row * self.width() + col;
        self.mask[idx].then(|| self.values[idx])
    }

    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|v| **v).count()
    }

    pub fn is_empty(&self) -> bool {
        self.valid_count() == 0
    }

    /// Fail with `NoValidData` when every cell is masked.
    pub fn ensure_has_data(self) -> Result<Self> {
        if self.is_empty() {
            Err(GridProcessorError::NoValidData)
        } else {
            Ok(self)
        }
    }

    /// Iterate over unmasked cells in row-major order.
    pub fn valid_cells(&self) -> impl Iterator<Item = ValidCell> + '_ {
        let width = self.width();
        self.mask
            .iter()
            .enumerate()
            .filter(|(_, valid)| **valid)
            .map(move |(idx, _)| {
                let (row, col) = (idx / width, idx % width);
                ValidCell {
                    row,
                    col,
                    lat: self.lat[row],
                    lon: self.lon[col],
                    value: self.values[idx],
                }
            })
    }

    /// Minimum and maximum of the valid cells.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.valid_cells().map(|c| c.value).fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Pixel-edge geographic extent of the grid.
    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_cell_centers(&self.lat, &self.lon)
    }

    /// Explain why `other` cannot share a stack with `self`, if it can't.
    pub fn geometry_mismatch(&self, other: &NormalizedGrid) -> Option<String> {
        if self.height() != other.height() || self.width() != other.width() {
            return Some(format!(
                "shape {}x{} vs {}x{}",
                other.height(),
                other.width(),
                self.height(),
                self.width()
            ));
        }
        if !coords_match(&self.lat, &other.lat) {
            return Some("latitude vectors differ".to_string());
        }
        if !coords_match(&self.lon, &other.lon) {
            return Some("longitude vectors differ".to_string());
        }
        None
    }
}

fn check_shape(lat: &[f64], lon: &[f64], cells: usize) -> Result<()> {
    if lat.len() * lon.len() != cells {
        return Err(GridProcessorError::shape_mismatch(format!(
            "{} values for {} lat x {} lon",
            cells,
            lat.len(),
            lon.len()
        )));
    }
    Ok(())
}

fn coords_match(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= COORD_TOLERANCE)
}

/// Same-shape grids from one source across consecutive timestamps.
#[derive(Debug, Clone)]
pub struct GridStack {
    grids: Vec<NormalizedGrid>,
}

impl GridStack {
    /// Build a stack, rejecting empty input and members whose shape or
    /// coordinates differ from the first grid.
    pub fn new(grids: Vec<NormalizedGrid>) -> Result<Self> {
        let first = grids.first().ok_or(GridProcessorError::EmptyStack)?;
        for (index, grid) in grids.iter().enumerate().skip(1) {
            if let Some(reason) = first.geometry_mismatch(grid) {
                return Err(GridProcessorError::stack_mismatch(index, reason));
            }
        }
        Ok(Self { grids })
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    pub fn grids(&self) -> &[NormalizedGrid] {
        &self.grids
    }

    /// Shared geometry of every member.
    pub fn template(&self) -> &NormalizedGrid {
        &self.grids[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band() -> TemperatureBand {
        TemperatureBand::new(30.0, 100.0)
    }

    #[test]
    fn test_masking_on_construction() {
        let grid = NormalizedGrid::from_fahrenheit(
            vec![1.0, 0.0],
            vec![10.0, 11.0],
            vec![70.0, f64::NAN, 120.0, 29.9],
            &band(),
        )
        .unwrap();

        assert_eq!(grid.mask(), &[true, false, false, false]);
        assert_eq!(grid.get(0, 0), Some(70.0));
        assert_eq!(grid.get(1, 0), None);
        assert!(grid.values()[2].is_nan());
        assert_eq!(grid.valid_count(), 1);
        assert_eq!(grid.value_range(), Some((70.0, 70.0)));
    }

    #[test]
    fn test_rejects_bad_shape_and_orientation() {
        assert!(matches!(
            NormalizedGrid::from_fahrenheit(vec![0.0], vec![0.0, 1.0], vec![70.0], &band()),
            Err(GridProcessorError::ShapeMismatch(_))
        ));
        assert!(matches!(
            NormalizedGrid::from_parts(vec![0.0, 1.0], vec![0.0], vec![70.0, 71.0], vec![true, true]),
            Err(GridProcessorError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_ensure_has_data() {
        let empty =
            NormalizedGrid::from_fahrenheit(vec![0.0], vec![0.0], vec![f64::NAN], &band()).unwrap();
        assert_eq!(empty.ensure_has_data(), Err(GridProcessorError::NoValidData));
    }

    #[test]
    fn test_valid_cells_carry_coordinates() {
        let grid = NormalizedGrid::from_fahrenheit(
            vec![31.0, 30.0],
            vec![-90.0, -89.0],
            vec![f64::NAN, 75.0, 76.0, f64::NAN],
            &band(),
        )
        .unwrap();

        let cells: Vec<ValidCell> = grid.valid_cells().collect();
        assert_eq!(cells.len(), 2);
        assert_eq!((cells[0].lat, cells[0].lon, cells[0].value), (31.0, -89.0, 75.0));
        assert_eq!((cells[1].row, cells[1].col), (1, 0));
    }

    #[test]
    fn test_stack_rejects_mismatch() {
        let a = NormalizedGrid::from_fahrenheit(vec![1.0, 0.0], vec![0.0], vec![70.0, 71.0], &band())
            .unwrap();
        let b = NormalizedGrid::from_fahrenheit(vec![2.0, 1.0], vec![0.0], vec![70.0, 71.0], &band())
            .unwrap();

        assert!(GridStack::new(vec![a.clone(), a.clone()]).is_ok());
        assert!(matches!(
            GridStack::new(vec![a, b]),
            Err(GridProcessorError::StackMismatch { index: 1, .. })
        ));
        assert!(matches!(GridStack::new(vec![]), Err(GridProcessorError::EmptyStack)));
    }
}
