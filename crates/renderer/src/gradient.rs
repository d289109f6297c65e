//! Gradient rendering for SST grids.

use grid_processor::NormalizedGrid;
use sst_common::ColorScaleConfig;

/// Number of distinct ramp steps. Keeps rasters within an indexed PNG palette.
const RAMP_STEPS: f64 = 64.0;

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn transparent() -> Self {
        Self { r: 0, g: 0, b: 0, a: 0 }
    }
}

/// Display range in °F that the color ramp is stretched over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    pub min: f64,
    pub max: f64,
}

impl ColorScale {
    pub fn fixed(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Range between the `low` and `high` percentiles of the valid cells.
    ///
    /// Percentiles interpolate linearly between the closest ranks. Returns
    /// `None` when the grid has no valid cells.
    pub fn from_percentiles(grid: &NormalizedGrid, low: f64, high: f64) -> Option<Self> {
        let mut values: Vec<f64> = grid.valid_cells().map(|c| c.value).collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);

        Some(Self {
            min: percentile(&values, low),
            max: percentile(&values, high),
        })
    }

    pub fn from_config(config: &ColorScaleConfig, grid: &NormalizedGrid) -> Option<Self> {
        match *config {
            ColorScaleConfig::Fixed { min, max } => Some(Self::fixed(min, max)),
            ColorScaleConfig::Percentile { low, high } => Self::from_percentiles(grid, low, high),
        }
    }

    /// Position of `value` inside the range, clamped to 0..=1.
    pub fn normalize(&self, value: f64) -> f64 {
        let range = self.max - self.min;
        let range = if range.abs() < 0.001 { 1.0 } else { range };
        ((value - self.min) / range).clamp(0.0, 1.0)
    }
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// SST color ramp over a normalized position (0 = coldest, 1 = warmest).
///
/// Cold water is deep blue, moving through cyan, green and yellow to red.
pub fn sst_color(norm: f64) -> Color {
    let t = (norm.clamp(0.0, 1.0) * RAMP_STEPS).round() / RAMP_STEPS;

    const STOPS: [(f64, Color); 6] = [
        (0.0, Color { r: 8, g: 29, b: 88, a: 255 }),
        (0.2, Color { r: 34, g: 94, b: 168, a: 255 }),
        (0.4, Color { r: 65, g: 182, b: 196, a: 255 }),
        (0.6, Color { r: 161, g: 218, b: 180, a: 255 }),
        (0.8, Color { r: 254, g: 178, b: 76, a: 255 }),
        (1.0, Color { r: 189, g: 0, b: 38, a: 255 }),
    ];

    for pair in STOPS.windows(2) {
        let (p0, c0) = pair[0];
        let (p1, c1) = pair[1];
        if t <= p1 {
            return interpolate_color(c0, c1, (t - p0) / (p1 - p0));
        }
    }
    STOPS[STOPS.len() - 1].1
}

/// Linear color interpolation
pub fn interpolate_color(color1: Color, color2: Color, t: f64) -> Color {
    let t = t.clamp(0.0, 1.0);
    let t_inv = 1.0 - t;

    Color::new(
        ((color1.r as f64 * t_inv) + (color2.r as f64 * t)).round() as u8,
        ((color1.g as f64 * t_inv) + (color2.g as f64 * t)).round() as u8,
        ((color1.b as f64 * t_inv) + (color2.b as f64 * t)).round() as u8,
        ((color1.a as f64 * t_inv) + (color2.a as f64 * t)).round() as u8,
    )
}

/// Render a grid as RGBA pixels, row 0 at the top.
///
/// Masked cells are fully transparent, never a fill color.
pub fn render_grid<F>(grid: &NormalizedGrid, scale: &ColorScale, color_fn: F) -> Vec<u8>
where
    F: Fn(f64) -> Color,
{
    let mut pixels = vec![0u8; grid.width() * grid.height() * 4];

    for (idx, (value, valid)) in grid.values().iter().zip(grid.mask()).enumerate() {
        let color = if *valid {
            color_fn(scale.normalize(*value))
        } else {
            Color::transparent()
        };

        let pixel_idx = idx * 4;
        pixels[pixel_idx] = color.r;
        pixels[pixel_idx + 1] = color.g;
        pixels[pixel_idx + 2] = color.b;
        pixels[pixel_idx + 3] = color.a;
    }

    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use sst_common::TemperatureBand;

    fn grid(values: Vec<f64>) -> NormalizedGrid {
        let n = values.len();
        let lon: Vec<f64> = (0..n).map(|i| i as f64).collect();
        NormalizedGrid::from_fahrenheit(vec![0.0], lon, values, &TemperatureBand::default()).unwrap()
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [60.0, 70.0, 80.0, 90.0, 100.0];
        assert_eq!(percentile(&sorted, 0.0), 60.0);
        assert_eq!(percentile(&sorted, 50.0), 80.0);
        assert_eq!(percentile(&sorted, 100.0), 100.0);
        assert!((percentile(&sorted, 10.0) - 64.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_scale_ignores_masked() {
        let g = grid(vec![60.0, f64::NAN, 80.0, 150.0]);
        let scale = ColorScale::from_percentiles(&g, 0.0, 100.0).unwrap();
        assert_eq!(scale, ColorScale::fixed(60.0, 80.0));

        let empty = grid(vec![f64::NAN]);
        assert_eq!(ColorScale::from_percentiles(&empty, 2.0, 98.0), None);
        assert_eq!(
            ColorScale::from_config(&ColorScaleConfig::Fixed { min: 40.0, max: 90.0 }, &empty),
            Some(ColorScale::fixed(40.0, 90.0))
        );
    }

    #[test]
    fn test_normalize_clamps() {
        let scale = ColorScale::fixed(60.0, 80.0);
        assert_eq!(scale.normalize(50.0), 0.0);
        assert_eq!(scale.normalize(70.0), 0.5);
        assert_eq!(scale.normalize(90.0), 1.0);
        assert_eq!(ColorScale::fixed(70.0, 70.0).normalize(70.0), 0.0);
    }

    #[test]
    fn test_ramp_endpoints_opaque() {
        assert_eq!(sst_color(0.0), Color::new(8, 29, 88, 255));
        assert_eq!(sst_color(1.0), Color::new(189, 0, 38, 255));
        assert!((0..=100).all(|i| sst_color(i as f64 / 100.0).a == 255));
    }

    #[test]
    fn test_masked_cells_transparent() {
        let g = grid(vec![70.0, f64::NAN, 20.0]);
        let pixels = render_grid(&g, &ColorScale::fixed(60.0, 80.0), sst_color);
        assert_eq!(pixels.len(), 12);
        assert_eq!(pixels[3], 255);
        assert_eq!(&pixels[4..8], &[0, 0, 0, 0]);
        assert_eq!(&pixels[8..12], &[0, 0, 0, 0]);
    }
}
