//! Raster rendering for normalized SST grids.
//!
//! - [`gradient`]: temperature color ramp, display range selection and
//!   RGBA rendering with transparent masked cells
//! - [`png`]: indexed / RGBA PNG encoding

pub mod gradient;
pub mod png;

use grid_processor::NormalizedGrid;
use sst_common::ColorScaleConfig;
use thiserror::Error;
use tracing::debug;

pub use gradient::{render_grid, sst_color, Color, ColorScale};

/// Errors produced while rendering a raster.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// Nothing to derive a color scale from.
    #[error("grid has no valid cells to render")]
    NoValidData,

    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;

/// An encoded raster and the display range used to color it.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub width: usize,
    pub height: usize,
    pub scale: ColorScale,
    pub png: Vec<u8>,
}

/// Color `grid` with the configured scale and encode it as PNG.
pub fn render_raster(grid: &NormalizedGrid, config: &ColorScaleConfig) -> Result<RasterImage> {
    let scale = ColorScale::from_config(config, grid).ok_or(RenderError::NoValidData)?;
    let pixels = render_grid(grid, &scale, sst_color);
    let png = png::create_png_auto(&pixels, grid.width(), grid.height()).map_err(RenderError::Encode)?;

    debug!(
        width = grid.width(),
        height = grid.height(),
        min = scale.min,
        max = scale.max,
        bytes = png.len(),
        "Rendered SST raster"
    );

    Ok(RasterImage {
        width: grid.width(),
        height: grid.height(),
        scale,
        png,
    })
}
