// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use image::{ImageFormat, RgbImage};
use plotters::prelude::*;
use plotters::style::register_font;

use crate::bounds::{drawable, equal_aspect};
use crate::figure::{Figure, FigureRenderer};
use crate::naming::{PNG_EXT, TIFF_EXT};
use crate::RenderError;

pub const X_AXIS_LABEL: &str = "UMAP1";
pub const Y_AXIS_LABEL: &str = "UMAP2";

/// Every text element uses this family; the face is compiled into the crate
/// so output does not depend on fonts installed on the host.
const FONT_FAMILY: &str = "sans-serif";
static FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

fn register_embedded_font() -> Result<(), RenderError> {
    static REGISTERED: OnceLock<bool> = OnceLock::new();
    let ok = *REGISTERED
        .get_or_init(|| register_font(FONT_FAMILY, FontStyle::Normal, FONT_BYTES).is_ok());
    if ok {
        Ok(())
    } else {
        Err(RenderError("embedded font could not be loaded".to_string()))
    }
}

/// Canvas geometry in logical pixels; every length is multiplied by `scale`
/// when rasterized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotStyle {
    /// Output pixels are `size * scale` square.
    pub size: u32,
    pub scale: u32,
    pub marker_diameter: f64,
    pub margin: u32,
    /// Height of title, tick and axis label text.
    pub font_size: u32,
    /// Band reserved left of and below the plot for ticks and axis labels.
    pub label_area: u32,
}

impl PlotStyle {
    /// Margins and text scaled to a `size` canvas, matching the 2000 px
    /// defaults proportionally.
    #[must_use]
    pub fn for_size(size: u32) -> Self {
        Self {
            size,
            scale: 2,
            marker_diameter: 6.0,
            margin: size / 25,
            font_size: (size * 3 / 200).max(1),
            label_area: size * 3 / 50,
        }
    }
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self::for_size(2000)
    }
}

/// Raster scatter renderer: plotters draws into an RGB buffer which is
/// written once as PNG and once as TIFF. Both axes share one data-to-pixel
/// scale.
#[derive(Debug, Clone)]
pub struct PlotRenderer {
    style: PlotStyle,
}

impl PlotRenderer {
    pub fn new(style: PlotStyle) -> Result<Self, RenderError> {
        if style.size == 0 || style.scale == 0 {
            return Err(RenderError("image size and scale must be >= 1".to_string()));
        }
        if style.font_size == 0 {
            return Err(RenderError("font size must be >= 1".to_string()));
        }
        let reserved = style
            .margin
            .saturating_mul(2)
            .saturating_add(style.label_area);
        if reserved >= style.size {
            return Err(RenderError(format!(
                "margin {} and label area {} leave no plot area in a {} px canvas",
                style.margin, style.label_area, style.size
            )));
        }
        register_embedded_font()?;
        Ok(Self { style })
    }

    #[must_use]
    pub fn style(&self) -> PlotStyle {
        self.style
    }

    fn rasterize(&self, figure: &Figure<'_>) -> Result<RgbImage, RenderError> {
        let scale = self.style.scale;
        let side = self.style.size * scale;
        let margin = self.style.margin * scale;
        let font_px = self.style.font_size * scale;
        let label_px = self.style.label_area * scale;
        let mut buf = vec![0_u8; side as usize * side as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buf, (side, side)).into_drawing_area();
            root.fill(&WHITE).map_err(draw_err)?;
            let area = root.margin(margin, margin, margin, margin);
            let area = match &figure.title {
                Some(title) => area
                    .titled(title, (FONT_FAMILY, font_px))
                    .map_err(draw_err)?,
                None => area,
            };
            if let Some(bounds) = figure.bounds {
                let (width, height) = area.dim_in_pixel();
                let ((x0, x1), (y0, y1)) = equal_aspect(
                    drawable(bounds.min_x, bounds.max_x),
                    drawable(bounds.min_y, bounds.max_y),
                    width.saturating_sub(label_px),
                    height.saturating_sub(label_px),
                );
                let mut chart = ChartBuilder::on(&area)
                    .x_label_area_size(label_px)
                    .y_label_area_size(label_px)
                    .build_cartesian_2d(x0..x1, y0..y1)
                    .map_err(draw_err)?;
                chart
                    .configure_mesh()
                    .disable_mesh()
                    .x_desc(X_AXIS_LABEL)
                    .y_desc(Y_AXIS_LABEL)
                    .label_style((FONT_FAMILY, font_px))
                    .axis_desc_style((FONT_FAMILY, font_px))
                    .draw()
                    .map_err(draw_err)?;
                let radius = (self.style.marker_diameter * f64::from(scale) / 2.0)
                    .round()
                    .max(1.0) as i32;
                for layer in &figure.layers {
                    let (r, g, b) = layer.color.rgb();
                    let style = RGBColor(r, g, b).mix(layer.opacity).filled();
                    chart
                        .draw_series(
                            layer
                                .points
                                .points()
                                .iter()
                                .map(|p| Circle::new((p[0], p[1]), radius, style)),
                        )
                        .map_err(draw_err)?;
                }
            }
            root.present().map_err(draw_err)?;
        }
        RgbImage::from_raw(side, side, buf)
            .ok_or_else(|| RenderError("raster buffer has the wrong size".to_string()))
    }
}

impl FigureRenderer for PlotRenderer {
    fn render(&self, figure: &Figure<'_>, out_dir: &Path) -> Result<Vec<PathBuf>, RenderError> {
        fs::create_dir_all(out_dir)
            .map_err(|e| RenderError(format!("cannot create {}: {e}", out_dir.display())))?;
        let img = self.rasterize(figure)?;
        let mut written = Vec::with_capacity(2);
        for (ext, format) in [(PNG_EXT, ImageFormat::Png), (TIFF_EXT, ImageFormat::Tiff)] {
            let path = out_dir.join(format!("{}.{ext}", figure.name));
            img.save_with_format(&path, format)
                .map_err(|e| RenderError(format!("cannot write {}: {e}", path.display())))?;
            written.push(path);
        }
        Ok(written)
    }
}

fn draw_err<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> RenderError {
    RenderError(format!("drawing failed: {e}"))
}
