// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use chemmap_model::{Bounds, CoordinateBlock, DatasetSpec, DisplayColor, RunDatasets};
use tracing::info;

use crate::bounds::{overlay_bounds, with_margin, OVERLAY_MARGIN};
use crate::naming::{overlay_name, single_view_name};
use crate::pairs::ordered_pairs;
use crate::RenderError;

pub const SINGLE_VIEW_OPACITY: f64 = 0.5;
pub const OVERLAY_OPACITY: f64 = 0.2;

/// One dataset's markers; layers are drawn in order, later on top.
#[derive(Debug, Clone)]
pub struct Layer<'a> {
    pub label: &'a str,
    pub color: &'a DisplayColor,
    pub points: &'a CoordinateBlock,
    pub opacity: f64,
}

#[derive(Debug, Clone)]
pub struct Figure<'a> {
    /// File stem of every encoding written for this figure.
    pub name: String,
    pub title: Option<String>,
    pub layers: Vec<Layer<'a>>,
    /// Axis ranges; `None` when there is nothing to draw.
    pub bounds: Option<Bounds>,
}

impl<'a> Figure<'a> {
    /// Scatter of one dataset titled with its label.
    #[must_use]
    pub fn single_view(spec: &'a DatasetSpec, points: &'a CoordinateBlock) -> Self {
        Self {
            name: single_view_name(&spec.base_name),
            title: Some(spec.label.clone()),
            layers: vec![Layer {
                label: &spec.label,
                color: &spec.color,
                points,
                opacity: SINGLE_VIEW_OPACITY,
            }],
            bounds: points.bounds().map(|b| with_margin(b, OVERLAY_MARGIN)),
        }
    }

    /// `first` drawn under `second`, shared axes from [`overlay_bounds`].
    #[must_use]
    pub fn overlay(
        first: (&'a DatasetSpec, &'a CoordinateBlock),
        second: (&'a DatasetSpec, &'a CoordinateBlock),
    ) -> Self {
        let layer = |(spec, points): (&'a DatasetSpec, &'a CoordinateBlock)| Layer {
            label: &spec.label,
            color: &spec.color,
            points,
            opacity: OVERLAY_OPACITY,
        };
        Self {
            name: overlay_name(&first.0.base_name, &second.0.base_name),
            title: None,
            bounds: overlay_bounds(first.1, second.1),
            layers: vec![layer(first), layer(second)],
        }
    }
}

/// Turns a figure into image files under `out_dir`, returning their paths.
pub trait FigureRenderer {
    fn render(&self, figure: &Figure<'_>, out_dir: &Path) -> Result<Vec<PathBuf>, RenderError>;
}

/// One single view per dataset, then one overlay per ordered pair.
pub fn render_run(
    renderer: &dyn FigureRenderer,
    datasets: &RunDatasets,
    blocks: &[CoordinateBlock],
    out_dir: &Path,
) -> Result<Vec<PathBuf>, RenderError> {
    if blocks.len() != datasets.len() {
        return Err(RenderError(format!(
            "{} coordinate blocks for {} datasets",
            blocks.len(),
            datasets.len()
        )));
    }
    let specs = datasets.as_slice();
    let mut written = Vec::new();
    for (spec, block) in specs.iter().zip(blocks) {
        let figure = Figure::single_view(spec, block);
        written.extend(renderer.render(&figure, out_dir)?);
        info!(figure = %figure.name, rows = block.len(), "single view rendered");
    }
    for (i, j) in ordered_pairs(specs.len()) {
        let figure = Figure::overlay((&specs[i], &blocks[i]), (&specs[j], &blocks[j]));
        written.extend(renderer.render(&figure, out_dir)?);
        info!(figure = %figure.name, "overlay rendered");
    }
    Ok(written)
}
