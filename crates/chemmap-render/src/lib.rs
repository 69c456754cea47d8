// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod bounds;
mod figure;
mod naming;
mod pairs;
mod plot;

use std::fmt::{Display, Formatter};

pub const CRATE_NAME: &str = "chemmap-render";

pub use bounds::{equal_aspect, overlay_bounds, with_margin, OVERLAY_MARGIN};
pub use figure::{
    render_run, Figure, FigureRenderer, Layer, OVERLAY_OPACITY, SINGLE_VIEW_OPACITY,
};
pub use naming::{overlay_name, single_view_name, PNG_EXT, TIFF_EXT};
pub use pairs::ordered_pairs;
pub use plot::{PlotRenderer, PlotStyle, X_AXIS_LABEL, Y_AXIS_LABEL};

#[derive(Debug)]
pub struct RenderError(pub String);
impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for RenderError {}
