// SPDX-License-Identifier: Apache-2.0

use chemmap_model::DatasetBaseName;

pub const PNG_EXT: &str = "png";
pub const TIFF_EXT: &str = "tiff";

#[must_use]
pub fn single_view_name(base: &DatasetBaseName) -> String {
    format!("umap_{base}")
}

#[must_use]
pub fn overlay_name(first: &DatasetBaseName, second: &DatasetBaseName) -> String {
    format!("umap_overlay_{first}_{second}")
}
