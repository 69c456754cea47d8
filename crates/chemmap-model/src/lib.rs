// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Chemmap model SSOT: datasets, fingerprints, fingerprint matrices and
//! coordinate blocks shared by every pipeline stage.

mod coords;
mod dataset;
mod fingerprint;
mod matrix;
mod params;

pub use coords::{Bounds, CoordinateBlock, Point2};
pub use dataset::{
    sanitize_base_name, DatasetBaseName, DatasetSpec, DisplayColor, RunDatasets,
    ValidationError, LABEL_MAX_LEN,
};
pub use fingerprint::{Fingerprint, FingerprintParams, DEFAULT_N_BITS, DEFAULT_RADIUS};
pub use matrix::{CombinedFingerprints, FingerprintMatrix};
pub use params::{CacheKeyStrategy, EmbeddingParams, ExecutionMode, Metric};

pub const CRATE_NAME: &str = "chemmap-model";
