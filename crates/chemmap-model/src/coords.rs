// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::ops::Range;

pub type Point2 = [f64; 2];

/// Ordered 2-D points; row `i` belongs to fingerprint row `i`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoordinateBlock(Vec<Point2>);

impl CoordinateBlock {
    #[must_use]
    pub fn new(points: Vec<Point2>) -> Self {
        Self(points)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn points(&self) -> &[Point2] {
        &self.0
    }

    #[must_use]
    pub fn into_points(self) -> Vec<Point2> {
        self.0
    }

    /// Copies a contiguous row range. Panics if the range is out of bounds.
    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> Self {
        Self(self.0[range].to_vec())
    }

    #[must_use]
    pub fn concat(blocks: &[CoordinateBlock]) -> Self {
        Self(blocks.iter().flat_map(|b| b.0.iter().copied()).collect())
    }

    /// Per-axis extent, `None` for an empty block.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        let mut iter = self.0.iter();
        let first = iter.next()?;
        let mut b = Bounds {
            min_x: first[0],
            max_x: first[0],
            min_y: first[1],
            max_y: first[1],
        };
        for p in iter {
            b.min_x = b.min_x.min(p[0]);
            b.max_x = b.max_x.max(p[0]);
            b.min_y = b.min_y.min(p[1]);
            b.max_y = b.max_y.max(p[1]);
        }
        Some(b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    #[must_use]
    pub fn union(self, other: Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            max_x: self.max_x.max(other.max_x),
            min_y: self.min_y.min(other.min_y),
            max_y: self.max_y.max(other.max_y),
        }
    }

    #[must_use]
    pub fn span_x(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[must_use]
    pub fn span_y(&self) -> f64 {
        self.max_y - self.min_y
    }
}
