// SPDX-License-Identifier: Apache-2.0

use chemmap_model::{Bounds, CoordinateBlock};

/// Relative padding added on each side of an overlay's axis ranges.
pub const OVERLAY_MARGIN: f64 = 0.05;

/// Union box of both blocks, padded by `OVERLAY_MARGIN * span` per axis.
/// `None` when both blocks are empty.
#[must_use]
pub fn overlay_bounds(a: &CoordinateBlock, b: &CoordinateBlock) -> Option<Bounds> {
    let union = match (a.bounds(), b.bounds()) {
        (Some(x), Some(y)) => x.union(y),
        (Some(x), None) | (None, Some(x)) => x,
        (None, None) => return None,
    };
    Some(with_margin(union, OVERLAY_MARGIN))
}

#[must_use]
pub fn with_margin(b: Bounds, margin: f64) -> Bounds {
    let (dx, dy) = (b.span_x() * margin, b.span_y() * margin);
    Bounds {
        min_x: b.min_x - dx,
        max_x: b.max_x + dx,
        min_y: b.min_y - dy,
        max_y: b.max_y + dy,
    }
}

/// Axis range the plotting backend can draw: a zero-width range is widened
/// by half a unit each way.
pub(crate) fn drawable(lo: f64, hi: f64) -> (f64, f64) {
    if hi > lo {
        (lo, hi)
    } else {
        (lo - 0.5, hi + 0.5)
    }
}

/// Widens the range that covers fewer data units per pixel, about its
/// centre, so a `width` x `height` px plot area draws both axes at one scale.
#[must_use]
pub fn equal_aspect(
    x: (f64, f64),
    y: (f64, f64),
    width: u32,
    height: u32,
) -> ((f64, f64), (f64, f64)) {
    if width == 0 || height == 0 {
        return (x, y);
    }
    let (w, h) = (f64::from(width), f64::from(height));
    let (x_per_px, y_per_px) = ((x.1 - x.0) / w, (y.1 - y.0) / h);
    let widen = |(lo, hi): (f64, f64), span: f64| {
        let mid = (lo + hi) / 2.0;
        (mid - span / 2.0, mid + span / 2.0)
    };
    if x_per_px >= y_per_px {
        (x, widen(y, x_per_px * h))
    } else {
        (widen(x, y_per_px * w), y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn margin_is_five_percent_of_union_span() {
        let a = CoordinateBlock::new(vec![[0.0, 0.0], [10.0, 2.0]]);
        let b = CoordinateBlock::new(vec![[-10.0, 4.0]]);
        let got = overlay_bounds(&a, &b).expect("bounds");
        assert_eq!(
            got,
            Bounds {
                min_x: -11.0,
                max_x: 11.0,
                min_y: -0.2,
                max_y: 4.2,
            }
        );
    }

    #[test]
    fn empty_sides() {
        let a = CoordinateBlock::new(vec![[1.0, 1.0]]);
        let empty = CoordinateBlock::default();
        assert_eq!(
            overlay_bounds(&a, &empty).expect("one side"),
            Bounds {
                min_x: 1.0,
                max_x: 1.0,
                min_y: 1.0,
                max_y: 1.0,
            }
        );
        assert!(overlay_bounds(&empty, &empty).is_none());
        assert_eq!(drawable(1.0, 1.0), (0.5, 1.5));
    }

    #[test]
    fn equal_aspect_widens_the_short_axis() {
        assert_eq!(
            equal_aspect((0.0, 10.0), (0.0, 2.0), 100, 100),
            ((0.0, 10.0), (-4.0, 6.0))
        );
        assert_eq!(
            equal_aspect((0.0, 10.0), (0.0, 10.0), 200, 100),
            ((-5.0, 15.0), (0.0, 10.0))
        );
        let ((x0, x1), (y0, y1)) = equal_aspect((-3.0, 1.0), (2.0, 7.0), 300, 150);
        assert!((((x1 - x0) / 300.0) - ((y1 - y0) / 150.0)).abs() < 1e-12);
    }

    #[test]
    fn equal_aspect_keeps_ranges_for_an_empty_area() {
        assert_eq!(
            equal_aspect((0.0, 1.0), (0.0, 5.0), 0, 10),
            ((0.0, 1.0), (0.0, 5.0))
        );
    }
}
