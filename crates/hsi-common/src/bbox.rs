//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

/// A projected bounding box in map units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Extent of a cloud of points, skipping NaN coordinates.
    ///
    /// Returns `None` when no point has both coordinates finite.
    pub fn from_points(xs: &[f64], ys: &[f64]) -> Option<Self> {
        let mut bbox: Option<Self> = None;
        for (&x, &y) in xs.iter().zip(ys) {
            if x.is_nan() || y.is_nan() {
                continue;
            }
            bbox = Some(match bbox {
                None => Self::new(x, y, x, y),
                Some(b) => Self::new(b.min_x.min(x), b.min_y.min(y), b.max_x.max(x), b.max_y.max(y)),
            });
        }
        bbox
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Snap the box outward onto a grid of `pixel` spacing and pad it by one
    /// extra pixel on every side.
    ///
    /// Each edge is floored to a multiple of `pixel`; the max edges then gain
    /// one pixel and the min edges lose one.
    pub fn snap_outward(&self, pixel: f64) -> Self {
        let snap = |v: f64| pixel * (v / pixel).floor();
        Self {
            min_x: snap(self.min_x) - pixel,
            min_y: snap(self.min_y) - pixel,
            max_x: snap(self.max_x) + pixel,
            max_y: snap(self.max_y) + pixel,
        }
    }

    /// Number of `(lines, samples)` of a `pixel`-spaced grid spanning the box.
    pub fn grid_shape(&self, pixel: f64) -> (usize, usize) {
        let lines = (self.height() / pixel).round().max(0.0) as usize;
        let samples = (self.width() / pixel).round().max(0.0) as usize;
        (lines, samples)
    }
}
