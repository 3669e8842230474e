//! Per-pixel map coordinates from an affine georeference.

use hsi_common::{BoundingBox, HsiError, Plane, RasterHeader, Result};
use nalgebra::{Rotation2, Vector2};
use tracing::debug;

/// Rotate `(x, y)` counter-clockwise by `angle_deg` about `(x0, y0)`.
pub fn rotate_coords(x: f64, y: f64, x0: f64, y0: f64, angle_deg: f64) -> (f64, f64) {
    let rotation = Rotation2::new(angle_deg.to_radians());
    let rotated = rotation * Vector2::new(x - x0, y - y0);
    (x0 + rotated.x, y0 + rotated.y)
}

/// X and Y ground coordinates of every pixel, each a `lines x samples` plane.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateGrid {
    pub x: Plane,
    pub y: Plane,
}

impl CoordinateGrid {
    /// Pair two coordinate planes of the same shape.
    pub fn new(x: Plane, y: Plane) -> Result<Self> {
        y.expect_shape(x.rows(), x.cols())?;
        Ok(Self { x, y })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.x.shape()
    }

    /// Extent of all finite coordinates.
    pub fn extent(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.x.as_slice(), self.y.as_slice())
    }
}

/// Affine pixel grid: origin at the upper-left corner, square pixels, rows
/// running south, optional rotation about the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub lines: usize,
    pub samples: usize,
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_size: f64,
    /// Rotation applied to the grid, in degrees.
    pub rotation: f64,
}

impl GridGeometry {
    pub fn new(
        lines: usize,
        samples: usize,
        origin_x: f64,
        origin_y: f64,
        pixel_size: f64,
        rotation: f64,
    ) -> Result<Self> {
        if !(pixel_size > 0.0) || !pixel_size.is_finite() {
            return Err(HsiError::geometry(format!(
                "pixel size must be positive, got {}",
                pixel_size
            )));
        }
        if !origin_x.is_finite() || !origin_y.is_finite() || !rotation.is_finite() {
            return Err(HsiError::geometry("non-finite origin or rotation"));
        }
        Ok(Self {
            lines,
            samples,
            origin_x,
            origin_y,
            pixel_size,
            rotation,
        })
    }

    /// Geometry described by a header's `map info`.
    ///
    /// The rotation is the header's effective rotation (`360 + stored` when a
    /// `rotation=` entry exists).
    pub fn from_header(header: &RasterHeader) -> Result<Self> {
        let map_info = header.require_map_info()?;
        let (origin_x, origin_y) = map_info.upper_left()?;
        let (pixel_size, _) = map_info.pixel_size()?;
        let rotation = map_info.effective_rotation()?;
        debug!(origin_x, origin_y, pixel_size, rotation, "Parsed georeference");
        Self::new(
            header.lines,
            header.samples,
            origin_x,
            origin_y,
            pixel_size,
            rotation,
        )
    }

    /// Map coordinate of pixel `(row, col)`.
    pub fn coordinate(&self, row: usize, col: usize) -> (f64, f64) {
        let x = self.origin_x + col as f64 * self.pixel_size;
        let y = self.origin_y - row as f64 * self.pixel_size;
        if self.rotation == 0.0 {
            return (x, y);
        }
        rotate_coords(x, y, self.origin_x, self.origin_y, self.rotation)
    }

    /// Coordinates of every pixel.
    pub fn coordinates(&self) -> CoordinateGrid {
        let unrotated_x = Plane::from_fn(self.lines, self.samples, |_, c| {
            self.origin_x + c as f64 * self.pixel_size
        });
        let unrotated_y = Plane::from_fn(self.lines, self.samples, |r, _| {
            self.origin_y - r as f64 * self.pixel_size
        });
        if self.rotation == 0.0 {
            return CoordinateGrid {
                x: unrotated_x,
                y: unrotated_y,
            };
        }

        let rotation = Rotation2::new(self.rotation.to_radians());
        let origin = Vector2::new(self.origin_x, self.origin_y);
        let mut x = unrotated_x;
        let mut y = unrotated_y;
        for (px, py) in x.as_mut_slice().iter_mut().zip(y.as_mut_slice().iter_mut()) {
            let rotated = origin + rotation * (Vector2::new(*px, *py) - origin);
            *px = rotated.x;
            *py = rotated.y;
        }
        CoordinateGrid { x, y }
    }
}
