//! Nearest-neighbour regridding onto a regular north-up output grid.

use hsi_common::{BoundingBox, HsiError, Plane, Result};
use projection::CoordinateGrid;
use tracing::{info, warn};

use crate::kdtree::KdTree;

/// A regular north-up grid in map units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputGrid {
    pub lines: usize,
    pub samples: usize,
    /// X of column 0.
    pub xmin: f64,
    /// Y of row 0.
    pub ymax: f64,
    pub pixel_size: f64,
}

impl OutputGrid {
    /// Frame an extent: every edge snapped to a multiple of `pixel_size`
    /// and padded by one pixel.
    pub fn frame(extent: &BoundingBox, pixel_size: f64) -> Self {
        let framed = extent.snap_outward(pixel_size);
        let (lines, samples) = framed.grid_shape(pixel_size);
        Self {
            lines,
            samples,
            xmin: framed.min_x,
            ymax: framed.max_y,
            pixel_size,
        }
    }

    /// Map coordinate of cell `(row, col)`.
    pub fn cell_coordinate(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.xmin + col as f64 * self.pixel_size,
            self.ymax - row as f64 * self.pixel_size,
        )
    }

    pub fn len(&self) -> usize {
        self.lines * self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// For every output cell, the nearest aggregated source cell and its distance.
///
/// Built once per raster and applied to every band.
#[derive(Debug, Clone)]
pub struct RegridMapping {
    grid: OutputGrid,
    source_shape: (usize, usize),
    indices: Vec<usize>,
    distances: Vec<f64>,
}

impl RegridMapping {
    /// Frame the output grid around `coords` and look up the nearest source
    /// cell of each output cell.
    pub fn build(coords: &CoordinateGrid, pixel_size: f64) -> Result<Self> {
        let extent = coords
            .extent()
            .ok_or_else(|| HsiError::geometry("aggregated grid has no finite coordinates"))?;
        let grid = OutputGrid::frame(&extent, pixel_size);
        let tree = KdTree::build(coords.x.as_slice(), coords.y.as_slice());

        let mut indices = Vec::with_capacity(grid.len());
        let mut distances = Vec::with_capacity(grid.len());
        for row in 0..grid.lines {
            for col in 0..grid.samples {
                let (x, y) = grid.cell_coordinate(row, col);
                let hit = tree
                    .nearest(x, y)
                    .ok_or_else(|| HsiError::geometry("spatial index is empty"))?;
                indices.push(hit.index);
                distances.push(hit.distance);
            }
        }

        let mapping = Self {
            grid,
            source_shape: coords.shape(),
            indices,
            distances,
        };

        let valid = mapping.valid_count();
        info!(
            out_lines = grid.lines,
            out_samples = grid.samples,
            xmin = grid.xmin,
            ymax = grid.ymax,
            valid,
            "Built regrid mapping"
        );
        if valid == 0 {
            warn!("No output cell lies within one pixel of a source cell");
        }
        Ok(mapping)
    }

    pub fn grid(&self) -> &OutputGrid {
        &self.grid
    }

    /// Shape of the aggregated source grid the mapping indexes into.
    pub fn source_shape(&self) -> (usize, usize) {
        self.source_shape
    }

    /// Flat source index chosen for each output cell, row-major.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Distance from each output cell to its chosen source cell.
    pub fn distances(&self) -> &[f64] {
        &self.distances
    }

    /// A cell is valid when its nearest source cell is at most one output
    /// pixel away.
    pub fn is_valid(&self, cell: usize) -> bool {
        self.distances[cell] <= self.grid.pixel_size
    }

    pub fn valid_count(&self) -> usize {
        (0..self.distances.len()).filter(|&i| self.is_valid(i)).count()
    }

    /// Regrid one aggregated band. Invalid cells and NaN results become
    /// `no_data`.
    pub fn apply(&self, band: &Plane, no_data: f64) -> Result<Plane> {
        band.expect_shape(self.source_shape.0, self.source_shape.1)?;
        let source = band.as_slice();
        let values = self
            .indices
            .iter()
            .enumerate()
            .map(|(cell, &idx)| {
                let value = source[idx];
                if !self.is_valid(cell) || value.is_nan() {
                    no_data
                } else {
                    value
                }
            })
            .collect();
        Plane::from_vec(self.grid.lines, self.grid.samples, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use projection::GridGeometry;

    #[test]
    fn test_frame_extent() {
        let grid = OutputGrid::frame(&BoundingBox::new(14.5, 25.5, 74.5, 85.5), 30.0);
        assert_eq!((grid.lines, grid.samples), (4, 4));
        assert_eq!(grid.xmin, -30.0);
        assert_eq!(grid.ymax, 90.0);
        assert_eq!(grid.cell_coordinate(1, 2), (30.0, 60.0));
    }

    #[test]
    fn test_identity_grid_maps_onto_itself() {
        let coords = GridGeometry::new(3, 3, 100.0, 200.0, 10.0, 0.0)
            .unwrap()
            .coordinates();
        let mapping = RegridMapping::build(&coords, 10.0).unwrap();
        let grid = *mapping.grid();
        // Extent 100..120 x 180..200, snapped and padded to 90..130 x 170..210.
        assert_eq!((grid.lines, grid.samples), (4, 4));
        assert_eq!((grid.xmin, grid.ymax), (90.0, 210.0));

        let band = Plane::from_fn(3, 3, |r, c| (r * 3 + c) as f64);
        let out = mapping.apply(&band, -9999.0).unwrap();
        assert_eq!(out.get(1, 1), 0.0);
        assert_eq!(out.get(3, 3), 8.0);
        assert_eq!(out.get(0, 0), -9999.0);
    }

    #[test]
    fn test_distances_and_validity() {
        let coords = GridGeometry::new(6, 4, 1000.0, 2000.0, 7.5, 330.0)
            .unwrap()
            .coordinates();
        let mapping = RegridMapping::build(&coords, 10.0).unwrap();
        assert_eq!(mapping.indices().len(), mapping.grid().len());
        for (cell, &d) in mapping.distances().iter().enumerate() {
            assert!(d >= 0.0);
            assert_eq!(mapping.is_valid(cell), !(d > 10.0));
        }
        assert!(mapping.valid_count() > 0);
    }

    #[test]
    fn test_nan_becomes_no_data() {
        let coords = GridGeometry::new(2, 2, 0.0, 20.0, 10.0, 0.0)
            .unwrap()
            .coordinates();
        let mapping = RegridMapping::build(&coords, 10.0).unwrap();
        let band = Plane::filled(2, 2, f64::NAN);
        let out = mapping.apply(&band, -1.0).unwrap();
        assert!(out.as_slice().iter().all(|&v| v == -1.0));
        assert!(mapping.apply(&Plane::zeros(3, 2), -1.0).is_err());
    }
}
