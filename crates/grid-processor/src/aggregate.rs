//! Block aggregation for reducing rasters to coarser resolution.
//!
//! An array is cut into non-overlapping `bin x bin` tiles, remainder rows and
//! columns are cropped, and each tile is reduced to a single value.

use hsi_common::{HsiError, Plane, Result};
use serde::{Deserialize, Serialize};

/// How a tile is reduced to one value.
///
/// - **NanMean**: continuous quantities with gaps (reflectance, coordinates)
/// - **Mean**: strict averaging, any gap in a tile poisons it
/// - **CircularMean**: angles in degrees that wrap at 360
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlockReducer {
    /// Arithmetic mean of non-NaN values; all-NaN tiles give NaN.
    #[default]
    NanMean,
    /// Arithmetic mean; a single NaN makes the tile NaN.
    Mean,
    /// Two-stage circular mean of degrees, ignoring NaN.
    CircularMean,
}

/// Aggregate a 2-D plane in `bin x bin` tiles.
///
/// Output shape is `(rows / bin, cols / bin)`. A bin of 1 returns a copy.
pub fn aggregate_plane(plane: &Plane, bin: usize, reducer: BlockReducer) -> Result<Plane> {
    check_axis("lines", plane.rows(), bin)?;
    check_axis("samples", plane.cols(), bin)?;
    if bin == 1 {
        return Ok(plane.clone());
    }

    let out_rows = plane.rows() / bin;
    let out_cols = plane.cols() / bin;
    let mut tile = Vec::with_capacity(bin * bin);

    Ok(Plane::from_fn(out_rows, out_cols, |r, c| {
        tile.clear();
        for row in r * bin..(r + 1) * bin {
            tile.extend_from_slice(&plane.row(row)[c * bin..(c + 1) * bin]);
        }
        reduce_tile(&tile, bin, reducer)
    }))
}

/// Aggregate along rows only: every column is reduced in blocks of `bin`
/// consecutive rows. Output shape is `(rows / bin, cols)`.
///
/// Used on `bands x samples` line planes to average neighbouring bands.
pub fn aggregate_rows(plane: &Plane, bin: usize, reducer: BlockReducer) -> Result<Plane> {
    check_axis("bands", plane.rows(), bin)?;
    if bin == 1 {
        return Ok(plane.clone());
    }

    let mut column = Vec::with_capacity(bin);
    Ok(Plane::from_fn(plane.rows() / bin, plane.cols(), |r, c| {
        column.clear();
        column.extend((r * bin..(r + 1) * bin).map(|row| plane.get(row, c)));
        reduce_block(&column, reducer)
    }))
}

/// Aggregate a 1-D slice in blocks of `bin`, cropping the trailing remainder.
pub fn aggregate_slice(values: &[f64], bin: usize, reducer: BlockReducer) -> Result<Vec<f64>> {
    check_axis("bands", values.len(), bin)?;
    Ok(values
        .chunks_exact(bin)
        .map(|block| reduce_block(block, reducer))
        .collect())
}

fn check_axis(axis: &'static str, len: usize, bin: usize) -> Result<()> {
    if bin == 0 || len < bin {
        return Err(HsiError::AggregationUnderflow { axis, len, bin });
    }
    Ok(())
}

/// Reduce a row-major `bin x bin` tile.
fn reduce_tile(tile: &[f64], bin: usize, reducer: BlockReducer) -> f64 {
    match reducer {
        BlockReducer::CircularMean => {
            // Circular mean across each tile row, then across the partials.
            let partials: Vec<f64> = tile
                .chunks_exact(bin)
                .map(circular_mean_deg)
                .collect();
            circular_mean_deg(&partials)
        }
        _ => reduce_block(tile, reducer),
    }
}

fn reduce_block(values: &[f64], reducer: BlockReducer) -> f64 {
    match reducer {
        BlockReducer::NanMean => nan_mean(values),
        BlockReducer::Mean => {
            if values.is_empty() {
                return f64::NAN;
            }
            values.iter().sum::<f64>() / values.len() as f64
        }
        BlockReducer::CircularMean => circular_mean_deg(values),
    }
}

/// Mean of the non-NaN values, NaN when there are none.
#[inline]
pub fn nan_mean(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &v in values {
        if !v.is_nan() {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Circular mean of angles in degrees, in `[0, 360)`. NaN values are ignored.
pub fn circular_mean_deg(values: &[f64]) -> f64 {
    let mut sin_sum = 0.0;
    let mut cos_sum = 0.0;
    let mut count = 0usize;
    for &v in values {
        if v.is_nan() {
            continue;
        }
        let rad = v.to_radians();
        sin_sum += rad.sin();
        cos_sum += rad.cos();
        count += 1;
    }
    if count == 0 {
        return f64::NAN;
    }
    let mean = (sin_sum / count as f64)
        .atan2(cos_sum / count as f64)
        .to_degrees();
    let wrapped = mean.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative angles.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}
