//! Row-major two-dimensional sample arrays.

use crate::error::{HsiError, Result};

/// A dense row-major 2-D array of `f64` samples.
///
/// Bands are stored as `lines x samples`, lines as `bands x samples` and
/// coordinate arrays as `lines x samples`.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Plane {
    /// Create a plane filled with a constant value.
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Create a plane of zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    /// Wrap an existing row-major buffer.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(HsiError::ShapeMismatch {
                expected: format!("{} values", rows * cols),
                actual: format!("{} values", data.len()),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Build a plane by evaluating `f(row, col)` for every cell.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                data.push(f(row, col));
            }
        }
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at `(row, col)`. Panics when out of range, like slice indexing.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    /// One row as a slice.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Apply `f` to every value in place.
    pub fn map_inplace(&mut self, mut f: impl FnMut(f64) -> f64) {
        for v in &mut self.data {
            *v = f(*v);
        }
    }

    /// Replace every occurrence of the no-data sentinel with NaN.
    pub fn mask_value(&mut self, no_data: f64) {
        self.map_inplace(|v| if v == no_data { f64::NAN } else { v });
    }

    /// Replace every NaN with the no-data sentinel.
    pub fn fill_nan(&mut self, no_data: f64) {
        self.map_inplace(|v| if v.is_nan() { no_data } else { v });
    }

    /// Minimum and maximum over non-NaN values, `None` if all values are NaN.
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Fail with ShapeMismatch unless the plane is `rows x cols`.
    pub fn expect_shape(&self, rows: usize, cols: usize) -> Result<()> {
        if self.shape() != (rows, cols) {
            return Err(HsiError::shape_mismatch((rows, cols), self.shape()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fn_row_major() {
        let plane = Plane::from_fn(2, 3, |r, c| (r * 10 + c) as f64);
        assert_eq!(plane.as_slice(), &[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        assert_eq!(plane.get(1, 2), 12.0);
        assert_eq!(plane.row(1), &[10.0, 11.0, 12.0]);
    }

    #[test]
    fn test_from_vec_rejects_bad_length() {
        assert!(Plane::from_vec(2, 2, vec![1.0; 3]).is_err());
        assert!(Plane::from_vec(2, 2, vec![1.0; 4]).is_ok());
    }

    #[test]
    fn test_mask_and_fill() {
        let mut plane = Plane::from_vec(1, 3, vec![-9999.0, 1.0, -9999.0]).unwrap();
        plane.mask_value(-9999.0);
        assert!(plane.get(0, 0).is_nan());
        assert_eq!(plane.get(0, 1), 1.0);

        plane.fill_nan(-1.0);
        assert_eq!(plane.as_slice(), &[-1.0, 1.0, -1.0]);
    }

    #[test]
    fn test_finite_range() {
        let plane = Plane::from_vec(1, 4, vec![f64::NAN, 3.0, -2.0, 7.5]).unwrap();
        assert_eq!(plane.finite_range(), Some((-2.0, 7.5)));
        assert_eq!(Plane::filled(2, 2, f64::NAN).finite_range(), None);
    }
}
