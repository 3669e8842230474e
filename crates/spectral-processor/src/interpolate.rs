//! Interpolation of aggregated spectra onto a target wavelength grid.
//!
//! Nearest, linear and not-a-knot cubic interpolation are all linear in the
//! sample values, so each is expressed as a `targets x sources` weight
//! matrix computed once and applied to every pixel.

use hsi_common::{HsiError, InterpolationKind, Plane, Result};
use nalgebra::DMatrix;

/// Spacing of the canonical grid in nanometers.
pub const CANONICAL_STEP: f64 = 10.0;

/// Sensors whose longest band is below this (nm) get the VNIR grid.
pub const VNIR_LIMIT: f64 = 1100.0;

/// The 10 nm output grid: 400-990 nm for VNIR sensors, 400-2500 nm otherwise.
pub fn canonical_grid(max_wavelength: f64) -> Vec<f64> {
    let end = if max_wavelength < VNIR_LIMIT { 990 } else { 2500 };
    (400..=end).step_by(CANONICAL_STEP as usize).map(|w| w as f64).collect()
}

/// Precomputed interpolation from a source axis onto target positions.
#[derive(Debug, Clone)]
pub struct SpectralInterpolator {
    kind: InterpolationKind,
    weights: DMatrix<f64>,
}

impl SpectralInterpolator {
    /// Build weights for `kind` from strictly increasing `source` positions.
    /// Targets outside the source range are extrapolated.
    pub fn new(source: &[f64], target: &[f64], kind: InterpolationKind) -> Result<Self> {
        if source.len() < kind.min_samples() {
            return Err(HsiError::interpolation(format!(
                "{} interpolation needs at least {} samples, got {}",
                kind,
                kind.min_samples(),
                source.len()
            )));
        }
        if source.iter().any(|v| !v.is_finite()) || source.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(HsiError::interpolation(
                "source positions must be finite and strictly increasing",
            ));
        }

        let weights = match kind {
            InterpolationKind::Nearest => nearest_weights(source, target),
            InterpolationKind::Linear => linear_weights(source, target),
            InterpolationKind::Cubic => cubic_weights(source, target)?,
        };
        Ok(Self { kind, weights })
    }

    pub fn kind(&self) -> InterpolationKind {
        self.kind
    }

    /// `(targets, sources)`
    pub fn shape(&self) -> (usize, usize) {
        self.weights.shape()
    }

    pub fn weights(&self) -> &DMatrix<f64> {
        &self.weights
    }

    /// Interpolate one spectrum.
    pub fn apply_slice(&self, values: &[f64]) -> Result<Vec<f64>> {
        let (targets, sources) = self.shape();
        if values.len() != sources {
            return Err(HsiError::shape_mismatch((sources, 1), (values.len(), 1)));
        }
        Ok((0..targets).map(|t| self.weighted_sum(t, values)).collect())
    }

    /// Interpolate every column of a `sources x samples` plane, giving a
    /// `targets x samples` plane.
    ///
    /// A NaN input only reaches the outputs that give it a non-zero weight.
    pub fn apply_plane(&self, plane: &Plane) -> Result<Plane> {
        let (targets, sources) = self.shape();
        let samples = plane.cols();
        plane.expect_shape(sources, samples)?;

        let input = DMatrix::from_row_slice(sources, samples, plane.as_slice());
        let product = &self.weights * &input;
        let mut out = Plane::from_fn(targets, samples, |r, c| product[(r, c)]);

        let mut column = vec![0.0; sources];
        for c in 0..samples {
            if !(0..sources).any(|r| plane.get(r, c).is_nan()) {
                continue;
            }
            for (r, value) in column.iter_mut().enumerate() {
                *value = plane.get(r, c);
            }
            for t in 0..targets {
                out.set(t, c, self.weighted_sum(t, &column));
            }
        }
        Ok(out)
    }

    fn weighted_sum(&self, target: usize, values: &[f64]) -> f64 {
        values
            .iter()
            .enumerate()
            .map(|(s, &v)| (self.weights[(target, s)], v))
            .filter(|&(w, _)| w != 0.0)
            .map(|(w, v)| w * v)
            .sum()
    }
}

/// Index of the first element of `sorted` that is `>= value`.
fn search_left(sorted: &[f64], value: f64) -> usize {
    sorted.partition_point(|&v| v < value)
}

/// Interval `[i, i + 1]` used for `t`; end intervals extend outwards.
fn interval(source: &[f64], t: f64) -> usize {
    let last = source.len() - 2;
    search_left(source, t).saturating_sub(1).min(last)
}

fn nearest_weights(source: &[f64], target: &[f64]) -> DMatrix<f64> {
    let midpoints: Vec<f64> = source.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    let mut weights = DMatrix::<f64>::zeros(target.len(), source.len());
    for (row, &t) in target.iter().enumerate() {
        // A target exactly on a midpoint takes the lower sample.
        let idx = search_left(&midpoints, t).min(source.len() - 1);
        weights[(row, idx)] = 1.0;
    }
    weights
}

fn linear_weights(source: &[f64], target: &[f64]) -> DMatrix<f64> {
    let mut weights = DMatrix::<f64>::zeros(target.len(), source.len());
    for (row, &t) in target.iter().enumerate() {
        let i = interval(source, t);
        let (x0, x1) = (source[i], source[i + 1]);
        let frac = (t - x0) / (x1 - x0);
        weights[(row, i)] = 1.0 - frac;
        weights[(row, i + 1)] = frac;
    }
    weights
}

/// Not-a-knot cubic spline weights.
///
/// The second derivatives `M` solve `A M = B y`; on interval `i`
///
/// ```text
/// S(t) = M_i (x_{i+1}-t)^3/6h + M_{i+1} (t-x_i)^3/6h
///      + (y_i/h - M_i h/6)(x_{i+1}-t) + (y_{i+1}/h - M_{i+1} h/6)(t-x_i)
/// ```
///
/// which is linear in `y` once `M = A^-1 B y` is substituted.
fn cubic_weights(source: &[f64], target: &[f64]) -> Result<DMatrix<f64>> {
    let n = source.len();
    let h: Vec<f64> = source.windows(2).map(|w| w[1] - w[0]).collect();

    let mut a = DMatrix::<f64>::zeros(n, n);
    let mut b = DMatrix::<f64>::zeros(n, n);

    // Third derivative continuous across x_1 and x_{n-2}.
    a[(0, 0)] = h[1];
    a[(0, 1)] = -(h[0] + h[1]);
    a[(0, 2)] = h[0];
    a[(n - 1, n - 3)] = h[n - 2];
    a[(n - 1, n - 2)] = -(h[n - 3] + h[n - 2]);
    a[(n - 1, n - 1)] = h[n - 3];

    for i in 1..n - 1 {
        a[(i, i - 1)] = h[i - 1];
        a[(i, i)] = 2.0 * (h[i - 1] + h[i]);
        a[(i, i + 1)] = h[i];
        b[(i, i - 1)] = 6.0 / h[i - 1];
        b[(i, i)] = -6.0 / h[i - 1] - 6.0 / h[i];
        b[(i, i + 1)] = 6.0 / h[i];
    }

    let moments = a
        .lu()
        .solve(&b)
        .ok_or_else(|| HsiError::interpolation("singular spline system"))?;

    let mut weights = DMatrix::<f64>::zeros(target.len(), n);
    for (row, &t) in target.iter().enumerate() {
        let i = interval(source, t);
        let hi = h[i];
        let left = source[i + 1] - t;
        let right = t - source[i];

        let m_lo = left.powi(3) / (6.0 * hi) - hi * left / 6.0;
        let m_hi = right.powi(3) / (6.0 * hi) - hi * right / 6.0;
        for s in 0..n {
            weights[(row, s)] = m_lo * moments[(i, s)] + m_hi * moments[(i + 1, s)];
        }
        weights[(row, i)] += left / hi;
        weights[(row, i + 1)] += right / hi;
    }
    Ok(weights)
}
