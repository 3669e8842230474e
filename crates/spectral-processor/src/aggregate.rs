//! Aggregation of the wavelength axis into roughly 10 nm bins.

use grid_processor::{aggregate_slice, BlockReducer};
use hsi_common::{Result, WavelengthAxis};

/// Target spacing of the canonical grid in nanometers.
pub const TARGET_SPACING: f64 = 10.0;

/// First and one-past-last wavelength of the fine axis used to model band
/// responses, 1 nm apart.
pub const RESPONSE_RANGE: (usize, usize) = (350, 2600);

/// Number of consecutive bands averaged into one: `10 / mean spacing`
/// rounded half to even, at least 1.
pub fn spectral_bins(axis: &WavelengthAxis) -> usize {
    match axis.mean_spacing() {
        Some(spacing) if spacing > 0.0 => ((TARGET_SPACING / spacing).round_ties_even() as usize).max(1),
        _ => 1,
    }
}

/// Gaussian response with unit peak at `center` and full width at half
/// maximum `fwhm`.
pub fn gaussian(x: f64, center: f64, fwhm: f64) -> f64 {
    let sigma = fwhm / (2.0 * (2.0 * std::f64::consts::LN_2).sqrt());
    (-((x - center).powi(2)) / (2.0 * sigma * sigma)).exp()
}

/// Aggregate the axis in blocks of `bins`, cropping trailing bands.
///
/// Centers are block means. With `bins == 1` the FWHM is kept; otherwise
/// each block's FWHM is measured on the summed Gaussian responses of its
/// bands.
pub fn aggregate_axis(axis: &WavelengthAxis, bins: usize) -> Result<WavelengthAxis> {
    let centers = aggregate_slice(axis.centers(), bins, BlockReducer::NanMean)?;
    let fwhm = if bins == 1 {
        axis.fwhm().to_vec()
    } else {
        axis.centers()
            .chunks_exact(bins)
            .zip(axis.fwhm().chunks_exact(bins))
            .map(|(c, f)| block_fwhm(c, f))
            .collect()
    };
    WavelengthAxis::new(centers, fwhm)
}

/// Width at half maximum of the summed responses of one block of bands.
///
/// The right crossing is the fine-axis sample closest to half maximum at or
/// after the peak, the left crossing the closest one before the peak. A peak
/// on the first sample counts as its own left crossing.
pub fn block_fwhm(centers: &[f64], fwhm: &[f64]) -> f64 {
    let (start, end) = RESPONSE_RANGE;
    let response: Vec<f64> = (start..end)
        .map(|w| {
            centers
                .iter()
                .zip(fwhm)
                .map(|(&c, &f)| gaussian(w as f64, c, f))
                .filter(|v| !v.is_nan())
                .sum()
        })
        .collect();

    let peak = first_extreme(&response, |v, best| v > best);
    let half = response[peak] / 2.0;
    let diff: Vec<f64> = response.iter().map(|v| (v - half).abs()).collect();

    let right = peak + first_extreme(&diff[peak..], |v, best| v < best);
    let left = if peak == 0 {
        0
    } else {
        first_extreme(&diff[..peak], |v, best| v < best)
    };
    (right - left) as f64
}

/// Index of the first element preferred by `better` over all earlier ones.
fn first_extreme(values: &[f64], better: impl Fn(f64, f64) -> bool) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if better(v, values[best]) {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, create_wavelength_axis};

    #[test]
    fn test_spectral_bins() {
        assert_eq!(spectral_bins(&create_wavelength_axis(380.0, 5.0, 100, 5.5)), 2);
        assert_eq!(spectral_bins(&create_wavelength_axis(380.0, 3.3, 100, 3.5)), 3);
        assert_eq!(spectral_bins(&create_wavelength_axis(400.0, 10.0, 50, 10.0)), 1);
        // Coarser than 20 nm rounds to zero; one band per bin instead.
        assert_eq!(spectral_bins(&create_wavelength_axis(400.0, 25.0, 20, 25.0)), 1);
        assert_eq!(spectral_bins(&create_wavelength_axis(400.0, 5.0, 1, 5.0)), 1);
    }

    #[test]
    fn test_spectral_bins_half_ratio_rounds_to_even() {
        // 10 / 4 = 2.5
        assert_eq!(spectral_bins(&create_wavelength_axis(400.0, 4.0, 100, 4.0)), 2);
        // 10 / 20 = 0.5 rounds to 0, clamped to 1
        assert_eq!(spectral_bins(&create_wavelength_axis(400.0, 20.0, 50, 20.0)), 1);
    }

    #[test]
    fn test_gaussian_half_max() {
        assert_approx_eq!(gaussian(500.0, 500.0, 8.0), 1.0, 1e-12);
        assert_approx_eq!(gaussian(504.0, 500.0, 8.0), 0.5, 1e-12);
    }

    #[test]
    fn test_single_band_block_recovers_fwhm() {
        assert_eq!(block_fwhm(&[1000.0], &[10.0]), 10.0);
    }

    #[test]
    fn test_bins_one_keeps_fwhm() {
        let axis = WavelengthAxis::new(vec![400.0, 410.0, 420.0], vec![9.0, 9.5, 10.0]).unwrap();
        let out = aggregate_axis(&axis, 1).unwrap();
        assert_eq!(out, axis);
    }

    #[test]
    fn test_aggregated_fwhm_not_below_inputs() {
        let axis = create_wavelength_axis(377.0, 5.0, 425, 5.8);
        let out = aggregate_axis(&axis, 2).unwrap();
        assert_eq!(out.len(), 212);
        assert_approx_eq!(out.centers()[0], 379.5, 1e-12);
        for &f in out.fwhm() {
            assert!(f >= 5.8, "aggregated fwhm {}", f);
        }
    }

    #[test]
    fn test_peak_at_first_sample() {
        // Response peaks on the first fine-axis sample.
        let width = block_fwhm(&[350.0], &[10.0]);
        assert_eq!(width, 5.0);
    }
}
