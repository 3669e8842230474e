//! Band center wavelengths paired with their spectral bandwidths.

use serde::{Deserialize, Serialize};

use crate::error::{HsiError, Result};

/// A strictly increasing sequence of band centers (nm) with one FWHM (nm)
/// per band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WavelengthAxis {
    centers: Vec<f64>,
    fwhm: Vec<f64>,
}

impl WavelengthAxis {
    /// Create an axis, validating ordering and lengths.
    pub fn new(centers: Vec<f64>, fwhm: Vec<f64>) -> Result<Self> {
        if centers.len() != fwhm.len() {
            return Err(HsiError::invalid_header(
                "fwhm",
                format!(
                    "{} FWHM values for {} wavelengths",
                    fwhm.len(),
                    centers.len()
                ),
            ));
        }
        if centers.is_empty() {
            return Err(HsiError::invalid_header("wavelength", "empty wavelength list"));
        }
        if let Some(pair) = centers.windows(2).find(|w| !(w[1] > w[0])) {
            return Err(HsiError::invalid_header(
                "wavelength",
                format!("not strictly increasing at {} -> {}", pair[0], pair[1]),
            ));
        }
        Ok(Self { centers, fwhm })
    }

    /// Regularly spaced axis `start, start + step, ...` up to and including `end`,
    /// every band with the same FWHM.
    pub fn regular(start: f64, end: f64, step: f64, fwhm: f64) -> Result<Self> {
        if !(step > 0.0) || end < start {
            return Err(HsiError::config(format!(
                "invalid wavelength range {}..={} step {}",
                start, end, step
            )));
        }
        let count = ((end - start) / step).round() as usize + 1;
        let centers: Vec<f64> = (0..count).map(|i| start + i as f64 * step).collect();
        let fwhm = vec![fwhm; count];
        Self::new(centers, fwhm)
    }

    pub fn centers(&self) -> &[f64] {
        &self.centers
    }

    pub fn fwhm(&self) -> &[f64] {
        &self.fwhm
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    pub fn min(&self) -> f64 {
        self.centers[0]
    }

    pub fn max(&self) -> f64 {
        self.centers[self.centers.len() - 1]
    }

    /// Mean distance between consecutive centers, `None` for a single band.
    pub fn mean_spacing(&self) -> Option<f64> {
        if self.centers.len() < 2 {
            return None;
        }
        Some((self.max() - self.min()) / (self.centers.len() - 1) as f64)
    }

    /// Whether `wavelength` lies inside the observed range.
    pub fn covers(&self, wavelength: f64) -> bool {
        wavelength >= self.min() && wavelength <= self.max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_increasing() {
        assert!(WavelengthAxis::new(vec![400.0, 400.0], vec![5.0, 5.0]).is_err());
        assert!(WavelengthAxis::new(vec![410.0, 400.0], vec![5.0, 5.0]).is_err());
        assert!(WavelengthAxis::new(vec![400.0, 410.0], vec![5.0]).is_err());
        assert!(WavelengthAxis::new(vec![], vec![]).is_err());
    }

    #[test]
    fn test_regular_axis() {
        let axis = WavelengthAxis::regular(400.0, 2500.0, 10.0, 10.0).unwrap();
        assert_eq!(axis.len(), 211);
        assert_eq!(axis.min(), 400.0);
        assert_eq!(axis.max(), 2500.0);
        assert!((axis.mean_spacing().unwrap() - 10.0).abs() < 1e-12);
        assert!(axis.covers(400.0));
        assert!(!axis.covers(2500.5));
    }

    #[test]
    fn test_single_band_spacing() {
        let axis = WavelengthAxis::new(vec![550.0], vec![10.0]).unwrap();
        assert_eq!(axis.mean_spacing(), None);
    }
}
