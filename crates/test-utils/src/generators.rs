//! Generators for synthetic hyperspectral cubes and wavelength axes.
//!
//! Values follow predictable patterns so tests can check that a sample
//! ended up where it should.

use hsi_common::{MemoryRaster, Plane, RasterHeader, WavelengthAxis};

/// Value stored at `(line, sample, band)` by [`create_test_cube`].
///
/// `band * 1_000_000 + line * 1000 + sample`
pub fn cube_value(line: usize, sample: usize, band: usize) -> f64 {
    (band * 1_000_000 + line * 1000 + sample) as f64
}

/// Creates an in-memory cube whose samples follow [`cube_value`].
///
/// # Example
///
/// ```
/// use test_utils::{create_test_cube, cube_value};
/// use hsi_common::RasterSource;
///
/// let mut cube = create_test_cube(4, 3, 2);
/// let band = cube.read_band(1).unwrap();
/// assert_eq!(band.get(2, 1), cube_value(2, 1, 1));
/// ```
pub fn create_test_cube(lines: usize, samples: usize, bands: usize) -> MemoryRaster {
    MemoryRaster::from_fn(RasterHeader::new(lines, samples, bands), cube_value)
}

/// Creates a cube where every band holds the same constant value.
pub fn create_constant_cube(lines: usize, samples: usize, bands: usize, value: f64) -> MemoryRaster {
    MemoryRaster::blank(RasterHeader::new(lines, samples, bands), value)
}

/// Creates a plane with the sentinel `value` at the given `(row, col)` positions
/// and `base` elsewhere.
pub fn create_plane_with(
    rows: usize,
    cols: usize,
    base: f64,
    positions: &[(usize, usize)],
    value: f64,
) -> Plane {
    let mut plane = Plane::filled(rows, cols, base);
    for &(r, c) in positions {
        if r < rows && c < cols {
            plane.set(r, c, value);
        }
    }
    plane
}

/// Evenly spaced band centers from `start` with `step`, all sharing `fwhm`.
pub fn create_wavelength_axis(start: f64, step: f64, count: usize, fwhm: f64) -> WavelengthAxis {
    let centers: Vec<f64> = (0..count).map(|i| start + i as f64 * step).collect();
    WavelengthAxis::new(centers, vec![fwhm; count])
        .unwrap_or_else(|e| panic!("invalid synthetic axis: {}", e))
}

/// A smooth reflectance-like spectrum evaluated at `wavelengths` (nm).
///
/// Rises from about 0.05 in the blue to a plateau near 0.45 past the red
/// edge, with a shallow absorption feature around 1400 nm.
pub fn vegetation_spectrum(wavelengths: &[f64]) -> Vec<f64> {
    wavelengths
        .iter()
        .map(|&w| {
            let red_edge = 0.05 + 0.4 / (1.0 + (-(w - 715.0) / 20.0).exp());
            let water = 0.15 * (-((w - 1400.0) / 60.0).powi(2)).exp();
            red_edge - water
        })
        .collect()
}

/// A cube of `lines × samples` pixels carrying [`vegetation_spectrum`] scaled
/// by `1 + 0.01 * (line + sample)`, with wavelength and FWHM in its header.
pub fn create_spectral_cube(lines: usize, samples: usize, axis: &WavelengthAxis) -> MemoryRaster {
    let mut header = RasterHeader::new(lines, samples, axis.len());
    header.wavelength = Some(axis.centers().to_vec());
    header.fwhm = Some(axis.fwhm().to_vec());
    header.wavelength_units = Some("Nanometers".into());
    let spectrum = vegetation_spectrum(axis.centers());
    MemoryRaster::from_fn(header, |l, s, b| {
        spectrum[b] * (1.0 + 0.01 * (l + s) as f64)
    })
}
