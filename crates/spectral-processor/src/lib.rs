//! Spectral resampling of hyperspectral cubes.
//!
//! Each pixel spectrum is averaged over blocks of adjacent bands (so the
//! aggregated spacing approaches 10 nm) and then interpolated onto a fixed
//! canonical grid: 400..=990 nm for VNIR-only sensors, 400..=2500 nm
//! otherwise.

pub mod aggregate;
pub mod engine;
pub mod interpolate;

pub use aggregate::{aggregate_axis, block_fwhm, gaussian, spectral_bins, TARGET_SPACING};
pub use engine::{
    description_for, SpectralPlan, SpectralResampleEngine, SpectralState,
    REFLECTANCE_DESCRIPTION, UNCERTAINTY_DESCRIPTION,
};
pub use interpolate::{canonical_grid, SpectralInterpolator, CANONICAL_STEP, VNIR_LIMIT};
