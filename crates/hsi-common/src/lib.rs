//! Common types shared across the hyperspectral resampling crates.
//!
//! Everything that crosses a crate boundary lives here: the row-major
//! [`Plane`] used for bands, lines and coordinate arrays, the raster
//! metadata ([`RasterHeader`], [`MapInfo`]), the [`RasterSource`] /
//! [`RasterSink`] streaming seam, the wavelength axis and the job
//! configuration.

pub mod bbox;
pub mod config;
pub mod error;
pub mod plane;
pub mod raster;
pub mod wavelength;

pub use bbox::BoundingBox;
pub use config::{BinSize, InterpolationKind, ResampleConfig};
pub use error::{HsiError, Result};
pub use plane::Plane;
pub use raster::{
    DataType, Interleave, MapInfo, MemoryRaster, RasterHeader, RasterSink, RasterSource,
};
pub use wavelength::WavelengthAxis;
