//! Ground geometry of raster pixel grids.
//!
//! [`GridGeometry`] turns a header's affine georeference (origin, pixel size,
//! rotation) into per-pixel map coordinates. [`GeometryLookupTable`] maps a
//! sensor-geometry raster into map geometry through a GLT.

pub mod geometry;
pub mod glt;

pub use geometry::{rotate_coords, CoordinateGrid, GridGeometry};
pub use glt::{ortho_header, orthorectify, GeometryLookupTable, ORTHO_BANDS};
