//! Spatial resampling of hyperspectral rasters.
//!
//! # Architecture
//!
//! ```text
//! RasterHeader (map info)
//!      │
//!      ▼
//! GridGeometry::coordinates()        per-pixel x/y, rotated about the origin
//!      │
//!      ▼
//! aggregate_plane(bin x bin)         coordinates and band values, NaN-aware
//!      │
//!      ▼
//! KdTree ─► RegridMapping            nearest aggregated cell per output cell
//!      │
//!      ▼
//! SpatialResampleEngine::stream_bands
//!               │
//!               ▼
//!          RasterSink
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grid_processor::SpatialResampleEngine;
//! use hsi_common::ResampleConfig;
//!
//! let mut engine = SpatialResampleEngine::new(ResampleConfig::default())?;
//! let sink = engine.run(&mut reader, |header| EnviWriter::create(&out, header).map_err(Into::into))?;
//! ```

pub mod aggregate;
pub mod engine;
pub mod kdtree;
pub mod regrid;
pub mod simple;

// Re-export commonly used types at crate root
pub use aggregate::{aggregate_plane, aggregate_rows, aggregate_slice, circular_mean_deg, nan_mean, BlockReducer};
pub use engine::{SpatialResampleEngine, SpatialState};
pub use kdtree::{KdTree, Nearest};
pub use regrid::{OutputGrid, RegridMapping};
pub use simple::{SimpleAggregateEngine, DEFAULT_AGGREGATION};
