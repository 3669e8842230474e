//! ENVI raster adapter.
//!
//! Reads and writes the subset of the ENVI format used by imaging
//! spectrometer products: a plain-text `.hdr` header next to a flat binary
//! file in BSQ, BIL or BIP interleave.
//!
//! [`EnviReader`] implements [`hsi_common::RasterSource`] and
//! [`EnviWriter`] implements [`hsi_common::RasterSink`], so the resampling
//! engines stream bands or lines without knowing about the file layout.
//!
//! # Example
//!
//! ```ignore
//! use envi_io::{EnviReader, EnviWriter};
//! use hsi_common::{RasterSink, RasterSource};
//!
//! let mut reader = EnviReader::open("scene_rfl")?;
//! let mut writer = EnviWriter::create("scene_copy", reader.header().clone())?;
//! for band in reader.bands() {
//!     let (index, plane) = band?;
//!     writer.write_band(index, &plane)?;
//! }
//! ```

pub mod error;
pub mod header;
pub mod reader;
mod sample;
pub mod writer;

pub use error::{EnviError, EnviResult};
pub use header::{format_header, header_path, parse_header, read_header, write_header};
pub use reader::EnviReader;
pub use writer::EnviWriter;
