//! ENVI writer with random-access band and line output.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use hsi_common::{HsiError, Interleave, Plane, RasterHeader, RasterSink};
use tracing::{debug, info};

use crate::error::EnviResult;
use crate::header::write_header;
use crate::sample::encode;

/// Writes a new ENVI raster band-by-band or line-by-line.
///
/// The data file is pre-sized on creation so bands and lines may arrive in
/// any order. Output is always little-endian with no header offset.
pub struct EnviWriter {
    path: PathBuf,
    header: RasterHeader,
    file: File,
    buf: Vec<u8>,
}

impl EnviWriter {
    /// Create the data file and write its header.
    pub fn create(path: impl AsRef<Path>, mut header: RasterHeader) -> EnviResult<Self> {
        let path = path.as_ref().to_path_buf();
        header.byte_order = 0;
        header.header_offset = 0;

        let header_file = write_header(&path, &header)?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        let total = (header.lines * header.samples * header.bands * header.data_type.size()) as u64;
        file.set_len(total)?;

        info!(
            file = %path.display(),
            header = %header_file.display(),
            lines = header.lines,
            samples = header.samples,
            bands = header.bands,
            "Created ENVI raster"
        );

        Ok(Self {
            path,
            header,
            file,
            buf: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_samples(&mut self, offset: usize, values: &[f64]) -> EnviResult<()> {
        self.buf.clear();
        encode(values, self.header.data_type, &mut self.buf)?;
        let byte_offset = (offset * self.header.data_type.size()) as u64;
        self.file.seek(SeekFrom::Start(byte_offset))?;
        self.file.write_all(&self.buf)?;
        Ok(())
    }

    fn check_index(&self, index: usize, limit: usize, what: &str) -> Result<(), HsiError> {
        if index >= limit {
            return Err(HsiError::ShapeMismatch {
                expected: format!("{} < {}", what, limit),
                actual: format!("{} {}", what, index),
            });
        }
        Ok(())
    }
}

impl RasterSink for EnviWriter {
    fn header(&self) -> &RasterHeader {
        &self.header
    }

    fn write_band(&mut self, band: usize, plane: &Plane) -> hsi_common::Result<()> {
        let (lines, samples, bands) = (self.header.lines, self.header.samples, self.header.bands);
        self.check_index(band, bands, "band")?;
        plane.expect_shape(lines, samples)?;
        debug!(band, "Writing band");

        match self.header.interleave {
            Interleave::Bsq => self.write_samples(band * lines * samples, plane.as_slice())?,
            Interleave::Bil => {
                for line in 0..lines {
                    self.write_samples((line * bands + band) * samples, plane.row(line))?;
                }
            }
            Interleave::Bip => {
                for line in 0..lines {
                    for sample in 0..samples {
                        let value = [plane.get(line, sample)];
                        self.write_samples((line * samples + sample) * bands + band, &value)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn write_line(&mut self, line: usize, plane: &Plane) -> hsi_common::Result<()> {
        let (lines, samples, bands) = (self.header.lines, self.header.samples, self.header.bands);
        self.check_index(line, lines, "line")?;
        plane.expect_shape(bands, samples)?;

        match self.header.interleave {
            Interleave::Bsq => {
                for band in 0..bands {
                    self.write_samples((band * lines + line) * samples, plane.row(band))?;
                }
            }
            Interleave::Bil => self.write_samples(line * bands * samples, plane.as_slice())?,
            Interleave::Bip => {
                let mut record = Vec::with_capacity(samples * bands);
                for sample in 0..samples {
                    for band in 0..bands {
                        record.push(plane.get(band, sample));
                    }
                }
                self.write_samples(line * samples * bands, &record)?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> hsi_common::Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}
