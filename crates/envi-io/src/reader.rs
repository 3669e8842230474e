//! Streaming reader for ENVI binary files.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use hsi_common::{HsiError, Interleave, Plane, RasterHeader, RasterSource};
use tracing::info;

use crate::error::{EnviError, EnviResult};
use crate::header::read_header;
use crate::sample::decode;

/// Reads bands or lines from an ENVI file on demand.
pub struct EnviReader {
    path: PathBuf,
    header: RasterHeader,
    file: BufReader<File>,
    buf: Vec<u8>,
}

impl EnviReader {
    /// Open a data file and its header.
    pub fn open(path: impl AsRef<Path>) -> EnviResult<Self> {
        let path = path.as_ref().to_path_buf();
        let header = read_header(&path)?;
        let file = File::open(&path)?;

        let expected = header.header_offset as u64
            + (header.lines * header.samples * header.bands * header.data_type.size()) as u64;
        let actual = file.metadata()?.len();
        if actual < expected {
            return Err(EnviError::InvalidFormat(format!(
                "{} holds {} bytes, header describes {}",
                path.display(),
                actual,
                expected
            )));
        }

        info!(
            file = %path.display(),
            lines = header.lines,
            samples = header.samples,
            bands = header.bands,
            interleave = %header.interleave,
            "Opened ENVI raster"
        );

        Ok(Self {
            path,
            header,
            file: BufReader::new(file),
            buf: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name of the data file without directory.
    pub fn base_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Read `count` samples starting at sample offset `offset` into `out`.
    fn read_samples(&mut self, offset: usize, out: &mut [f64]) -> EnviResult<()> {
        let size = self.header.data_type.size();
        let byte_offset = self.header.header_offset as u64 + (offset * size) as u64;
        self.buf.resize(out.len() * size, 0);
        self.file.seek(SeekFrom::Start(byte_offset))?;
        self.file.read_exact(&mut self.buf)?;
        decode(
            &self.buf,
            self.header.data_type,
            self.header.byte_order == 1,
            out,
        );
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

impl RasterSource for EnviReader {
    fn header(&self) -> &RasterHeader {
        &self.header
    }

    fn read_band(&mut self, band: usize) -> hsi_common::Result<Plane> {
        self.check_index(band, self.header.bands, "band")?;
        let (lines, samples, bands) = (self.header.lines, self.header.samples, self.header.bands);
        let mut plane = Plane::zeros(lines, samples);

        match self.header.interleave {
            Interleave::Bsq => {
                self.read_samples(band * lines * samples, plane.as_mut_slice())?;
            }
            Interleave::Bil => {
                let mut row = vec![0.0; samples];
                for line in 0..lines {
                    self.read_samples((line * bands + band) * samples, &mut row)?;
                    plane.as_mut_slice()[line * samples..(line + 1) * samples]
                        .copy_from_slice(&row);
                }
            }
            Interleave::Bip => {
                let mut record = vec![0.0; samples * bands];
                for line in 0..lines {
                    self.read_samples(line * samples * bands, &mut record)?;
                    for sample in 0..samples {
                        plane.set(line, sample, record[sample * bands + band]);
                    }
                }
            }
        }
        Ok(plane)
    }

    fn read_line(&mut self, line: usize) -> hsi_common::Result<Plane> {
        self.check_index(line, self.header.lines, "line")?;
        let (lines, samples, bands) = (self.header.lines, self.header.samples, self.header.bands);
        let mut plane = Plane::zeros(bands, samples);

        match self.header.interleave {
            Interleave::Bsq => {
                let mut row = vec![0.0; samples];
                for band in 0..bands {
                    self.read_samples((band * lines + line) * samples, &mut row)?;
                    plane.as_mut_slice()[band * samples..(band + 1) * samples]
                        .copy_from_slice(&row);
                }
            }
            Interleave::Bil => {
                self.read_samples(line * bands * samples, plane.as_mut_slice())?;
            }
            Interleave::Bip => {
                let mut record = vec![0.0; samples * bands];
                self.read_samples(line * samples * bands, &mut record)?;
                for sample in 0..samples {
                    for band in 0..bands {
                        plane.set(band, sample, record[sample * bands + band]);
                    }
                }
            }
        }
        Ok(plane)
    }
}
