//! Raster metadata and the streaming read/write seam.
//!
//! Engines never touch files directly. They pull bands or lines from a
//! [`RasterSource`] and push results into a [`RasterSink`]; the ENVI adapter
//! and [`MemoryRaster`] are the two implementations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HsiError, Result};
use crate::plane::Plane;
use crate::wavelength::WavelengthAxis;

/// Sample storage type, numbered with the ENVI `data type` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    U8,
    I16,
    I32,
    F32,
    F64,
    U16,
}

impl DataType {
    /// Parse an ENVI `data type` code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::U8),
            2 => Some(Self::I16),
            3 => Some(Self::I32),
            4 => Some(Self::F32),
            5 => Some(Self::F64),
            12 => Some(Self::U16),
            _ => None,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::U8 => 1,
            Self::I16 => 2,
            Self::I32 => 3,
            Self::F32 => 4,
            Self::F64 => 5,
            Self::U16 => 12,
        }
    }

    /// Bytes per sample.
    pub fn size(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

/// Sample layout of the binary file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interleave {
    /// Band sequential.
    #[default]
    Bsq,
    /// Band interleaved by line.
    Bil,
    /// Band interleaved by pixel.
    Bip,
}

impl Interleave {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bsq => "bsq",
            Self::Bil => "bil",
            Self::Bip => "bip",
        }
    }
}

impl FromStr for Interleave {
    type Err = HsiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bsq" => Ok(Self::Bsq),
            "bil" => Ok(Self::Bil),
            "bip" => Ok(Self::Bip),
            other => Err(HsiError::invalid_header(
                "interleave",
                format!("unknown interleave '{}'", other),
            )),
        }
    }
}

impl fmt::Display for Interleave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ordered entries of a `map info` list.
///
/// Layout: `[projection, ref_x, ref_y, ul_x, ul_y, pixel_x, pixel_y, ...]`,
/// optionally followed by `units=...` and `rotation=<deg>` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapInfo {
    entries: Vec<String>,
}

impl MapInfo {
    pub fn new(entries: Vec<String>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| e.trim().to_string()).collect(),
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn projection(&self) -> Option<&str> {
        self.entries.first().map(String::as_str)
    }

    fn number(&self, index: usize, name: &str) -> Result<f64> {
        let raw = self
            .entries
            .get(index)
            .ok_or_else(|| HsiError::geometry(format!("map info has no {} entry", name)))?;
        raw.parse::<f64>()
            .map_err(|_| HsiError::geometry(format!("{} '{}' is not numeric", name, raw)))
    }

    /// Upper-left `(x, y)` map coordinate.
    pub fn upper_left(&self) -> Result<(f64, f64)> {
        Ok((self.number(3, "upper-left x")?, self.number(4, "upper-left y")?))
    }

    /// Pixel size `(x, y)` in map units.
    pub fn pixel_size(&self) -> Result<(f64, f64)> {
        let px = self.number(5, "pixel size x")?;
        let py = self.number(6, "pixel size y")?;
        if !(px > 0.0) || !(py > 0.0) {
            return Err(HsiError::geometry(format!(
                "pixel size must be positive, got {} x {}",
                px, py
            )));
        }
        Ok((px, py))
    }

    /// The stored `rotation=` value, if present.
    pub fn rotation(&self) -> Result<Option<f64>> {
        let Some(entry) = self.rotation_entry() else {
            return Ok(None);
        };
        let value = entry
            .split('=')
            .next_back()
            .map(str::trim)
            .unwrap_or_default();
        value
            .parse::<f64>()
            .map(Some)
            .map_err(|_| HsiError::geometry(format!("rotation '{}' is not numeric", value)))
    }

    /// Angle fed to the rotation transform: `360 + stored` when a rotation
    /// entry exists, otherwise 0.
    pub fn effective_rotation(&self) -> Result<f64> {
        Ok(self.rotation()?.map(|r| 360.0 + r).unwrap_or(0.0))
    }

    fn rotation_entry(&self) -> Option<&String> {
        self.entries
            .iter()
            .find(|e| e.to_lowercase().starts_with("rotation"))
    }

    /// Copy with a new upper-left corner.
    pub fn with_upper_left(mut self, x: f64, y: f64) -> Self {
        self.ensure_len(5);
        self.entries[3] = x.to_string();
        self.entries[4] = y.to_string();
        self
    }

    /// Copy with a new square pixel size.
    pub fn with_pixel_size(mut self, pixel: f64) -> Self {
        self.ensure_len(7);
        self.entries[5] = pixel.to_string();
        self.entries[6] = pixel.to_string();
        self
    }

    /// Copy with the rotation forced to zero, replacing an existing rotation
    /// entry or appending one.
    pub fn without_rotation(mut self) -> Self {
        let zero = "rotation=0.0000".to_string();
        match self
            .entries
            .iter()
            .position(|e| e.to_lowercase().starts_with("rotation"))
        {
            Some(pos) => self.entries[pos] = zero,
            None => self.entries.push(zero),
        }
        self
    }

    fn ensure_len(&mut self, len: usize) {
        while self.entries.len() < len {
            self.entries.push(String::new());
        }
    }
}

/// Raster metadata: dimensions, storage layout, georeference and spectral
/// attributes.
///
/// Keys the adapter does not interpret are kept in `extra` so they survive
/// a read/modify/write cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterHeader {
    pub lines: usize,
    pub samples: usize,
    pub bands: usize,
    pub header_offset: usize,
    pub data_type: DataType,
    pub interleave: Interleave,
    /// 0 = little endian, 1 = big endian.
    pub byte_order: u8,
    pub map_info: Option<MapInfo>,
    pub wavelength: Option<Vec<f64>>,
    pub fwhm: Option<Vec<f64>>,
    pub wavelength_units: Option<String>,
    /// The `data ignore value`.
    pub no_data: Option<f64>,
    pub band_names: Option<Vec<String>>,
    pub description: Option<String>,
    pub extra: Vec<(String, String)>,
}

impl RasterHeader {
    /// Minimal little-endian float32 BSQ header.
    pub fn new(lines: usize, samples: usize, bands: usize) -> Self {
        Self {
            lines,
            samples,
            bands,
            header_offset: 0,
            data_type: DataType::F32,
            interleave: Interleave::Bsq,
            byte_order: 0,
            map_info: None,
            wavelength: None,
            fwhm: None,
            wavelength_units: None,
            no_data: None,
            band_names: None,
            description: None,
            extra: Vec::new(),
        }
    }

    /// `(lines, samples)` of one band.
    pub fn band_shape(&self) -> (usize, usize) {
        (self.lines, self.samples)
    }

    /// `(bands, samples)` of one line.
    pub fn line_shape(&self) -> (usize, usize) {
        (self.bands, self.samples)
    }

    /// The no-data sentinel, falling back to `default` when the header has none.
    pub fn no_data_or(&self, default: f64) -> f64 {
        self.no_data.unwrap_or(default)
    }

    /// The georeference, required by the spatial engine.
    pub fn require_map_info(&self) -> Result<&MapInfo> {
        self.map_info
            .as_ref()
            .ok_or_else(|| HsiError::geometry("header has no map info"))
    }

    /// Wavelength centers and FWHM as a validated axis in nanometers.
    ///
    /// Micrometer units are scaled by 1000.
    pub fn wavelength_axis(&self) -> Result<WavelengthAxis> {
        let centers = self
            .wavelength
            .clone()
            .ok_or_else(|| HsiError::MissingField("wavelength".into()))?;
        let fwhm = self
            .fwhm
            .clone()
            .ok_or_else(|| HsiError::MissingField("fwhm".into()))?;
        if centers.len() != self.bands {
            return Err(HsiError::invalid_header(
                "wavelength",
                format!("{} wavelengths for {} bands", centers.len(), self.bands),
            ));
        }
        let scale = match &self.wavelength_units {
            Some(units) if units.to_lowercase().starts_with("micro") => 1000.0,
            _ => 1.0,
        };
        if scale != 1.0 {
            let centers = centers.iter().map(|w| w * scale).collect();
            let fwhm = fwhm.iter().map(|w| w * scale).collect();
            return WavelengthAxis::new(centers, fwhm);
        }
        WavelengthAxis::new(centers, fwhm)
    }

    /// Heuristic for observation-geometry products (path length, sensor and
    /// solar angles, slope/aspect...): any band name mentioning an azimuth.
    pub fn looks_like_observation(&self) -> bool {
        self.band_names
            .as_ref()
            .map(|names| names.iter().any(|n| n.to_lowercase().contains("azimuth")))
            .unwrap_or(false)
    }

    /// Look up a preserved extra key (case-insensitive).
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Set or replace a preserved extra key.
    pub fn set_extra(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.extra.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&key)) {
            Some(entry) => entry.1 = value,
            None => self.extra.push((key, value)),
        }
    }
}

/// Read side of the raster seam.
pub trait RasterSource {
    fn header(&self) -> &RasterHeader;

    /// Read one band as a `lines x samples` plane.
    fn read_band(&mut self, band: usize) -> Result<Plane>;

    /// Read one line as a `bands x samples` plane.
    fn read_line(&mut self, line: usize) -> Result<Plane>;

    /// Lazy sequence over every band in order. Each call starts again at band 0.
    fn bands(&mut self) -> Bands<'_, Self>
    where
        Self: Sized,
    {
        Bands {
            source: self,
            next: 0,
            done: false,
        }
    }

    /// Lazy sequence over every line in order. Each call starts again at line 0.
    fn lines(&mut self) -> Lines<'_, Self>
    where
        Self: Sized,
    {
        Lines {
            source: self,
            next: 0,
            done: false,
        }
    }
}

/// Write side of the raster seam.
pub trait RasterSink {
    fn header(&self) -> &RasterHeader;

    /// Write a `lines x samples` plane at band index `band`.
    fn write_band(&mut self, band: usize, plane: &Plane) -> Result<()>;

    /// Write a `bands x samples` plane at line index `line`.
    fn write_line(&mut self, line: usize, plane: &Plane) -> Result<()>;

    /// Flush buffered output.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Band iterator returned by [`RasterSource::bands`]. Stops after the first error.
pub struct Bands<'a, S: RasterSource> {
    source: &'a mut S,
    next: usize,
    done: bool,
}

impl<S: RasterSource> Iterator for Bands<'_, S> {
    type Item = Result<(usize, Plane)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next >= self.source.header().bands {
            return None;
        }
        let band = self.next;
        self.next += 1;
        match self.source.read_band(band) {
            Ok(plane) => Some(Ok((band, plane))),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Line iterator returned by [`RasterSource::lines`]. Stops after the first error.
pub struct Lines<'a, S: RasterSource> {
    source: &'a mut S,
    next: usize,
    done: bool,
}

impl<S: RasterSource> Iterator for Lines<'_, S> {
    type Item = Result<(usize, Plane)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next >= self.source.header().lines {
            return None;
        }
        let line = self.next;
        self.next += 1;
        match self.source.read_line(line) {
            Ok(plane) => Some(Ok((line, plane))),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// A raster held entirely in memory, one plane per band.
///
/// Serves as both source and sink so engines can be exercised without files.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRaster {
    header: RasterHeader,
    bands: Vec<Plane>,
}

impl MemoryRaster {
    /// Wrap existing band planes, checking them against the header.
    pub fn new(header: RasterHeader, bands: Vec<Plane>) -> Result<Self> {
        if bands.len() != header.bands {
            return Err(HsiError::ShapeMismatch {
                expected: format!("{} bands", header.bands),
                actual: format!("{} bands", bands.len()),
            });
        }
        for plane in &bands {
            plane.expect_shape(header.lines, header.samples)?;
        }
        Ok(Self { header, bands })
    }

    /// A raster with every sample set to `fill`, ready to be written into.
    pub fn blank(header: RasterHeader, fill: f64) -> Self {
        let bands = (0..header.bands)
            .map(|_| Plane::filled(header.lines, header.samples, fill))
            .collect();
        Self { header, bands }
    }

    /// Build a raster from `f(line, sample, band)`.
    pub fn from_fn(header: RasterHeader, mut f: impl FnMut(usize, usize, usize) -> f64) -> Self {
        let bands = (0..header.bands)
            .map(|b| Plane::from_fn(header.lines, header.samples, |l, s| f(l, s, b)))
            .collect();
        Self { header, bands }
    }

    pub fn band(&self, band: usize) -> &Plane {
        &self.bands[band]
    }

    pub fn into_parts(self) -> (RasterHeader, Vec<Plane>) {
        (self.header, self.bands)
    }

    fn check_band(&self, band: usize) -> Result<()> {
        if band >= self.header.bands {
            return Err(HsiError::ShapeMismatch {
                expected: format!("band < {}", self.header.bands),
                actual: format!("band {}", band),
            });
        }
        Ok(())
    }

    fn check_line(&self, line: usize) -> Result<()> {
        if line >= self.header.lines {
            return Err(HsiError::ShapeMismatch {
                expected: format!("line < {}", self.header.lines),
                actual: format!("line {}", line),
            });
        }
        Ok(())
    }
}

impl RasterSource for MemoryRaster {
    fn header(&self) -> &RasterHeader {
        &self.header
    }

    fn read_band(&mut self, band: usize) -> Result<Plane> {
        self.check_band(band)?;
        Ok(self.bands[band].clone())
    }

    fn read_line(&mut self, line: usize) -> Result<Plane> {
        self.check_line(line)?;
        let (bands, samples) = self.header.line_shape();
        Ok(Plane::from_fn(bands, samples, |b, s| {
            self.bands[b].get(line, s)
        }))
    }
}

impl RasterSink for MemoryRaster {
    fn header(&self) -> &RasterHeader {
        &self.header
    }

    fn write_band(&mut self, band: usize, plane: &Plane) -> Result<()> {
        self.check_band(band)?;
        plane.expect_shape(self.header.lines, self.header.samples)?;
        self.bands[band] = plane.clone();
        Ok(())
    }

    fn write_line(&mut self, line: usize, plane: &Plane) -> Result<()> {
        self.check_line(line)?;
        let (bands, samples) = self.header.line_shape();
        plane.expect_shape(bands, samples)?;
        for b in 0..bands {
            for s in 0..samples {
                self.bands[b].set(line, s, plane.get(b, s));
            }
        }
        Ok(())
    }
}
