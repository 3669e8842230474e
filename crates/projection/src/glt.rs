//! Geometry lookup table (GLT) orthorectification.
//!
//! A GLT is a two-band raster in map geometry. For every output cell it
//! stores the 1-based sample (band 0) and line (band 1) of the sensor-geometry
//! pixel that lands there. Signs mark interpolated fills and are ignored;
//! zero means no pixel maps to the cell.

use hsi_common::{
    DataType, HsiError, Plane, RasterHeader, RasterSink, RasterSource, Result,
};
use tracing::{debug, info};

/// Number of bands in an orthorectified location product (lon, lat, elevation).
pub const ORTHO_BANDS: usize = 3;

/// Sensor-pixel indices for every cell of a map-geometry grid.
#[derive(Debug, Clone)]
pub struct GeometryLookupTable {
    lines: usize,
    samples: usize,
    /// Zero-based `(line, sample)` source index per cell.
    indices: Vec<(usize, usize)>,
    /// Bit N is set when cell N has a source pixel.
    valid_bitmap: Vec<u64>,
}

impl GeometryLookupTable {
    /// Build from the sample-index and line-index planes of a GLT raster.
    pub fn from_planes(sample_plane: &Plane, line_plane: &Plane) -> Result<Self> {
        let (lines, samples) = sample_plane.shape();
        line_plane.expect_shape(lines, samples)?;

        let len = lines * samples;
        let mut table = Self {
            lines,
            samples,
            indices: vec![(0, 0); len],
            valid_bitmap: vec![0u64; len.div_ceil(64)],
        };

        for (idx, (&s, &l)) in sample_plane
            .as_slice()
            .iter()
            .zip(line_plane.as_slice())
            .enumerate()
        {
            if !s.is_finite() || !l.is_finite() {
                continue;
            }
            let (s, l) = (s.abs().round(), l.abs().round());
            if s < 1.0 || l < 1.0 {
                continue;
            }
            table.set(idx, l as usize - 1, s as usize - 1);
        }
        Ok(table)
    }

    /// Read a GLT from the first two bands of `source`.
    pub fn from_source<S: RasterSource>(source: &mut S) -> Result<Self> {
        if source.header().bands < 2 {
            return Err(HsiError::invalid_header(
                "bands",
                format!("a GLT needs 2 bands, found {}", source.header().bands),
            ));
        }
        let samples = source.read_band(0)?;
        let lines = source.read_band(1)?;
        Self::from_planes(&samples, &lines)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.lines, self.samples)
    }

    #[inline]
    pub fn is_valid(&self, idx: usize) -> bool {
        (self.valid_bitmap[idx / 64] & (1u64 << (idx % 64))) != 0
    }

    #[inline]
    fn set(&mut self, idx: usize, line: usize, sample: usize) {
        self.indices[idx] = (line, sample);
        self.valid_bitmap[idx / 64] |= 1u64 << (idx % 64);
    }

    /// Source `(line, sample)` of cell `idx`, if any.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<(usize, usize)> {
        self.is_valid(idx).then(|| self.indices[idx])
    }

    pub fn valid_count(&self) -> usize {
        self.valid_bitmap
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum()
    }

    /// Pull `band` (sensor geometry) onto the GLT grid; cells without a
    /// source pixel get `fill`.
    pub fn apply(&self, band: &Plane, fill: f64) -> Result<Plane> {
        let (src_lines, src_samples) = band.shape();
        let mut out = Plane::filled(self.lines, self.samples, fill);
        for (idx, value) in out.as_mut_slice().iter_mut().enumerate() {
            let Some((line, sample)) = self.get(idx) else {
                continue;
            };
            if line >= src_lines || sample >= src_samples {
                return Err(HsiError::geometry(format!(
                    "GLT points at line {} sample {}, source is {} x {}",
                    line + 1,
                    sample + 1,
                    src_lines,
                    src_samples
                )));
            }
            *value = band.get(line, sample);
        }
        Ok(out)
    }
}

/// Header of the orthorectified product: the GLT's grid and map info, the
/// location raster's band names and description, three float32 bands.
pub fn ortho_header(loc: &RasterHeader, glt: &RasterHeader, no_data: f64) -> RasterHeader {
    let mut header = glt.clone();
    header.bands = ORTHO_BANDS;
    header.data_type = DataType::F32;
    header.byte_order = 0;
    header.header_offset = 0;
    header.no_data = Some(no_data);
    header.band_names = loc.band_names.clone();
    header.description = loc.description.clone();
    header.wavelength = None;
    header.fwhm = None;
    header
}

/// Orthorectify the first [`ORTHO_BANDS`] bands of `loc` through `glt` into
/// `sink`. `sink` must carry the header from [`ortho_header`].
pub fn orthorectify<L, K>(
    loc: &mut L,
    table: &GeometryLookupTable,
    sink: &mut K,
    no_data: f64,
) -> Result<()>
where
    L: RasterSource,
    K: RasterSink,
{
    if loc.header().bands < ORTHO_BANDS {
        return Err(HsiError::invalid_header(
            "bands",
            format!(
                "location raster needs {} bands, found {}",
                ORTHO_BANDS,
                loc.header().bands
            ),
        ));
    }
    let (lines, samples) = table.shape();
    info!(
        lines,
        samples,
        valid = table.valid_count(),
        "Orthorectifying location bands"
    );

    for band in 0..ORTHO_BANDS {
        let source = loc.read_band(band)?;
        let projected = table.apply(&source, no_data)?;
        sink.write_band(band, &projected)?;
        debug!(band, "Wrote orthorectified band");
    }
    sink.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsi_common::MemoryRaster;

    fn table_2x3() -> GeometryLookupTable {
        // Cell (0, 2) has no source; cell (1, 0) uses a negative (filled) index.
        let samples = Plane::from_vec(2, 3, vec![1.0, 2.0, 0.0, -2.0, 1.0, 2.0]).unwrap();
        let lines = Plane::from_vec(2, 3, vec![1.0, 1.0, 0.0, -2.0, 2.0, 2.0]).unwrap();
        GeometryLookupTable::from_planes(&samples, &lines).unwrap()
    }

    #[test]
    fn test_table_indices() {
        let table = table_2x3();
        assert_eq!(table.shape(), (2, 3));
        assert_eq!(table.valid_count(), 5);
        assert_eq!(table.get(0), Some((0, 0)));
        assert_eq!(table.get(2), None);
        assert_eq!(table.get(3), Some((1, 1)));
    }

    #[test]
    fn test_apply_fills_missing_cells() {
        let table = table_2x3();
        let band = Plane::from_vec(2, 2, vec![10.0, 20.0, 30.0, 40.0]).unwrap();
        let out = table.apply(&band, -9999.0).unwrap();
        assert_eq!(out.as_slice(), &[10.0, 20.0, -9999.0, 40.0, 30.0, 40.0]);
    }

    #[test]
    fn test_apply_rejects_out_of_range_index() {
        let samples = Plane::filled(1, 1, 5.0);
        let lines = Plane::filled(1, 1, 1.0);
        let table = GeometryLookupTable::from_planes(&samples, &lines).unwrap();
        assert!(table.apply(&Plane::zeros(2, 2), 0.0).is_err());
    }

    #[test]
    fn test_orthorectify_location_raster() {
        let mut loc_header = RasterHeader::new(2, 2, 3);
        loc_header.band_names = Some(vec!["Longitude".into(), "Latitude".into(), "Elevation".into()]);
        let mut loc = MemoryRaster::from_fn(loc_header.clone(), |l, s, b| {
            (b * 100 + l * 10 + s) as f64
        });

        let mut glt_header = test_utils::georeferenced_header(2, 3, 2, 5.0, None);
        glt_header.data_type = DataType::I32;
        let glt_planes = vec![
            Plane::from_vec(2, 3, vec![1.0, 2.0, 0.0, -2.0, 1.0, 2.0]).unwrap(),
            Plane::from_vec(2, 3, vec![1.0, 1.0, 0.0, -2.0, 2.0, 2.0]).unwrap(),
        ];
        let mut glt = MemoryRaster::new(glt_header.clone(), glt_planes).unwrap();
        let table = GeometryLookupTable::from_source(&mut glt).unwrap();

        let header = ortho_header(&loc_header, &glt_header, -9999.0);
        assert_eq!(header.bands, 3);
        assert_eq!(header.data_type, DataType::F32);
        assert_eq!(header.map_info, glt_header.map_info);
        assert_eq!(header.band_names, loc_header.band_names);

        let mut sink = MemoryRaster::blank(header, 0.0);
        orthorectify(&mut loc, &table, &mut sink, -9999.0).unwrap();
        assert_eq!(sink.band(1).as_slice(), &[100.0, 101.0, -9999.0, 111.0, 110.0, 111.0]);
        assert_eq!(sink.band(2).get(0, 0), 200.0);
    }

    #[test]
    fn test_glt_needs_two_bands() {
        let mut one_band = MemoryRaster::blank(RasterHeader::new(2, 2, 1), 1.0);
        assert!(GeometryLookupTable::from_source(&mut one_band).is_err());
    }
}
