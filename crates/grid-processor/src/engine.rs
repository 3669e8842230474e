//! Band-by-band spatial resampling.
//!
//! ```text
//! Init ──prepare_geometry──► GeometryReady ──build_mapping──► MappingReady
//!                                                                 │
//!                                                           stream_bands
//!                                                                 ▼
//!                                            Done ◄── StreamingBands
//! ```

use std::fmt;

use hsi_common::{
    HsiError, Plane, RasterHeader, RasterSink, RasterSource, ResampleConfig, Result,
};
use projection::{CoordinateGrid, GridGeometry};
use tracing::{debug, info};

use crate::aggregate::{aggregate_plane, BlockReducer};
use crate::regrid::RegridMapping;

/// Lifecycle of a [`SpatialResampleEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialState {
    Init,
    GeometryReady,
    MappingReady,
    StreamingBands,
    Done,
}

impl fmt::Display for SpatialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::GeometryReady => "geometry-ready",
            Self::MappingReady => "mapping-ready",
            Self::StreamingBands => "streaming-bands",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Resamples a georeferenced raster onto a regular north-up grid at the
/// configured target pixel size.
pub struct SpatialResampleEngine {
    config: ResampleConfig,
    state: SpatialState,
    verbose: bool,
    mask: Option<Plane>,
    header: Option<RasterHeader>,
    coords: Option<CoordinateGrid>,
    bin: usize,
    observation: bool,
    mapping: Option<RegridMapping>,
}

impl SpatialResampleEngine {
    pub fn new(config: ResampleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: SpatialState::Init,
            verbose: false,
            mask: None,
            header: None,
            coords: None,
            bin: 0,
            observation: false,
            mapping: None,
        })
    }

    /// Log progress every 10 bands at info level.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Exclude pixels where `mask` equals 1. The mask must have the source
    /// band shape.
    pub fn with_mask(mut self, mask: Plane) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn state(&self) -> SpatialState {
        self.state
    }

    /// Aggregation block size, known from `MappingReady` on.
    pub fn bin_size(&self) -> Option<usize> {
        (self.bin > 0).then_some(self.bin)
    }

    pub fn mapping(&self) -> Option<&RegridMapping> {
        self.mapping.as_ref()
    }

    /// Whether angular bands get the circular mean.
    pub fn is_observation(&self) -> bool {
        self.observation
    }

    fn expect_state(&self, expected: SpatialState, action: &str) -> Result<()> {
        if self.state != expected {
            return Err(HsiError::State(format!(
                "cannot {} in state {} (expected {})",
                action, self.state, expected
            )));
        }
        Ok(())
    }

    /// Parse the georeference and compute per-pixel coordinates.
    pub fn prepare_geometry(&mut self, header: &RasterHeader) -> Result<()> {
        self.expect_state(SpatialState::Init, "prepare geometry")?;

        let geometry = GridGeometry::from_header(header)?;
        if let Some(mask) = &self.mask {
            mask.expect_shape(header.lines, header.samples)?;
        }
        self.observation = self
            .config
            .observation
            .unwrap_or_else(|| header.looks_like_observation());
        self.bin = self.config.spatial_bin(geometry.pixel_size)?;
        self.coords = Some(geometry.coordinates());
        self.header = Some(header.clone());

        info!(
            lines = header.lines,
            samples = header.samples,
            source_pixel = geometry.pixel_size,
            rotation = geometry.rotation,
            observation = self.observation,
            "Prepared source geometry"
        );
        self.state = SpatialState::GeometryReady;
        Ok(())
    }

    /// Aggregate the coordinates and build the nearest-neighbour mapping.
    pub fn build_mapping(&mut self) -> Result<()> {
        self.expect_state(SpatialState::GeometryReady, "build mapping")?;
        let coords = self
            .coords
            .take()
            .ok_or_else(|| HsiError::State("coordinates missing".into()))?;

        if self.verbose {
            info!(bins = self.bin, "Aggregating every {} pixels", self.bin);
        }
        let aggregated = CoordinateGrid::new(
            aggregate_plane(&coords.x, self.bin, BlockReducer::NanMean)?,
            aggregate_plane(&coords.y, self.bin, BlockReducer::NanMean)?,
        )?;
        self.mapping = Some(RegridMapping::build(
            &aggregated,
            self.config.target_pixel_size,
        )?);
        self.state = SpatialState::MappingReady;
        Ok(())
    }

    fn source_header(&self) -> Result<&RasterHeader> {
        self.header
            .as_ref()
            .ok_or_else(|| HsiError::State("source header missing".into()))
    }

    fn regrid_mapping(&self) -> Result<&RegridMapping> {
        self.mapping
            .as_ref()
            .ok_or_else(|| HsiError::State("mapping not built".into()))
    }

    /// The no-data sentinel written to the output.
    pub fn no_data(&self) -> Result<f64> {
        Ok(self.source_header()?.no_data_or(self.config.no_data_fallback))
    }

    /// Header of the resampled raster: new dimensions, north-up map info at
    /// the target pixel size, little-endian, no-data carried through.
    pub fn output_header(&self) -> Result<RasterHeader> {
        let mapping = self.regrid_mapping()?;
        let source = self.source_header()?;
        let grid = mapping.grid();

        let mut header = source.clone();
        header.lines = grid.lines;
        header.samples = grid.samples;
        header.header_offset = 0;
        header.byte_order = 0;
        header.no_data = Some(self.no_data()?);
        header.map_info = Some(
            source
                .require_map_info()?
                .clone()
                .with_upper_left(grid.xmin, grid.ymax)
                .with_pixel_size(grid.pixel_size)
                .without_rotation(),
        );
        Ok(header)
    }

    fn reducer_for(&self, band: usize) -> BlockReducer {
        if self.observation && self.config.angular_band_indices.contains(&band) {
            BlockReducer::CircularMean
        } else {
            BlockReducer::NanMean
        }
    }

    /// Resample one source band.
    pub fn resample_band(&self, band: usize, mut plane: Plane) -> Result<Plane> {
        let no_data = self.no_data()?;
        plane.mask_value(no_data);
        if let Some(mask) = &self.mask {
            mask.expect_shape(plane.rows(), plane.cols())?;
            for (value, &m) in plane.as_mut_slice().iter_mut().zip(mask.as_slice()) {
                if m == 1.0 {
                    *value = f64::NAN;
                }
            }
        }
        let aggregated = aggregate_plane(&plane, self.bin, self.reducer_for(band))?;
        self.regrid_mapping()?.apply(&aggregated, no_data)
    }

    /// Read, resample and write every band in order.
    pub fn stream_bands<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<()>
    where
        S: RasterSource,
        K: RasterSink,
    {
        self.expect_state(SpatialState::MappingReady, "stream bands")?;
        let expected = self.output_header()?;
        let sink_header = sink.header();
        if sink_header.band_shape() != expected.band_shape() || sink_header.bands != source.header().bands {
            return Err(HsiError::ShapeMismatch {
                expected: format!(
                    "{} x {} x {}",
                    expected.lines, expected.samples, source.header().bands
                ),
                actual: format!(
                    "{} x {} x {}",
                    sink_header.lines, sink_header.samples, sink_header.bands
                ),
            });
        }

        self.state = SpatialState::StreamingBands;
        let total = source.header().bands;
        for item in source.bands() {
            let (band, plane) = item?;
            if self.verbose && band % 10 == 0 {
                info!("{}/{}", band, total);
            }
            let resampled = self.resample_band(band, plane)?;
            sink.write_band(band, &resampled)?;
            debug!(band, "Wrote resampled band");
        }
        sink.finish()?;

        self.state = SpatialState::Done;
        info!(bands = total, "Spatial resampling complete");
        Ok(())
    }

    /// Run the whole job. `make_sink` receives the output header and returns
    /// the sink to write into.
    pub fn run<S, K, F>(&mut self, source: &mut S, make_sink: F) -> Result<K>
    where
        S: RasterSource,
        K: RasterSink,
        F: FnOnce(RasterHeader) -> Result<K>,
    {
        self.prepare_geometry(source.header())?;
        self.build_mapping()?;
        let mut sink = make_sink(self.output_header()?)?;
        self.stream_bands(source, &mut sink)?;
        Ok(sink)
    }
}
