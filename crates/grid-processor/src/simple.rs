//! Plain `n x n` block aggregation of every band.

use hsi_common::{config::DEFAULT_NO_DATA, HsiError, Plane, RasterHeader, RasterSink, RasterSource, Result};
use tracing::{debug, info};

use crate::aggregate::{aggregate_plane, BlockReducer};

/// Default block edge for simple aggregation.
pub const DEFAULT_AGGREGATION: usize = 3;

/// Averages non-overlapping `factor x factor` blocks of every band with the
/// strict mean: a block holding any masked or no-data pixel becomes no-data.
#[derive(Debug, Clone)]
pub struct SimpleAggregateEngine {
    factor: usize,
    mask: Option<Plane>,
    no_data: f64,
}

impl SimpleAggregateEngine {
    pub fn new(factor: usize) -> Result<Self> {
        if factor == 0 {
            return Err(HsiError::config("aggregation factor must be >= 1"));
        }
        Ok(Self {
            factor,
            mask: None,
            no_data: DEFAULT_NO_DATA,
        })
    }

    /// Exclude pixels where `mask` equals 1.
    pub fn with_mask(mut self, mask: Plane) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Output header: dimensions divided by the factor, pixel size scaled
    /// up, no-data set to the output sentinel.
    pub fn output_header(&self, source: &RasterHeader) -> Result<RasterHeader> {
        for (axis, len) in [("lines", source.lines), ("samples", source.samples)] {
            if len < self.factor {
                return Err(HsiError::AggregationUnderflow {
                    axis,
                    len,
                    bin: self.factor,
                });
            }
        }
        let mut header = source.clone();
        header.lines = source.lines / self.factor;
        header.samples = source.samples / self.factor;
        header.header_offset = 0;
        header.byte_order = 0;
        header.no_data = Some(self.no_data);
        if let Some(map_info) = &source.map_info {
            if let Ok((pixel, _)) = map_info.pixel_size() {
                header.map_info = Some(map_info.clone().with_pixel_size(pixel * self.factor as f64));
            }
        }
        Ok(header)
    }

    /// Aggregate one band.
    pub fn aggregate_band(&self, mut plane: Plane, source_no_data: Option<f64>) -> Result<Plane> {
        if let Some(no_data) = source_no_data {
            plane.mask_value(no_data);
        }
        if let Some(mask) = &self.mask {
            mask.expect_shape(plane.rows(), plane.cols())?;
            for (value, &m) in plane.as_mut_slice().iter_mut().zip(mask.as_slice()) {
                if m == 1.0 {
                    *value = f64::NAN;
                }
            }
        }
        let mut out = aggregate_plane(&plane, self.factor, BlockReducer::Mean)?;
        out.fill_nan(self.no_data);
        Ok(out)
    }

    /// Aggregate every band of `source` into `sink`.
    pub fn run<S, K, F>(&self, source: &mut S, make_sink: F) -> Result<K>
    where
        S: RasterSource,
        K: RasterSink,
        F: FnOnce(RasterHeader) -> Result<K>,
    {
        let header = self.output_header(source.header())?;
        let source_no_data = source.header().no_data;
        info!(
            factor = self.factor,
            out_lines = header.lines,
            out_samples = header.samples,
            "Aggregating bands"
        );
        let mut sink = make_sink(header)?;
        for item in source.bands() {
            let (band, plane) = item?;
            sink.write_band(band, &self.aggregate_band(plane, source_no_data)?)?;
            debug!(band, "Wrote aggregated band");
        }
        sink.finish()?;
        Ok(sink)
    }
}
