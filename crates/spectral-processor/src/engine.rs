//! Line-by-line spectral resampling onto the canonical 10 nm grid.
//!
//! ```text
//! Init ──prepare_axis──► AxisReady ──stream_lines──► StreamingLines ──► Done
//! ```

use std::fmt;

use grid_processor::{aggregate_rows, BlockReducer};
use hsi_common::{
    HsiError, InterpolationKind, Plane, RasterHeader, RasterSink, RasterSource, ResampleConfig,
    Result, WavelengthAxis,
};
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate_axis, spectral_bins};
use crate::interpolate::{canonical_grid, SpectralInterpolator};

/// Description written to resampled reflectance headers.
pub const REFLECTANCE_DESCRIPTION: &str = "10 nm resampled reflectance";

/// Description written to resampled uncertainty headers.
pub const UNCERTAINTY_DESCRIPTION: &str = "10 nm resampled reflectance uncertainty";

/// Lifecycle of a [`SpectralResampleEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectralState {
    Init,
    AxisReady,
    StreamingLines,
    Done,
}

impl fmt::Display for SpectralState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::AxisReady => "axis-ready",
            Self::StreamingLines => "streaming-lines",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Everything derived from the source wavelength axis.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralPlan {
    /// Source bands averaged per aggregated band.
    pub bins: usize,
    /// Source bands actually used (`bins * aggregated.len()`).
    pub used_bands: usize,
    pub aggregated: WavelengthAxis,
    /// Output wavelengths.
    pub canonical: Vec<f64>,
    /// Aggregated FWHM carried to the output wavelengths (nearest).
    pub fwhm: Vec<f64>,
    /// Output wavelengths outside the aggregated range.
    pub extrapolated: Vec<f64>,
}

/// Resamples every pixel spectrum: NaN-mean band aggregation followed by
/// interpolation onto the canonical grid.
pub struct SpectralResampleEngine {
    kind: InterpolationKind,
    bins_override: Option<usize>,
    no_data_fallback: f64,
    description: String,
    state: SpectralState,
    header: Option<RasterHeader>,
    plan: Option<SpectralPlan>,
    interpolator: Option<SpectralInterpolator>,
}

impl SpectralResampleEngine {
    pub fn new(kind: InterpolationKind) -> Self {
        Self {
            kind,
            bins_override: None,
            no_data_fallback: hsi_common::config::DEFAULT_NO_DATA,
            description: REFLECTANCE_DESCRIPTION.to_string(),
            state: SpectralState::Init,
            header: None,
            plan: None,
            interpolator: None,
        }
    }

    pub fn from_config(config: &ResampleConfig) -> Result<Self> {
        config.validate()?;
        let mut engine = Self::new(config.interpolation_kind);
        engine.no_data_fallback = config.no_data_fallback;
        Ok(engine)
    }

    /// Average exactly `bins` bands instead of deriving the count from the
    /// band spacing. Zero is treated as one.
    pub fn with_bins(mut self, bins: usize) -> Self {
        self.bins_override = Some(bins.max(1));
        self
    }

    /// Description written to the output header.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn state(&self) -> SpectralState {
        self.state
    }

    pub fn plan(&self) -> Option<&SpectralPlan> {
        self.plan.as_ref()
    }

    fn expect_state(&self, expected: SpectralState, action: &str) -> Result<()> {
        if self.state != expected {
            return Err(HsiError::State(format!(
                "cannot {} in state {} (expected {})",
                action, self.state, expected
            )));
        }
        Ok(())
    }

    /// Aggregate the wavelength axis, pick the canonical grid and build the
    /// interpolation weights.
    pub fn prepare_axis(&mut self, header: &RasterHeader) -> Result<()> {
        self.expect_state(SpectralState::Init, "prepare axis")?;

        let axis = header.wavelength_axis()?;
        let bins = self.bins_override.unwrap_or_else(|| spectral_bins(&axis));
        let aggregated = aggregate_axis(&axis, bins)?;
        let canonical = canonical_grid(axis.max());

        let interpolator = SpectralInterpolator::new(aggregated.centers(), &canonical, self.kind)?;
        let fwhm = SpectralInterpolator::new(
            aggregated.centers(),
            &canonical,
            InterpolationKind::Nearest,
        )?
        .apply_slice(aggregated.fwhm())?;

        let extrapolated: Vec<f64> = canonical
            .iter()
            .copied()
            .filter(|&w| !aggregated.covers(w))
            .collect();
        if !extrapolated.is_empty() {
            warn!(
                count = extrapolated.len(),
                aggregated_min = aggregated.min(),
                aggregated_max = aggregated.max(),
                "Canonical wavelengths outside the aggregated range will be extrapolated"
            );
        }

        info!(
            bins,
            source_bands = axis.len(),
            aggregated_bands = aggregated.len(),
            out_bands = canonical.len(),
            kind = %self.kind,
            "Aggregating every {} bands",
            bins
        );

        self.plan = Some(SpectralPlan {
            bins,
            used_bands: bins * aggregated.len(),
            aggregated,
            canonical,
            fwhm,
            extrapolated,
        });
        self.interpolator = Some(interpolator);
        self.header = Some(header.clone());
        self.state = SpectralState::AxisReady;
        Ok(())
    }

    fn spectral_plan(&self) -> Result<&SpectralPlan> {
        self.plan
            .as_ref()
            .ok_or_else(|| HsiError::State("axis not prepared".into()))
    }

    fn source_header(&self) -> Result<&RasterHeader> {
        self.header
            .as_ref()
            .ok_or_else(|| HsiError::State("axis not prepared".into()))
    }

    pub fn no_data(&self) -> Result<f64> {
        Ok(self.source_header()?.no_data_or(self.no_data_fallback))
    }

    /// Header of the resampled raster: canonical wavelengths and resampled
    /// FWHM in nanometers; per-band metadata of the source is dropped.
    pub fn output_header(&self) -> Result<RasterHeader> {
        let plan = self.spectral_plan()?;
        let mut header = self.source_header()?.clone();
        header.bands = plan.canonical.len();
        header.wavelength = Some(plan.canonical.clone());
        header.fwhm = Some(plan.fwhm.clone());
        header.wavelength_units = Some("Nanometers".into());
        header.band_names = None;
        header.description = Some(self.description.clone());
        header.no_data = Some(self.no_data()?);
        header.header_offset = 0;
        header.byte_order = 0;
        header
            .extra
            .retain(|(key, _)| !key.eq_ignore_ascii_case("default bands"));
        Ok(header)
    }

    /// Resample one `bands x samples` line into `canonical x samples`.
    pub fn resample_line(&self, mut line: Plane) -> Result<Plane> {
        let plan = self.spectral_plan()?;
        let interpolator = self
            .interpolator
            .as_ref()
            .ok_or_else(|| HsiError::State("axis not prepared".into()))?;
        let no_data = self.no_data()?;

        if line.rows() < plan.used_bands {
            return Err(HsiError::ShapeMismatch {
                expected: format!("at least {} bands", plan.used_bands),
                actual: format!("{} bands", line.rows()),
            });
        }
        line.mask_value(no_data);
        let used = Plane::from_vec(
            plan.used_bands,
            line.cols(),
            line.as_slice()[..plan.used_bands * line.cols()].to_vec(),
        )?;
        let aggregated = aggregate_rows(&used, plan.bins, BlockReducer::NanMean)?;
        let mut out = interpolator.apply_plane(&aggregated)?;
        out.fill_nan(no_data);
        Ok(out)
    }

    /// Read, resample and write every line in order.
    pub fn stream_lines<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<()>
    where
        S: RasterSource,
        K: RasterSink,
    {
        self.expect_state(SpectralState::AxisReady, "stream lines")?;
        let expected = self.output_header()?;
        let sink_header = sink.header();
        if sink_header.line_shape() != expected.line_shape() || sink_header.lines != expected.lines {
            return Err(HsiError::ShapeMismatch {
                expected: format!(
                    "{} x {} x {}",
                    expected.lines, expected.samples, expected.bands
                ),
                actual: format!(
                    "{} x {} x {}",
                    sink_header.lines, sink_header.samples, sink_header.bands
                ),
            });
        }
        if source.header().bands < self.spectral_plan()?.used_bands {
            return Err(HsiError::State("source has fewer bands than planned".into()));
        }

        self.state = SpectralState::StreamingLines;
        let mut count = 0;
        for item in source.lines() {
            let (line, plane) = item?;
            sink.write_line(line, &self.resample_line(plane)?)?;
            debug!(line, "Wrote resampled line");
            count += 1;
        }
        sink.finish()?;

        self.state = SpectralState::Done;
        info!(lines = count, "Spectral resampling complete");
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
        self.prepare_axis(source.header())?;
        let mut sink = make_sink(self.output_header()?)?;
        self.stream_lines(source, &mut sink)?;
        Ok(sink)
    }
}

/// Output description for a source file: uncertainty products are
/// recognised by `UNC` in their name. `prefix` is prepended verbatim.
pub fn description_for(file_name: &str, prefix: &str) -> String {
    let base = if file_name.contains("UNC") {
        UNCERTAINTY_DESCRIPTION
    } else {
        REFLECTANCE_DESCRIPTION
    };
    format!("{}{}", prefix, base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsi_common::MemoryRaster;
    use test_utils::{create_spectral_cube, create_wavelength_axis};

    #[test]
    fn test_plan_for_5nm_sensor() {
        let axis = create_wavelength_axis(377.0, 5.0, 425, 5.8);
        let header = create_spectral_cube(1, 1, &axis).into_parts().0;
        let mut engine = SpectralResampleEngine::new(InterpolationKind::Cubic);
        engine.prepare_axis(&header).unwrap();

        let plan = engine.plan().unwrap();
        assert_eq!(plan.bins, 2);
        assert_eq!(plan.used_bands, 424);
        assert_eq!(plan.canonical.len(), 211);
        assert_eq!(plan.fwhm.len(), 211);
        // The last source band is dropped; aggregated centers end at 2489.5.
        assert_eq!(plan.aggregated.max(), 2489.5);
        assert_eq!(plan.extrapolated, vec![2490.0, 2500.0]);
    }

    #[test]
    fn test_state_machine() {
        let axis = create_wavelength_axis(400.0, 10.0, 8, 10.0);
        let mut source = create_spectral_cube(2, 3, &axis);
        let mut engine = SpectralResampleEngine::new(InterpolationKind::Linear);
        assert!(engine.output_header().is_err());
        let mut sink = MemoryRaster::blank(hsi_common::RasterSink::header(&source).clone(), 0.0);
        assert!(matches!(
            engine.stream_lines(&mut source, &mut sink),
            Err(HsiError::State(_))
        ));

        let mut sink = engine
            .run(&mut source, |h| Ok(MemoryRaster::blank(h, 0.0)))
            .unwrap();
        assert_eq!(engine.state(), SpectralState::Done);
        assert!(engine.stream_lines(&mut source, &mut sink).is_err());
    }

    #[test]
    fn test_output_header() {
        let axis = create_wavelength_axis(400.0, 10.0, 8, 10.0);
        let (mut header, _) = create_spectral_cube(2, 3, &axis).into_parts();
        header.band_names = Some((0..8).map(|i| format!("band {}", i)).collect());
        header.set_extra("default bands", "{3, 2, 1}");
        header.no_data = Some(-1.0);

        let mut engine = SpectralResampleEngine::new(InterpolationKind::Nearest)
            .with_description(description_for("SISTER_AVNG_UNC.bin", ""));
        engine.prepare_axis(&header).unwrap();
        let out = engine.output_header().unwrap();
        assert_eq!(out.bands, 60);
        assert_eq!(out.wavelength.as_ref().unwrap()[0], 400.0);
        assert_eq!(out.fwhm.as_ref().unwrap()[59], 10.0);
        assert_eq!(out.band_names, None);
        assert_eq!(out.extra("default bands"), None);
        assert_eq!(out.no_data, Some(-1.0));
        assert_eq!(out.description.as_deref(), Some(UNCERTAINTY_DESCRIPTION));
    }

    #[test]
    fn test_no_data_pixels_stay_no_data() {
        let axis = create_wavelength_axis(400.0, 5.0, 20, 5.0);
        let mut header = RasterHeader::new(1, 2, 20);
        header.wavelength = Some(axis.centers().to_vec());
        header.fwhm = Some(axis.fwhm().to_vec());
        header.no_data = Some(-9999.0);
        let mut source = MemoryRaster::from_fn(header, |_, s, b| {
            if s == 0 { -9999.0 } else { 0.1 + b as f64 * 0.01 }
        });

        let mut engine = SpectralResampleEngine::new(InterpolationKind::Cubic);
        let out = engine
            .run(&mut source, |h| Ok(MemoryRaster::blank(h, 0.0)))
            .unwrap();
        let line = hsi_common::RasterSource::read_line(&mut out.clone(), 0).unwrap();
        for band in 0..line.rows() {
            assert_eq!(line.get(band, 0), -9999.0);
            assert!(line.get(band, 1) != -9999.0);
        }
    }

    #[test]
    fn test_explicit_bins() {
        let axis = create_wavelength_axis(400.0, 5.0, 21, 5.0);
        let header = create_spectral_cube(1, 1, &axis).into_parts().0;
        let mut engine = SpectralResampleEngine::new(InterpolationKind::Linear).with_bins(0);
        engine.prepare_axis(&header).unwrap();
        assert_eq!(engine.plan().unwrap().bins, 1);
        assert_eq!(engine.plan().unwrap().used_bands, 21);
    }

    #[test]
    fn test_missing_wavelengths() {
        let header = RasterHeader::new(1, 1, 4);
        let mut engine = SpectralResampleEngine::new(InterpolationKind::Cubic);
        assert!(matches!(
            engine.prepare_axis(&header),
            Err(HsiError::MissingField(_))
        ));
        assert_eq!(engine.state(), SpectralState::Init);
    }

    #[test]
    fn test_too_few_aggregated_bands_for_cubic() {
        let axis = create_wavelength_axis(400.0, 5.0, 6, 5.0);
        let header = create_spectral_cube(1, 1, &axis).into_parts().0;
        let mut engine = SpectralResampleEngine::new(InterpolationKind::Cubic);
        assert!(matches!(
            engine.prepare_axis(&header),
            Err(HsiError::Interpolation(_))
        ));
    }

    #[test]
    fn test_description_for() {
        assert_eq!(description_for("scene_rfl", ""), REFLECTANCE_DESCRIPTION);
        assert_eq!(
            description_for("scene_RFL_UNC", "(EXPERIMENTAL) "),
            "(EXPERIMENTAL) 10 nm resampled reflectance uncertainty"
        );
    }
}
