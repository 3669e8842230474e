//! Subcommand implementations: open the ENVI inputs, run an engine and
//! write the product next to them.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use envi_io::{EnviReader, EnviWriter};
use grid_processor::{SimpleAggregateEngine, SpatialResampleEngine};
use hsi_common::{InterpolationKind, Plane, RasterSource, ResampleConfig};
use projection::{ortho_header, orthorectify, GeometryLookupTable};
use spectral_processor::{description_for, SpectralResampleEngine};
use tracing::info;

pub const EXPERIMENTAL_DISCLAIMER: &str =
    "(DISCLAIMER: THIS DATA IS EXPERIMENTAL AND NOT INTENDED FOR SCIENTIFIC USE) ";

const ORTHO_NO_DATA: f64 = -9999.0;

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))
}

/// Pixel size as used in output names: zero-padded integer when whole.
fn pixel_label(pixel: f64) -> String {
    if pixel.fract() == 0.0 {
        format!("{:02}", pixel as u64)
    } else {
        pixel.to_string()
    }
}

/// `<out_dir>/<basename>_<pixel>m`
pub fn spatial_output(input: &Path, out_dir: &Path, pixel: f64) -> Result<PathBuf> {
    Ok(out_dir.join(format!("{}_{}m", file_name(input)?, pixel_label(pixel))))
}

/// `<out_dir>/<stem>_<factor>px`
pub fn aggregate_output(input: &Path, out_dir: &Path, factor: usize) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", input.display()))?;
    Ok(out_dir.join(format!("{}_{}px", stem, factor)))
}

/// `<loc_file>_ort`
pub fn ortho_output(loc: &Path) -> PathBuf {
    let mut name = loc.as_os_str().to_owned();
    name.push("_ort");
    PathBuf::from(name)
}

/// The GLT belonging to a location file: last `loc` in the file name
/// replaced by `glt`.
pub fn glt_path(loc: &Path) -> Result<PathBuf> {
    let name = file_name(loc)?;
    let Some(pos) = name.rfind("loc") else {
        bail!("cannot derive a GLT name from {}", loc.display());
    };
    let glt = format!("{}glt{}", &name[..pos], &name[pos + 3..]);
    Ok(loc.with_file_name(glt))
}

fn read_mask(path: &Path) -> Result<Plane> {
    let mut reader = EnviReader::open(path)
        .with_context(|| format!("Failed to open mask {}", path.display()))?;
    let mask = reader
        .read_band(0)
        .with_context(|| format!("Failed to read mask {}", path.display()))?;
    Ok(mask)
}

fn open(path: &Path) -> Result<EnviReader> {
    EnviReader::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

pub fn spatial(
    input: &Path,
    out_dir: &Path,
    mut config: ResampleConfig,
    verbose: bool,
) -> Result<PathBuf> {
    let output = spatial_output(input, out_dir, config.target_pixel_size)?;
    let mut reader = open(input)?;
    if config.observation.is_none() && reader.base_name().contains("obs") {
        config.observation = Some(true);
    }

    let mask = config.mask.as_deref().map(read_mask).transpose()?;
    let mut engine = SpatialResampleEngine::new(config)
        .context("Invalid spatial configuration")?
        .with_verbose(verbose);
    if let Some(mask) = mask {
        engine = engine.with_mask(mask);
    }

    engine
        .run(&mut reader, |header| Ok(EnviWriter::create(&output, header)?))
        .with_context(|| format!("Spatial resampling of {} failed", input.display()))?;
    info!(
        bin = engine.bin_size(),
        observation = engine.is_observation(),
        "Wrote {}",
        output.display()
    );
    Ok(output)
}

pub fn aggregate(input: &Path, out_dir: &Path, factor: usize, mask: Option<&Path>) -> Result<PathBuf> {
    let output = aggregate_output(input, out_dir, factor)?;
    let mut reader = open(input)?;
    let mut engine = SimpleAggregateEngine::new(factor)?;
    if let Some(mask) = mask {
        engine = engine.with_mask(read_mask(mask)?);
    }

    engine
        .run(&mut reader, |header| Ok(EnviWriter::create(&output, header)?))
        .with_context(|| format!("Aggregation of {} failed", input.display()))?;
    Ok(output)
}

pub fn spectral(
    input: &Path,
    output: &Path,
    kind: InterpolationKind,
    bins: Option<usize>,
    description_prefix: &str,
) -> Result<PathBuf> {
    let mut reader = open(input)?;
    let mut engine = SpectralResampleEngine::new(kind)
        .with_description(description_for(&reader.base_name(), description_prefix));
    if let Some(bins) = bins {
        engine = engine.with_bins(bins);
    }

    engine
        .run(&mut reader, |header| Ok(EnviWriter::create(output, header)?))
        .with_context(|| format!("Spectral resampling of {} failed", input.display()))?;
    if let Some(plan) = engine.plan() {
        info!(
            bins = plan.bins,
            bands = plan.canonical.len(),
            extrapolated = plan.extrapolated.len(),
            "Wrote {}",
            output.display()
        );
    }
    Ok(output.to_path_buf())
}

pub fn ortho(loc: &Path) -> Result<PathBuf> {
    let glt = glt_path(loc)?;
    let output = ortho_output(loc);

    let mut loc_reader = open(loc)?;
    let mut glt_reader = open(&glt)?;
    let table = GeometryLookupTable::from_source(&mut glt_reader)
        .with_context(|| format!("Invalid GLT {}", glt.display()))?;
    let header = ortho_header(loc_reader.header(), glt_reader.header(), ORTHO_NO_DATA);

    let mut writer = EnviWriter::create(&output, header)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    orthorectify(&mut loc_reader, &table, &mut writer, ORTHO_NO_DATA)
        .with_context(|| format!("Orthorectification of {} failed", loc.display()))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsi_common::{MemoryRaster, RasterHeader, RasterSink};
    use test_utils::{georeferenced_header, temp_raster_path};

    fn write_raster(path: &Path, raster: MemoryRaster) {
        let (header, bands) = raster.into_parts();
        let mut writer = EnviWriter::create(path, header).unwrap();
        for (band, plane) in bands.iter().enumerate() {
            writer.write_band(band, plane).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_output_names() {
        let input = Path::new("/data/ang20200712t201415_rfl");
        assert_eq!(
            spatial_output(input, Path::new("/out"), 30.0).unwrap(),
            PathBuf::from("/out/ang20200712t201415_rfl_30m")
        );
        assert_eq!(
            spatial_output(input, Path::new("/out"), 5.0).unwrap(),
            PathBuf::from("/out/ang20200712t201415_rfl_05m")
        );
        assert_eq!(
            aggregate_output(Path::new("/data/scene.bin"), Path::new("/out"), 3).unwrap(),
            PathBuf::from("/out/scene_3px")
        );
        assert_eq!(
            ortho_output(Path::new("/data/ang_loc")),
            PathBuf::from("/data/ang_loc_ort")
        );
    }

    #[test]
    fn test_glt_path() {
        assert_eq!(
            glt_path(Path::new("/data/ang20200712t201415_loc")).unwrap(),
            PathBuf::from("/data/ang20200712t201415_glt")
        );
        // Directory names are left alone.
        assert_eq!(
            glt_path(Path::new("/loc/scene_loc")).unwrap(),
            PathBuf::from("/loc/scene_glt")
        );
        assert!(glt_path(Path::new("/data/scene_rfl")).is_err());
    }

    #[test]
    fn test_spatial_writes_north_up_product() {
        let (dir, input) = temp_raster_path("scene_rfl");
        let header = georeferenced_header(12, 12, 2, 5.0, Some(-15.0));
        write_raster(&input, MemoryRaster::from_fn(header, |l, s, b| (b * 100 + l + s) as f64));

        let config = ResampleConfig {
            target_pixel_size: 15.0,
            ..Default::default()
        };
        let output = spatial(&input, dir.path(), config, true).unwrap();
        assert_eq!(output, dir.path().join("scene_rfl_15m"));

        let reader = EnviReader::open(&output).unwrap();
        let map_info = reader.header().map_info.as_ref().unwrap();
        assert_eq!(map_info.pixel_size().unwrap(), (15.0, 15.0));
        assert_eq!(map_info.rotation().unwrap(), Some(0.0));
        assert_eq!(reader.header().bands, 2);
    }

    #[test]
    fn test_aggregate_with_mask() {
        let (dir, input) = temp_raster_path("scene.bin");
        let mask_path = dir.path().join("mask");
        let mut header = georeferenced_header(6, 6, 1, 5.0, None);
        header.no_data = None;
        write_raster(&input, MemoryRaster::blank(header, 2.0));

        let mut mask = MemoryRaster::blank(RasterHeader::new(6, 6, 1), 0.0);
        let mut plane = Plane::zeros(6, 6);
        for l in 0..3 {
            for s in 0..3 {
                plane.set(l, s, 1.0);
            }
        }
        mask.write_band(0, &plane).unwrap();
        write_raster(&mask_path, mask);

        let output = aggregate(&input, dir.path(), 3, Some(&mask_path)).unwrap();
        assert_eq!(output, dir.path().join("scene_3px"));
        let band = EnviReader::open(&output).unwrap().read_band(0).unwrap();
        assert_eq!(band.as_slice(), &[-9999.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_spectral_description() {
        let (dir, input) = temp_raster_path("scene_RFL_UNC");
        let axis = test_utils::create_wavelength_axis(400.0, 10.0, 20, 10.0);
        write_raster(&input, test_utils::create_spectral_cube(2, 2, &axis));

        let output = dir.path().join("scene_RFL_UNC_10nm");
        spectral(&input, &output, InterpolationKind::Linear, None, EXPERIMENTAL_DISCLAIMER).unwrap();
        let header = EnviReader::open(&output).unwrap().header().clone();
        assert_eq!(header.bands, 60);
        assert!(header
            .description
            .as_deref()
            .unwrap()
            .ends_with("10 nm resampled reflectance uncertainty"));
        assert!(header.description.as_deref().unwrap().starts_with("(DISCLAIMER"));
    }

    #[test]
    fn test_ortho() {
        let (dir, loc) = temp_raster_path("scene_loc");
        let mut loc_header = RasterHeader::new(2, 2, 3);
        loc_header.band_names = Some(vec!["Longitude".into(), "Latitude".into(), "Elevation".into()]);
        write_raster(&loc, MemoryRaster::from_fn(loc_header, |l, s, b| (b * 10 + l * 2 + s) as f64));

        let mut glt_header = georeferenced_header(2, 3, 2, 5.0, None);
        glt_header.data_type = hsi_common::DataType::I32;
        let glt = MemoryRaster::new(
            glt_header,
            vec![
                Plane::from_vec(2, 3, vec![1.0, 2.0, 0.0, 1.0, 2.0, 0.0]).unwrap(),
                Plane::from_vec(2, 3, vec![1.0, 1.0, 0.0, 2.0, 2.0, 0.0]).unwrap(),
            ],
        )
        .unwrap();
        write_raster(&dir.path().join("scene_glt"), glt);

        let output = ortho(&loc).unwrap();
        assert_eq!(output, dir.path().join("scene_loc_ort"));
        let mut reader = EnviReader::open(&output).unwrap();
        assert_eq!(reader.header().bands, 3);
        assert_eq!(reader.header().band_names.as_ref().unwrap()[2], "Elevation");
        let elevation = reader.read_band(2).unwrap();
        assert_eq!(elevation.as_slice(), &[20.0, 21.0, -9999.0, 22.0, 23.0, -9999.0]);
    }

    #[test]
    fn test_missing_input_reports_path() {
        let (dir, input) = temp_raster_path("absent");
        let err = aggregate(&input, dir.path(), 3, None).unwrap_err();
        assert!(format!("{:#}", err).contains("absent"));
    }
}
