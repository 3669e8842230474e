//! End-to-end spatial resampling tests.

use envi_io::{EnviReader, EnviWriter};
use grid_processor::{SimpleAggregateEngine, SpatialResampleEngine};
use hsi_common::{BinSize, HsiError, MemoryRaster, RasterHeader, RasterSource, ResampleConfig};
use test_utils::{create_test_cube, georeferenced_header, temp_raster_path, utm_map_info};

const NO_DATA: f64 = -9999.0;

/// 100 x 100 pixels at 1 m whose block centres sit off the 30 m lattice,
/// so the padded frame overhangs the data on every side.
fn scene_100m() -> MemoryRaster {
    let mut header = RasterHeader::new(100, 100, 2);
    header.map_info = Some(utm_map_info(724_514.5, 4_074_629.5, 1.0, None));
    header.no_data = Some(NO_DATA);
    MemoryRaster::from_fn(header, |l, s, b| (b + 1) as f64 * 100.0 + (l + s) as f64 * 0.01)
}

fn config(pixel: f64, bin: BinSize) -> ResampleConfig {
    ResampleConfig {
        target_pixel_size: pixel,
        bin_size: bin,
        ..Default::default()
    }
}

// ============================================================================
// 1 m -> 30 m scenario
// ============================================================================

#[test]
fn test_100px_to_30m_frame() {
    let mut source = scene_100m();
    let mut engine = SpatialResampleEngine::new(config(30.0, BinSize::Fixed(30))).unwrap();
    let out = engine
        .run(&mut source, |h| Ok(MemoryRaster::blank(h, 0.0)))
        .unwrap();
    let (header, bands) = out.into_parts();

    let limit = (100.0f64 / 30.0).ceil() as usize + 2;
    assert!(header.lines <= limit, "lines {}", header.lines);
    assert!(header.samples <= limit, "samples {}", header.samples);

    for band in &bands {
        let (last_row, last_col) = (header.lines - 1, header.samples - 1);
        for (r, c) in [(0, 0), (0, last_col), (last_row, 0), (last_row, last_col)] {
            assert_eq!(band.get(r, c), NO_DATA, "corner ({}, {})", r, c);
        }
        let interior: Vec<f64> = (1..last_row)
            .flat_map(|r| (1..last_col).map(move |c| (r, c)))
            .map(|(r, c)| band.get(r, c))
            .filter(|&v| v != NO_DATA)
            .collect();
        assert!(!interior.is_empty());
    }
    // Band 1 values centre around 200.
    let populated: Vec<f64> = bands[1]
        .as_slice()
        .iter()
        .copied()
        .filter(|&v| v != NO_DATA)
        .collect();
    assert!(populated.iter().all(|&v| v > 200.0 && v < 202.0));
}

#[test]
fn test_auto_bin_matches_fixed() {
    let mut auto = SpatialResampleEngine::new(config(30.0, BinSize::Auto)).unwrap();
    let mut fixed = SpatialResampleEngine::new(config(30.0, BinSize::Fixed(30))).unwrap();
    let a = auto
        .run(&mut scene_100m(), |h| Ok(MemoryRaster::blank(h, 0.0)))
        .unwrap();
    let b = fixed
        .run(&mut scene_100m(), |h| Ok(MemoryRaster::blank(h, 0.0)))
        .unwrap();
    assert_eq!(auto.bin_size(), Some(30));
    assert_eq!(a, b);
}

// ============================================================================
// Determinism and file output
// ============================================================================

fn resample_to_file(input: &std::path::Path, output: &std::path::Path) {
    let mut reader = EnviReader::open(input).unwrap();
    let mut engine = SpatialResampleEngine::new(config(15.0, BinSize::Auto)).unwrap();
    engine
        .run(&mut reader, |h| EnviWriter::create(output, h).map_err(HsiError::from))
        .unwrap();
}

#[test]
fn test_rotated_output_is_byte_identical_across_runs() {
    let (dir, input) = temp_raster_path("flightline");
    let mut header = georeferenced_header(40, 30, 3, 5.0, Some(-20.0));
    header.interleave = hsi_common::Interleave::Bil;
    let mut cube = create_test_cube(40, 30, 3);
    let mut writer = EnviWriter::create(&input, header).unwrap();
    for line in 0..40 {
        let plane = cube.read_line(line).unwrap();
        hsi_common::RasterSink::write_line(&mut writer, line, &plane).unwrap();
    }
    hsi_common::RasterSink::finish(&mut writer).unwrap();

    let first = dir.path().join("first");
    let second = dir.path().join("second");
    resample_to_file(&input, &first);
    resample_to_file(&input, &second);

    assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("first.hdr")).unwrap(),
        std::fs::read_to_string(dir.path().join("second.hdr")).unwrap()
    );

    let mut out = EnviReader::open(&first).unwrap();
    let out_header = out.header().clone();
    assert_eq!(out_header.interleave, hsi_common::Interleave::Bil);
    let map_info = out_header.map_info.unwrap();
    assert_eq!(map_info.rotation().unwrap(), Some(0.0));
    assert_eq!(map_info.pixel_size().unwrap(), (15.0, 15.0));

    let band = out.read_band(2).unwrap();
    assert!(band.as_slice().iter().any(|&v| v == -9999.0));
    assert!(band.as_slice().iter().any(|&v| v >= 2_000_000.0));
}

#[test]
fn test_simple_aggregation_to_file() {
    let (_dir, output) = temp_raster_path("scene_3px");
    let mut source = create_test_cube(9, 9, 2);
    let engine = SimpleAggregateEngine::new(3).unwrap();
    engine
        .run(&mut source, |h| EnviWriter::create(&output, h).map_err(HsiError::from))
        .unwrap();

    let mut reader = EnviReader::open(&output).unwrap();
    assert_eq!(reader.header().band_shape(), (3, 3));
    let band = reader.read_band(0).unwrap();
    assert_eq!(band.get(2, 1), 7004.0);
}
