//! Common test fixtures for resampling tests.

use std::path::PathBuf;

use hsi_common::{MapInfo, RasterHeader};

/// Georeferenced scenes used across the test suites.
pub mod scenes {
    /// UTM upper-left easting of the synthetic scenes.
    pub const UTM_EASTING: f64 = 724_500.0;

    /// UTM upper-left northing of the synthetic scenes.
    pub const UTM_NORTHING: f64 = 4_074_600.0;

    /// Rotation entry used by airborne flight lines (stored value).
    pub const FLIGHT_ROTATION: f64 = -15.0;
}

/// Builds a UTM `map info` list with the given origin and pixel size.
///
/// When `rotation` is `Some`, a `rotation=<deg>` entry is appended.
pub fn utm_map_info(x: f64, y: f64, pixel: f64, rotation: Option<f64>) -> MapInfo {
    let mut entries: Vec<String> = vec![
        "UTM".into(),
        "1.000".into(),
        "1.000".into(),
        format!("{}", x),
        format!("{}", y),
        format!("{}", pixel),
        format!("{}", pixel),
        "11".into(),
        "North".into(),
        "WGS-84".into(),
        "units=Meters".into(),
    ];
    if let Some(rotation) = rotation {
        entries.push(format!("rotation={:.8}", rotation));
    }
    MapInfo::new(entries)
}

/// A georeferenced float32 BSQ header with a `-9999` no-data value.
pub fn georeferenced_header(
    lines: usize,
    samples: usize,
    bands: usize,
    pixel: f64,
    rotation: Option<f64>,
) -> RasterHeader {
    let mut header = RasterHeader::new(lines, samples, bands);
    header.map_info = Some(utm_map_info(
        scenes::UTM_EASTING,
        scenes::UTM_NORTHING,
        pixel,
        rotation,
    ));
    header.no_data = Some(-9999.0);
    header
}

/// Band names of an observation-geometry product.
pub fn observation_band_names() -> Vec<String> {
    [
        "Path length (m)",
        "To-sensor azimuth (0 to 360 degrees CW from N)",
        "To-sensor zenith (0 to 90 degrees from zenith)",
        "To-sun azimuth (0 to 360 degrees CW from N)",
        "To-sun zenith (0 to 90 degrees from zenith)",
        "Solar phase",
        "Slope",
        "Aspect",
        "Cosine(i)",
        "UTC Time",
        "Earth-sun distance (AU)",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// A fresh temporary directory and a data path inside it.
pub fn temp_raster_path(name: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("cannot create temp dir: {}", e));
    let path = dir.path().join(name);
    (dir, path)
}
