//! ENVI header parsing and formatting.
//!
//! A header is a text file starting with `ENVI` followed by `key = value`
//! entries. Values wrapped in braces are lists and may span several lines.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use hsi_common::{DataType, Interleave, MapInfo, RasterHeader};
use tracing::debug;

use crate::error::{EnviError, EnviResult};

/// Header path written next to a data file: `<stem>.hdr`.
pub fn header_path(data_path: &Path) -> PathBuf {
    data_path.with_extension("hdr")
}

/// Locate the header of an existing data file.
///
/// Tries `<stem>.hdr` first, then `<file>.hdr`.
pub fn find_header(data_path: &Path) -> Option<PathBuf> {
    let replaced = header_path(data_path);
    if replaced.is_file() {
        return Some(replaced);
    }
    let mut appended = data_path.as_os_str().to_owned();
    appended.push(".hdr");
    let appended = PathBuf::from(appended);
    appended.is_file().then_some(appended)
}

/// Read and parse the header belonging to `data_path`.
pub fn read_header(data_path: &Path) -> EnviResult<RasterHeader> {
    let path = find_header(data_path).ok_or_else(|| {
        EnviError::MissingField(format!("header file for {}", data_path.display()))
    })?;
    debug!(header = %path.display(), "Reading ENVI header");
    let text = std::fs::read_to_string(&path)?;
    parse_header(&text)
}

/// Write `header` next to `data_path`, returning the header path.
pub fn write_header(data_path: &Path, header: &RasterHeader) -> EnviResult<PathBuf> {
    let path = header_path(data_path);
    std::fs::write(&path, format_header(header))?;
    Ok(path)
}

/// Parse header text.
pub fn parse_header(text: &str) -> EnviResult<RasterHeader> {
    let mut lines = text.lines();
    let magic = lines
        .by_ref()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| EnviError::InvalidFormat("empty header".into()))?;
    if !magic.trim().starts_with("ENVI") {
        return Err(EnviError::InvalidFormat(format!(
            "expected 'ENVI' on the first line, found '{}'",
            magic.trim()
        )));
    }

    let mut header = RasterHeader::new(0, 0, 0);
    let (mut has_samples, mut has_lines, mut has_bands) = (false, false, false);

    for (key, value) in collect_entries(lines)? {
        match key.as_str() {
            "samples" => {
                header.samples = parse_number(&key, &value)?;
                has_samples = true;
            }
            "lines" => {
                header.lines = parse_number(&key, &value)?;
                has_lines = true;
            }
            "bands" => {
                header.bands = parse_number(&key, &value)?;
                has_bands = true;
            }
            "header offset" => header.header_offset = parse_number(&key, &value)?,
            "data type" => {
                let code: u32 = parse_number(&key, &value)?;
                header.data_type =
                    DataType::from_code(code).ok_or(EnviError::UnsupportedDataType(code))?;
            }
            "interleave" => {
                header.interleave = value
                    .parse::<Interleave>()
                    .map_err(|e| EnviError::InvalidFormat(e.to_string()))?;
            }
            "byte order" => header.byte_order = parse_number(&key, &value)?,
            "map info" => header.map_info = Some(MapInfo::new(parse_list(&value))),
            "wavelength" => header.wavelength = Some(parse_float_list(&key, &value)?),
            "fwhm" => header.fwhm = Some(parse_float_list(&key, &value)?),
            "wavelength units" => header.wavelength_units = Some(unbrace(&value).to_string()),
            "data ignore value" => header.no_data = Some(parse_number(&key, &value)?),
            "band names" => header.band_names = Some(parse_list(&value)),
            "description" => header.description = Some(unbrace(&value).to_string()),
            _ => header.extra.push((key, value)),
        }
    }

    for (present, field) in [
        (has_samples, "samples"),
        (has_lines, "lines"),
        (has_bands, "bands"),
    ] {
        if !present {
            return Err(EnviError::MissingField(field.into()));
        }
    }
    if header.byte_order > 1 {
        return Err(EnviError::InvalidFormat(format!(
            "byte order must be 0 or 1, got {}",
            header.byte_order
        )));
    }

    Ok(header)
}

/// Format a header as ENVI text.
pub fn format_header(header: &RasterHeader) -> String {
    let mut out = String::from("ENVI\n");
    // Writing to a String cannot fail.
    let mut line = |key: &str, value: String| {
        let _ = writeln!(out, "{} = {}", key, value);
    };

    if let Some(description) = &header.description {
        line("description", format!("{{{}}}", description));
    }
    line("samples", header.samples.to_string());
    line("lines", header.lines.to_string());
    line("bands", header.bands.to_string());
    line("header offset", header.header_offset.to_string());
    if header.extra("file type").is_none() {
        line("file type", "ENVI Standard".to_string());
    }
    line("data type", header.data_type.code().to_string());
    line("interleave", header.interleave.to_string());
    line("byte order", header.byte_order.to_string());
    if let Some(map_info) = &header.map_info {
        line("map info", format_list(map_info.entries()));
    }
    if let Some(units) = &header.wavelength_units {
        line("wavelength units", units.clone());
    }
    if let Some(no_data) = header.no_data {
        line("data ignore value", no_data.to_string());
    }
    if let Some(names) = &header.band_names {
        line("band names", format_list(names));
    }
    if let Some(wavelength) = &header.wavelength {
        line("wavelength", format_list(wavelength));
    }
    if let Some(fwhm) = &header.fwhm {
        line("fwhm", format_list(fwhm));
    }
    for (key, value) in &header.extra {
        line(key, value.clone());
    }
    out
}

fn collect_entries<'a>(lines: impl Iterator<Item = &'a str>) -> EnviResult<Vec<(String, String)>> {
    let mut entries = Vec::new();
    let mut pending: Option<(String, String)> = None;

    for line in lines {
        if let Some((key, mut value)) = pending.take() {
            value.push('\n');
            value.push_str(line.trim());
            if line.contains('}') {
                entries.push((key, value));
            } else {
                pending = Some((key, value));
            }
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim().to_string();
        if value.starts_with('{') && !value.contains('}') {
            pending = Some((key, value));
        } else {
            entries.push((key, value));
        }
    }

    if let Some((key, _)) = pending {
        return Err(EnviError::InvalidFormat(format!(
            "unterminated list for '{}'",
            key
        )));
    }
    Ok(entries)
}

fn unbrace(value: &str) -> &str {
    value
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .trim()
}

fn parse_list(value: &str) -> Vec<String> {
    unbrace(value)
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> EnviResult<T> {
    unbrace(value)
        .parse()
        .map_err(|_| EnviError::InvalidFormat(format!("'{}' is not a valid {}", value, key)))
}

fn parse_float_list(key: &str, value: &str) -> EnviResult<Vec<f64>> {
    parse_list(value)
        .iter()
        .map(|item| parse_number(key, item))
        .collect()
}

fn format_list<T: std::fmt::Display>(items: &[T]) -> String {
    let joined: Vec<String> = items.iter().map(|i| i.to_string()).collect();
    format!("{{{}}}", joined.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    const AVIRIS_HEADER: &str = "ENVI
description = {
  AVIRIS-NG reflectance, orthocorrected}
samples = 4
lines = 3
bands = 5
header offset = 0
file type = ENVI Standard
data type = 4
interleave = bil
byte order = 0
map info = { UTM , 1.000 , 1.000 , 724522.127 , 4074620.759 , 5.0000000000e+00 , 5.0000000000e+00 ,
 11 , North , WGS-84 , units=Meters , rotation=75.00000000 }
wavelength units = Nanometers
data ignore value = -9999
band names = {band 1, band 2, band 3,
 band 4, band 5}
wavelength = { 400.0, 405.0, 410.0,
 415.0, 420.0 }
fwhm = {5.5, 5.5, 5.6, 5.6, 5.7}
sensor type = AVIRIS-NG
";

    #[test]
    fn test_parse_full_header() {
        let header = parse_header(AVIRIS_HEADER).unwrap();
        assert_eq!(header.samples, 4);
        assert_eq!(header.lines, 3);
        assert_eq!(header.bands, 5);
        assert_eq!(header.data_type, DataType::F32);
        assert_eq!(header.interleave, Interleave::Bil);
        assert_eq!(header.no_data, Some(-9999.0));
        assert_eq!(header.wavelength.as_ref().unwrap().len(), 5);
        assert_eq!(header.fwhm.as_ref().unwrap()[4], 5.7);
        assert_eq!(header.band_names.as_ref().unwrap()[3], "band 4");
        assert_eq!(
            header.description.as_deref(),
            Some("AVIRIS-NG reflectance, orthocorrected")
        );
        assert_eq!(header.extra("sensor type"), Some("AVIRIS-NG"));
        assert_eq!(header.extra("file type"), Some("ENVI Standard"));

        let map_info = header.map_info.as_ref().unwrap();
        assert_eq!(map_info.upper_left().unwrap(), (724522.127, 4074620.759));
        assert_eq!(map_info.pixel_size().unwrap(), (5.0, 5.0));
        assert_eq!(map_info.rotation().unwrap(), Some(75.0));
    }

    #[test]
    fn test_format_then_parse_preserves_fields() {
        let header = parse_header(AVIRIS_HEADER).unwrap();
        let text = format_header(&header);
        assert!(text.starts_with("ENVI\n"));
        assert_eq!(text.matches("file type").count(), 1);

        let reparsed = parse_header(&text).unwrap();
        assert_eq!(reparsed, header);
    }

    #[test]
    fn test_missing_dimension() {
        let err = parse_header("ENVI\nsamples = 3\nlines = 2\n").unwrap_err();
        assert!(matches!(err, EnviError::MissingField(f) if f == "bands"));
    }

    #[test]
    fn test_rejects_bad_magic_and_values() {
        assert!(parse_header("").is_err());
        assert!(parse_header("NOT ENVI\nsamples = 1\n").is_err());
        assert!(parse_header("ENVI\nsamples = x\nlines = 1\nbands = 1\n").is_err());
        assert!(matches!(
            parse_header("ENVI\nsamples = 1\nlines = 1\nbands = 1\ndata type = 9\n"),
            Err(EnviError::UnsupportedDataType(9))
        ));
        assert!(parse_header("ENVI\nsamples = 1\nlines = 1\nbands = 1\nwavelength = {1, 2\n").is_err());
    }

    #[test]
    fn test_header_paths() {
        assert_eq!(
            header_path(Path::new("/tmp/scene_rfl.bin")),
            PathBuf::from("/tmp/scene_rfl.hdr")
        );
        assert_eq!(
            header_path(Path::new("/tmp/scene_rfl_30m")),
            PathBuf::from("/tmp/scene_rfl_30m.hdr")
        );
    }

    #[test]
    fn test_find_header_appended() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("scene.img");
        std::fs::write(dir.path().join("scene.img.hdr"), "ENVI\n").unwrap();
        assert_eq!(find_header(&data), Some(dir.path().join("scene.img.hdr")));

        std::fs::write(dir.path().join("scene.hdr"), "ENVI\n").unwrap();
        assert_eq!(find_header(&data), Some(dir.path().join("scene.hdr")));
    }
}
