//! Configuration shared by the resampling engines.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{HsiError, Result};

/// Sentinel written for invalid cells when the source header has none.
pub const DEFAULT_NO_DATA: f64 = -9999.0;

/// Band indices of azimuth-type channels in observation products
/// (to-sensor azimuth, to-sun azimuth, aspect).
pub const DEFAULT_ANGULAR_BANDS: [usize; 3] = [1, 3, 7];

/// Configuration for a resampling job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
    /// Output ground-sample distance in map units.
    pub target_pixel_size: f64,

    /// Aggregation block size, derived from the pixel ratio when `auto`.
    pub bin_size: BinSize,

    /// Curve used by the spectral interpolator.
    pub interpolation_kind: InterpolationKind,

    /// Bands averaged with the circular mean in observation products.
    pub angular_band_indices: BTreeSet<usize>,

    /// Optional mask raster; pixels where its first band equals 1 are excluded.
    pub mask: Option<PathBuf>,

    /// Force (or deny) observation-product handling. `None` auto-detects.
    pub observation: Option<bool>,

    /// No-data sentinel used when the source header does not declare one.
    pub no_data_fallback: f64,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            target_pixel_size: 30.0,
            bin_size: BinSize::Auto,
            interpolation_kind: InterpolationKind::Cubic,
            angular_band_indices: DEFAULT_ANGULAR_BANDS.into_iter().collect(),
            mask: None,
            observation: None,
            no_data_fallback: DEFAULT_NO_DATA,
        }
    }
}

impl ResampleConfig {
    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields with any `RESAMPLE_*` environment variables present.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("RESAMPLE_PIXEL_SIZE") {
            self.target_pixel_size = val
                .parse()
                .map_err(|_| HsiError::config(format!("RESAMPLE_PIXEL_SIZE '{}' is not a number", val)))?;
        }

        if let Ok(val) = std::env::var("RESAMPLE_BIN_SIZE") {
            self.bin_size = val.parse()?;
        }

        if let Ok(val) = std::env::var("RESAMPLE_INTERPOLATION") {
            self.interpolation_kind = val.parse()?;
        }

        if let Ok(val) = std::env::var("RESAMPLE_ANGULAR_BANDS") {
            self.angular_band_indices = parse_index_list(&val)?;
        }

        if let Ok(val) = std::env::var("RESAMPLE_MASK") {
            if !val.is_empty() {
                self.mask = Some(PathBuf::from(val));
            }
        }

        Ok(())
    }

    /// Parse a YAML document; missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML configuration file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.target_pixel_size > 0.0) || !self.target_pixel_size.is_finite() {
            return Err(HsiError::config(format!(
                "target_pixel_size must be > 0, got {}",
                self.target_pixel_size
            )));
        }
        if let BinSize::Fixed(0) = self.bin_size {
            return Err(HsiError::config("bin_size must be >= 1"));
        }
        Ok(())
    }

    /// Spatial block size for a source of `source_pixel` map units:
    /// the fixed value, or `target / source` rounded half to even.
    pub fn spatial_bin(&self, source_pixel: f64) -> Result<usize> {
        match self.bin_size {
            BinSize::Fixed(bin) => Ok(bin),
            BinSize::Auto => {
                let bin = (self.target_pixel_size / source_pixel).round_ties_even();
                if bin < 1.0 {
                    return Err(HsiError::config(format!(
                        "target pixel size {} is finer than source pixel size {}",
                        self.target_pixel_size, source_pixel
                    )));
                }
                Ok(bin as usize)
            }
        }
    }
}

fn parse_index_list(s: &str) -> Result<BTreeSet<usize>> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<usize>()
                .map_err(|_| HsiError::config(format!("'{}' is not a band index", t)))
        })
        .collect()
}

/// Aggregation block size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "RawBinSize")]
pub enum BinSize {
    /// Derived from the ratio of target to source resolution.
    #[default]
    Auto,
    /// Explicit block edge length.
    Fixed(usize),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBinSize {
    Fixed(usize),
    Named(String),
}

impl TryFrom<RawBinSize> for BinSize {
    type Error = HsiError;

    fn try_from(raw: RawBinSize) -> Result<Self> {
        match raw {
            RawBinSize::Fixed(n) => Ok(BinSize::Fixed(n)),
            RawBinSize::Named(s) => s.parse(),
        }
    }
}

impl Serialize for BinSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            BinSize::Auto => serializer.serialize_str("auto"),
            BinSize::Fixed(n) => serializer.serialize_u64(*n as u64),
        }
    }
}

impl FromStr for BinSize {
    type Err = HsiError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(BinSize::Auto);
        }
        s.parse::<usize>()
            .map(BinSize::Fixed)
            .map_err(|_| HsiError::config(format!("bin size '{}' is neither 'auto' nor an integer", s)))
    }
}

/// Interpolation curve for spectral resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationKind {
    /// Value of the closest sample.
    Nearest,
    /// Piecewise linear.
    Linear,
    /// Not-a-knot cubic spline.
    #[default]
    Cubic,
}

impl InterpolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Linear => "linear",
            Self::Cubic => "cubic",
        }
    }

    /// Smallest number of samples the curve can be fitted through.
    pub fn min_samples(&self) -> usize {
        match self {
            Self::Nearest => 1,
            Self::Linear => 2,
            Self::Cubic => 4,
        }
    }
}

impl FromStr for InterpolationKind {
    type Err = HsiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "linear" => Ok(Self::Linear),
            "cubic" => Ok(Self::Cubic),
            other => Err(HsiError::config(format!(
                "unknown interpolation kind '{}', expected nearest|linear|cubic",
                other
            ))),
        }
    }
}

impl fmt::Display for InterpolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
