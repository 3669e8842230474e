//! Resampling tool for imaging spectrometer products.
//!
//! Reads ENVI rasters and writes spatially resampled, block-aggregated,
//! spectrally resampled or orthorectified copies next to them.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hsi_common::{BinSize, InterpolationKind, ResampleConfig};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "resampler")]
#[command(about = "Spatial and spectral resampling of ENVI hyperspectral rasters")]
struct Args {
    /// Log level
    #[arg(long, default_value = "info", env = "RESAMPLE_LOG_LEVEL")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    /// YAML configuration file; RESAMPLE_* variables and flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aggregate and regrid onto a north-up grid of a coarser pixel size
    Spatial {
        in_file: PathBuf,
        out_dir: PathBuf,

        /// Output pixel size in map units
        #[arg(long)]
        pixel: Option<f64>,

        /// Aggregation block size ("auto" or an integer)
        #[arg(long)]
        bin: Option<BinSize>,

        /// Mask raster; pixels where its first band is 1 are excluded
        #[arg(long)]
        mask: Option<PathBuf>,

        /// Treat the input as an observation product
        #[arg(long)]
        observation: bool,

        /// Log progress every 10 bands
        #[arg(short, long)]
        verbose: bool,
    },

    /// Average non-overlapping pixel blocks without regridding
    Aggregate {
        in_file: PathBuf,
        out_dir: PathBuf,

        /// Block edge length in pixels
        #[arg(long, default_value_t = grid_processor::DEFAULT_AGGREGATION)]
        agg: usize,

        /// Mask raster; pixels where its first band is 1 are excluded
        #[arg(long)]
        mask: Option<PathBuf>,
    },

    /// Resample every spectrum onto the 10 nm grid
    Spectral {
        in_file: PathBuf,
        out_file: PathBuf,

        /// Interpolation curve
        #[arg(long)]
        kind: Option<InterpolationKind>,

        /// Bands averaged per block instead of the spacing-derived count
        #[arg(long)]
        bins: Option<usize>,

        /// Prefix the output description with an experimental-data disclaimer
        #[arg(long)]
        experimental: bool,
    },

    /// Orthorectify a location raster through its geometry lookup table
    Ortho {
        loc_file: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_level, args.json)?;

    let mut config = load_config(args.config.as_deref())?;
    info!(
        pixel = config.target_pixel_size,
        kind = %config.interpolation_kind,
        "Loaded configuration"
    );

    let output = match args.command {
        Command::Spatial {
            in_file,
            out_dir,
            pixel,
            bin,
            mask,
            observation,
            verbose,
        } => {
            if let Some(pixel) = pixel {
                config.target_pixel_size = pixel;
            }
            if let Some(bin) = bin {
                config.bin_size = bin;
            }
            if mask.is_some() {
                config.mask = mask;
            }
            if observation {
                config.observation = Some(true);
            }
            commands::spatial(&in_file, &out_dir, config, verbose)?
        }
        Command::Aggregate {
            in_file,
            out_dir,
            agg,
            mask,
        } => commands::aggregate(&in_file, &out_dir, agg, mask.or(config.mask).as_deref())?,
        Command::Spectral {
            in_file,
            out_file,
            kind,
            bins,
            experimental,
        } => {
            let kind = kind.unwrap_or(config.interpolation_kind);
            let prefix = if experimental {
                commands::EXPERIMENTAL_DISCLAIMER
            } else {
                ""
            };
            commands::spectral(&in_file, &out_file, kind, bins, prefix)?
        }
        Command::Ortho { loc_file } => commands::ortho(&loc_file)?,
    };

    info!(output = %output.display(), "Done");
    Ok(())
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);
    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// Defaults, then the YAML file if given, then `RESAMPLE_*` variables.
fn load_config(path: Option<&std::path::Path>) -> Result<ResampleConfig> {
    let mut config = match path {
        Some(path) => ResampleConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ResampleConfig::default(),
    };
    config
        .apply_env()
        .context("Invalid RESAMPLE_* environment variable")?;
    Ok(config)
}
