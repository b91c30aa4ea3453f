//! Configuration management for WSI Tiler.
//!
//! This module provides the command-line interface. Every option can be set:
//! - on the command line via clap
//! - through an environment variable with the `WSI_TILER_` prefix
//! - or left at its default
//!
//! # Commands
//!
//! - `segment`: compute the foreground mask of an image
//! - `raster`: decompose a mask into tiling jobs
//! - `tiles`: run tiling jobs and emit tile rows
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use wsi_tiler::config::{Cli, Command};
//!
//! match Cli::parse().into_command() {
//!     Command::Tiles(config) => {
//!         config.validate()?;
//!         let params = config.tiling_params()?;
//!     }
//!     _ => {}
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `WSI_TILER_GAUSSIAN_KERNEL` - Blur kernel for segmentation (default: 15)
//! - `WSI_TILER_SEGMENT_COLOR_ENHANCE` - Colour enhancement before segmentation (default: 15)
//! - `WSI_TILER_MIN_OBJECT_SIZE` - Smallest kept foreground object (default: 200)
//! - `WSI_TILER_STRIP_HEIGHT` - Rows per raster strip (default: 100)
//! - `WSI_TILER_MARGIN` - Columns added around raster strips (default: 10)
//! - `WSI_TILER_MAX_AREA` - Split boxes larger than this area
//! - `WSI_TILER_MAGS` - Tile magnifications (default: 1.25,5,10,20)
//! - `WSI_TILER_REFERENCE_MAG` - Grid magnification (default: 5)
//! - `WSI_TILER_TILE_SIZE` - Tile edge in pixels (default: 224)
//! - `WSI_TILER_STRIDE` - Extra grid step (default: 0)
//! - `WSI_TILER_OVERLAP` - Tile overlap percentage (default: 0)
//! - `WSI_TILER_THRESHOLD` - Minimum foreground percentage per tile (default: 20)
//! - `WSI_TILER_COLOR_ENHANCE` - Colour enhancement factor (default: 0, disabled)
//! - `WSI_TILER_MAX_BAD_TILES` - Background tiles tolerated per set
//! - `WSI_TILER_NATIVE_MAG` - Magnification of slide full resolution (default: 40)
//! - `WSI_TILER_WORKERS` - Concurrent jobs (default: 4)
//! - `WSI_TILER_CACHE_SLIDES` - Max slides to keep open (default: 8)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::geometry::Magnification;
use crate::region::{DEFAULT_MARGIN, DEFAULT_STRIP_HEIGHT};
use crate::segment::{SegmentOptions, DEFAULT_GAUSSIAN_KERNEL, DEFAULT_MIN_OBJECT_SIZE};
use crate::slide::DEFAULT_SLIDE_CACHE_CAPACITY;
use crate::tile::{
    TilingParams, DEFAULT_FOREGROUND_THRESHOLD, DEFAULT_TILE_SIZE, DEFAULT_WORKERS,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default tile magnifications, as accepted on the command line.
pub const DEFAULT_MAGS: &str = "1.25,5,10,20";

/// Default grid magnification.
pub const DEFAULT_REFERENCE_MAG: f64 = 5.0;

/// Default magnification of a slide's full-resolution pixel grid.
pub const DEFAULT_NATIVE_MAG: f64 = 40.0;

/// Default colour enhancement applied to thumbnails before segmentation.
pub const DEFAULT_SEGMENT_COLOR_ENHANCE: f32 = 15.0;

// =============================================================================
// CLI Arguments
// =============================================================================

/// WSI Tiler - multi-magnification tile extraction for Whole Slide Images.
///
/// Segments tissue, decomposes masks into seed boxes and extracts
/// co-registered tile sets at several magnifications.
#[derive(Parser, Debug, Clone)]
#[command(name = "wsi-tiler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compute the foreground mask of an image
    Segment(SegmentConfig),

    /// Decompose a mask into tiling jobs (JSON lines)
    Raster(RasterConfig),

    /// Run tiling jobs and write tile rows (JSON lines)
    Tiles(TilesConfig),
}

// =============================================================================
// Segment
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct SegmentConfig {
    /// Input RGB image (PNG, JPEG, TIFF), or a slide when --magnification is set.
    pub input: PathBuf,

    /// Output mask image (255 = foreground).
    #[arg(short, long)]
    pub output: PathBuf,

    /// Read the input as a slide, whole, at this magnification.
    #[arg(long)]
    pub magnification: Option<f64>,

    /// Magnification of the slide's full-resolution pixel grid.
    #[arg(long, default_value_t = DEFAULT_NATIVE_MAG, env = "WSI_TILER_NATIVE_MAG")]
    pub native_magnification: f64,

    /// Where to write the slide thumbnail (defaults to `<output>_thumbnail.png`).
    #[arg(long)]
    pub thumbnail: Option<PathBuf>,

    /// Colour enhancement factor applied before segmentation (0 disables).
    #[arg(
        long,
        default_value_t = DEFAULT_SEGMENT_COLOR_ENHANCE,
        env = "WSI_TILER_SEGMENT_COLOR_ENHANCE"
    )]
    pub color_enhance: f32,

    /// Side of the Gaussian blur kernel (odd).
    #[arg(long, default_value_t = DEFAULT_GAUSSIAN_KERNEL, env = "WSI_TILER_GAUSSIAN_KERNEL")]
    pub gaussian_kernel: u32,

    /// Foreground objects smaller than this many pixels are dropped.
    #[arg(long, default_value_t = DEFAULT_MIN_OBJECT_SIZE, env = "WSI_TILER_MIN_OBJECT_SIZE")]
    pub min_object_size: usize,

    /// Fill holes enclosed by foreground.
    #[arg(long, default_value_t = false)]
    pub fill_holes: bool,

    /// Drop foreground touching near-black areas.
    #[arg(long, default_value_t = false)]
    pub remove_black: bool,

    /// Annotation mask to intersect with the foreground; its values are kept.
    #[arg(long)]
    pub annotation: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl SegmentConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.gaussian_kernel == 0 || self.gaussian_kernel % 2 == 0 {
            return Err(format!(
                "gaussian_kernel must be a positive odd number, got {}",
                self.gaussian_kernel
            ));
        }
        if self.input == self.output {
            return Err("output must differ from input".to_string());
        }
        if !self.color_enhance.is_finite() || self.color_enhance < 0.0 {
            return Err(format!(
                "color_enhance must be a non-negative number, got {}",
                self.color_enhance
            ));
        }
        if let Some(m) = self.magnification {
            Magnification::new(m).map_err(|e| format!("magnification: {e}"))?;
        }
        Magnification::new(self.native_magnification)
            .map_err(|e| format!("native_magnification: {e}"))?;
        Ok(())
    }

    /// Magnification to read the input slide at, if it is a slide.
    pub fn slide_magnification(&self) -> Result<Option<Magnification>, String> {
        self.magnification
            .map(|m| Magnification::new(m).map_err(|e| e.to_string()))
            .transpose()
    }

    pub fn native_magnification(&self) -> Result<Magnification, String> {
        Magnification::new(self.native_magnification).map_err(|e| e.to_string())
    }

    /// Thumbnail destination; only slide inputs produce a thumbnail.
    pub fn thumbnail_path(&self) -> Option<PathBuf> {
        if let Some(ref path) = self.thumbnail {
            return Some(path.clone());
        }
        self.magnification?;

        let stem = self.output.file_stem()?.to_string_lossy();
        Some(self.output.with_file_name(format!("{stem}_thumbnail.png")))
    }

    pub fn segment_options(&self) -> SegmentOptions {
        SegmentOptions {
            gaussian_kernel: self.gaussian_kernel,
            min_object_size: self.min_object_size,
            fill_holes: self.fill_holes,
            remove_background_black: self.remove_black,
        }
    }
}

// =============================================================================
// Raster
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct RasterConfig {
    /// Input mask image; 0 is background, other values are labels.
    pub mask: PathBuf,

    /// Slide the mask was computed from, copied into every job.
    #[arg(long)]
    pub slide: String,

    /// Magnification the mask pixels are measured at.
    #[arg(long)]
    pub mask_magnification: f64,

    /// Rows covered by each raster strip.
    #[arg(long, default_value_t = DEFAULT_STRIP_HEIGHT, env = "WSI_TILER_STRIP_HEIGHT")]
    pub strip_height: u32,

    /// Background columns added on each side of a strip.
    #[arg(long, default_value_t = DEFAULT_MARGIN, env = "WSI_TILER_MARGIN")]
    pub margin: i64,

    /// Split boxes whose area exceeds this many mask pixels.
    #[arg(long, env = "WSI_TILER_MAX_AREA")]
    pub max_area: Option<i64>,

    /// Keep boxes enclosed by larger boxes.
    #[arg(long, default_value_t = false)]
    pub keep_contained: bool,

    /// Output file (defaults to stdout).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl RasterConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.slide.is_empty() {
            return Err("slide path is required. Set --slide".to_string());
        }
        Magnification::new(self.mask_magnification).map_err(|e| e.to_string())?;
        if self.strip_height == 0 {
            return Err("strip_height must be greater than 0".to_string());
        }
        if self.margin < 0 {
            return Err("margin must not be negative".to_string());
        }
        if matches!(self.max_area, Some(a) if a <= 0) {
            return Err("max_area must be greater than 0".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Tiles
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct TilesConfig {
    /// JSON-lines file of tiling jobs (defaults to stdin).
    pub jobs: Option<PathBuf>,

    /// Output file (defaults to stdout).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Magnifications to extract each tile set at (comma-separated).
    #[arg(long, default_value = DEFAULT_MAGS, env = "WSI_TILER_MAGS", value_delimiter = ',')]
    pub mags: Vec<f64>,

    /// Magnification the tiling grid is laid out at.
    #[arg(long, default_value_t = DEFAULT_REFERENCE_MAG, env = "WSI_TILER_REFERENCE_MAG")]
    pub reference_mag: f64,

    /// Tile edge in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "WSI_TILER_TILE_SIZE")]
    pub tile_size: u32,

    /// Extra grid step in pixels; negative values overlap tiles.
    #[arg(long, default_value_t = 0, env = "WSI_TILER_STRIDE", allow_negative_numbers = true)]
    pub stride: i64,

    /// Tile overlap percentage; values in (0, 100) override --stride.
    #[arg(long, default_value_t = 0.0, env = "WSI_TILER_OVERLAP")]
    pub overlap: f64,

    /// Minimum percentage of foreground per tile.
    #[arg(long, default_value_t = DEFAULT_FOREGROUND_THRESHOLD, env = "WSI_TILER_THRESHOLD")]
    pub threshold: f64,

    /// Colour enhancement factor applied before segmentation (0 disables).
    #[arg(long, default_value_t = 0.0, env = "WSI_TILER_COLOR_ENHANCE")]
    pub color_enhance: f32,

    /// Background tiles tolerated per tile set (defaults to the number of magnifications).
    #[arg(long, env = "WSI_TILER_MAX_BAD_TILES")]
    pub max_bad_tiles: Option<usize>,

    /// Magnification of the slides' full-resolution pixel grid.
    #[arg(long, default_value_t = DEFAULT_NATIVE_MAG, env = "WSI_TILER_NATIVE_MAG")]
    pub native_magnification: f64,

    /// Number of jobs processed concurrently.
    #[arg(long, default_value_t = DEFAULT_WORKERS, env = "WSI_TILER_WORKERS")]
    pub workers: usize,

    /// Maximum number of slides kept open.
    #[arg(long, default_value_t = DEFAULT_SLIDE_CACHE_CAPACITY, env = "WSI_TILER_CACHE_SLIDES")]
    pub cache_slides: usize,

    /// JSON file mapping integer labels to class names.
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// Namespace mixed into tile identifiers.
    #[arg(long, default_value = "")]
    pub id_namespace: String,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl TilesConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be greater than 0".to_string());
        }
        if self.cache_slides == 0 {
            return Err("cache_slides must be greater than 0".to_string());
        }
        if !(0.0..100.0).contains(&self.overlap) {
            return Err(format!("overlap must be within [0, 100), got {}", self.overlap));
        }
        Magnification::new(self.native_magnification)
            .map_err(|e| format!("native_magnification: {e}"))?;

        self.tiling_params()?
            .validate()
            .map_err(|e| e.to_string())
    }

    /// Tiling parameters described by this configuration.
    pub fn tiling_params(&self) -> Result<TilingParams, String> {
        let mag_levels = self
            .mags
            .iter()
            .map(|&m| Magnification::new(m))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("mags: {e}"))?;
        let reference_mag =
            Magnification::new(self.reference_mag).map_err(|e| format!("reference_mag: {e}"))?;

        Ok(TilingParams {
            mag_levels,
            reference_mag,
            tile_size: self.tile_size,
            stride: self.stride,
            overlap_percent: self.overlap,
            foreground_threshold_percent: self.threshold,
            color_enhance_factor: self.color_enhance,
            max_bad_tiles: self.max_bad_tiles,
        })
    }

    pub fn native_magnification(&self) -> Result<Magnification, String> {
        Magnification::new(self.native_magnification).map_err(|e| e.to_string())
    }
}

// =============================================================================
// Tests
// =============================================================================
