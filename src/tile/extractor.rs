//! Multi-magnification tile grid extraction.
//!
//! The extractor turns one seed region of a slide into co-registered tile
//! sets. A grid is laid over the region at the reference magnification; each
//! grid cell gives a centroid that is mapped to every requested magnification
//! and a patch of `tile_size` pixels is read around it.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        try_extract()                             │
//! │  1. Clamp bbox, map to reference mag, read region                │
//! │  2. Optional colour enhancement                                  │
//! │  3. Foreground mask (no hole filling, black borders removed)     │
//! │  4. Brightness threshold = mean gray level of the foreground     │
//! │  5. Walk the grid; per centroid read one patch per magnification │
//! │  6. Keep the set if all patches were read and few are background │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed or empty reference read drops the whole seed region. A failed
//! patch read only drops the tile set it belongs to.

use image::RgbImage;
use tracing::{debug, warn};

use crate::error::{EmptyRegionError, InputError, TilingError};
use crate::geometry::{convert_box, convert_point, BoundingBox, Magnification};
use crate::segment::{enhance_color, gray_level, ForegroundSegmenter, SegmentOptions, FOREGROUND};
use crate::slide::RegionReader;

use super::descriptor::TileDescriptor;

// =============================================================================
// Defaults
// =============================================================================

/// Default magnifications a tile set is extracted at.
pub const DEFAULT_MAG_LEVELS: [Magnification; 4] = [
    Magnification::new_unchecked(1.25),
    Magnification::new_unchecked(5.0),
    Magnification::new_unchecked(10.0),
    Magnification::new_unchecked(20.0),
];

/// Default magnification the grid is laid out at.
pub const DEFAULT_REFERENCE_MAG: Magnification = Magnification::new_unchecked(5.0);

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 224;

/// Default minimum percentage of dark pixels for a tile to count as tissue.
pub const DEFAULT_FOREGROUND_THRESHOLD: f64 = 20.0;

// =============================================================================
// Parameters
// =============================================================================

/// Grid and quality parameters shared by every seed region of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct TilingParams {
    /// Magnifications each tile set is read at
    pub mag_levels: Vec<Magnification>,

    /// Magnification the grid and centroids are expressed in
    pub reference_mag: Magnification,

    /// Edge of the square tiles in pixels, at every magnification
    pub tile_size: u32,

    /// Extra grid step added to `tile_size`; negative values overlap tiles
    pub stride: i64,

    /// Overlap percentage; values strictly between 0 and 100 override `stride`
    pub overlap_percent: f64,

    /// Minimum percentage of dark pixels for a tile to count as tissue
    pub foreground_threshold_percent: f64,

    /// Colour enhancement applied before segmentation, 0 disables it
    pub color_enhance_factor: f32,

    /// Background tiles tolerated per set; `None` means the number of magnifications
    pub max_bad_tiles: Option<usize>,
}

impl Default for TilingParams {
    fn default() -> Self {
        Self {
            mag_levels: DEFAULT_MAG_LEVELS.to_vec(),
            reference_mag: DEFAULT_REFERENCE_MAG,
            tile_size: DEFAULT_TILE_SIZE,
            stride: 0,
            overlap_percent: 0.0,
            foreground_threshold_percent: DEFAULT_FOREGROUND_THRESHOLD,
            color_enhance_factor: 0.0,
            max_bad_tiles: None,
        }
    }
}

impl TilingParams {
    /// Grid step after applying the overlap override.
    pub fn effective_stride(&self) -> i64 {
        if self.overlap_percent > 0.0 && self.overlap_percent < 100.0 {
            -((self.overlap_percent * f64::from(self.tile_size) / 100.0).round() as i64)
        } else {
            self.stride
        }
    }

    /// Distance between neighbouring grid cells.
    pub fn grid_step(&self) -> i64 {
        i64::from(self.tile_size) + self.effective_stride()
    }

    /// Number of background tiles that rejects a set.
    pub fn bad_tile_limit(&self) -> usize {
        self.max_bad_tiles.unwrap_or(self.mag_levels.len())
    }

    /// Check the parameters for consistency.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.mag_levels.is_empty() {
            return Err(InputError::parameter("mag_levels", "at least one magnification is required"));
        }
        if self.tile_size == 0 {
            return Err(InputError::parameter("tile_size", "must be positive"));
        }
        if self.grid_step() <= 0 {
            return Err(InputError::parameter(
                "stride",
                format!(
                    "tile_size + stride must be positive, got {} + {}",
                    self.tile_size,
                    self.effective_stride()
                ),
            ));
        }
        if !(0.0..=100.0).contains(&self.foreground_threshold_percent) {
            return Err(InputError::parameter(
                "foreground_threshold_percent",
                format!("must be within 0..=100, got {}", self.foreground_threshold_percent),
            ));
        }
        if !self.color_enhance_factor.is_finite() || self.color_enhance_factor < 0.0 {
            return Err(InputError::parameter(
                "color_enhance_factor",
                format!("must be finite and non-negative, got {}", self.color_enhance_factor),
            ));
        }
        Ok(())
    }
}

/// One seed region to tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilingRequest {
    /// Region of interest, expressed at `bbox_magnification`
    pub bbox: BoundingBox,

    /// Magnification the bbox was measured at
    pub bbox_magnification: Magnification,

    /// Label copied onto every descriptor
    pub label: Option<u32>,
}

impl TilingRequest {
    pub fn new(bbox: BoundingBox, bbox_magnification: Magnification) -> Self {
        Self {
            bbox,
            bbox_magnification,
            label: None,
        }
    }

    pub fn with_label(mut self, label: u32) -> Self {
        self.label = Some(label);
        self
    }
}

// =============================================================================
// TileGridExtractor
// =============================================================================

/// Extracts filtered grids of co-registered tiles from slide regions.
#[derive(Debug, Clone)]
pub struct TileGridExtractor {
    params: TilingParams,
    segmenter: ForegroundSegmenter,
}

impl TileGridExtractor {
    /// Create an extractor.
    ///
    /// # Errors
    ///
    /// Returns [`InputError`] if the parameters are inconsistent, see
    /// [`TilingParams::validate`].
    pub fn new(params: TilingParams) -> Result<Self, InputError> {
        params.validate()?;
        let segmenter = ForegroundSegmenter::new(
            SegmentOptions::default()
                .with_fill_holes(false)
                .with_remove_background_black(true),
        )?;
        Ok(Self { params, segmenter })
    }

    pub fn params(&self) -> &TilingParams {
        &self.params
    }

    /// Extract tile sets, logging and swallowing per-region failures.
    ///
    /// Returns an empty list when the reference region cannot be read or has
    /// no foreground.
    pub async fn extract<R: RegionReader + ?Sized>(
        &self,
        reader: &R,
        request: &TilingRequest,
    ) -> Vec<TileDescriptor> {
        match self.try_extract(reader, request).await {
            Ok(tiles) => tiles,
            Err(e) => {
                warn!(
                    slide = reader.identifier(),
                    bbox = ?request.bbox.to_array(),
                    error = %e,
                    "Skipping region"
                );
                Vec::new()
            }
        }
    }

    /// Extract tile sets for one seed region.
    ///
    /// # Returns
    ///
    /// Descriptors of every accepted tile set, in row-major grid order, one
    /// descriptor per magnification in the order of `mag_levels`.
    ///
    /// # Errors
    ///
    /// - [`TilingError::EmptyRegion`] if the box collapses at the reference
    ///   magnification or the region has no foreground
    /// - [`TilingError::RegionFetch`] if the reference region cannot be read
    pub async fn try_extract<R: RegionReader + ?Sized>(
        &self,
        reader: &R,
        request: &TilingRequest,
    ) -> Result<Vec<TileDescriptor>, TilingError> {
        let params = &self.params;
        let reference = params.reference_mag;

        let bbox = convert_box(
            request.bbox.clamp_non_negative(),
            request.bbox_magnification,
            reference,
        );
        if bbox.is_empty() {
            return Err(EmptyRegionError::DegenerateBox {
                magnification: reference.value(),
            }
            .into());
        }

        let region = reader.read_region(bbox, reference).await?;
        let threshold = self.brightness_threshold(&region)?;

        let (n_cols, n_rows) = region.dimensions();
        let step = params.grid_step() as usize;
        let half = i64::from(params.tile_size / 2);
        let limit = params.bad_tile_limit();

        let mut tiles = Vec::new();
        let mut rejected = 0usize;

        for ir in (0..i64::from(n_rows)).step_by(step) {
            for ic in (0..i64::from(n_cols)).step_by(step) {
                let centroid = (bbox.min_row() + ir + half, bbox.min_col() + ic + half);
                match self.read_tile_set(reader, centroid, threshold, request.label).await {
                    Some((set, bad)) if bad < limit => tiles.extend(set),
                    _ => rejected += 1,
                }
            }
        }

        debug!(
            slide = reader.identifier(),
            bbox = ?request.bbox.to_array(),
            accepted = tiles.len() / params.mag_levels.len(),
            rejected,
            "Extracted tile grid"
        );

        Ok(tiles)
    }

    /// Mean gray level of the foreground of `region`, in `[0, 1]`.
    fn brightness_threshold(&self, region: &RgbImage) -> Result<f64, EmptyRegionError> {
        let source = if self.params.color_enhance_factor != 0.0 {
            enhance_color(region, self.params.color_enhance_factor)
        } else {
            region.clone()
        };
        let mask = self.segmenter.extract(&source);

        let (sum, count) = region
            .pixels()
            .zip(mask.pixels())
            .filter(|(_, m)| m.0[0] == FOREGROUND)
            .fold((0.0f64, 0usize), |(sum, count), (p, _)| {
                (sum + f64::from(gray_level(p)), count + 1)
            });

        if count == 0 {
            return Err(EmptyRegionError::NoForeground);
        }
        Ok(sum / count as f64)
    }

    /// Read the patches of one centroid at every magnification.
    ///
    /// Returns `None` if any patch could not be read, otherwise the
    /// descriptors and the number of background patches.
    async fn read_tile_set<R: RegionReader + ?Sized>(
        &self,
        reader: &R,
        centroid: (i64, i64),
        threshold: f64,
        label: Option<u32>,
    ) -> Option<(Vec<TileDescriptor>, usize)> {
        let params = &self.params;
        let size = i64::from(params.tile_size);
        let half = size / 2;

        let mut set = Vec::with_capacity(params.mag_levels.len());
        let mut bad = 0;

        for &mag in &params.mag_levels {
            let (row, col) = convert_point(centroid, params.reference_mag, mag);
            let patch_box = BoundingBox::from_corners_unchecked(
                row - half,
                col - half,
                row - half + size,
                col - half + size,
            );

            let patch = match reader.read_region(patch_box, mag).await {
                Ok(patch) if patch.width() > 0 && patch.height() > 0 => patch,
                Ok(_) => {
                    debug!(?centroid, %mag, "Empty patch, dropping tile set");
                    return None;
                }
                Err(e) => {
                    debug!(?centroid, %mag, error = %e, "Patch read failed, dropping tile set");
                    return None;
                }
            };

            if foreground_percent(&patch, threshold) < params.foreground_threshold_percent {
                bad += 1;
            }

            set.push(TileDescriptor {
                top_left_row: row - half,
                top_left_col: col - half,
                bottom_right_row: row + half,
                bottom_right_col: col + half,
                magnification: mag,
                tile_size: params.tile_size,
                centroid_row: centroid.0,
                centroid_col: centroid.1,
                label,
            });
        }

        Some((set, bad))
    }
}

/// Percentage of pixels at or below the brightness threshold.
fn foreground_percent(patch: &RgbImage, threshold: f64) -> f64 {
    let total = patch.pixels().len();
    if total == 0 {
        return 0.0;
    }
    let dark = patch
        .pixels()
        .filter(|p| f64::from(gray_level(p)) <= threshold)
        .count();
    dark as f64 * 100.0 / total as f64
}

// =============================================================================
// Tests
// =============================================================================
