//! Whole-slide images served from an in-memory resolution pyramid.
//!
//! The base page of the file is decoded once through the `image` crate. Lower
//! resolutions are built at open time by repeated 2x downsampling, so a read
//! at low magnification never resamples the full-resolution raster.
//!
//! ```text
//! level 0  ██████████████████  downsample 1   (native magnification)
//! level 1  █████████           downsample 2
//! level 2  ████▌               downsample 4
//! ...      stops once the short side drops below MIN_LEVEL_SIZE
//! ```
//!
//! Vendor codecs the `image` crate cannot decode (Aperio JPEG 2000 tiles,
//! for example) surface as [`SlideReadError::Decode`].

use std::path::Path;

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::debug;

use crate::error::{RegionFetchError, SlideReadError};
use crate::geometry::{BoundingBox, Magnification};

use super::plain::decode_rgb;
use super::reader::{clip_to_extent, crop_resampled, RegionReader};

/// Levels stop once their shorter side would fall below this many pixels.
pub const MIN_LEVEL_SIZE: u32 = 256;

/// A single resolution of the pyramid.
struct PyramidLevel {
    image: RgbImage,

    /// Downsample factor relative to level 0
    downsample: f64,
}

/// A slide backed by a multi-resolution pyramid.
pub struct WholeSlideSource {
    identifier: String,
    native_magnification: Magnification,
    levels: Vec<PyramidLevel>,
}

impl WholeSlideSource {
    /// Decode the base page of a slide file and build its pyramid.
    ///
    /// # Errors
    ///
    /// Returns [`SlideReadError`] if the file is missing, cannot be decoded
    /// or has no pixels.
    pub fn open(
        path: impl AsRef<Path>,
        native_magnification: Magnification,
    ) -> Result<Self, SlideReadError> {
        let path = path.as_ref();
        let base = decode_rgb(path)?;
        Self::from_image(path.display().to_string(), base, native_magnification)
    }

    /// Build a pyramid over an in-memory full-resolution image.
    pub fn from_image(
        identifier: impl Into<String>,
        base: RgbImage,
        native_magnification: Magnification,
    ) -> Result<Self, SlideReadError> {
        let identifier = identifier.into();
        let (width, height) = base.dimensions();
        if width == 0 || height == 0 {
            return Err(SlideReadError::Empty(identifier));
        }

        let mut levels = vec![PyramidLevel {
            image: base,
            downsample: 1.0,
        }];

        loop {
            let Some(prev) = levels.last() else { break };
            let (w, h) = prev.image.dimensions();
            let (next_w, next_h) = (w / 2, h / 2);
            if next_w.min(next_h) < MIN_LEVEL_SIZE {
                break;
            }
            let image = imageops::resize(&prev.image, next_w, next_h, FilterType::Triangle);
            levels.push(PyramidLevel {
                image,
                downsample: f64::from(width) / f64::from(next_w),
            });
        }

        debug!(
            slide = %identifier,
            width,
            height,
            levels = levels.len(),
            "Built slide pyramid"
        );

        Ok(Self {
            identifier,
            native_magnification,
            levels,
        })
    }

    /// Number of pyramid levels; level 0 is full resolution.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Downsample factor of a level, or `None` if out of range.
    pub fn level_downsample(&self, level: usize) -> Option<f64> {
        self.levels.get(level).map(|l| l.downsample)
    }

    /// Find the best level for a given downsample factor.
    ///
    /// Returns the level with the largest downsample that does not exceed
    /// `downsample`, so reads are only ever scaled down from a sharper level.
    /// Requests finer than full resolution use level 0.
    pub fn best_level_for_downsample(&self, downsample: f64) -> usize {
        self.levels
            .iter()
            .rposition(|l| l.downsample <= downsample + 1e-9)
            .unwrap_or(0)
    }
}

#[async_trait]
impl RegionReader for WholeSlideSource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn native_magnification(&self) -> Magnification {
        self.native_magnification
    }

    fn dimensions(&self) -> (u32, u32) {
        self.levels[0].image.dimensions()
    }

    async fn read_region(
        &self,
        region: BoundingBox,
        mag: Magnification,
    ) -> Result<RgbImage, RegionFetchError> {
        let clipped = clip_to_extent(region, self.dimensions_at(mag), mag)?;

        let downsample = self.native_magnification.value() / mag.value();
        let level = &self.levels[self.best_level_for_downsample(downsample)];
        let level_mag = Magnification::new(self.native_magnification.value() / level.downsample)
            .map_err(|e| RegionFetchError::Backend(e.to_string()))?;

        Ok(crop_resampled(&level.image, level_mag, clipped, mag))
    }
}

// =============================================================================
// Tests
// =============================================================================
