//! RegionReader trait for magnification-aware region access.
//!
//! A slide is addressed by a rectangle expressed in the pixel grid of some
//! magnification. Implementations decide how to serve that rectangle (crop a
//! flat image, pick a pyramid level, call out to a remote service) but share
//! the same bounds contract:
//!
//! - an empty rectangle fails with [`RegionFetchError::EmptyRegion`]
//! - a rectangle entirely outside the slide fails with
//!   [`RegionFetchError::OutOfBounds`]
//! - a rectangle partially outside the slide is clipped, so the returned
//!   image can be smaller than requested

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::error::RegionFetchError;
use crate::geometry::{convert, convert_box, BoundingBox, Magnification};

// =============================================================================
// RegionReader Trait
// =============================================================================

/// Read RGB regions of a slide at arbitrary magnification.
#[async_trait]
pub trait RegionReader: Send + Sync {
    /// Identifier of the slide, used in logs and output rows.
    fn identifier(&self) -> &str;

    /// Magnification of the full-resolution pixel grid.
    fn native_magnification(&self) -> Magnification;

    /// Full-resolution `(width, height)` in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// `(width, height)` of the slide when viewed at `mag`.
    fn dimensions_at(&self, mag: Magnification) -> (u32, u32) {
        let (width, height) = self.dimensions();
        let scaled = convert(
            &[i64::from(width), i64::from(height)],
            self.native_magnification(),
            mag,
        );
        (clamp_u32(scaled[0]), clamp_u32(scaled[1]))
    }

    /// Read the pixels inside `region`, measured at `mag`.
    ///
    /// # Arguments
    ///
    /// * `region` - Rows and columns of the rectangle in the `mag` pixel grid
    /// * `mag` - Magnification the rectangle is expressed in
    ///
    /// # Returns
    ///
    /// The clipped region, resampled to `mag`.
    ///
    /// # Errors
    ///
    /// Returns an error if the region is empty, lies entirely outside the
    /// slide, or the backing store fails.
    async fn read_region(
        &self,
        region: BoundingBox,
        mag: Magnification,
    ) -> Result<RgbImage, RegionFetchError>;

    /// Read the whole slide at `mag`, e.g. a thumbnail for segmentation.
    async fn read_extent(&self, mag: Magnification) -> Result<RgbImage, RegionFetchError> {
        let (width, height) = self.dimensions_at(mag);
        let region =
            BoundingBox::from_corners_unchecked(0, 0, i64::from(height), i64::from(width));
        self.read_region(region, mag).await
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

fn clamp_u32(v: i64) -> u32 {
    v.clamp(0, i64::from(u32::MAX)) as u32
}

/// Clip `region` to a slide of `(width, height)` pixels at `mag`.
pub(crate) fn clip_to_extent(
    region: BoundingBox,
    (width, height): (u32, u32),
    mag: Magnification,
) -> Result<BoundingBox, RegionFetchError> {
    if region.is_empty() {
        return Err(RegionFetchError::EmptyRegion {
            magnification: mag.value(),
        });
    }

    let top = region.min_row().max(0);
    let left = region.min_col().max(0);
    let bottom = region.max_row().min(i64::from(height));
    let right = region.max_col().min(i64::from(width));

    if top >= bottom || left >= right {
        return Err(RegionFetchError::OutOfBounds {
            top: region.min_row(),
            left: region.min_col(),
            bottom: region.max_row(),
            right: region.max_col(),
            magnification: mag.value(),
            height,
            width,
        });
    }

    Ok(BoundingBox::from_corners_unchecked(top, left, bottom, right))
}

/// Crop `region` (already clipped, at `mag`) out of an image captured at
/// `source_mag`, resampling it to the size of `region`.
pub(crate) fn crop_resampled(
    source: &RgbImage,
    source_mag: Magnification,
    region: BoundingBox,
    mag: Magnification,
) -> RgbImage {
    let out_width = region.width() as u32;
    let out_height = region.height() as u32;

    let src = convert_box(region, mag, source_mag);
    let (src_width, src_height) = source.dimensions();
    let left = clamp_u32(src.min_col()).min(src_width.saturating_sub(1));
    let top = clamp_u32(src.min_row()).min(src_height.saturating_sub(1));
    // At least one source pixel, never past the image edge.
    let width = clamp_u32(src.width()).max(1).min(src_width - left);
    let height = clamp_u32(src.height()).max(1).min(src_height - top);

    let crop = imageops::crop_imm(source, left, top, width, height).to_image();
    if crop.dimensions() == (out_width, out_height) {
        crop
    } else {
        imageops::resize(&crop, out_width, out_height, FilterType::Triangle)
    }
}

// =============================================================================
// Tests
// =============================================================================
