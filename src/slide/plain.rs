//! Flat raster images served as single-level slides.

use std::path::Path;

use async_trait::async_trait;
use image::RgbImage;

use crate::error::{RegionFetchError, SlideReadError};
use crate::geometry::{BoundingBox, Magnification};

use super::reader::{clip_to_extent, crop_resampled, RegionReader};

/// An RGB image captured at a known magnification.
///
/// Regions at other magnifications are cropped from the full image and
/// resampled.
pub struct PlainImageSource {
    identifier: String,
    image: RgbImage,
    magnification: Magnification,
}

impl PlainImageSource {
    /// Decode an image file (PNG, JPEG, TIFF) into memory.
    ///
    /// # Errors
    ///
    /// Returns [`SlideReadError::NotFound`] if the file is missing,
    /// [`SlideReadError::Decode`] if it cannot be decoded and
    /// [`SlideReadError::Empty`] if it has no pixels.
    pub fn open(path: impl AsRef<Path>, magnification: Magnification) -> Result<Self, SlideReadError> {
        let path = path.as_ref();
        let identifier = path.display().to_string();
        let image = decode_rgb(path)?;
        Self::from_image(identifier, image, magnification)
    }

    /// Wrap an in-memory image.
    pub fn from_image(
        identifier: impl Into<String>,
        image: RgbImage,
        magnification: Magnification,
    ) -> Result<Self, SlideReadError> {
        let identifier = identifier.into();
        if image.width() == 0 || image.height() == 0 {
            return Err(SlideReadError::Empty(identifier));
        }
        Ok(Self {
            identifier,
            image,
            magnification,
        })
    }
}

/// Decode any supported image file to 8-bit RGB, sniffing the format from
/// its content rather than its extension.
pub(crate) fn decode_rgb(path: &Path) -> Result<RgbImage, SlideReadError> {
    let display = path.display().to_string();
    if !path.exists() {
        return Err(SlideReadError::NotFound(display));
    }

    let decode_err = |message: String| SlideReadError::Decode {
        path: display.clone(),
        message,
    };

    let reader = image::ImageReader::open(path)
        .map_err(|e| decode_err(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| decode_err(e.to_string()))?;
    let decoded = reader.decode().map_err(|e| decode_err(e.to_string()))?;

    Ok(decoded.to_rgb8())
}

#[async_trait]
impl RegionReader for PlainImageSource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn native_magnification(&self) -> Magnification {
        self.magnification
    }

    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    async fn read_region(
        &self,
        region: BoundingBox,
        mag: Magnification,
    ) -> Result<RgbImage, RegionFetchError> {
        let clipped = clip_to_extent(region, self.dimensions_at(mag), mag)?;
        Ok(crop_resampled(&self.image, self.magnification, clipped, mag))
    }
}
