use std::path::Path;

use async_trait::async_trait;
use image::RgbImage;

use crate::error::{RegionFetchError, SlideReadError};
use crate::geometry::{BoundingBox, Magnification};

use super::plain::PlainImageSource;
use super::pyramid::WholeSlideSource;
use super::reader::RegionReader;

/// File extensions opened as whole-slide pyramids.
const WHOLE_SLIDE_EXTENSIONS: &[&str] = &["ndpi", "svs", "tif", "tiff"];

/// Kind of source a path is opened as, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideKind {
    WholeSlide,
    PlainImage,
}

impl SlideKind {
    /// `.ndpi`, `.svs`, `.tif` and `.tiff` (any case) are whole slides,
    /// everything else is a plain image.
    pub fn from_path(path: &Path) -> Self {
        let is_slide = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| WHOLE_SLIDE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);

        if is_slide {
            SlideKind::WholeSlide
        } else {
            SlideKind::PlainImage
        }
    }
}

/// An opened slide of either kind.
///
/// The variant is chosen once in [`SlideHandle::open`]; callers only see the
/// [`RegionReader`] interface.
pub enum SlideHandle {
    WholeSlide(WholeSlideSource),
    PlainImage(PlainImageSource),
}

impl SlideHandle {
    /// Open `path`, dispatching on its extension.
    ///
    /// `native_magnification` is the magnification of the file's full
    /// resolution pixel grid.
    pub fn open(
        path: impl AsRef<Path>,
        native_magnification: Magnification,
    ) -> Result<Self, SlideReadError> {
        let path = path.as_ref();
        match SlideKind::from_path(path) {
            SlideKind::WholeSlide => {
                WholeSlideSource::open(path, native_magnification).map(SlideHandle::WholeSlide)
            }
            SlideKind::PlainImage => {
                PlainImageSource::open(path, native_magnification).map(SlideHandle::PlainImage)
            }
        }
    }

    pub fn kind(&self) -> SlideKind {
        match self {
            SlideHandle::WholeSlide(_) => SlideKind::WholeSlide,
            SlideHandle::PlainImage(_) => SlideKind::PlainImage,
        }
    }
}

#[async_trait]
impl RegionReader for SlideHandle {
    fn identifier(&self) -> &str {
        match self {
            SlideHandle::WholeSlide(s) => s.identifier(),
            SlideHandle::PlainImage(s) => s.identifier(),
        }
    }

    fn native_magnification(&self) -> Magnification {
        match self {
            SlideHandle::WholeSlide(s) => s.native_magnification(),
            SlideHandle::PlainImage(s) => s.native_magnification(),
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        match self {
            SlideHandle::WholeSlide(s) => s.dimensions(),
            SlideHandle::PlainImage(s) => s.dimensions(),
        }
    }

    async fn read_region(
        &self,
        region: BoundingBox,
        mag: Magnification,
    ) -> Result<RgbImage, RegionFetchError> {
        match self {
            SlideHandle::WholeSlide(s) => s.read_region(region, mag).await,
            SlideHandle::PlainImage(s) => s.read_region(region, mag).await,
        }
    }
}
