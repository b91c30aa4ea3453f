//! Test utilities for integration tests.
//!
//! This module provides synthetic slides whose pixels are generated on demand
//! in the pixel grid of whatever magnification is requested, so every
//! magnification sees the same tissue pattern at full sharpness.

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use wsi_tiler::error::{RegionFetchError, SlideReadError};
use wsi_tiler::geometry::{convert, BoundingBox, Magnification};
use wsi_tiler::slide::{RegionReader, SlideSource};

pub const TISSUE: Rgb<u8> = Rgb([150, 50, 100]);
pub const GLASS: Rgb<u8> = Rgb([238, 236, 240]);
pub const GRAY: Rgb<u8> = Rgb([128, 128, 128]);

pub fn mag(v: f64) -> Magnification {
    Magnification::new(v).unwrap()
}

// =============================================================================
// Procedural Slide
// =============================================================================

/// Pixel pattern of a [`ProceduralSlide`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pattern {
    /// Vertical tissue stripes, 16 pixels wide, on glass
    Stripes,
    /// A single flat colour
    Uniform(Rgb<u8>),
}

/// A slide with a procedural pattern and optional per-magnification failures.
pub struct ProceduralSlide {
    identifier: String,
    native: Magnification,
    width: u32,
    height: u32,
    pattern: Pattern,
    failing: Vec<Magnification>,
    reads: Arc<AtomicUsize>,
}

impl ProceduralSlide {
    pub fn new(identifier: &str, native: f64, width: u32, height: u32, pattern: Pattern) -> Self {
        Self {
            identifier: identifier.to_string(),
            native: mag(native),
            width,
            height,
            pattern,
            failing: Vec::new(),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 2048 x 2048 stripes at 10x.
    pub fn striped(identifier: &str) -> Self {
        Self::new(identifier, 10.0, 2048, 2048, Pattern::Stripes)
    }

    /// Every read at `m` fails with a backend error.
    pub fn failing_at(mut self, m: f64) -> Self {
        self.failing.push(mag(m));
        self
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn pixel(&self, col: u32) -> Rgb<u8> {
        match self.pattern {
            Pattern::Stripes if (col / 16) % 2 == 0 => TISSUE,
            Pattern::Stripes => GLASS,
            Pattern::Uniform(color) => color,
        }
    }
}

#[async_trait]
impl RegionReader for ProceduralSlide {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn native_magnification(&self) -> Magnification {
        self.native
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    async fn read_region(
        &self,
        region: BoundingBox,
        m: Magnification,
    ) -> Result<RgbImage, RegionFetchError> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        if self.failing.contains(&m) {
            return Err(RegionFetchError::Backend(format!("no level at {m}")));
        }
        if region.is_empty() {
            return Err(RegionFetchError::EmptyRegion {
                magnification: m.value(),
            });
        }

        let extent = convert(
            &[i64::from(self.width), i64::from(self.height)],
            self.native,
            m,
        );
        let top = region.min_row().max(0);
        let left = region.min_col().max(0);
        let bottom = region.max_row().min(extent[1]);
        let right = region.max_col().min(extent[0]);

        if top >= bottom || left >= right {
            return Err(RegionFetchError::OutOfBounds {
                top: region.min_row(),
                left: region.min_col(),
                bottom: region.max_row(),
                right: region.max_col(),
                magnification: m.value(),
                height: extent[1] as u32,
                width: extent[0] as u32,
            });
        }

        Ok(RgbImage::from_fn(
            (right - left) as u32,
            (bottom - top) as u32,
            |x, _| self.pixel(left as u32 + x),
        ))
    }
}

// =============================================================================
// Mock Slide Source
// =============================================================================

/// A slide source serving [`ProceduralSlide`]s by name and counting opens.
#[derive(Default)]
pub struct MockSlideSource {
    slides: HashMap<String, (f64, u32, u32, Pattern)>,
    opens: Arc<AtomicUsize>,
}

impl MockSlideSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slide(mut self, name: &str, native: f64, size: u32, pattern: Pattern) -> Self {
        self.slides
            .insert(name.to_string(), (native, size, size, pattern));
        self
    }

    /// Shared open counter, readable after the source moves into a registry.
    pub fn open_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.opens)
    }
}

#[async_trait]
impl SlideSource for MockSlideSource {
    type Slide = ProceduralSlide;

    async fn open_slide(&self, slide_id: &str) -> Result<ProceduralSlide, SlideReadError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let &(native, width, height, pattern) = self
            .slides
            .get(slide_id)
            .ok_or_else(|| SlideReadError::NotFound(slide_id.to_string()))?;
        Ok(ProceduralSlide::new(slide_id, native, width, height, pattern))
    }
}

/// A striped RGB image for writing to disk.
pub fn striped_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _| {
        if (x / 16) % 2 == 0 {
            TISSUE
        } else {
            GLASS
        }
    })
}
