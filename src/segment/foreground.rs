//! Tissue foreground segmentation.
//!
//! Tissue is more saturated than glass, so the mask is computed from the
//! HSV saturation channel:
//!
//! ```text
//! RGB ─► saturation ─► Gaussian blur ─► Otsu ─► [fill holes] ─► drop small objects
//!  │                                                                  │
//!  └──► value ─► blur ─► near-black ─► dilate(disk 5) ─► components ──┴─► [remove black]
//! ```
//!
//! The output mask holds 255 for foreground and 0 for background.

use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{grayscale_dilate, Mask};
use imageproc::region_labelling::{connected_components, Connectivity};
use tracing::debug;

use crate::error::InputError;

use super::color::saturation_value;

/// Default Gaussian kernel size (pixels, odd).
pub const DEFAULT_GAUSSIAN_KERNEL: u32 = 15;

/// Default minimum connected-component size kept in the mask (pixels).
pub const DEFAULT_MIN_OBJECT_SIZE: usize = 200;

/// Value-channel level at or below which a pixel counts as near-black.
pub const BLACK_VALUE_THRESHOLD: u8 = 50;

/// Radius of the disk used to grow near-black regions over their edges.
pub const BLACK_DILATION_RADIUS: u8 = 5;

/// Mask value for foreground pixels.
pub const FOREGROUND: u8 = 255;

type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

// =============================================================================
// Options
// =============================================================================

/// Parameters controlling [`ForegroundSegmenter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentOptions {
    /// Side of the square Gaussian kernel; must be odd. `1` disables blurring.
    pub gaussian_kernel: u32,

    /// Connected components with fewer pixels than this are discarded.
    pub min_object_size: usize,

    /// Fill background holes enclosed by foreground.
    pub fill_holes: bool,

    /// Drop foreground that touches near-black areas (calibration strips,
    /// scanner borders).
    pub remove_background_black: bool,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            gaussian_kernel: DEFAULT_GAUSSIAN_KERNEL,
            min_object_size: DEFAULT_MIN_OBJECT_SIZE,
            fill_holes: false,
            remove_background_black: false,
        }
    }
}

impl SegmentOptions {
    pub fn with_fill_holes(mut self, fill_holes: bool) -> Self {
        self.fill_holes = fill_holes;
        self
    }

    pub fn with_remove_background_black(mut self, remove: bool) -> Self {
        self.remove_background_black = remove;
        self
    }

    pub fn with_min_object_size(mut self, min_object_size: usize) -> Self {
        self.min_object_size = min_object_size;
        self
    }
}

// =============================================================================
// ForegroundSegmenter
// =============================================================================

/// Computes binary tissue masks from RGB rasters.
#[derive(Debug, Clone, Copy)]
pub struct ForegroundSegmenter {
    options: SegmentOptions,
}

impl ForegroundSegmenter {
    /// Create a segmenter, validating the kernel size.
    pub fn new(options: SegmentOptions) -> Result<Self, InputError> {
        if options.gaussian_kernel == 0 || options.gaussian_kernel % 2 == 0 {
            return Err(InputError::parameter(
                "gaussian_kernel",
                format!("must be a positive odd size, got {}", options.gaussian_kernel),
            ));
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> &SegmentOptions {
        &self.options
    }

    /// Compute the foreground mask of `image`.
    ///
    /// A raster whose blurred saturation is constant has no meaningful Otsu
    /// split; it yields an all-background mask.
    pub fn extract(&self, image: &RgbImage) -> GrayImage {
        let (width, height) = image.dimensions();
        let (saturation, value) = saturation_value(image);

        let blurred = blur(&saturation, self.options.gaussian_kernel);
        let Some(mut mask) = otsu_binarize(&blurred) else {
            debug!(width, height, "uniform saturation, mask is empty");
            return GrayImage::new(width, height);
        };

        if self.options.fill_holes {
            fill_holes(&mut mask);
        }

        remove_small_objects(&mut mask, self.options.min_object_size);

        if self.options.remove_background_black {
            let blurred_value = blur(&value, self.options.gaussian_kernel);
            remove_black_regions(&mut mask, &blurred_value);
        }

        mask
    }
}

impl Default for ForegroundSegmenter {
    fn default() -> Self {
        Self {
            options: SegmentOptions::default(),
        }
    }
}

// =============================================================================
// Steps
// =============================================================================

/// Sigma that OpenCV derives for a kernel of side `k`.
fn kernel_sigma(k: u32) -> f32 {
    0.3 * ((k as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn blur(channel: &GrayImage, kernel: u32) -> GrayImage {
    if kernel <= 1 {
        return channel.clone();
    }
    gaussian_blur_f32(channel, kernel_sigma(kernel))
}

/// Binarize with Otsu's level, or `None` when the channel is constant.
fn otsu_binarize(channel: &GrayImage) -> Option<GrayImage> {
    let first = channel.pixels().next()?.0[0];
    if channel.pixels().all(|p| p.0[0] == first) {
        return None;
    }

    Some(threshold(channel, otsu_level(channel), ThresholdType::Binary))
}

/// Number of pixels under each label; index 0 is the background.
fn label_sizes(labels: &LabelImage) -> Vec<usize> {
    let max_label = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
    let mut sizes = vec![0usize; max_label + 1];
    for p in labels.pixels() {
        sizes[p.0[0] as usize] += 1;
    }
    sizes
}

/// Set background regions that do not reach the image border to foreground.
pub(crate) fn fill_holes(mask: &mut GrayImage) {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let mut inverted = mask.clone();
    for p in inverted.pixels_mut() {
        p.0[0] = if p.0[0] == 0 { FOREGROUND } else { 0 };
    }

    let labels = connected_components(&inverted, Connectivity::Four, Luma([0u8]));
    let sizes = label_sizes(&labels);
    let mut touches_border = vec![false; sizes.len()];
    for x in 0..width {
        touches_border[labels.get_pixel(x, 0).0[0] as usize] = true;
        touches_border[labels.get_pixel(x, height - 1).0[0] as usize] = true;
    }
    for y in 0..height {
        touches_border[labels.get_pixel(0, y).0[0] as usize] = true;
        touches_border[labels.get_pixel(width - 1, y).0[0] as usize] = true;
    }

    for (p, l) in mask.pixels_mut().zip(labels.pixels()) {
        let label = l.0[0] as usize;
        if label != 0 && !touches_border[label] {
            p.0[0] = FOREGROUND;
        }
    }
}

/// Clear 4-connected foreground components smaller than `min_size` pixels.
pub(crate) fn remove_small_objects(mask: &mut GrayImage, min_size: usize) {
    if min_size <= 1 {
        return;
    }
    let labels = connected_components(&*mask, Connectivity::Four, Luma([0u8]));
    let sizes = label_sizes(&labels);

    for (p, l) in mask.pixels_mut().zip(labels.pixels()) {
        let label = l.0[0] as usize;
        if label != 0 && sizes[label] < min_size {
            p.0[0] = 0;
        }
    }
}

/// Clear foreground that shares a component with dilated near-black areas.
fn remove_black_regions(mask: &mut GrayImage, blurred_value: &GrayImage) {
    let near_black = threshold(blurred_value, BLACK_VALUE_THRESHOLD, ThresholdType::BinaryInverted);
    let near_black = grayscale_dilate(&near_black, &Mask::disk(BLACK_DILATION_RADIUS));

    let labels = connected_components(&near_black, Connectivity::Four, Luma([0u8]));
    let sizes = label_sizes(&labels);
    if sizes.len() <= 1 {
        return;
    }

    let mut overlaps = vec![false; sizes.len()];
    for (p, l) in mask.pixels().zip(labels.pixels()) {
        if p.0[0] != 0 {
            overlaps[l.0[0] as usize] = true;
        }
    }

    let mut cleared = 0usize;
    for (p, l) in mask.pixels_mut().zip(labels.pixels()) {
        let label = l.0[0] as usize;
        if label != 0 && overlaps[label] && p.0[0] != 0 {
            p.0[0] = 0;
            cleared += 1;
        }
    }
    debug!(cleared, "removed foreground over near-black regions");
}

// =============================================================================
// Tests
// =============================================================================
