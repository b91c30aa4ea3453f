//! Foreground segmentation and mask utilities.
//!
//! # Components
//!
//! - [`ForegroundSegmenter`]: saturation/Otsu tissue mask with optional hole
//!   filling and near-black border removal
//! - [`merge_masks`]: intersect a tissue mask with an annotation mask
//! - [`enhance_color`], [`gray_level`], [`saturation_value`]: pixel-level
//!   colour conversions shared with the tile extractor

mod color;
mod foreground;
mod merge;

pub use color::{enhance_color, gray_level, saturation_value};
pub use foreground::{
    ForegroundSegmenter, SegmentOptions, BLACK_DILATION_RADIUS, BLACK_VALUE_THRESHOLD,
    DEFAULT_GAUSSIAN_KERNEL, DEFAULT_MIN_OBJECT_SIZE, FOREGROUND,
};
pub use merge::merge_masks;
