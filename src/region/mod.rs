//! Decomposition of irregular regions into compact bounding boxes.
//!
//! Three operations prepare seed regions for tile extraction:
//!
//! - [`rasterize_mask_to_boxes`]: cut a tissue or annotation mask into
//!   labelled horizontal strips that hug the foreground
//! - [`split_oversized_box`]: bound the area of a single box
//! - [`remove_contained`]: drop boxes enclosed by a strictly larger box
//!
//! All boxes are expressed in the pixel grid of the mask they came from; map
//! them with [`crate::geometry::convert_box`] before reading a slide at another
//! magnification.

mod contain;
mod raster;
mod split;

pub use contain::{remove_contained, remove_contained_boxes};
pub use raster::{rasterize_mask_to_boxes, DEFAULT_MARGIN, DEFAULT_STRIP_HEIGHT};
pub use split::split_oversized_box;
