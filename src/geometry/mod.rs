//! Geometric primitives shared by every stage of the pipeline.
//!
//! - [`Magnification`] and the [`convert`] family map integer pixel
//!   coordinates between magnification levels.
//! - [`BoundingBox`] and [`LabeledBox`] describe regions of interest.

mod bbox;
mod magnification;

pub use bbox::{BoundingBox, LabeledBox};
pub use magnification::{convert, convert_box, convert_point, Magnification};
