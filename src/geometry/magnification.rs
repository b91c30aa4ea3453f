//! Magnification levels and coordinate conversion between them.
//!
//! Pixel coordinates only make sense together with the magnification they
//! were measured at. Every cross-magnification transform in the crate goes
//! through [`convert`], so scaling and truncation behave the same way for
//! bounding boxes, tile centroids and slide reads.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InputError;

use super::BoundingBox;

// =============================================================================
// Magnification
// =============================================================================

/// A positive scale factor relative to a slide's native optical resolution.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Magnification(f64);

impl Magnification {
    /// Create a magnification, rejecting zero, negative and non-finite values.
    pub fn new(value: f64) -> Result<Self, InputError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(InputError::InvalidMagnification(value))
        }
    }

    /// Create a magnification from a value known to be valid.
    pub(crate) const fn new_unchecked(value: f64) -> Self {
        Self(value)
    }

    /// The raw scale factor.
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Factor that maps coordinates at `self` onto `target`.
    pub fn ratio_to(self, target: Magnification) -> f64 {
        target.0 / self.0
    }
}

impl TryFrom<f64> for Magnification {
    type Error = InputError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Magnification::new(value)
    }
}

impl From<Magnification> for f64 {
    fn from(mag: Magnification) -> Self {
        mag.0
    }
}

impl fmt::Display for Magnification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Coordinate Conversion
// =============================================================================

/// Convert integer pixel coordinates from `mag_start` to `mag_end`.
///
/// Each coordinate is multiplied by `mag_end`, divided by `mag_start` and
/// truncated toward zero. Identical magnifications return an exact copy.
///
/// The conversion is lossy: a round trip `start -> end -> start` can drift by
/// one unit when scaling up first, and by up to `ceil(start / end)` units when
/// scaling down first.
pub fn convert(coords: &[i64], mag_start: Magnification, mag_end: Magnification) -> Vec<i64> {
    if mag_start == mag_end {
        return coords.to_vec();
    }
    coords
        .iter()
        .map(|&c| scale(c, mag_start, mag_end))
        .collect()
}

/// Convert a single `(row, col)` point.
pub fn convert_point(
    point: (i64, i64),
    mag_start: Magnification,
    mag_end: Magnification,
) -> (i64, i64) {
    if mag_start == mag_end {
        return point;
    }
    (
        scale(point.0, mag_start, mag_end),
        scale(point.1, mag_start, mag_end),
    )
}

/// Convert the four corners of a bounding box.
///
/// Truncation toward zero is monotonic, so the converted box keeps
/// `min <= max` on both axes.
pub fn convert_box(
    bbox: BoundingBox,
    mag_start: Magnification,
    mag_end: Magnification,
) -> BoundingBox {
    let c = convert(&bbox.to_array(), mag_start, mag_end);
    BoundingBox::from_corners_unchecked(c[0], c[1], c[2], c[3])
}

#[inline]
fn scale(coord: i64, mag_start: Magnification, mag_end: Magnification) -> i64 {
    (coord as f64 * mag_end.0 / mag_start.0) as i64
}

// =============================================================================
// Tests
// =============================================================================
