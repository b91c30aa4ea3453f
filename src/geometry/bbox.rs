use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Axis-aligned rectangle in pixel coordinates: `(min_row, min_col, max_row, max_col)`.
///
/// Bounds follow the half-open convention used by region reads: rows
/// `min_row..max_row` and columns `min_col..max_col`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[i64; 4]", into = "[i64; 4]")]
pub struct BoundingBox {
    min_row: i64,
    min_col: i64,
    max_row: i64,
    max_col: i64,
}

impl BoundingBox {
    /// Create a box, checking that `min <= max` on both axes.
    pub fn new(min_row: i64, min_col: i64, max_row: i64, max_col: i64) -> Result<Self, InputError> {
        if min_row > max_row || min_col > max_col {
            return Err(InputError::InvalidBox {
                min_row,
                min_col,
                max_row,
                max_col,
            });
        }
        Ok(Self::from_corners_unchecked(min_row, min_col, max_row, max_col))
    }

    /// Create a box whose ordering the caller already guarantees.
    pub(crate) const fn from_corners_unchecked(
        min_row: i64,
        min_col: i64,
        max_row: i64,
        max_col: i64,
    ) -> Self {
        Self {
            min_row,
            min_col,
            max_row,
            max_col,
        }
    }

    pub const fn min_row(&self) -> i64 {
        self.min_row
    }

    pub const fn min_col(&self) -> i64 {
        self.min_col
    }

    pub const fn max_row(&self) -> i64 {
        self.max_row
    }

    pub const fn max_col(&self) -> i64 {
        self.max_col
    }

    pub const fn height(&self) -> i64 {
        self.max_row - self.min_row
    }

    pub const fn width(&self) -> i64 {
        self.max_col - self.min_col
    }

    pub const fn area(&self) -> i64 {
        self.height() * self.width()
    }

    pub const fn is_empty(&self) -> bool {
        self.height() == 0 || self.width() == 0
    }

    /// Corners as `[min_row, min_col, max_row, max_col]`.
    pub const fn to_array(&self) -> [i64; 4] {
        [self.min_row, self.min_col, self.max_row, self.max_col]
    }

    /// Clamp every coordinate to be non-negative.
    ///
    /// Ordering is preserved because clamping is monotonic.
    pub fn clamp_non_negative(&self) -> Self {
        Self::from_corners_unchecked(
            self.min_row.max(0),
            self.min_col.max(0),
            self.max_row.max(0),
            self.max_col.max(0),
        )
    }

    /// Whether `self` lies inside `other`, bounds inclusive.
    pub const fn is_within(&self, other: &BoundingBox) -> bool {
        self.min_row >= other.min_row
            && self.max_row <= other.max_row
            && self.min_col >= other.min_col
            && self.max_col <= other.max_col
    }
}

impl TryFrom<[i64; 4]> for BoundingBox {
    type Error = InputError;

    fn try_from(c: [i64; 4]) -> Result<Self, Self::Error> {
        BoundingBox::new(c[0], c[1], c[2], c[3])
    }
}

impl From<BoundingBox> for [i64; 4] {
    fn from(b: BoundingBox) -> Self {
        b.to_array()
    }
}

/// A bounding box tagged with the mask value it was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabeledBox {
    pub bbox: BoundingBox,
    pub label: u32,
}

impl LabeledBox {
    pub const fn new(bbox: BoundingBox, label: u32) -> Self {
        Self { bbox, label }
    }
}
