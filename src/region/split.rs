use crate::error::InputError;
use crate::geometry::BoundingBox;

/// Split a box into strips whose area does not exceed `max_area`.
///
/// The longer side is cut (rows when `height > width`, columns otherwise)
/// into `n = ceil(area / max_area)` strips of `ceil(side / n)` pixels. The
/// last strip is truncated at the far edge of the original box, so the
/// strips tile the input exactly.
///
/// Boxes that already fit, and zero-area boxes, are returned unchanged.
///
/// # Errors
///
/// Returns [`InputError::InvalidParameter`] if `max_area <= 0`.
pub fn split_oversized_box(bbox: BoundingBox, max_area: i64) -> Result<Vec<BoundingBox>, InputError> {
    if max_area <= 0 {
        return Err(InputError::parameter("max_area", format!("must be positive, got {max_area}")));
    }

    let area = bbox.area();
    if area == 0 || area <= max_area {
        return Ok(vec![bbox]);
    }

    let pieces = div_ceil(area, max_area);
    let split_rows = bbox.height() > bbox.width();
    let (start, end) = if split_rows {
        (bbox.min_row(), bbox.max_row())
    } else {
        (bbox.min_col(), bbox.max_col())
    };
    let step = div_ceil(end - start, pieces).max(1);

    let mut strips = Vec::with_capacity(pieces as usize);
    let mut lo = start;
    while lo < end {
        let hi = (lo + step).min(end);
        let strip = if split_rows {
            BoundingBox::from_corners_unchecked(lo, bbox.min_col(), hi, bbox.max_col())
        } else {
            BoundingBox::from_corners_unchecked(bbox.min_row(), lo, bbox.max_row(), hi)
        };
        strips.push(strip);
        lo = hi;
    }

    Ok(strips)
}

/// Ceiling division for positive operands.
const fn div_ceil(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}

// =============================================================================
// Tests
// =============================================================================
