use crate::error::InputError;
use crate::geometry::BoundingBox;

/// Indices of the boxes that are not enclosed by a strictly larger box.
///
/// Box `i` is dropped when some other box `j` has `areas[j] > areas[i]` and
/// contains `i` with inclusive bounds. Boxes of equal area never remove each
/// other, so duplicated boxes are all kept. Quadratic in the number of boxes.
///
/// # Errors
///
/// Returns [`InputError::LengthMismatch`] if `boxes` and `areas` differ in length.
pub fn remove_contained(boxes: &[BoundingBox], areas: &[i64]) -> Result<Vec<usize>, InputError> {
    if boxes.len() != areas.len() {
        return Err(InputError::LengthMismatch {
            left: boxes.len(),
            right: areas.len(),
        });
    }

    let kept = (0..boxes.len())
        .filter(|&i| {
            !(0..boxes.len()).any(|j| j != i && areas[i] < areas[j] && boxes[i].is_within(&boxes[j]))
        })
        .collect();

    Ok(kept)
}

/// [`remove_contained`] using each box's own area, returning the kept boxes.
pub fn remove_contained_boxes(boxes: &[BoundingBox]) -> Vec<BoundingBox> {
    let areas: Vec<i64> = boxes.iter().map(BoundingBox::area).collect();
    // Lengths match by construction.
    remove_contained(boxes, &areas)
        .unwrap_or_default()
        .into_iter()
        .map(|i| boxes[i])
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
