use std::collections::HashMap;

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use tracing::debug;

use crate::error::InputError;
use crate::geometry::{BoundingBox, LabeledBox};

/// Default number of mask rows covered by one raster strip.
pub const DEFAULT_STRIP_HEIGHT: u32 = 100;

/// Default number of background columns added on each side of a strip.
pub const DEFAULT_MARGIN: i64 = 10;

/// Tight bounds of one connected component, inclusive.
#[derive(Debug, Clone, Copy)]
struct Component {
    label: u32,
    min_row: u32,
    min_col: u32,
    max_row: u32,
    max_col: u32,
}

impl Component {
    fn new(label: u32, row: u32, col: u32) -> Self {
        Self {
            label,
            min_row: row,
            min_col: col,
            max_row: row,
            max_col: col,
        }
    }

    fn include(&mut self, row: u32, col: u32) {
        self.min_row = self.min_row.min(row);
        self.min_col = self.min_col.min(col);
        self.max_row = self.max_row.max(row);
        self.max_col = self.max_col.max(col);
    }
}

/// Decompose a mask into horizontal strips that hug its foreground.
///
/// ```text
///   mask                    boxes (strip_height rows each)
///   ..####......            [  ##### ]
///   .######.....     ->     [ ######## ]
///   ...#########            [   #########  ]
/// ```
///
/// Components are found first. A mask with more than two distinct values is
/// labelled into 4-connected equal-valued regions; otherwise every non-zero
/// pixel belongs to a single component. Components are visited in raster
/// order of their first pixel. Inside each component's bounding box, every
/// distinct non-zero value is walked in strips of `strip_height` rows and
/// each non-empty strip yields
/// `[strip_row, col_min - margin, strip_row + strip_height, col_max + margin]`,
/// with the left edge clamped at 0, labelled with that value.
///
/// Boxes are neither merged nor filtered here.
///
/// # Errors
///
/// Returns [`InputError::InvalidParameter`] if `strip_height` is zero.
pub fn rasterize_mask_to_boxes(
    mask: &GrayImage,
    strip_height: u32,
    margin: i64,
) -> Result<Vec<LabeledBox>, InputError> {
    if strip_height == 0 {
        return Err(InputError::parameter("strip_height", "must be at least 1"));
    }

    let width = mask.width();
    let labels = component_labels(mask);
    let components = collect_components(&labels, width);

    let mut boxes = Vec::new();
    for comp in &components {
        for value in component_values(mask, &labels, comp) {
            for row in (comp.min_row..=comp.max_row).step_by(strip_height as usize) {
                let strip_end = row.saturating_add(strip_height).min(comp.max_row + 1);
                let mut span: Option<(u32, u32)> = None;

                for y in row..strip_end {
                    for x in comp.min_col..=comp.max_col {
                        let idx = y as usize * width as usize + x as usize;
                        if labels[idx] == comp.label && mask.get_pixel(x, y).0[0] == value {
                            span = Some(match span {
                                Some((lo, hi)) => (lo.min(x), hi.max(x)),
                                None => (x, x),
                            });
                        }
                    }
                }

                if let Some((lo, hi)) = span {
                    let top = i64::from(row);
                    let bbox = BoundingBox::from_corners_unchecked(
                        top,
                        (i64::from(lo) - margin).max(0),
                        top + i64::from(strip_height),
                        i64::from(hi) + margin,
                    );
                    boxes.push(LabeledBox::new(bbox, u32::from(value)));
                }
            }
        }
    }

    debug!(
        components = components.len(),
        boxes = boxes.len(),
        "Rasterized mask into boxes"
    );

    Ok(boxes)
}

/// Per-pixel component label, row-major; 0 is background.
fn component_labels(mask: &GrayImage) -> Vec<u32> {
    let mut seen = [false; 256];
    for p in mask.pixels() {
        seen[p.0[0] as usize] = true;
    }
    let distinct = seen.iter().filter(|&&s| s).count();

    if distinct > 2 {
        connected_components(mask, Connectivity::Four, Luma([0u8]))
            .pixels()
            .map(|p| p.0[0])
            .collect()
    } else {
        mask.pixels().map(|p| u32::from(p.0[0] != 0)).collect()
    }
}

/// Components ordered by the raster position of their first pixel.
fn collect_components(labels: &[u32], width: u32) -> Vec<Component> {
    let mut components: Vec<Component> = Vec::new();
    let mut index: HashMap<u32, usize> = HashMap::new();

    for (i, &label) in labels.iter().enumerate() {
        if label == 0 {
            continue;
        }
        let row = (i / width as usize) as u32;
        let col = (i % width as usize) as u32;
        match index.get(&label) {
            Some(&slot) => components[slot].include(row, col),
            None => {
                index.insert(label, components.len());
                components.push(Component::new(label, row, col));
            }
        }
    }

    components
}

/// Distinct non-zero mask values inside one component, ascending.
fn component_values(mask: &GrayImage, labels: &[u32], comp: &Component) -> Vec<u8> {
    let width = mask.width() as usize;
    let mut present = [false; 256];
    for y in comp.min_row..=comp.max_row {
        for x in comp.min_col..=comp.max_col {
            if labels[y as usize * width + x as usize] == comp.label {
                present[mask.get_pixel(x, y).0[0] as usize] = true;
            }
        }
    }
    (1..=255u8).filter(|&v| present[v as usize]).collect()
}

// =============================================================================
// Tests
// =============================================================================
