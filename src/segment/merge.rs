use image::imageops::{resize, FilterType};
use image::GrayImage;

/// Combine a foreground mask with an annotation mask.
///
/// A pixel keeps the value from `content` where both `mask_a` and `mask_b`
/// are non-zero and is 0 elsewhere. `mask_b` and `content` are resampled
/// (nearest neighbour, so labels are never blended) to the shape of
/// `mask_a` when they differ.
pub fn merge_masks(mask_a: &GrayImage, mask_b: &GrayImage, content: &GrayImage) -> GrayImage {
    let (width, height) = mask_a.dimensions();
    let mask_b = fit_to(mask_b, width, height);
    let content = fit_to(content, width, height);

    GrayImage::from_fn(width, height, |x, y| {
        let a = mask_a.get_pixel(x, y).0[0];
        let b = mask_b.get_pixel(x, y).0[0];
        if a != 0 && b != 0 {
            *content.get_pixel(x, y)
        } else {
            image::Luma([0])
        }
    })
}

fn fit_to(mask: &GrayImage, width: u32, height: u32) -> GrayImage {
    if mask.dimensions() == (width, height) {
        mask.clone()
    } else {
        resize(mask, width, height, FilterType::Nearest)
    }
}
