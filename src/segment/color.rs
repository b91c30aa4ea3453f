//! Per-pixel colour conversions used by segmentation and tile scoring.

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Luminance weights for grayscale conversion (ITU-R BT.709, as scikit-image).
const GRAY_WEIGHTS: [f32; 3] = [0.2125, 0.7154, 0.0721];

/// Luma weights used for the colour-enhancement baseline (ITU-R 601-2).
const LUMA_601_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// Split an RGB image into its HSV saturation and value channels.
///
/// Uses the 8-bit convention: `V = max(R, G, B)` and
/// `S = 255 * (V - min) / V`, with `S = 0` where `V = 0`.
pub fn saturation_value(image: &RgbImage) -> (GrayImage, GrayImage) {
    let (width, height) = image.dimensions();
    let mut saturation = GrayImage::new(width, height);
    let mut value = GrayImage::new(width, height);

    for (x, y, Rgb([r, g, b])) in image.enumerate_pixels() {
        let max = (*r).max(*g).max(*b);
        let min = (*r).min(*g).min(*b);
        let s = if max == 0 {
            0
        } else {
            ((255.0 * f32::from(max - min) / f32::from(max)).round()) as u8
        };
        saturation.put_pixel(x, y, Luma([s]));
        value.put_pixel(x, y, Luma([max]));
    }

    (saturation, value)
}

/// Grayscale intensity of one pixel in `[0, 1]`.
#[inline]
pub fn gray_level(pixel: &Rgb<u8>) -> f32 {
    let [r, g, b] = pixel.0;
    (GRAY_WEIGHTS[0] * f32::from(r) + GRAY_WEIGHTS[1] * f32::from(g) + GRAY_WEIGHTS[2] * f32::from(b))
        / 255.0
}

/// Adjust colour saturation by blending each pixel with its luma.
///
/// `factor = 0` yields a grayscale image, `1` the original, larger values
/// push colours further from gray. Blended values are truncated toward zero
/// and clamped to `0..=255`.
pub fn enhance_color(image: &RgbImage, factor: f32) -> RgbImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let [r, g, b] = pixel.0;
        let luma = (LUMA_601_WEIGHTS[0] * f32::from(r)
            + LUMA_601_WEIGHTS[1] * f32::from(g)
            + LUMA_601_WEIGHTS[2] * f32::from(b))
        .round();
        for channel in pixel.0.iter_mut() {
            let blended = luma + factor * (f32::from(*channel) - luma);
            *channel = blended.clamp(0.0, 255.0) as u8;
        }
    }
    out
}
