//! Integration tests for turning masks into seed regions.
//!
//! These tests verify:
//! - Segmentation of a thumbnail followed by rasterization
//! - Thumbnails read whole from a slide file, with colour enhancement
//! - Splitting oversized strips and pruning enclosed boxes
//! - Labelled masks keeping one label per box
//! - Mapping mask boxes to slide magnification

use image::{GrayImage, Luma, RgbImage};
use tempfile::TempDir;

use wsi_tiler::geometry::{convert_box, BoundingBox, LabeledBox};
use wsi_tiler::region::{rasterize_mask_to_boxes, remove_contained, split_oversized_box};
use wsi_tiler::segment::{enhance_color, merge_masks, ForegroundSegmenter, SegmentOptions, FOREGROUND};
use wsi_tiler::slide::{RegionReader, SlideHandle, SlideKind};

use super::test_utils::{mag, GLASS, TISSUE};

/// A block of `value` over rows `r0..r1` and columns `c0..c1`.
fn paint(mask: &mut GrayImage, (r0, c0, r1, c1): (u32, u32, u32, u32), value: u8) {
    for y in r0..r1 {
        for x in c0..c1 {
            mask.put_pixel(x, y, Luma([value]));
        }
    }
}

#[test]
fn test_binary_mask_pipeline() {
    let mut mask = GrayImage::new(300, 300);
    paint(&mut mask, (0, 50, 200, 150), 255);

    let boxes = rasterize_mask_to_boxes(&mask, 100, 10).unwrap();
    let arrays: Vec<_> = boxes.iter().map(|b| b.bbox.to_array()).collect();
    assert_eq!(arrays, vec![[0, 40, 100, 159], [100, 40, 200, 159]]);
    assert!(boxes.iter().all(|b| b.label == 255));

    // Each strip is 100 x 119; halve it along the columns
    let mut pieces = Vec::new();
    for b in &boxes {
        for piece in split_oversized_box(b.bbox, 6000).unwrap() {
            assert!(piece.area() <= 6000);
            pieces.push(piece);
        }
    }
    assert_eq!(pieces.len(), 4);
    assert_eq!(pieces[0].to_array(), [0, 40, 100, 100]);
    assert_eq!(pieces[1].to_array(), [0, 100, 100, 159]);

    // A box inside an existing piece is pruned, the pieces survive
    pieces.push(BoundingBox::new(10, 50, 60, 90).unwrap());
    let areas: Vec<i64> = pieces.iter().map(|b| b.area()).collect();
    let kept = remove_contained(&pieces, &areas).unwrap();
    assert_eq!(kept, vec![0, 1, 2, 3]);
}

#[test]
fn test_labelled_mask_keeps_labels_apart() {
    let mut mask = GrayImage::new(200, 60);
    paint(&mut mask, (0, 0, 50, 50), 1);
    paint(&mut mask, (0, 100, 50, 150), 2);

    let boxes = rasterize_mask_to_boxes(&mask, 100, 10).unwrap();

    assert_eq!(
        boxes,
        vec![
            LabeledBox::new(BoundingBox::new(0, 0, 100, 59).unwrap(), 1),
            LabeledBox::new(BoundingBox::new(0, 90, 100, 159).unwrap(), 2),
        ]
    );
}

#[test]
fn test_thumbnail_to_slide_boxes() {
    // Tissue on the left half of a 1.25x thumbnail
    let thumb = RgbImage::from_fn(128, 128, |x, _| if x < 64 { TISSUE } else { GLASS });
    let segmenter = ForegroundSegmenter::new(SegmentOptions::default().with_min_object_size(0)).unwrap();
    let tissue = segmenter.extract(&thumb);

    assert_eq!(tissue.get_pixel(10, 10).0[0], FOREGROUND);
    assert_eq!(tissue.get_pixel(120, 10).0[0], 0);

    // Annotate only the top half
    let mut annotation = GrayImage::new(128, 128);
    paint(&mut annotation, (0, 0, 64, 128), 1);
    let merged = merge_masks(&tissue, &annotation, &annotation);

    assert_eq!(merged.get_pixel(10, 10).0[0], 1);
    assert_eq!(merged.get_pixel(10, 100).0[0], 0);

    let boxes = rasterize_mask_to_boxes(&merged, 64, 0).unwrap();
    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0].label, 1);
    assert_eq!(boxes[0].bbox.min_row(), 0);

    let at_20x = convert_box(boxes[0].bbox, mag(1.25), mag(20.0));
    let b = boxes[0].bbox;
    assert_eq!(at_20x.to_array(), [0, b.min_col() * 16, 64 * 16, b.max_col() * 16]);
}

#[tokio::test]
async fn test_slide_thumbnail_segmentation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("case.tiff");
    // Tissue on the left half at 10x
    RgbImage::from_fn(1024, 1024, |x, _| if x < 512 { TISSUE } else { GLASS })
        .save(&path)
        .unwrap();

    let slide = SlideHandle::open(&path, mag(10.0)).unwrap();
    assert_eq!(slide.kind(), SlideKind::WholeSlide);

    let thumb = slide.read_extent(mag(1.25)).await.unwrap();
    assert_eq!(thumb.dimensions(), (128, 128));

    let segmenter = ForegroundSegmenter::new(SegmentOptions::default().with_min_object_size(0)).unwrap();
    let tissue = segmenter.extract(&enhance_color(&thumb, 15.0));

    assert_eq!(tissue.get_pixel(10, 10).0[0], FOREGROUND);
    assert_eq!(tissue.get_pixel(120, 10).0[0], 0);

    // The mask lines up with the thumbnail, so boxes map back to the slide
    let boxes = rasterize_mask_to_boxes(&tissue, 128, 0).unwrap();
    assert_eq!(boxes.len(), 1);
    let at_10x = convert_box(boxes[0].bbox, mag(1.25), mag(10.0));
    assert_eq!(at_10x.max_row(), 1024);
    assert!(at_10x.max_col() <= 1024);
}

#[test]
fn test_empty_mask_yields_no_boxes() {
    let mask = GrayImage::new(64, 64);
    assert!(rasterize_mask_to_boxes(&mask, 16, 5).unwrap().is_empty());
}
