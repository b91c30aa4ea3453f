//! Integration tests for multi-magnification grid extraction.
//!
//! These tests verify:
//! - Grid layout and co-registration across magnifications
//! - Background rejection and the bad-tile limit
//! - Patch failures dropping only their own tile set
//! - Region errors for empty and out-of-slide boxes

use std::collections::HashSet;

use wsi_tiler::error::{EmptyRegionError, RegionFetchError, TilingError};
use wsi_tiler::geometry::BoundingBox;
use wsi_tiler::tile::{TileGridExtractor, TilingParams, TilingRequest};

use super::test_utils::{mag, Pattern, ProceduralSlide, GRAY};

fn params(mags: &[f64], tile_size: u32) -> TilingParams {
    TilingParams {
        mag_levels: mags.iter().map(|&m| mag(m)).collect(),
        reference_mag: mag(5.0),
        tile_size,
        ..TilingParams::default()
    }
}

fn extractor(mags: &[f64], tile_size: u32) -> TileGridExtractor {
    TileGridExtractor::new(params(mags, tile_size)).unwrap()
}

// =============================================================================
// Grid Layout
// =============================================================================

#[tokio::test]
async fn test_grid_over_striped_slide() {
    let slide = ProceduralSlide::striped("striped.svs");
    // 1024 x 1024 at 1x is 5120 x 5120 at 5x, clipped to the 1024 x 1024 slide extent
    let request = TilingRequest::new(BoundingBox::new(0, 0, 1024, 1024).unwrap(), mag(1.0)).with_label(3);

    let tiles = extractor(&[1.25, 5.0, 10.0], 256)
        .try_extract(&slide, &request)
        .await
        .unwrap();

    assert_eq!(tiles.len(), 48);

    let mags: HashSet<u64> = tiles.iter().map(|t| t.magnification.value().to_bits()).collect();
    assert_eq!(mags.len(), 3);
    assert!(tiles.iter().all(|t| t.label == Some(3)));
    assert!(tiles.iter().all(|t| t.tile_size == 256));

    let centroids: HashSet<(i64, i64)> = tiles.iter().map(|t| (t.centroid_row, t.centroid_col)).collect();
    assert_eq!(centroids.len(), 16);
    for &(row, col) in &centroids {
        assert!((0..1024).contains(&row));
        assert!((0..1024).contains(&col));
        assert_eq!((row - 128) % 256, 0);
        assert_eq!((col - 128) % 256, 0);
    }
}

#[tokio::test]
async fn test_tile_sets_are_co_registered() {
    let slide = ProceduralSlide::striped("striped.svs");
    let request = TilingRequest::new(BoundingBox::new(0, 0, 256, 256).unwrap(), mag(5.0));

    let tiles = extractor(&[1.25, 5.0, 10.0], 256)
        .try_extract(&slide, &request)
        .await
        .unwrap();

    // One set, in magnification order
    assert_eq!(tiles.len(), 3);
    assert!(tiles.iter().all(|t| (t.centroid_row, t.centroid_col) == (128, 128)));

    assert_eq!(tiles[0].magnification, mag(1.25));
    assert_eq!(tiles[0].bounds().to_array(), [-96, -96, 160, 160]);
    assert_eq!(tiles[1].bounds().to_array(), [0, 0, 256, 256]);
    assert_eq!(tiles[2].magnification, mag(10.0));
    assert_eq!(tiles[2].bounds().to_array(), [128, 128, 384, 384]);
}

#[tokio::test]
async fn test_overlap_halves_the_grid_step() {
    let slide = ProceduralSlide::striped("striped.svs");
    let request = TilingRequest::new(BoundingBox::new(0, 0, 1024, 1024).unwrap(), mag(5.0));

    let overlapping = TileGridExtractor::new(TilingParams {
        overlap_percent: 50.0,
        ..params(&[5.0], 256)
    })
    .unwrap();

    let tiles = overlapping.try_extract(&slide, &request).await.unwrap();

    assert_eq!(tiles.len(), 64);
    assert_eq!((tiles[1].centroid_row, tiles[1].centroid_col), (128, 256));
}

// =============================================================================
// Filtering
// =============================================================================

#[tokio::test]
async fn test_zero_bad_tile_limit_rejects_every_set() {
    let slide = ProceduralSlide::striped("striped.svs");
    let request = TilingRequest::new(BoundingBox::new(0, 0, 512, 512).unwrap(), mag(5.0));

    let strict = TileGridExtractor::new(TilingParams {
        max_bad_tiles: Some(0),
        ..params(&[5.0, 10.0], 256)
    })
    .unwrap();

    let tiles = strict.try_extract(&slide, &request).await.unwrap();
    assert!(tiles.is_empty());
}

#[tokio::test]
async fn test_failing_magnification_drops_tile_sets() {
    let slide = ProceduralSlide::striped("striped.svs").failing_at(10.0);
    let request = TilingRequest::new(BoundingBox::new(0, 0, 512, 512).unwrap(), mag(5.0));

    let tiles = extractor(&[5.0, 10.0], 256)
        .try_extract(&slide, &request)
        .await
        .unwrap();

    assert!(tiles.is_empty());
    // Reference read plus two patch reads per centroid
    assert_eq!(slide.read_count(), 1 + 4 * 2);
}

#[tokio::test]
async fn test_uniform_slide_has_no_foreground() {
    let slide = ProceduralSlide::new("gray.svs", 10.0, 1024, 1024, Pattern::Uniform(GRAY));
    let request = TilingRequest::new(BoundingBox::new(0, 0, 256, 256).unwrap(), mag(5.0));

    let err = extractor(&[5.0], 128)
        .try_extract(&slide, &request)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TilingError::EmptyRegion(EmptyRegionError::NoForeground)
    ));
}

// =============================================================================
// Region Errors
// =============================================================================

#[tokio::test]
async fn test_box_collapsing_at_reference_mag() {
    let slide = ProceduralSlide::striped("striped.svs");
    // 0.1 pixels tall once mapped from 20x to 5x
    let request = TilingRequest::new(BoundingBox::new(0, 0, 3, 400).unwrap(), mag(20.0));

    let err = extractor(&[5.0], 128)
        .try_extract(&slide, &request)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TilingError::EmptyRegion(EmptyRegionError::DegenerateBox { .. })
    ));
}

#[tokio::test]
async fn test_box_outside_slide() {
    let slide = ProceduralSlide::striped("striped.svs");
    let request = TilingRequest::new(BoundingBox::new(5000, 5000, 5200, 5200).unwrap(), mag(5.0));

    let extractor = extractor(&[5.0], 128);
    let err = extractor.try_extract(&slide, &request).await.unwrap_err();
    assert!(matches!(
        err,
        TilingError::RegionFetch(RegionFetchError::OutOfBounds { .. })
    ));

    // The lenient entry point swallows the error
    assert!(extractor.extract(&slide, &request).await.is_empty());
}
