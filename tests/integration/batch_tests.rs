//! Integration tests for batch execution.
//!
//! These tests verify:
//! - Slides shared between jobs are opened once
//! - Output ordering, de-duplication and failure isolation
//! - File-backed slides of both kinds through `FileSlideSource`
//! - JSON-lines job records as written by the raster command

use std::sync::atomic::Ordering;
use std::sync::Arc;

use image::RgbImage;
use tempfile::TempDir;

use wsi_tiler::error::{SlideReadError, TilingError};
use wsi_tiler::geometry::BoundingBox;
use wsi_tiler::slide::{FileSlideSource, SlideKind, SlideRegistry, SlideSource};
use wsi_tiler::tile::{BatchRunner, LabelMap, TileGridExtractor, TileRow, TilingJob, TilingParams};

use super::test_utils::{mag, striped_image, MockSlideSource, Pattern, GLASS, GRAY, TISSUE};

fn extractor(mags: &[f64], tile_size: u32) -> TileGridExtractor {
    TileGridExtractor::new(TilingParams {
        mag_levels: mags.iter().map(|&m| mag(m)).collect(),
        reference_mag: mag(5.0),
        tile_size,
        ..TilingParams::default()
    })
    .unwrap()
}

fn job(path: &str, bbox: [i64; 4], label: Option<u32>) -> TilingJob {
    TilingJob {
        wsi_path: path.to_string(),
        bbox: BoundingBox::try_from(bbox).unwrap(),
        bbox_magnification: mag(5.0),
        label,
    }
}

// =============================================================================
// Mock Slides
// =============================================================================

#[tokio::test]
async fn test_batch_shares_opened_slides() {
    let source = MockSlideSource::new()
        .with_slide("a.svs", 10.0, 2048, Pattern::Stripes)
        .with_slide("gray.svs", 10.0, 1024, Pattern::Uniform(GRAY));
    let opens = source.open_counter();

    let registry = Arc::new(SlideRegistry::new(source));
    let runner = BatchRunner::new(registry.clone(), extractor(&[5.0, 10.0], 128), 2);

    let report = runner
        .run(vec![
            job("a.svs", [0, 0, 256, 256], Some(1)),
            job("a.svs", [256, 0, 512, 256], Some(1)),
            job("a.svs", [0, 0, 256, 256], Some(1)),
            job("missing.svs", [0, 0, 256, 256], None),
            job("gray.svs", [0, 0, 256, 256], None),
        ])
        .await;

    // One open per distinct slide
    assert_eq!(opens.load(Ordering::SeqCst), 3);
    assert_eq!(registry.cached_count().await, 2);

    // Two distinct boxes, 2 x 2 grid each, two magnifications
    assert_eq!(report.rows.len(), 16);
    assert_eq!(report.duplicates_dropped, 8);
    assert!(report.rows[..8].iter().all(|r| r.bbox_min_row == 0));
    assert!(report.rows[8..].iter().all(|r| r.bbox_min_row == 256));

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 3);
    assert!(matches!(
        report.failures[0].error,
        TilingError::SlideRead(SlideReadError::NotFound(_))
    ));

    assert_eq!(report.empty_jobs, 1);
}

#[tokio::test]
async fn test_batch_rows_carry_job_metadata() {
    let source = MockSlideSource::new().with_slide("a.svs", 10.0, 2048, Pattern::Stripes);
    let labels = LabelMap::from_json_str("labels.json", r#"{"1": "tumor", "2": "stroma"}"#)
        .unwrap()
        .map;

    let runner = BatchRunner::new(Arc::new(SlideRegistry::new(source)), extractor(&[5.0], 128), 1)
        .with_labels(labels);

    let report = runner.run(vec![job("a.svs", [0, 0, 128, 128], Some(2))]).await;
    assert_eq!(report.rows.len(), 1);

    let row = &report.rows[0];
    assert_eq!(row.wsi_path, "a.svs");
    assert_eq!(row.tile_label.as_deref(), Some("stroma"));
    assert_eq!(row.bbox_magnification, 5.0);
    assert_eq!(row.reference_magnification, 5.0);
    assert_eq!(
        (row.tile_min_row, row.tile_min_col, row.tile_max_row, row.tile_max_col),
        (0, 0, 128, 128)
    );
    assert_eq!((row.tile_centroid_row, row.tile_centroid_col), (64, 64));
    assert_eq!(row.tile_id.len(), 32);

    // Rows survive a JSON round trip unchanged
    let line = serde_json::to_string(row).unwrap();
    let parsed: TileRow = serde_json::from_str(&line).unwrap();
    assert_eq!(&parsed, row);
}

#[tokio::test]
async fn test_batch_is_deterministic() {
    let run = || async {
        let source = MockSlideSource::new().with_slide("a.svs", 10.0, 2048, Pattern::Stripes);
        BatchRunner::new(Arc::new(SlideRegistry::new(source)), extractor(&[5.0, 10.0], 128), 4)
            .run(vec![
                job("a.svs", [0, 0, 256, 256], None),
                job("a.svs", [512, 512, 768, 768], None),
            ])
            .await
            .rows
    };

    assert_eq!(run().await, run().await);
}

// =============================================================================
// File-backed Slides
// =============================================================================

#[tokio::test]
async fn test_plain_image_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("slide.png");
    striped_image(512, 512).save(&path).unwrap();
    let path = path.display().to_string();

    let source = FileSlideSource::new(mag(5.0));
    let slide = source.open_slide(&path).await.unwrap();
    assert_eq!(slide.kind(), SlideKind::PlainImage);

    let runner = BatchRunner::new(Arc::new(SlideRegistry::new(source)), extractor(&[5.0], 128), 2);
    let report = runner.run(vec![job(&path, [0, 0, 256, 256], None)]).await;

    assert!(report.failures.is_empty());
    assert_eq!(report.rows.len(), 4);
}

#[tokio::test]
async fn test_whole_slide_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("slide.tiff");
    // 32 pixel stripes at 10x are 16 pixel stripes at 5x
    RgbImage::from_fn(1024, 1024, |x, _| if (x / 32) % 2 == 0 { TISSUE } else { GLASS })
        .save(&path)
        .unwrap();
    let path = path.display().to_string();

    let source = FileSlideSource::new(mag(10.0));
    let slide = source.open_slide(&path).await.unwrap();
    assert_eq!(slide.kind(), SlideKind::WholeSlide);

    let runner = BatchRunner::new(Arc::new(SlideRegistry::new(source)), extractor(&[5.0, 10.0], 128), 2);
    let report = runner.run(vec![job(&path, [0, 0, 256, 256], None)]).await;

    assert!(report.failures.is_empty());
    assert!(!report.rows.is_empty());
    assert!(report
        .rows
        .iter()
        .all(|r| r.tile_magnification == 5.0 || r.tile_magnification == 10.0));
}

#[tokio::test]
async fn test_unreadable_file_is_a_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.png");
    std::fs::write(&path, b"not an image").unwrap();

    let runner = BatchRunner::new(
        Arc::new(SlideRegistry::new(FileSlideSource::new(mag(5.0)))),
        extractor(&[5.0], 128),
        1,
    );
    let report = runner
        .run(vec![job(&path.display().to_string(), [0, 0, 64, 64], None)])
        .await;

    assert!(report.rows.is_empty());
    assert!(matches!(
        report.failures[0].error,
        TilingError::SlideRead(SlideReadError::Decode { .. })
    ));
}

// =============================================================================
// Job Records
// =============================================================================

#[test]
fn test_job_json_lines() {
    let text = r#"{"wsi_path": "a.svs", "bbox": [10, 20, 30, 40], "bbox_magnification": 1.25}
{"wsi_path": "b.svs", "bbox": [0, 0, 5, 5], "bbox_magnification": 5, "label": 2}"#;

    let jobs: Vec<TilingJob> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(jobs[0].bbox.to_array(), [10, 20, 30, 40]);
    assert_eq!(jobs[0].bbox_magnification, mag(1.25));
    assert_eq!(jobs[0].label, None);
    assert_eq!(jobs[1].label, Some(2));

    // Inverted corners and non-positive magnifications are rejected
    assert!(serde_json::from_str::<TilingJob>(
        r#"{"wsi_path": "a", "bbox": [30, 20, 10, 40], "bbox_magnification": 1}"#
    )
    .is_err());
    assert!(serde_json::from_str::<TilingJob>(
        r#"{"wsi_path": "a", "bbox": [0, 0, 10, 10], "bbox_magnification": 0}"#
    )
    .is_err());
}
