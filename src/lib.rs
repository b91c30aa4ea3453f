//! # WSI Tiler
//!
//! Multi-magnification tile extraction for Whole Slide Images (WSI).
//!
//! Given a seed region of a slide, this library lays a regular grid over the
//! region at a reference magnification and, for every grid point, reads one
//! square tile per requested magnification, all centred on the same physical
//! location. A tile set is kept only when enough of its tiles contain tissue.
//!
//! ## Architecture
//!
//! ```text
//!  thumbnail ──► segment ──► mask ──► region ──► seed boxes
//!                                                   │
//!                                                   ▼
//!  slide file ──► slide::SlideRegistry ──► tile::TileGridExtractor
//!                                                   │
//!                                                   ▼
//!                                     tile::BatchRunner ──► TileRow
//! ```
//!
//! - [`geometry`] - magnification conversion and bounding boxes
//! - [`segment`] - tissue foreground segmentation and mask merging
//! - [`region`] - mask rasterization, box splitting, containment pruning
//! - [`slide`] - magnification-aware region readers and the slide registry
//! - [`tile`] - grid extraction, batch execution and output rows
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wsi_tiler::{
//!     BatchRunner, BoundingBox, FileSlideSource, Magnification, SlideRegistry,
//!     TileGridExtractor, TilingJob, TilingParams,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = FileSlideSource::new(Magnification::new(40.0).unwrap());
//!     let registry = Arc::new(SlideRegistry::new(source));
//!     let extractor = TileGridExtractor::new(TilingParams::default()).unwrap();
//!     let runner = BatchRunner::new(registry, extractor, 4);
//!
//!     let job = TilingJob {
//!         wsi_path: "case.svs".to_string(),
//!         bbox: BoundingBox::new(100, 100, 400, 400).unwrap(),
//!         bbox_magnification: Magnification::new(1.25).unwrap(),
//!         label: Some(1),
//!     };
//!     let report = runner.run(vec![job]).await;
//!     println!("{} tiles", report.rows.len());
//! }
//! ```

pub mod config;
pub mod error;
pub mod geometry;
pub mod region;
pub mod segment;
pub mod slide;
pub mod tile;

// Re-export commonly used types
pub use config::{Cli, Command, RasterConfig, SegmentConfig, TilesConfig};
pub use error::{
    AnnotationParseError, EmptyRegionError, InputError, RegionFetchError, SlideReadError,
    TilingError,
};
pub use geometry::{convert, convert_box, convert_point, BoundingBox, LabeledBox, Magnification};
pub use region::{rasterize_mask_to_boxes, remove_contained, remove_contained_boxes, split_oversized_box};
pub use segment::{merge_masks, ForegroundSegmenter, SegmentOptions};
pub use slide::{
    FileSlideSource, PlainImageSource, RegionReader, SlideHandle, SlideKind, SlideRegistry,
    SlideSource, WholeSlideSource,
};
pub use tile::{
    BatchReport, BatchRunner, JobFailure, LabelMap, TileDescriptor, TileGridExtractor,
    TileIdGenerator, TileRow, TilingJob, TilingParams, TilingRequest,
};
