//! Tile extraction layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              BatchRunner                │
//! │  (jobs → tasks, ordering, dedupe,       │
//! │   labels, failure report)               │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          TileGridExtractor              │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  Foreground  │  │  Grid walk over │  │
//! │  │  threshold   │  │  magnifications │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │       SlideRegistry / RegionReader      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileGridExtractor`]: grid of co-registered tile sets for one seed region
//! - [`TilingParams`]: grid and quality parameters
//! - [`TileDescriptor`]: one tile of an accepted set
//! - [`TileRow`]: flat output record, with a [`TileIdGenerator`] identifier
//! - [`BatchRunner`]: concurrent execution of [`TilingJob`]s
//! - [`LabelMap`]: integer label to class name mapping

mod batch;
mod descriptor;
mod extractor;
mod labels;

pub use batch::{BatchReport, BatchRunner, JobFailure, TilingJob, DEFAULT_WORKERS};
pub use descriptor::{TileDescriptor, TileIdGenerator, TileRow};
pub use extractor::{
    TileGridExtractor, TilingParams, TilingRequest, DEFAULT_FOREGROUND_THRESHOLD,
    DEFAULT_MAG_LEVELS, DEFAULT_REFERENCE_MAG, DEFAULT_TILE_SIZE,
};
pub use labels::{LabelMap, LoadedLabelMap};
