//! Slide abstraction layer.
//!
//! This module provides a unified, magnification-aware interface for reading
//! regions of whole-slide images and flat images alike.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │      TileGridExtractor / BatchRunner    │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            SlideRegistry                │
//! │  (caches slides, singleflight opens)    │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          RegionReader Trait             │
//! │  (read_region at any magnification)     │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │ WholeSlideSource│    │  PlainImageSource   │
//! │ (.svs .ndpi ...)│    │  (png, jpeg, ...)   │
//! └─────────────────┘    └─────────────────────┘
//! ```
//!
//! [`SlideHandle`] is the closed set of file-backed sources, chosen by file
//! extension when the slide is opened.

mod handle;
mod plain;
mod pyramid;
mod reader;
mod registry;

pub use handle::{SlideHandle, SlideKind};
pub use plain::PlainImageSource;
pub use pyramid::{WholeSlideSource, MIN_LEVEL_SIZE};
pub use reader::RegionReader;
pub use registry::{FileSlideSource, SlideRegistry, SlideSource, DEFAULT_SLIDE_CACHE_CAPACITY};
