//! Slide Registry for sharing opened slides between jobs.
//!
//! Decoding a slide and building its pyramid is far more expensive than any
//! single region read, and a batch usually holds many boxes per slide. The
//! registry provides:
//! - LRU caching of opened slides, keyed by path
//! - Singleflight opening, so concurrent jobs on the same slide decode it once
//!
//! # Example
//!
//! ```ignore
//! use wsi_tiler::slide::{FileSlideSource, SlideRegistry};
//!
//! let registry = SlideRegistry::new(FileSlideSource::new(native_mag));
//!
//! // Opens and caches on first access
//! let slide = registry.get_slide("slides/case_01.svs").await?;
//! let region = slide.read_region(bbox, mag).await?;
//! ```

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{debug, info};

use crate::error::SlideReadError;
use crate::geometry::Magnification;

use super::handle::SlideHandle;
use super::reader::RegionReader;

// =============================================================================
// Configuration
// =============================================================================

/// Default capacity for slide cache (number of slides).
pub const DEFAULT_SLIDE_CACHE_CAPACITY: usize = 8;

// =============================================================================
// SlideSource Trait
// =============================================================================

/// Trait for opening slides from identifiers.
///
/// This abstraction lets the registry work with files on disk as well as
/// synthetic or remote slides.
#[async_trait]
pub trait SlideSource: Send + Sync {
    /// The type of slide this source opens.
    type Slide: RegionReader + 'static;

    /// Open the slide named by `slide_id`.
    async fn open_slide(&self, slide_id: &str) -> Result<Self::Slide, SlideReadError>;
}

/// Opens slide files from the local filesystem as [`SlideHandle`]s.
#[derive(Debug, Clone, Copy)]
pub struct FileSlideSource {
    native_magnification: Magnification,
}

impl FileSlideSource {
    /// `native_magnification` is applied to every slide this source opens.
    pub fn new(native_magnification: Magnification) -> Self {
        Self {
            native_magnification,
        }
    }
}

#[async_trait]
impl SlideSource for FileSlideSource {
    type Slide = SlideHandle;

    async fn open_slide(&self, slide_id: &str) -> Result<SlideHandle, SlideReadError> {
        let path = slide_id.to_string();
        let mag = self.native_magnification;

        // Decoding is CPU bound
        tokio::task::spawn_blocking(move || SlideHandle::open(&path, mag))
            .await
            .map_err(|e| SlideReadError::Decode {
                path: slide_id.to_string(),
                message: e.to_string(),
            })?
    }
}

// =============================================================================
// SlideRegistry
// =============================================================================

/// Registry for managing slide lifecycle and caching.
///
/// The registry:
/// - Caches opened slides with LRU eviction
/// - Opens slides on demand through its [`SlideSource`]
/// - Uses singleflight to prevent duplicate opens for the same slide
pub struct SlideRegistry<S: SlideSource> {
    /// The source for opening slides
    source: S,

    /// Cached slides indexed by slide ID
    cache: RwLock<LruCache<String, Arc<S::Slide>>>,

    /// In-flight opens for singleflight pattern
    in_flight: Mutex<HashMap<String, Arc<InFlightState<S::Slide>>>>,
}

/// State for an in-flight slide open operation.
struct InFlightState<T> {
    /// Notification for waiters
    notify: Notify,
    /// Result of the open operation (set when complete)
    result: Mutex<Option<Result<Arc<T>, SlideReadError>>>,
}

impl<S: SlideSource> SlideRegistry<S> {
    /// Create a new SlideRegistry holding up to
    /// [`DEFAULT_SLIDE_CACHE_CAPACITY`] slides.
    pub fn new(source: S) -> Self {
        Self::with_capacity(source, DEFAULT_SLIDE_CACHE_CAPACITY)
    }

    /// Create a new SlideRegistry with a custom cache capacity.
    ///
    /// A capacity of zero is treated as one.
    pub fn with_capacity(source: S, slide_cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(slide_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            source,
            cache: RwLock::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// The source slides are opened from.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get a slide, opening it if not already cached.
    ///
    /// This method:
    /// 1. Checks the cache for an existing slide
    /// 2. If not cached, opens the slide through the source
    /// 3. Uses singleflight to prevent duplicate opens for concurrent requests
    ///
    /// Failed opens are not cached; the next call retries.
    pub async fn get_slide(&self, slide_id: &str) -> Result<Arc<S::Slide>, SlideReadError> {
        // Fast path: check cache
        {
            let mut cache = self.cache.write().await;
            if let Some(slide) = cache.get(slide_id) {
                return Ok(slide.clone());
            }
        }

        // Slow path: check in_flight or become leader
        loop {
            let state = {
                let mut in_flight = self.in_flight.lock().await;

                if let Some(state) = in_flight.get(slide_id) {
                    // Another task is opening this slide
                    state.clone()
                } else {
                    // We're the leader for opening this slide
                    let state = Arc::new(InFlightState {
                        notify: Notify::new(),
                        result: Mutex::new(None),
                    });
                    in_flight.insert(slide_id.to_string(), state.clone());
                    drop(in_flight);

                    debug!(slide = slide_id, "Opening slide");
                    let result = self.source.open_slide(slide_id).await.map(Arc::new);

                    {
                        let mut result_guard = state.result.lock().await;
                        *result_guard = Some(result.clone());
                    }

                    if let Ok(ref slide) = result {
                        let (width, height) = slide.dimensions();
                        info!(slide = slide_id, width, height, "Slide opened");
                        let mut cache = self.cache.write().await;
                        cache.put(slide_id.to_string(), slide.clone());
                    }

                    // Clean up in_flight and notify waiters
                    {
                        let mut in_flight = self.in_flight.lock().await;
                        in_flight.remove(slide_id);
                    }
                    state.notify.notify_waiters();

                    return result;
                }
            };

            // Register interest before checking, so a completion between the
            // check and the wait is not missed.
            let notified = state.notify.notified();
            {
                let result_guard = state.result.lock().await;
                if let Some(ref result) = *result_guard {
                    return result.clone();
                }
            }
            notified.await;

            let result_guard = state.result.lock().await;
            if let Some(ref result) = *result_guard {
                return result.clone();
            }
        }
    }

    /// Remove a slide from the cache.
    pub async fn invalidate(&self, slide_id: &str) {
        let mut cache = self.cache.write().await;
        cache.pop(slide_id);
    }

    /// Clear all cached slides.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
    }

    /// Get the number of cached slides.
    pub async fn cached_count(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
