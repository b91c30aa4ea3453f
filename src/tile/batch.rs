//! Concurrent tiling of many seed regions.
//!
//! A batch is a list of [`TilingJob`]s, each naming a slide and one seed box.
//! Jobs run as tokio tasks, at most `workers` at a time, and share opened
//! slides through a [`SlideRegistry`]. Decoding and segmentation are CPU
//! bound, so each job's extraction runs on the blocking pool and leaves the
//! runtime workers free. Results are gathered in job order so the output is
//! deterministic regardless of scheduling.
//!
//! # Failure isolation
//!
//! A job that fails (missing slide, unreadable region) is recorded in
//! [`BatchReport::failures`] and does not affect other jobs. Jobs whose region
//! has no foreground are counted in [`BatchReport::empty_jobs`].

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::TilingError;
use crate::geometry::{BoundingBox, Magnification};
use crate::slide::{SlideRegistry, SlideSource};

use super::descriptor::{TileDescriptor, TileIdGenerator, TileRow};
use super::extractor::{TileGridExtractor, TilingRequest};
use super::labels::LabelMap;

/// Default number of jobs running at once.
pub const DEFAULT_WORKERS: usize = 4;

/// One seed region of one slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilingJob {
    pub wsi_path: String,
    pub bbox: BoundingBox,
    pub bbox_magnification: Magnification,
    #[serde(default)]
    pub label: Option<u32>,
}

impl TilingJob {
    fn request(&self) -> TilingRequest {
        TilingRequest {
            bbox: self.bbox,
            bbox_magnification: self.bbox_magnification,
            label: self.label,
        }
    }
}

/// A job that produced no rows because of an error.
#[derive(Debug, Clone)]
pub struct JobFailure {
    /// Position of the job in the input
    pub index: usize,
    pub wsi_path: String,
    pub error: TilingError,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Output rows, in job order then grid order
    pub rows: Vec<TileRow>,

    /// Jobs that failed
    pub failures: Vec<JobFailure>,

    /// Jobs whose region had no foreground or collapsed to zero area
    pub empty_jobs: usize,

    /// Rows dropped because an earlier row had the same slide, centroid and magnification
    pub duplicates_dropped: usize,
}

/// Runs tiling jobs concurrently over a shared slide registry.
pub struct BatchRunner<S: SlideSource + 'static> {
    registry: Arc<SlideRegistry<S>>,
    extractor: Arc<TileGridExtractor>,
    semaphore: Arc<Semaphore>,
    labels: Option<Arc<LabelMap>>,
    ids: TileIdGenerator,
}

impl<S: SlideSource + 'static> BatchRunner<S> {
    /// Create a runner executing at most `workers` jobs at once.
    ///
    /// A worker count of zero is treated as one.
    pub fn new(registry: Arc<SlideRegistry<S>>, extractor: TileGridExtractor, workers: usize) -> Self {
        Self {
            registry,
            extractor: Arc::new(extractor),
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
            labels: None,
            ids: TileIdGenerator::default(),
        }
    }

    /// Resolve integer labels to class names in the output rows.
    pub fn with_labels(mut self, labels: LabelMap) -> Self {
        self.labels = Some(Arc::new(labels));
        self
    }

    pub fn with_id_generator(mut self, ids: TileIdGenerator) -> Self {
        self.ids = ids;
        self
    }

    /// Run every job and gather the rows.
    pub async fn run(&self, jobs: Vec<TilingJob>) -> BatchReport {
        let total = jobs.len();
        let mut handles = Vec::with_capacity(total);

        for job in jobs {
            let registry = self.registry.clone();
            let extractor = self.extractor.clone();
            let semaphore = self.semaphore.clone();
            let request = job.request();
            let path = job.wsi_path.clone();

            let handle = tokio::spawn(async move {
                // The semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();
                let slide = registry.get_slide(&path).await?;

                let runtime = tokio::runtime::Handle::current();
                tokio::task::spawn_blocking(move || {
                    runtime.block_on(extractor.try_extract(slide.as_ref(), &request))
                })
                .await
                .map_err(|e| TilingError::Task(e.to_string()))?
            });
            handles.push((job, handle));
        }

        let mut report = BatchReport::default();
        let mut seen = HashSet::new();

        for (index, (job, handle)) in handles.into_iter().enumerate() {
            let result = handle
                .await
                .unwrap_or_else(|e| Err(TilingError::Task(e.to_string())));

            match result {
                Ok(tiles) => {
                    for tile in &tiles {
                        let key = (
                            job.wsi_path.clone(),
                            tile.centroid_row,
                            tile.centroid_col,
                            tile.magnification.value().to_bits(),
                        );
                        if !seen.insert(key) {
                            report.duplicates_dropped += 1;
                            continue;
                        }
                        report.rows.push(self.row(&job, tile));
                    }
                }
                Err(TilingError::EmptyRegion(e)) => {
                    debug!(index, slide = %job.wsi_path, error = %e, "Job produced no tiles");
                    report.empty_jobs += 1;
                }
                Err(error) => {
                    warn!(index, slide = %job.wsi_path, error = %error, "Job failed");
                    report.failures.push(JobFailure {
                        index,
                        wsi_path: job.wsi_path.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            jobs = total,
            rows = report.rows.len(),
            failed = report.failures.len(),
            empty = report.empty_jobs,
            duplicates = report.duplicates_dropped,
            "Batch complete"
        );

        report
    }

    fn row(&self, job: &TilingJob, tile: &TileDescriptor) -> TileRow {
        let label = tile.label.map(|l| match &self.labels {
            Some(map) => map.resolve(l),
            None => l.to_string(),
        });
        TileRow::new(
            self.ids.tile_id(&job.wsi_path, job.bbox, tile),
            &job.wsi_path,
            job.bbox,
            job.bbox_magnification,
            self.extractor.params().reference_mag,
            tile,
            label,
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
