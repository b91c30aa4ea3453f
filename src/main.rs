//! WSI Tiler - multi-magnification tile extraction for Whole Slide Images.
//!
//! This binary wires the library stages into three commands that can be
//! chained through JSON lines:
//!
//! ```text
//! wsi-tiler segment case.svs --magnification 1.25 -o mask.png
//! wsi-tiler raster mask.png --slide case.svs --mask-magnification 1.25 > jobs.jsonl
//! wsi-tiler tiles jobs.jsonl -o tiles.jsonl
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsi_tiler::{
    config::{Cli, Command, RasterConfig, SegmentConfig, TilesConfig},
    geometry::{LabeledBox, Magnification},
    region::{rasterize_mask_to_boxes, remove_contained, split_oversized_box},
    segment::{enhance_color, merge_masks, ForegroundSegmenter},
    slide::{FileSlideSource, RegionReader, SlideHandle, SlideRegistry},
    tile::{BatchRunner, LabelMap, TileGridExtractor, TileIdGenerator, TilingJob},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Segment(config) => run_segment(config).await,
        Command::Raster(config) => run_raster(config),
        Command::Tiles(config) => run_tiles(config).await,
    }
}

/// Initialize the tracing/logging subsystem.
///
/// Logs go to stderr so stdout stays free for JSON lines.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "wsi_tiler=debug"
    } else {
        "wsi_tiler=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Open the output file, or stdout when none is given.
fn open_output(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn write_json_lines<T: Serialize>(out: &mut dyn Write, items: &[T]) -> io::Result<()> {
    for item in items {
        serde_json::to_writer(&mut *out, item)?;
        out.write_all(b"\n")?;
    }
    out.flush()
}

// =============================================================================
// Segment Command
// =============================================================================

async fn run_segment(config: SegmentConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let segmenter = match ForegroundSegmenter::new(config.segment_options()) {
        Ok(s) => s,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let image = match read_segment_input(&config).await {
        Ok(img) => img,
        Err(e) => {
            error!("Cannot read {}: {}", config.input.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = config.thumbnail_path() {
        if let Err(e) = image.save(&path) {
            error!("Cannot write {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
        info!(thumbnail = %path.display(), "Thumbnail written");
    }

    let mut mask = if config.color_enhance != 0.0 {
        segmenter.extract(&enhance_color(&image, config.color_enhance))
    } else {
        segmenter.extract(&image)
    };

    if let Some(ref path) = config.annotation {
        let annotation = match image::open(path) {
            Ok(img) => img.to_luma8(),
            Err(e) => {
                error!("Cannot read annotation {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        };
        mask = merge_masks(&mask, &annotation, &annotation);
    }

    if let Err(e) = mask.save(&config.output) {
        error!("Cannot write {}: {}", config.output.display(), e);
        return ExitCode::FAILURE;
    }

    let foreground = mask.pixels().filter(|p| p.0[0] != 0).count();
    info!(
        output = %config.output.display(),
        width = mask.width(),
        height = mask.height(),
        foreground,
        "Mask written"
    );

    ExitCode::SUCCESS
}

/// Read the segmentation input: a flat image, or a whole slide at the
/// requested magnification.
async fn read_segment_input(config: &SegmentConfig) -> Result<image::RgbImage, String> {
    let Some(mag) = config.slide_magnification()? else {
        return image::open(&config.input)
            .map(|img| img.to_rgb8())
            .map_err(|e| e.to_string());
    };

    let slide = SlideHandle::open(&config.input, config.native_magnification()?)
        .map_err(|e| e.to_string())?;
    let (width, height) = slide.dimensions_at(mag);
    info!(
        slide = slide.identifier(),
        magnification = mag.value(),
        width,
        height,
        "Reading slide thumbnail"
    );

    slide.read_extent(mag).await.map_err(|e| e.to_string())
}

// =============================================================================
// Raster Command
// =============================================================================

fn run_raster(config: RasterConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let mask = match image::open(&config.mask) {
        Ok(img) => img.to_luma8(),
        Err(e) => {
            error!("Cannot read {}: {}", config.mask.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let boxes = match raster_boxes(&config, &mask) {
        Ok(boxes) => boxes,
        Err(e) => {
            error!("Rasterization failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let Ok(mask_mag) = Magnification::new(config.mask_magnification) else {
        error!("Configuration error: invalid mask magnification");
        return ExitCode::FAILURE;
    };

    let jobs: Vec<TilingJob> = boxes
        .into_iter()
        .map(|b| TilingJob {
            wsi_path: config.slide.clone(),
            bbox: b.bbox,
            bbox_magnification: mask_mag,
            label: Some(b.label),
        })
        .collect();

    let result = open_output(config.output.as_deref())
        .and_then(|mut out| write_json_lines(out.as_mut(), &jobs));
    if let Err(e) = result {
        error!("Cannot write jobs: {}", e);
        return ExitCode::FAILURE;
    }

    info!(slide = %config.slide, jobs = jobs.len(), "Jobs written");
    ExitCode::SUCCESS
}

/// Rasterize, optionally split oversized boxes, then drop enclosed boxes.
fn raster_boxes(
    config: &RasterConfig,
    mask: &image::GrayImage,
) -> Result<Vec<LabeledBox>, wsi_tiler::error::InputError> {
    let mut boxes = rasterize_mask_to_boxes(mask, config.strip_height, config.margin)?;

    if let Some(max_area) = config.max_area {
        let mut split = Vec::with_capacity(boxes.len());
        for b in boxes {
            for piece in split_oversized_box(b.bbox, max_area)? {
                split.push(LabeledBox::new(piece, b.label));
            }
        }
        boxes = split;
    }

    if !config.keep_contained {
        let bboxes: Vec<_> = boxes.iter().map(|b| b.bbox).collect();
        let areas: Vec<_> = bboxes.iter().map(|b| b.area()).collect();
        let kept = remove_contained(&bboxes, &areas)?;
        boxes = kept.into_iter().map(|i| boxes[i]).collect();
    }

    Ok(boxes)
}

// =============================================================================
// Tiles Command
// =============================================================================

async fn run_tiles(config: TilesConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let (params, native_mag) = match (config.tiling_params(), config.native_magnification()) {
        (Ok(p), Ok(m)) => (p, m),
        (Err(e), _) | (_, Err(e)) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let extractor = match TileGridExtractor::new(params) {
        Ok(x) => x,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let jobs = match read_jobs(config.jobs.as_deref()) {
        Ok(jobs) => jobs,
        Err(e) => {
            error!("Cannot read jobs: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration:");
    info!("  Jobs: {}", jobs.len());
    info!("  Magnifications: {:?} (grid at {}x)", config.mags, config.reference_mag);
    info!("  Tile size: {}", config.tile_size);
    info!("  Workers: {}, slide cache: {}", config.workers, config.cache_slides);

    let registry = Arc::new(SlideRegistry::with_capacity(
        FileSlideSource::new(native_mag),
        config.cache_slides,
    ));
    let mut runner = BatchRunner::new(registry, extractor, config.workers)
        .with_id_generator(TileIdGenerator::new(config.id_namespace.clone()));

    if let Some(ref path) = config.labels {
        match LabelMap::load(path) {
            Ok(loaded) => {
                for rejected in &loaded.rejected {
                    warn!("Label map {}: {}", path.display(), rejected);
                }
                runner = runner.with_labels(loaded.map);
            }
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    let total = jobs.len();
    let report = runner.run(jobs).await;

    for failure in &report.failures {
        warn!(
            "Job {} ({}) failed: {}",
            failure.index, failure.wsi_path, failure.error
        );
    }

    let result = open_output(config.output.as_deref())
        .and_then(|mut out| write_json_lines(out.as_mut(), &report.rows));
    if let Err(e) = result {
        error!("Cannot write tiles: {}", e);
        return ExitCode::FAILURE;
    }

    if total > 0 && report.failures.len() == total {
        error!("All {} jobs failed", total);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Parse JSON-lines jobs from a file, or stdin when none is given.
fn read_jobs(path: Option<&Path>) -> Result<Vec<TilingJob>, String> {
    let reader: Box<dyn BufRead> = match path {
        Some(path) => Box::new(BufReader::new(
            File::open(path).map_err(|e| format!("{}: {}", path.display(), e))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut jobs = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| e.to_string())?;
        if line.trim().is_empty() {
            continue;
        }
        let job: TilingJob =
            serde_json::from_str(&line).map_err(|e| format!("line {}: {}", i + 1, e))?;
        jobs.push(job);
    }
    Ok(jobs)
}
