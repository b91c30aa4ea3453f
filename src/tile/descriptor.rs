//! Tile descriptors and the tabular rows emitted for them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::geometry::{BoundingBox, Magnification};

// =============================================================================
// TileDescriptor
// =============================================================================

/// One tile of an accepted tile set.
///
/// Bounds are expressed at `magnification`; the centroid is expressed at the
/// reference magnification of the grid, so every member of a tile set shares
/// the same centroid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileDescriptor {
    pub top_left_row: i64,
    pub top_left_col: i64,
    pub bottom_right_row: i64,
    pub bottom_right_col: i64,
    pub magnification: Magnification,
    pub tile_size: u32,
    pub centroid_row: i64,
    pub centroid_col: i64,
    pub label: Option<u32>,
}

impl TileDescriptor {
    /// The tile bounds as a box at [`Self::magnification`].
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_corners_unchecked(
            self.top_left_row,
            self.top_left_col,
            self.bottom_right_row,
            self.bottom_right_col,
        )
    }
}

// =============================================================================
// TileRow
// =============================================================================

/// A flat output record: one tile together with the region it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRow {
    pub tile_id: String,
    pub wsi_path: String,
    pub bbox_min_row: i64,
    pub bbox_min_col: i64,
    pub bbox_max_row: i64,
    pub bbox_max_col: i64,
    pub bbox_magnification: f64,
    pub reference_magnification: f64,
    pub tile_min_row: i64,
    pub tile_min_col: i64,
    pub tile_max_row: i64,
    pub tile_max_col: i64,
    pub tile_magnification: f64,
    pub tile_size: u32,
    pub tile_centroid_row: i64,
    pub tile_centroid_col: i64,
    pub tile_label: Option<String>,
}

impl TileRow {
    /// Flatten a descriptor extracted from `bbox` of `wsi_path`.
    pub fn new(
        tile_id: String,
        wsi_path: &str,
        bbox: BoundingBox,
        bbox_magnification: Magnification,
        reference_magnification: Magnification,
        tile: &TileDescriptor,
        tile_label: Option<String>,
    ) -> Self {
        Self {
            tile_id,
            wsi_path: wsi_path.to_string(),
            bbox_min_row: bbox.min_row(),
            bbox_min_col: bbox.min_col(),
            bbox_max_row: bbox.max_row(),
            bbox_max_col: bbox.max_col(),
            bbox_magnification: bbox_magnification.value(),
            reference_magnification: reference_magnification.value(),
            tile_min_row: tile.top_left_row,
            tile_min_col: tile.top_left_col,
            tile_max_row: tile.bottom_right_row,
            tile_max_col: tile.bottom_right_col,
            tile_magnification: tile.magnification.value(),
            tile_size: tile.tile_size,
            tile_centroid_row: tile.centroid_row,
            tile_centroid_col: tile.centroid_col,
            tile_label,
        }
    }
}

// =============================================================================
// TileIdGenerator
// =============================================================================

/// Number of digest bytes kept in an identifier (128 bits).
const TILE_ID_BYTES: usize = 16;

/// Deterministic tile identifiers.
///
/// The identifier is the hex-encoded first 128 bits of a SHA-256 digest over
/// an optional namespace, the slide path, the seed box, the tile centroid and
/// the tile magnification. Re-running the same job yields the same ids.
#[derive(Debug, Clone, Default)]
pub struct TileIdGenerator {
    namespace: String,
}

impl TileIdGenerator {
    /// Create a generator whose ids are scoped to `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Identifier for `tile`, extracted from `bbox` of `wsi_path`.
    pub fn tile_id(&self, wsi_path: &str, bbox: BoundingBox, tile: &TileDescriptor) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.namespace.as_bytes());
        hasher.update([0u8]);
        hasher.update(wsi_path.as_bytes());
        hasher.update([0u8]);
        for v in bbox.to_array() {
            hasher.update(v.to_le_bytes());
        }
        hasher.update(tile.centroid_row.to_le_bytes());
        hasher.update(tile.centroid_col.to_le_bytes());
        hasher.update(tile.magnification.value().to_le_bytes());

        let digest = hasher.finalize();
        hex::encode(&digest[..TILE_ID_BYTES])
    }
}
