use thiserror::Error;

/// Malformed regions, coordinates or parameters supplied by the caller
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    /// Magnification must be a positive, finite scale factor
    #[error("Invalid magnification: {0} (must be positive and finite)")]
    InvalidMagnification(f64),

    /// Bounding box corners are out of order
    #[error("Invalid bounding box [{min_row}, {min_col}, {max_row}, {max_col}]: min must not exceed max")]
    InvalidBox {
        min_row: i64,
        min_col: i64,
        max_row: i64,
        max_col: i64,
    },

    /// A numeric parameter is outside its accepted range
    #[error("Invalid parameter {name}: {message}")]
    InvalidParameter { name: &'static str, message: String },

    /// Two parallel inputs must have the same length
    #[error("Length mismatch: {left} boxes but {right} areas")]
    LengthMismatch { left: usize, right: usize },
}

impl InputError {
    pub(crate) fn parameter(name: &'static str, message: impl Into<String>) -> Self {
        InputError::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}

/// Errors raised while opening or decoding a slide
#[derive(Debug, Clone, Error)]
pub enum SlideReadError {
    /// The slide file does not exist
    #[error("Slide not found: {0}")]
    NotFound(String),

    /// The file exists but could not be decoded
    #[error("Cannot decode slide {path}: {message}")]
    Decode { path: String, message: String },

    /// The decoded slide has no pixels
    #[error("Slide {0} has zero width or height")]
    Empty(String),

    /// The slide was opened with an invalid native magnification
    #[error("Invalid slide input: {0}")]
    Input(#[from] InputError),
}

/// Errors raised by a single region or patch fetch
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegionFetchError {
    /// Requested region lies entirely outside the slide
    #[error("Region out of bounds: rows {top}..{bottom}, cols {left}..{right} at {magnification}x (slide is {height}x{width})")]
    OutOfBounds {
        top: i64,
        left: i64,
        bottom: i64,
        right: i64,
        magnification: f64,
        height: u32,
        width: u32,
    },

    /// Requested region has zero width or height
    #[error("Empty region requested at {magnification}x")]
    EmptyRegion { magnification: f64 },

    /// The backing reader failed
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A region of interest produced nothing to work with
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmptyRegionError {
    /// The bounding box collapses to zero area at the reference magnification
    #[error("Bounding box has zero area at {magnification}x")]
    DegenerateBox { magnification: f64 },

    /// The foreground mask over the region has no foreground pixels
    #[error("No foreground pixels found in region")]
    NoForeground,
}

/// A malformed annotation or label-map entry
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnnotationParseError {
    /// The source could not be read or parsed at all
    #[error("Cannot parse annotations from {source_name}: {message}")]
    Malformed { source_name: String, message: String },

    /// A single entry was rejected
    #[error("Invalid annotation entry {key:?}: {message}")]
    InvalidEntry { key: String, message: String },
}

/// Errors from tile extraction and batch processing
#[derive(Debug, Clone, Error)]
pub enum TilingError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    SlideRead(#[from] SlideReadError),

    #[error(transparent)]
    RegionFetch(#[from] RegionFetchError),

    #[error(transparent)]
    EmptyRegion(#[from] EmptyRegionError),

    /// A worker task panicked or was cancelled
    #[error("Worker task failed: {0}")]
    Task(String),
}
