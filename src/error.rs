use thiserror::Error;

/// I/O errors that can occur when reading from a byte source (local file or
/// HTTP range backend).
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from the remote HTTP range-GET backend
    #[error("remote backend error: {0}")]
    Remote(String),

    /// Requested range exceeds resource bounds
    #[error("range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Network or connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Object not found
    #[error("object not found: {0}")]
    NotFound(String),

    /// A read-miss fetch failed after exhausting retries
    #[error("I/O failed after {retries} retries at offset {offset}")]
    RetriesExhausted { offset: u64, retries: u32 },
}

/// Errors related to format detection and validation
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF parsing error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// File format is not supported (should map to HTTP 415)
    #[error("unsupported format: {reason}")]
    UnsupportedFormat { reason: String },
}

/// Errors that can occur when parsing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("file too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unsupported compression scheme
    #[error("unsupported compression: {0} (only JPEG is supported)")]
    UnsupportedCompression(String),

    /// File uses strips instead of tiles
    #[error("unsupported organization: file uses strips instead of tiles")]
    StripOrganization,

    /// Unknown field type in IFD entry
    #[error("unknown field type: {0}")]
    UnknownFieldType(u16),
}

/// Errors from the tile pipeline: decoding, quality validation, bounds checks.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    #[error("slide error: {0}")]
    Slide(#[from] TiffError),

    #[error("slide not found: {slide_id}")]
    SlideNotFound { slide_id: String },

    #[error("invalid level {level} (slide has {max_levels} level(s))")]
    InvalidLevel { level: usize, max_levels: usize },

    #[error("tile ({x}, {y}) out of bounds for level {level} (max {max_x}x{max_y})")]
    TileOutOfBounds {
        level: usize,
        x: u32,
        y: u32,
        max_x: u32,
        max_y: u32,
    },

    #[error("invalid JPEG quality {quality} (must be 1-100)")]
    InvalidQuality { quality: u8 },

    #[error("failed to decode tile: {0}")]
    DecodeFailed(String),

    #[error("invalid region request: {0}")]
    BadArg(String),

    /// JPEG decode failure surfaced by the encoder's re-decode step, carrying
    /// the underlying `image` crate error message.
    #[error("failed to decode JPEG: {message}")]
    DecodeError { message: String },

    /// JPEG encode failure surfaced by the encoder's re-encode step.
    #[error("failed to encode JPEG: {message}")]
    EncodeError { message: String },
}

/// Top-level error taxonomy for the core's public `Slide` handle, matching
/// the classes named by the original design: `OPEN_FAILED`, `IO_FAILED`,
/// `NOT_RECOGNIZED`, `BAD_TIFF`, `DECODE_FAILED`, `BAD_ARG`, `HASH_FAILED`.
///
/// Once a `Slide` records one of these in its terminal error slot, every
/// subsequent public call becomes a no-op returning a sentinel; `error()` is
/// the sole observer.
#[derive(Debug, Clone, Error)]
pub enum SlideError {
    #[error("open failed: {0}")]
    OpenFailed(String),

    #[error("I/O failed: {0}")]
    IoFailed(#[from] IoError),

    #[error("not recognized: {0}")]
    NotRecognized(String),

    #[error("bad TIFF structure: {0}")]
    BadTiff(#[from] TiffError),

    #[error("decode failed: {0}")]
    DecodeFailed(String),

    #[error("bad argument: {0}")]
    BadArg(String),

    #[error("hash failed: {0}")]
    HashFailed(String),
}

impl From<FormatError> for SlideError {
    fn from(e: FormatError) -> Self {
        match e {
            FormatError::Io(io) => SlideError::IoFailed(io),
            FormatError::Tiff(t) => SlideError::BadTiff(t),
            FormatError::UnsupportedFormat { reason } => SlideError::NotRecognized(reason),
        }
    }
}

impl From<TileError> for SlideError {
    fn from(e: TileError) -> Self {
        match e {
            TileError::Io(io) => SlideError::IoFailed(io),
            TileError::Slide(t) => SlideError::BadTiff(t),
            TileError::SlideNotFound { slide_id } => SlideError::NotRecognized(slide_id),
            TileError::InvalidLevel { level, max_levels } => {
                SlideError::BadArg(format!("invalid level {level} (max {max_levels})"))
            }
            TileError::TileOutOfBounds { .. } => SlideError::BadArg(e.to_string()),
            TileError::InvalidQuality { .. } => SlideError::BadArg(e.to_string()),
            TileError::DecodeFailed(msg) => SlideError::DecodeFailed(msg),
            TileError::BadArg(msg) => SlideError::BadArg(msg),
            TileError::DecodeError { message } => SlideError::DecodeFailed(message),
            TileError::EncodeError { message } => SlideError::DecodeFailed(message),
        }
    }
}
