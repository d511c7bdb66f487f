//! # WSI Streamer
//!
//! Remote random-access I/O and a tiled-pyramid read path for whole-slide
//! microscopy images (WSI), plus an ambient HTTP tile server built on top.
//!
//! A WSI is a pyramid of downsampled, tiled images wrapped in a TIFF-like
//! container; a typical file is tens of gigabytes, so this crate never loads
//! a whole image into memory. It fetches, decodes, and caches tiles on
//! demand from a local file or an HTTP(S) byte-range endpoint.
//!
//! ## Core (library)
//!
//! - A byte-range-addressed remote/local file abstraction
//!   ([`io::RangeReader`]) with a fixed-size block cache and multi-threaded
//!   sub-block prefetch on miss ([`io::BlockCache`]).
//! - A process-wide registry mapping URL to a live byte source, so
//!   concurrent readers of the same slide share one cache
//!   ([`io::registry::ByteSourceRegistry`]).
//! - A bounded handle pool for the tiled read path
//!   ([`io::handle_pool::TiffHandlePool`]).
//! - A tile decoder (fast-path JPEG to pre-multiplied ARGB32,
//!   [`tile::decoder`]) and a region compositor that maps `(level, x, y, w,
//!   h)` requests to tiles, clips boundaries, and blits into a caller buffer
//!   ([`tile::region::read_region`]).
//! - A quickhash-1 collaborator streaming a slide's bytes through SHA-256
//!   ([`hash::QuickHash`]).
//! - [`slide::Slide`]: the ergonomic, idiomatic-Rust stand-in for the
//!   original C-style `open`/`read_region`/`get_error` public API.
//!
//! ## Ambient HTTP server (binary)
//!
//! - [`mod@format`] - TIFF/SVS parsers and JPEG handling
//! - [`slide`] - Slide abstraction and registry
//! - [`tile`] - Tile service and encoding
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use wsi_streamer::Cli;
//! use clap::Parser;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cli = Cli::parse();
//!
//!     match cli.into_command() {
//!         wsi_streamer::Command::Serve(config) => {
//!             config.validate().expect("Invalid configuration");
//!             println!("Starting server on {}", config.bind_address());
//!         }
//!         wsi_streamer::Command::Sign(_config) => {
//!             // Generate signed URL
//!         }
//!         wsi_streamer::Command::Check(_config) => {
//!             // Validate storage reachability
//!         }
//!     }
//! }
//! ```
//!
//! ## Example: reading a region directly
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), wsi_streamer::error::SlideError> {
//! use wsi_streamer::slide::Slide;
//!
//! let slide = Slide::open("file:///data/slides/example.svs").await?;
//! let mut dst = vec![0u8; 256 * 256 * 4];
//! slide.read_region(&mut dst, 0, 0, 0, 256, 256).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod hash;
pub mod io;
pub mod server;
pub mod slide;
pub mod tile;

// Re-export commonly used types
pub use config::{CheckConfig, Cli, Command, ServeConfig, SignConfig, SignOutputFormat};
pub use error::{FormatError, IoError, SlideError, TiffError, TileError};
pub use format::tiff::{
    check_compression, check_tile_tags, check_tiled, parse_u32_array, parse_u64_array,
    validate_ifd, validate_ifd_strict, validate_level, validate_pyramid, ByteOrder, Compression,
    FieldType, Ifd, IfdEntry, PyramidLevel, TiffHeader, TiffPyramid, TiffTag, TileData,
    ValidationError, ValidationResult, ValueReader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE,
};
pub use format::{detect_format, is_tiff_header, SlideFormat};
pub use format::{
    is_abbreviated_stream, is_complete_stream, merge_jpeg_tables, prepare_tile_jpeg,
    GenericTiffLevelData, GenericTiffReader, SvsLevelData, SvsMetadata, SvsReader,
};
pub use hash::{QuickHash, QuickHashError};
pub use io::{
    AnyRangeReader, BlockCache, ByteSourceRegistry, HandlePoolGuard, HttpRangeReader,
    LocalRangeReader, RangeReader, RegistryConfig, TiffHandlePool, HANDLE_CACHE_MAX,
};
pub use server::{
    auth_middleware, create_dev_router, create_production_router, create_router, health_handler,
    slide_metadata_handler, slides_handler, tile_handler, AppState, AuthError, AuthQueryParams,
    ErrorResponse, HealthResponse, LevelMetadataResponse, OptionalAuth, RouterConfig,
    SignedUrlAuth, SlideMetadataResponse, SlidesQueryParams, SlidesResponse, TilePathParams,
    TileQueryParams,
};
pub use slide::{
    CachedSlide, LevelInfo, Slide, SlideListResult, SlideReader, SlideRegistry, SlideSource,
    UrlSlideSource,
};
pub use tile::{
    clamp_quality, decode_jpeg_tile, is_valid_quality, read_region, DecodedTile, JpegTileEncoder,
    TileCache, TileCacheKey, TileRequest, TileResponse, TileService, DEFAULT_JPEG_QUALITY,
    DEFAULT_TILE_CACHE_CAPACITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
