//! HTTP request handlers for the WSI tile API.
//!
//! This module contains the Axum handlers for serving tiles, slide listings,
//! slide metadata, DZI descriptors, and health checks.
//!
//! # Endpoints
//!
//! - `GET /tiles/{slide_id}/{level}/{x}/{y}.jpg` - Serve a tile
//! - `GET /slides` - List available slides
//! - `GET /slides/{slide_id}` - Slide metadata (dimensions, levels)
//! - `GET /slides/{slide_id}/dzi` - Deep Zoom XML descriptor
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{IoError, TiffError, TileError};
use crate::slide::SlideSource;
use crate::tile::{TileRequest, TileService, DEFAULT_JPEG_QUALITY};

use super::dzi::generate_dzi_xml;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the tile service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<S: SlideSource> {
    /// The tile service for processing tile requests
    pub tile_service: Arc<TileService<S>>,

    /// Default cache control max-age in seconds (defaults to 1 hour)
    pub cache_max_age: u32,
}

impl<S: SlideSource> AppState<S> {
    /// Create a new application state with the given tile service.
    pub fn new(tile_service: TileService<S>) -> Self {
        Self {
            tile_service: Arc::new(tile_service),
            cache_max_age: 3600, // 1 hour default
        }
    }

    /// Create a new application state with custom cache max-age.
    pub fn with_cache_max_age(tile_service: TileService<S>, cache_max_age: u32) -> Self {
        Self {
            tile_service: Arc::new(tile_service),
            cache_max_age,
        }
    }
}

impl<S: SlideSource> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            tile_service: Arc::clone(&self.tile_service),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for tile requests.
///
/// Extracted from: `/tiles/{slide_id}/{level}/{x}/{y}.jpg`
#[derive(Debug, Deserialize)]
pub struct TilePathParams {
    /// Slide identifier (can be a relative path like "folder/slide.svs")
    pub slide_id: String,

    /// Pyramid level (0 = highest resolution)
    pub level: usize,

    /// Tile X coordinate (0-indexed from left)
    pub x: u32,

    /// Tile Y coordinate (0-indexed from top)
    pub y: u32,
}

/// Query parameters for tile requests.
#[derive(Debug, Deserialize)]
pub struct TileQueryParams {
    /// JPEG quality (1-100, defaults to 80)
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Signature for authentication (handled by auth middleware)
    #[serde(default)]
    pub sig: Option<String>,

    /// Expiry timestamp for authentication (handled by auth middleware)
    #[serde(default)]
    pub exp: Option<u64>,
}

fn default_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_request")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert TileError to HTTP response.
impl IntoResponse for TileError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            // 404 Not Found
            TileError::SlideNotFound { slide_id } => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Slide not found: {}", slide_id),
            ),

            // 400 Bad Request - Invalid parameters
            TileError::InvalidLevel { level, max_levels } => (
                StatusCode::BAD_REQUEST,
                "invalid_level",
                format!(
                    "Invalid level: {} (slide has {} levels, valid range: 0-{})",
                    level,
                    max_levels,
                    max_levels.saturating_sub(1)
                ),
            ),

            TileError::TileOutOfBounds {
                level,
                x,
                y,
                max_x,
                max_y,
            } => (
                StatusCode::BAD_REQUEST,
                "tile_out_of_bounds",
                format!(
                    "Tile coordinates ({}, {}) at level {} are out of bounds (max: {}, {})",
                    x,
                    y,
                    level,
                    max_x.saturating_sub(1),
                    max_y.saturating_sub(1)
                ),
            ),

            TileError::InvalidQuality { quality } => (
                StatusCode::BAD_REQUEST,
                "invalid_quality",
                format!("Invalid quality: {} (must be 1-100)", quality),
            ),

            // 415 Unsupported Media Type - Format not supported
            TileError::Slide(TiffError::UnsupportedCompression(compression)) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_format",
                format!("Unsupported compression: {} (only JPEG is supported)", compression),
            ),

            TileError::Slide(TiffError::StripOrganization) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_format",
                "Unsupported organization: file uses strips instead of tiles".to_string(),
            ),

            // 500 Internal Server Error - I/O and processing errors
            TileError::Io(io_err) => {
                // Map specific I/O errors
                match io_err {
                    IoError::NotFound(path) => (
                        StatusCode::NOT_FOUND,
                        "not_found",
                        format!("Resource not found: {}", path),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "io_error",
                        format!("I/O error: {}", io_err),
                    ),
                }
            }

            TileError::DecodeError { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "decode_error",
                format!("Failed to decode tile: {}", message),
            ),

            TileError::EncodeError { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "encode_error",
                format!("Failed to encode tile: {}", message),
            ),

            // Other slide/TIFF errors
            TileError::Slide(tiff_err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "slide_error",
                format!("Slide processing error: {}", tiff_err),
            ),
        };

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

/// Wrapper for handler errors to implement IntoResponse.
pub struct HandlerError(pub TileError);

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

impl From<TileError> for HandlerError {
    fn from(err: TileError) -> Self {
        HandlerError(err)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle tile requests.
///
/// # Endpoint
///
/// `GET /tiles/{slide_id}/{level}/{x}/{y}.jpg`
///
/// # Path Parameters
///
/// - `slide_id`: Slide identifier (URL-encoded if contains special characters)
/// - `level`: Pyramid level (0 = highest resolution)
/// - `x`: Tile X coordinate
/// - `y`: Tile Y coordinate
///
/// # Query Parameters
///
/// - `quality`: JPEG quality 1-100 (default: 80)
/// - `sig`: Authentication signature (optional, for signed URLs)
/// - `exp`: Signature expiry timestamp (optional, for signed URLs)
///
/// # Response
///
/// - `200 OK`: JPEG tile image with `Content-Type: image/jpeg`
/// - `400 Bad Request`: Invalid level or tile coordinates
/// - `404 Not Found`: Slide not found
/// - `415 Unsupported Media Type`: Slide format not supported
/// - `500 Internal Server Error`: Processing error
///
/// # Headers
///
/// - `Content-Type: image/jpeg`
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Tile-Cache-Hit: true|false`
pub async fn tile_handler<S: SlideSource>(
    State(state): State<AppState<S>>,
    Path(params): Path<TilePathParams>,
    Query(query): Query<TileQueryParams>,
) -> Result<Response, HandlerError> {
    // Build tile request
    let request = TileRequest::with_quality(
        &params.slide_id,
        params.level,
        params.x,
        params.y,
        query.quality,
    );

    // Get tile from service
    let response = state.tile_service.get_tile(request).await?;

    // Build HTTP response with appropriate headers
    let http_response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header(
            header::CACHE_CONTROL,
            format!("public, max-age={}", state.cache_max_age),
        )
        .header("X-Tile-Cache-Hit", response.cache_hit.to_string())
        .header("X-Tile-Quality", response.quality.to_string())
        .body(axum::body::Body::from(response.data))
        .unwrap();

    Ok(http_response)
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Slide Listing
// =============================================================================

/// Query parameters for the slide listing endpoint.
#[derive(Debug, Deserialize)]
pub struct SlidesQueryParams {
    /// Maximum number of slides to return.
    #[serde(default = "default_slides_limit")]
    pub limit: u32,

    /// Opaque pagination cursor from a previous response.
    #[serde(default)]
    pub cursor: Option<String>,
}

fn default_slides_limit() -> u32 {
    100
}

/// Response body for `GET /slides`.
#[derive(Debug, Serialize)]
pub struct SlidesResponse {
    /// Slide identifiers in this page.
    pub slides: Vec<String>,

    /// Cursor to pass as `?cursor=` to fetch the next page, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// List available slide identifiers.
///
/// # Endpoint
///
/// `GET /slides?limit=100&cursor=...`
pub async fn slides_handler<S: SlideSource>(
    State(state): State<AppState<S>>,
    Query(query): Query<SlidesQueryParams>,
) -> Result<Json<SlidesResponse>, HandlerError> {
    let result = state
        .tile_service
        .list_slides(query.limit, query.cursor.as_deref())
        .await
        .map_err(|e| HandlerError(TileError::Io(e)))?;

    Ok(Json(SlidesResponse {
        slides: result.slides,
        next_cursor: result.next_cursor,
    }))
}

// =============================================================================
// Slide Metadata
// =============================================================================

/// Metadata for a single pyramid level.
#[derive(Debug, Clone, Serialize)]
pub struct LevelMetadataResponse {
    /// Pyramid level (0 = highest resolution).
    pub level: usize,
    /// Level width in pixels.
    pub width: u32,
    /// Level height in pixels.
    pub height: u32,
    /// Tile width in pixels.
    pub tile_width: u32,
    /// Tile height in pixels.
    pub tile_height: u32,
    /// Number of tiles across.
    pub tiles_x: u32,
    /// Number of tiles down.
    pub tiles_y: u32,
    /// Downsample factor relative to level 0.
    pub downsample: f64,
}

/// Response body for `GET /slides/{slide_id}`.
#[derive(Debug, Clone, Serialize)]
pub struct SlideMetadataResponse {
    /// The slide identifier that was requested.
    pub slide_id: String,
    /// Detected format name (e.g. "Aperio SVS").
    pub format: String,
    /// Level-0 width in pixels.
    pub width: u32,
    /// Level-0 height in pixels.
    pub height: u32,
    /// Number of pyramid levels.
    pub level_count: usize,
    /// Per-level metadata, ordered from level 0 upward.
    pub levels: Vec<LevelMetadataResponse>,
}

/// Path parameters shared by the metadata/DZI/view endpoints.
#[derive(Debug, Deserialize)]
pub struct SlideIdPathParams {
    /// Slide identifier.
    pub slide_id: String,
}

async fn load_slide_metadata<S: SlideSource>(
    state: &AppState<S>,
    slide_id: &str,
) -> Result<SlideMetadataResponse, HandlerError> {
    let slide = state
        .tile_service
        .registry()
        .get_slide(slide_id)
        .await
        .map_err(|e| HandlerError(format_error_to_tile_error(slide_id, e)))?;

    let (width, height) = slide.dimensions().ok_or(HandlerError(TileError::InvalidLevel {
        level: 0,
        max_levels: 0,
    }))?;

    let levels = (0..slide.level_count())
        .filter_map(|level| {
            let info = slide.level_info(level)?;
            Some(LevelMetadataResponse {
                level,
                width: info.width,
                height: info.height,
                tile_width: info.tile_width,
                tile_height: info.tile_height,
                tiles_x: info.tiles_x,
                tiles_y: info.tiles_y,
                downsample: info.downsample,
            })
        })
        .collect();

    Ok(SlideMetadataResponse {
        slide_id: slide_id.to_string(),
        format: slide.format().name().to_string(),
        width,
        height,
        level_count: slide.level_count(),
        levels,
    })
}

fn format_error_to_tile_error(slide_id: &str, err: crate::error::FormatError) -> TileError {
    match err {
        crate::error::FormatError::Io(io_err) => {
            if matches!(io_err, IoError::NotFound(_)) {
                TileError::SlideNotFound {
                    slide_id: slide_id.to_string(),
                }
            } else {
                TileError::Io(io_err)
            }
        }
        crate::error::FormatError::Tiff(tiff_err) => TileError::Slide(tiff_err),
        crate::error::FormatError::UnsupportedFormat { reason } => {
            TileError::Slide(TiffError::InvalidTagValue {
                tag: "Format",
                message: reason,
            })
        }
    }
}

/// Serve metadata (dimensions, level count, per-level info) for a slide.
///
/// # Endpoint
///
/// `GET /slides/{slide_id}`
pub async fn slide_metadata_handler<S: SlideSource>(
    State(state): State<AppState<S>>,
    Path(params): Path<SlideIdPathParams>,
) -> Result<Json<SlideMetadataResponse>, HandlerError> {
    let metadata = load_slide_metadata(&state, &params.slide_id).await?;
    Ok(Json(metadata))
}

// =============================================================================
// DZI (Deep Zoom Image)
// =============================================================================

/// Serve a Deep Zoom XML descriptor for a slide.
///
/// # Endpoint
///
/// `GET /slides/{slide_id}/dzi`
pub async fn dzi_xml_handler<S: SlideSource>(
    State(state): State<AppState<S>>,
    Path(params): Path<SlideIdPathParams>,
) -> Result<Response, HandlerError> {
    let metadata = load_slide_metadata(&state, &params.slide_id).await?;
    let tile_size = metadata.levels.first().map(|l| l.tile_width).unwrap_or(256);
    let xml = generate_dzi_xml(metadata.width, metadata.height, tile_size);

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/xml")
        .body(axum::body::Body::from(xml))
        .unwrap())
}

// =============================================================================
// Viewer
// =============================================================================

/// Serve an HTML page with an OpenSeadragon viewer for a slide.
///
/// # Endpoint
///
/// `GET /view/{slide_id}`
pub async fn view_handler<S: SlideSource>(
    State(state): State<AppState<S>>,
    Path(params): Path<SlideIdPathParams>,
) -> Result<Html<String>, HandlerError> {
    let metadata = load_slide_metadata(&state, &params.slide_id).await?;
    let html = super::viewer::generate_viewer_html(&params.slide_id, &metadata, "", "");
    Ok(Html(html))
}

// =============================================================================
// Tests
// =============================================================================
