//! Generic pyramidal TIFF reader.
//!
//! This module provides support for reading standard pyramidal TIFF files
//! that use tiled organization with JPEG compression.
//!
//! # Supported Files
//!
//! This reader supports TIFF files that:
//! - Use tiled organization (not strips)
//! - Use JPEG compression (compression tag = 7)
//! - Have multiple resolution levels (pyramid structure)
//!
//! # Unsupported Files
//!
//! Files that don't meet these requirements return an error that can be
//! mapped to HTTP 415 Unsupported Media Type:
//! - Strip-based TIFFs
//! - Non-JPEG compression (LZW, Deflate, JPEG2000, etc.)
//! - Single-level TIFFs without pyramid structure

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::jpeg::prepare_tile_jpeg;
use super::tiff::{
    validate_pyramid, PyramidLevel, TiffHeader, TiffPyramid, TileData, ValidationResult,
};

// =============================================================================
// Generic TIFF Level Data
// =============================================================================

/// Data for a single pyramid level in a generic TIFF file.
#[derive(Debug, Clone)]
pub struct GenericTiffLevelData {
    /// The pyramid level metadata
    pub level: PyramidLevel,

    /// Tile offsets and byte counts
    pub tile_data: TileData,
}

impl GenericTiffLevelData {
    /// Get the offset and size for a specific tile.
    pub fn get_tile_location(&self, tile_x: u32, tile_y: u32) -> Option<(u64, u64)> {
        let tile_index = self.level.tile_index(tile_x, tile_y)?;
        self.tile_data.get_tile_location(tile_index)
    }

    /// Get the JPEGTables for this level (if present).
    pub fn jpeg_tables(&self) -> Option<&Bytes> {
        self.tile_data.jpeg_tables.as_ref()
    }

    /// Byte count recorded for a tile, or `None` if the coordinates are out
    /// of range for this level. A byte count of `0` means the tile is
    /// legitimately absent (`TILEBYTECOUNTS[t] == 0`) rather than an error —
    /// callers should treat that as "render transparent", not a decode
    /// failure.
    pub fn tile_byte_count(&self, tile_x: u32, tile_y: u32) -> Option<u64> {
        let tile_index = self.level.tile_index(tile_x, tile_y)?;
        self.tile_data
            .get_tile_location(tile_index)
            .map(|(_, byte_count)| byte_count)
    }
}

// =============================================================================
// Generic TIFF Reader
// =============================================================================

/// Reader for generic pyramidal TIFF files.
///
/// This reader handles standard tiled TIFF files with JPEG compression.
/// It validates the file structure on open and rejects unsupported configurations.
#[derive(Debug)]
pub struct GenericTiffReader {
    /// Parsed TIFF pyramid structure
    pyramid: TiffPyramid,

    /// Level data including tile offsets and optional JPEGTables
    levels: Vec<GenericTiffLevelData>,

    /// Validation warnings (non-fatal issues)
    warnings: Vec<String>,
}

impl GenericTiffReader {
    /// Open a generic pyramidal TIFF file.
    ///
    /// This reads the TIFF structure, validates it meets requirements,
    /// and loads tile offset arrays.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file is not a valid TIFF
    /// - The file uses strip organization (not tiles)
    /// - The file uses unsupported compression (not JPEG)
    /// - No pyramid levels are found
    pub async fn open<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        // Parse the TIFF pyramid structure
        let pyramid = TiffPyramid::parse(reader).await?;

        // Validate the pyramid meets our requirements
        let validation = validate_pyramid(&pyramid);
        if !validation.is_valid {
            return Err(validation.into_result().unwrap_err());
        }

        // Store warnings for later inspection
        let warnings = validation.warnings;

        // Load tile data for each pyramid level
        let mut levels = Vec::with_capacity(pyramid.levels.len());
        for level in &pyramid.levels {
            let tile_data = TileData::load(reader, level, &pyramid.header).await?;
            levels.push(GenericTiffLevelData {
                level: level.clone(),
                tile_data,
            });
        }

        Ok(GenericTiffReader {
            pyramid,
            levels,
            warnings,
        })
    }

    /// Open a generic pyramidal TIFF with detailed validation result.
    ///
    /// This is like `open()` but returns the validation result separately,
    /// allowing access to warnings even on success.
    pub async fn open_with_validation<R: RangeReader>(
        reader: &R,
    ) -> Result<(Self, ValidationResult), TiffError> {
        // Parse the TIFF pyramid structure
        let pyramid = TiffPyramid::parse(reader).await?;

        // Validate the pyramid
        let validation = validate_pyramid(&pyramid);
        if !validation.is_valid {
            return Err(validation.clone().into_result().unwrap_err());
        }

        // Load tile data for each pyramid level
        let mut levels = Vec::with_capacity(pyramid.levels.len());
        for level in &pyramid.levels {
            let tile_data = TileData::load(reader, level, &pyramid.header).await?;
            levels.push(GenericTiffLevelData {
                level: level.clone(),
                tile_data,
            });
        }

        let reader = GenericTiffReader {
            pyramid,
            levels,
            warnings: validation.warnings.clone(),
        };

        Ok((reader, validation))
    }

    /// Get the TIFF header.
    pub fn header(&self) -> &TiffHeader {
        &self.pyramid.header
    }

    /// Get validation warnings from file open.
    ///
    /// Warnings indicate non-fatal issues like unusual tile dimensions.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Get the number of pyramid levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Get data for a specific pyramid level.
    pub fn get_level(&self, level: usize) -> Option<&GenericTiffLevelData> {
        self.levels.get(level)
    }

    /// Get dimensions of the full-resolution (level 0) image.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.levels.first().map(|l| (l.level.width, l.level.height))
    }

    /// Get dimensions of a specific level.
    pub fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.levels
            .get(level)
            .map(|l| (l.level.width, l.level.height))
    }

    /// Get the downsample factor for a level.
    pub fn level_downsample(&self, level: usize) -> Option<f64> {
        self.levels.get(level).map(|l| l.level.downsample)
    }

    /// Get tile size for a level.
    pub fn tile_size(&self, level: usize) -> Option<(u32, u32)> {
        self.levels
            .get(level)
            .map(|l| (l.level.tile_width, l.level.tile_height))
    }

    /// Get the number of tiles in X and Y directions for a level.
    pub fn tile_count(&self, level: usize) -> Option<(u32, u32)> {
        self.levels
            .get(level)
            .map(|l| (l.level.tiles_x, l.level.tiles_y))
    }

    /// Read raw tile data from the file.
    ///
    /// This reads the raw bytes from the file without any processing.
    pub async fn read_raw_tile<R: RangeReader>(
        &self,
        reader: &R,
        level: usize,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Bytes, TiffError> {
        let level_data = self.levels.get(level).ok_or(TiffError::InvalidTagValue {
            tag: "level",
            message: format!("level {} out of range (max {})", level, self.levels.len()),
        })?;

        let (offset, size) =
            level_data
                .get_tile_location(tile_x, tile_y)
                .ok_or(TiffError::InvalidTagValue {
                    tag: "tile",
                    message: format!(
                        "tile ({}, {}) out of range for level {}",
                        tile_x, tile_y, level
                    ),
                })?;

        let data = reader.read_exact_at(offset, size as usize).await?;
        Ok(data)
    }

    /// Read a tile and prepare it for JPEG decoding.
    ///
    /// This reads the tile data and merges it with JPEGTables if the tile
    /// contains an abbreviated JPEG stream (rare for generic TIFF but handled).
    ///
    /// # Arguments
    /// * `reader` - Range reader for the file
    /// * `level` - Pyramid level index
    /// * `tile_x` - Tile X coordinate
    /// * `tile_y` - Tile Y coordinate
    ///
    /// # Returns
    /// Complete JPEG data ready for decoding.
    pub async fn read_tile<R: RangeReader>(
        &self,
        reader: &R,
        level: usize,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Bytes, TiffError> {
        // Read raw tile data
        let raw_data = self.read_raw_tile(reader, level, tile_x, tile_y).await?;

        // Get JPEGTables for this level (may not be present in generic TIFF)
        let level_data = self.levels.get(level).ok_or(TiffError::InvalidTagValue {
            tag: "level",
            message: format!("level {} out of range", level),
        })?;

        let tables = level_data.jpeg_tables();

        // Prepare the JPEG data (merge tables if needed)
        let jpeg_data = prepare_tile_jpeg(tables.map(|t| t.as_ref()), &raw_data);

        Ok(jpeg_data)
    }

    /// Whether tile `(tile_x, tile_y)` at `level` is a legitimately missing
    /// tile (`TILEBYTECOUNTS[t] == 0`). Returns `false` for out-of-range
    /// coordinates too — callers should bounds-check separately.
    pub fn is_tile_missing(&self, level: usize, tile_x: u32, tile_y: u32) -> bool {
        self.levels
            .get(level)
            .and_then(|l| l.tile_byte_count(tile_x, tile_y))
            == Some(0)
    }

    /// Find the best level for a given downsample factor.
    ///
    /// Returns the level with the smallest downsample that is >= the requested factor.
    pub fn best_level_for_downsample(&self, downsample: f64) -> Option<usize> {
        self.pyramid
            .best_level_for_downsample(downsample)
            .map(|l| l.level_index)
    }
}

// =============================================================================
// Tests
// =============================================================================
