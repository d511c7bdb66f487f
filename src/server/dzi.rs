//! Deep Zoom Image (DZI) compatibility module.
//!
//! This module provides DZI-compatible endpoints for integration with
//! OpenSeadragon and other Deep Zoom-compatible viewers.
//!
//! # DZI Format Overview
//!
//! Deep Zoom uses an inverted level numbering compared to WSI pyramids:
//! - DZI level 0 = 1x1 pixel (lowest resolution)
//! - DZI max level = full resolution (highest resolution)
//!
//! WSI pyramids typically use:
//! - Level 0 = full resolution (highest resolution)
//! - Level N = lowest resolution
//!
//! This module handles the level mapping between these two conventions.

/// Generate DZI XML descriptor for a slide.
///
/// # Example Output
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Image xmlns="http://schemas.microsoft.com/deepzoom/2008"
///        TileSize="256"
///        Overlap="0"
///        Format="jpg">
///   <Size Width="46920" Height="33600" />
/// </Image>
/// ```
pub fn generate_dzi_xml(width: u32, height: u32, tile_size: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Image xmlns="http://schemas.microsoft.com/deepzoom/2008"
       TileSize="{tile_size}"
       Overlap="0"
       Format="jpg">
  <Size Width="{width}" Height="{height}" />
</Image>"#
    )
}

/// Calculate the maximum DZI level for given image dimensions.
///
/// DZI levels go from 0 (1x1) to max_level (full resolution).
/// max_level = ceil(log2(max(width, height)))
pub fn calculate_max_dzi_level(width: u32, height: u32) -> usize {
    let max_dim = width.max(height) as f64;
    if max_dim <= 1.0 {
        return 0;
    }
    max_dim.log2().ceil() as usize
}

/// Calculate dimensions at a specific DZI level.
///
/// At DZI level L, the dimensions are:
/// - width = ceil(original_width / 2^(max_level - L))
/// - height = ceil(original_height / 2^(max_level - L))
pub fn dzi_level_dimensions(
    width: u32,
    height: u32,
    dzi_level: usize,
    max_dzi_level: usize,
) -> (u32, u32) {
    if dzi_level > max_dzi_level {
        return (0, 0);
    }

    let scale = 1u32 << (max_dzi_level - dzi_level);
    let level_width = width.div_ceil(scale);
    let level_height = height.div_ceil(scale);

    (level_width.max(1), level_height.max(1))
}

/// Calculate the downsample factor for a DZI level.
///
/// Returns the factor by which the full resolution is downsampled at this level.
pub fn dzi_level_downsample(dzi_level: usize, max_dzi_level: usize) -> f64 {
    if dzi_level > max_dzi_level {
        return 0.0;
    }
    (1u64 << (max_dzi_level - dzi_level)) as f64
}

/// Find the best WSI level for a given DZI level.
///
/// Given a list of WSI level downsamples (level 0 = 1.0, higher levels = larger downsamples),
/// finds the WSI level that best matches the requested DZI level.
///
/// Returns `(wsi_level, additional_scale)` where:
/// - `wsi_level` is the WSI pyramid level to read from
/// - `additional_scale` is any additional downsampling needed
pub fn find_best_wsi_level(
    wsi_level_downsamples: &[f64],
    dzi_downsample: f64,
) -> Option<(usize, f64)> {
    if wsi_level_downsamples.is_empty() {
        return None;
    }

    // Find the WSI level with the smallest downsample that is >= dzi_downsample
    // (i.e., the highest resolution level that doesn't need upscaling)
    let mut best_level = 0;
    let mut best_downsample = wsi_level_downsamples[0];

    for (level, &downsample) in wsi_level_downsamples.iter().enumerate() {
        if downsample <= dzi_downsample && downsample >= best_downsample {
            best_level = level;
            best_downsample = downsample;
        }
    }

    // Calculate additional scale factor needed
    let additional_scale = dzi_downsample / best_downsample;

    Some((best_level, additional_scale))
}

/// Parse DZI tile coordinates from a filename like "3_5.jpg" or "3_5".
///
/// Returns `(x, y)` coordinates.
pub fn parse_dzi_tile_coords(filename: &str) -> Option<(u32, u32)> {
    // Strip .jpg or .jpeg extension if present
    let name = filename
        .strip_suffix(".jpg")
        .or_else(|| filename.strip_suffix(".jpeg"))
        .unwrap_or(filename);

    // Parse "x_y" format
    let parts: Vec<&str> = name.split('_').collect();
    if parts.len() != 2 {
        return None;
    }

    let x: u32 = parts[0].parse().ok()?;
    let y: u32 = parts[1].parse().ok()?;

    Some((x, y))
}

/// Calculate tile count at a DZI level.
pub fn dzi_tile_count(level_width: u32, level_height: u32, tile_size: u32) -> (u32, u32) {
    let tiles_x = level_width.div_ceil(tile_size);
    let tiles_y = level_height.div_ceil(tile_size);
    (tiles_x.max(1), tiles_y.max(1))
}
