//! Component E: the region compositor. Translates `(level, x, y, w, h)` into
//! tile iteration, drives the decoder per tile, and blits into the caller's
//! destination buffer.
//!
//! Grounded in [`crate::tile::service::TileService::generate_thumbnail`]'s
//! tile-iteration-and-blit loop, generalized from "whole thumbnail" to an
//! arbitrary pixel rectangle at an arbitrary level, and switched from
//! re-encoded JPEG tiles to direct ARGB32 compositing so there is no
//! encode/decode round-trip on the read path.

use std::sync::Arc;

use crate::error::TileError;
use crate::io::handle_pool::TiffHandlePool;
use crate::io::RangeReader;
use crate::slide::registry::CachedSlide;

use super::decoder::decode_jpeg_tile;

/// Read a `w x h` region of `level`-local pixels starting at level-0
/// coordinate `(x, y)` into `dst`, a pre-multiplied ARGB32 buffer of exactly
/// `w * h * 4` bytes with stride `4 * w`.
///
/// `dst` is assumed already zeroed by the caller; this function only ever
/// writes pixels that fall within both the requested rectangle and the
/// slide's true level dimensions, which is what produces boundary clipping
/// and missing-tile transparency for free — untouched bytes stay zero.
///
/// `handle_pool` bounds the number of live TIFF reader identities checked out
/// concurrently across the whole process (component C); this call checks one
/// out per tile and returns it once that tile is composited.
pub async fn read_region<R: RangeReader + 'static>(
    slide: &CachedSlide<R>,
    handle_pool: &TiffHandlePool<()>,
    dst: &mut [u8],
    x: u32,
    y: u32,
    level: usize,
    w: u32,
    h: u32,
) -> Result<(), TileError> {
    if level >= slide.level_count() {
        return Err(TileError::InvalidLevel {
            level,
            max_levels: slide.level_count(),
        });
    }
    if w == 0 || h == 0 {
        return Err(TileError::BadArg(format!("region size must be non-zero, got {w}x{h}")));
    }
    if dst.len() != w as usize * h as usize * 4 {
        return Err(TileError::BadArg(format!(
            "destination buffer is {} bytes, expected {} for a {w}x{h} ARGB32 region",
            dst.len(),
            w as usize * h as usize * 4
        )));
    }

    let info = slide.level_info(level).ok_or(TileError::InvalidLevel {
        level,
        max_levels: slide.level_count(),
    })?;

    // Step 2: translate (x, y) from level-0 to level-local coordinates.
    let downsample = info.downsample.max(1.0);
    let local_x = (x as f64 / downsample).floor() as u32;
    let local_y = (y as f64 / downsample).floor() as u32;

    let tw = info.tile_width;
    let th = info.tile_height;
    if tw == 0 || th == 0 {
        return Err(TileError::BadArg("slide reports a zero-sized tile".into()));
    }

    // Step 3: covering tile range.
    let col_start = local_x / tw;
    let col_end = (local_x + w).div_ceil(tw).min(info.tiles_x);
    let row_start = local_y / th;
    let row_end = (local_y + h).div_ceil(th).min(info.tiles_y);

    for row in row_start..row_end {
        for col in col_start..col_end {
            let tile_x0 = col * tw;
            let tile_y0 = row * th;

            // Intersection of the tile rectangle with the requested
            // rectangle and the slide's true level dimensions.
            let ix0 = tile_x0.max(local_x);
            let iy0 = tile_y0.max(local_y);
            let ix1 = (tile_x0 + tw).min(local_x + w).min(info.width);
            let iy1 = (tile_y0 + th).min(local_y + h).min(info.height);

            if ix0 >= ix1 || iy0 >= iy1 {
                continue;
            }

            if slide.is_tile_missing(level, col, row) {
                // Missing tile: leave dst zeroed for this intersection.
                continue;
            }

            let guard = handle_pool.checkout_guarded(|| Arc::new(())).await;
            let jpeg = slide.read_tile(level, col, row).await?;
            let tile = decode_jpeg_tile(&jpeg, tw, th)?;
            drop(guard);

            let tile_stride = tw as usize * 4;
            let dst_stride = w as usize * 4;

            for yy in iy0..iy1 {
                let tile_row = (yy - tile_y0) as usize * tile_stride;
                let dst_row = (yy - local_y) as usize * dst_stride;
                let row_bytes = (ix1 - ix0) as usize * 4;
                let tile_off = tile_row + (ix0 - tile_x0) as usize * 4;
                let dst_off = dst_row + (ix0 - local_x) as usize * 4;
                dst[dst_off..dst_off + row_bytes]
                    .copy_from_slice(&tile.pixels[tile_off..tile_off + row_bytes]);
            }
        }
    }

    Ok(())
}
