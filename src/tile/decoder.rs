//! Component D: decode one compressed tile to a pre-multiplied ARGB32 buffer.
//!
//! Grounded in [`crate::tile::encoder::JpegTileEncoder`] for "wrap the
//! `image` crate's JPEG codec behind a small, slide-shaped API" but running
//! the opposite direction — decode rather than encode — and targeting the
//! ARGB32 destination format the region compositor writes into rather than a
//! re-encoded JPEG response body.
//!
//! This crate's TIFF readers only accept JPEG-compressed pyramids
//! (`TiffError::UnsupportedCompression` rejects anything else at open time),
//! so the `read_direct` fast path from the data model is unconditional here:
//! there is no TIFF-RGBA fallback codec to fall back to, because every tile
//! that reaches this decoder is already known to be JPEG. See DESIGN.md for
//! why that fallback path is a documented stub rather than a second codec.

use image::ImageFormat;

use crate::error::TileError;

/// One decoded tile: pre-multiplied ARGB32 pixels, little-endian, stride
/// `4 * tile_width`.
pub struct DecodedTile {
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes, byte order per pixel is `[B, G, R, A]`.
    pub pixels: Vec<u8>,
}

impl DecodedTile {
    /// An all-transparent tile of the given nominal size, used for missing
    /// tiles (`TILEBYTECOUNTS[t] == 0`) and as the TIFF-RGBA fallback stub.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; width as usize * height as usize * 4],
        }
    }
}

/// Decode a complete JPEG tile stream (already merged with JPEGTables by the
/// format reader) into a `tile_width x tile_height` ARGB32 buffer.
///
/// JPEG carries no alpha channel, so every decoded pixel gets full opacity;
/// pre-multiplication by alpha=255 is the identity, so the RGB bytes are
/// copied through unchanged.
///
/// If the decoded image is smaller than the nominal tile size — true for
/// right/bottom-edge tiles whose encoder only wrote the valid sub-rectangle
/// — the returned buffer is still `tile_width x tile_height`, zero-padded
/// beyond the decoded extent. This is what gives boundary clipping (data
/// model invariant: "last-column tile width `k < tile_w` ⇒ columns
/// `[k, tile_w)` are zero in the output").
pub fn decode_jpeg_tile(
    jpeg_data: &[u8],
    tile_width: u32,
    tile_height: u32,
) -> Result<DecodedTile, TileError> {
    let image = image::load_from_memory_with_format(jpeg_data, ImageFormat::Jpeg)
        .map_err(|e| TileError::DecodeFailed(e.to_string()))?;
    let rgb = image.into_rgb8();
    let (decoded_w, decoded_h) = (rgb.width(), rgb.height());

    if decoded_w > tile_width || decoded_h > tile_height {
        return Err(TileError::DecodeFailed(format!(
            "decoded tile {}x{} exceeds nominal tile size {}x{}",
            decoded_w, decoded_h, tile_width, tile_height
        )));
    }

    let mut pixels = vec![0u8; tile_width as usize * tile_height as usize * 4];
    let stride = tile_width as usize * 4;
    let raw = rgb.as_raw();
    let src_stride = decoded_w as usize * 3;

    for y in 0..decoded_h as usize {
        let src_row = &raw[y * src_stride..y * src_stride + src_stride];
        let dst_row_start = y * stride;
        for x in 0..decoded_w as usize {
            let (r, g, b) = (src_row[x * 3], src_row[x * 3 + 1], src_row[x * 3 + 2]);
            let px = dst_row_start + x * 4;
            pixels[px] = b;
            pixels[px + 1] = g;
            pixels[px + 2] = r;
            pixels[px + 3] = 0xFF;
        }
    }

    Ok(DecodedTile {
        width: tile_width,
        height: tile_height,
        pixels,
    })
}
