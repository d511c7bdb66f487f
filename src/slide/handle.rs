//! Public-facing slide handle.
//!
//! Wires the byte-source registry (component B), the TIFF handle pool
//! (component C), the tile decoder (component D) and the region compositor
//! (component E) behind the ergonomic API a consumer of this library would
//! actually reach for: [`Slide::open`] and [`Slide::read_region`]. This is
//! the idiomatic Rust stand-in for the original design's C-callable surface
//! (`open`/`close`/`get_level_count`/`read_region`/`get_error`) — see
//! DESIGN.md for why a full C ABI is out of scope.
//!
//! Once a read fails, the `Slide` records the failure in a terminal error
//! slot: every later call returns the same error without attempting further
//! I/O, and `error()` is the only way to observe it. This mirrors the
//! original's documented behavior that a slide object, once broken, stays
//! broken for its remaining lifetime.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::error::SlideError;
use crate::io::handle_pool::TiffHandlePool;
use crate::io::registry::{AnyRangeReader, ByteSourceRegistry, RegistryConfig};
use crate::tile::region::read_region;

use super::registry::CachedSlide;

/// Process-wide byte-source registry shared by every [`Slide`] opened
/// through [`Slide::open`]. Lazily initialized on first use so that opening
/// a `Slide` never requires the caller to thread a registry through.
static GLOBAL_REGISTRY: OnceLock<Arc<ByteSourceRegistry>> = OnceLock::new();

fn global_registry() -> Arc<ByteSourceRegistry> {
    GLOBAL_REGISTRY
        .get_or_init(|| Arc::new(ByteSourceRegistry::new(RegistryConfig::default())))
        .clone()
}

/// An open whole-slide image, ready for region reads.
///
/// `Slide` is cheap to clone-share: internally it holds only `Arc`s, so
/// handing a `Slide` to multiple readers doesn't duplicate the underlying
/// byte cache or parsed pyramid metadata.
pub struct Slide {
    cached: Arc<CachedSlide<AnyRangeReader>>,
    handle_pool: TiffHandlePool<()>,
    error: OnceLock<SlideError>,
}

impl Slide {
    /// Open a slide from a `file://` path, bare filesystem path, or
    /// `http(s)://` URL, using the process-wide byte-source registry.
    pub async fn open(url: &str) -> Result<Self, SlideError> {
        Self::open_with_registry(url, &global_registry()).await
    }

    /// Open a slide located under `root` on the local filesystem, joining
    /// `relative_path` onto it. Convenience wrapper around [`Slide::open`]
    /// for the common local-storage-root case.
    pub async fn open_local(root: impl AsRef<Path>, relative_path: &str) -> Result<Self, SlideError> {
        let full = root.as_ref().join(relative_path);
        let url = format!("file://{}", full.display());
        Self::open(&url).await
    }

    /// Open a slide using a caller-supplied registry, e.g. one shared with
    /// an ambient server process instead of the process-wide default.
    pub async fn open_with_registry(
        url: &str,
        registry: &ByteSourceRegistry,
    ) -> Result<Self, SlideError> {
        let reader = registry.get_or_open(url).await?;
        let cached = CachedSlide::open(reader).await?;
        Ok(Self {
            cached: Arc::new(cached),
            handle_pool: TiffHandlePool::new(),
            error: OnceLock::new(),
        })
    }

    /// Number of pyramid levels, or `0` if this slide is in its terminal
    /// error state.
    pub fn level_count(&self) -> usize {
        if self.error.get().is_some() {
            return 0;
        }
        self.cached.level_count()
    }

    /// Dimensions of `level`, or `None` if `level` is out of range or the
    /// slide is in its terminal error state.
    pub fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        if self.error.get().is_some() {
            return None;
        }
        self.cached.level_dimensions(level)
    }

    /// Dimensions of the full-resolution (level 0) image.
    pub fn level0_dimensions(&self) -> Option<(u32, u32)> {
        self.level_dimensions(0)
    }

    /// Downsample factor of `level` relative to level 0.
    pub fn level_downsample(&self, level: usize) -> Option<f64> {
        if self.error.get().is_some() {
            return None;
        }
        self.cached.level_downsample(level)
    }

    /// Find the level whose downsample factor best matches `downsample`
    /// without exceeding it, falling back to the coarsest level available.
    pub fn best_level_for_downsample(&self, downsample: f64) -> Option<usize> {
        if self.error.get().is_some() {
            return None;
        }
        self.cached.best_level_for_downsample(downsample)
    }

    /// Read a `w x h` region of `level`-local pixels starting at level-0
    /// coordinate `(x, y)` into `dst`, a pre-multiplied ARGB32 buffer of
    /// exactly `w * h * 4` bytes.
    ///
    /// On failure (including a prior terminal error), `dst` is zeroed and
    /// the error is recorded (if not already set) before being returned.
    pub async fn read_region(
        &self,
        dst: &mut [u8],
        x: u32,
        y: u32,
        level: usize,
        w: u32,
        h: u32,
    ) -> Result<(), SlideError> {
        if let Some(err) = self.error.get() {
            dst.fill(0);
            return Err(err.clone());
        }

        match read_region(&self.cached, &self.handle_pool, dst, x, y, level, w, h).await {
            Ok(()) => Ok(()),
            Err(e) => {
                dst.fill(0);
                let slide_err: SlideError = e.into();
                // `OnceLock::set` only keeps the first write; that is exactly
                // the terminal-error semantics we want.
                let _ = self.error.set(slide_err.clone());
                Err(slide_err)
            }
        }
    }

    /// The terminal error recorded by a prior failed call, if any. `Slide`
    /// never clears this once set.
    pub fn error(&self) -> Option<&SlideError> {
        self.error.get()
    }
}
