//! Slide abstraction layer.
//!
//! This module provides a unified interface for working with Whole Slide Images
//! regardless of their underlying format.
//!
//! # Architecture
//!
//! The slide abstraction layer sits between the format-specific parsers and the
//! tile service:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            SlideRegistry                │
//! │  (caches slides, auto-detects format)   │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           SlideReader Trait             │
//! │  (format-agnostic slide interface)      │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │   SvsReader     │    │ GenericTiffReader   │
//! │  (SVS format)   │    │ (standard TIFF)     │
//! └─────────────────┘    └─────────────────────┘
//! ```
//!
//! # Usage
//!
//! The registry-backed path (used by the ambient HTTP server, which keeps
//! its own slide-metadata LRU across many requests):
//!
//! ```ignore
//! use std::sync::Arc;
//! use wsi_streamer::io::ByteSourceRegistry;
//! use wsi_streamer::slide::{SlideRegistry, UrlSlideSource};
//!
//! let byte_sources = Arc::new(ByteSourceRegistry::new(Default::default()));
//! let source = UrlSlideSource::local("/data/slides", byte_sources);
//! let registry = SlideRegistry::new(source);
//!
//! let slide = registry.get_slide("example.svs").await?;
//! let tile = slide.read_tile(0, 0, 0).await?;
//! ```
//!
//! The standalone path (a single slide handle, no registry required):
//!
//! ```ignore
//! use wsi_streamer::slide::Slide;
//!
//! let slide = Slide::open("file:///data/slides/example.svs").await?;
//! let mut dst = vec![0u8; 256 * 256 * 4];
//! slide.read_region(&mut dst, 0, 0, 0, 256, 256).await?;
//! ```

pub mod handle;
mod reader;
mod registry;
mod url_source;

pub use handle::Slide;
pub use reader::{LevelInfo, SlideReader};
pub use registry::{CachedSlide, SlideListResult, SlideRegistry, SlideSource};
pub use url_source::UrlSlideSource;
