//! Byte-level I/O layer: seekable byte sources, block caching, the process-wide
//! byte-source registry, and the TIFF handle pool.
//!
//! This is the foundation every other module builds on. A [`RangeReader`] is the
//! uniform "byte source" abstraction over local files or HTTP range-GETs;
//! [`BlockCache`] wraps one in a fixed-size compressed-byte cache with
//! multi-threaded prefetch on miss; [`registry`] keeps at most one live byte
//! source per URL so concurrent readers of the same slide share one transfer
//! context; [`handle_pool`] bounds and reuses the lightweight handles the tiled
//! read path checks out per tile.

mod block_cache;
pub mod handle_pool;
pub mod http;
pub mod local;
mod range_reader;
pub mod registry;

pub use block_cache::{BlockCache, DEFAULT_BLOCK_SIZE, DEFAULT_N_THREADS, DEFAULT_THREAD_CACHE_SIZE};
pub use handle_pool::{HandlePoolGuard, TiffHandlePool, HANDLE_CACHE_MAX};
pub use http::HttpRangeReader;
pub use local::LocalRangeReader;
pub use range_reader::{
    read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le, RangeReader,
};
pub use registry::{AnyRangeReader, ByteSourceRegistry, RegistryConfig};
