//! Process-wide byte-source registry: at most one live [`BlockCache`] per URL.
//!
//! Grounded in [`crate::slide::registry::SlideRegistry`]'s singleflight/LRU
//! shape, but operating one layer lower — this is the byte-source cache that
//! sits *underneath* the slide-metadata cache, so that two open `Slide`
//! handles for the same URL share one cache of compressed bytes instead of
//! each keeping a private copy.
//!
//! Entries are soft-closed rather than evicted outright: closing a source
//! only marks it closed and drops it from future lookups' fast path, but a
//! concurrent or later reopen of the same URL resurrects the existing entry
//! (and its warm block cache) if it is still resident, rather than starting a
//! cold fetch. [`ByteSourceRegistry::release`] is the hard removal that
//! actually drops the entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::{BlockCache, HttpRangeReader, LocalRangeReader, RangeReader};
use crate::error::IoError;

/// Either backend, unified behind [`RangeReader`] so the registry can hold
/// one homogeneous map regardless of URL scheme.
pub enum AnyRangeReader {
    Local(LocalRangeReader),
    Http(HttpRangeReader),
}

#[async_trait::async_trait]
impl RangeReader for AnyRangeReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<bytes::Bytes, IoError> {
        match self {
            AnyRangeReader::Local(r) => r.read_exact_at(offset, len).await,
            AnyRangeReader::Http(r) => r.read_exact_at(offset, len).await,
        }
    }

    fn size(&self) -> u64 {
        match self {
            AnyRangeReader::Local(r) => r.size(),
            AnyRangeReader::Http(r) => r.size(),
        }
    }

    fn identifier(&self) -> &str {
        match self {
            AnyRangeReader::Local(r) => r.identifier(),
            AnyRangeReader::Http(r) => r.identifier(),
        }
    }
}

/// A registry entry: a shared block cache plus a soft-close flag.
struct Entry {
    cache: Arc<BlockCache<AnyRangeReader>>,
    closed: AtomicBool,
}

/// Shared tunables the registry uses to open new byte sources.
#[derive(Clone)]
pub struct RegistryConfig {
    pub http_client: reqwest::Client,
    pub retry_times: u32,
    pub block_size: usize,
    pub block_cache_capacity: usize,
    pub n_threads: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            http_client: HttpRangeReader::shared_client(),
            retry_times: 10,
            block_size: super::DEFAULT_BLOCK_SIZE,
            block_cache_capacity: 100,
            n_threads: super::DEFAULT_N_THREADS,
        }
    }
}

/// Process-wide map of URL -> open byte source.
///
/// One `ByteSourceRegistry` is meant to be shared (behind an `Arc`) across
/// every `Slide` handle in a process, so concurrent opens of the same URL
/// converge on one underlying file descriptor or HTTP connection.
pub struct ByteSourceRegistry {
    entries: Mutex<HashMap<String, Arc<Entry>>>,
    config: RegistryConfig,
}

impl ByteSourceRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Get the byte source for `url`, opening and inserting it if this is the
    /// first reference (or if a prior soft-close left a resurrectable entry
    /// whose backing reader has since been released).
    ///
    /// Reopening a soft-closed entry resurrects it per spec.md §4.A/§3: the
    /// block cache's contents and hit/miss counters are discarded and it
    /// restarts cold, rather than continuing to serve blocks cached before
    /// the close. Reopening an entry that was never closed just shares the
    /// existing warm cache, which is the whole point of the registry.
    pub async fn get_or_open(&self, url: &str) -> Result<Arc<BlockCache<AnyRangeReader>>, IoError> {
        {
            let entries = self.entries.lock().await;
            if let Some(entry) = entries.get(url) {
                let entry = Arc::clone(entry);
                drop(entries);
                let was_closed = entry.closed.swap(false, Ordering::SeqCst);
                if was_closed {
                    entry.cache.clear().await;
                }
                return Ok(Arc::clone(&entry.cache));
            }
        }

        let reader = self.open_reader(url).await?;
        let cache = Arc::new(BlockCache::with_capacity_and_threads(
            reader,
            self.config.block_size,
            self.config.block_cache_capacity,
            self.config.n_threads,
        ));

        let mut entries = self.entries.lock().await;
        // Another task may have raced us to insert the same URL; prefer the
        // one already present so we don't leak a second backing reader.
        let mut inserted_new = false;
        let entry = entries
            .entry(url.to_string())
            .or_insert_with(|| {
                inserted_new = true;
                Arc::new(Entry {
                    cache: Arc::clone(&cache),
                    closed: AtomicBool::new(false),
                })
            });
        let entry = Arc::clone(entry);
        drop(entries);
        if !inserted_new {
            let was_closed = entry.closed.swap(false, Ordering::SeqCst);
            if was_closed {
                entry.cache.clear().await;
            }
        }
        Ok(Arc::clone(&entry.cache))
    }

    async fn open_reader(&self, url: &str) -> Result<AnyRangeReader, IoError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            let reader =
                HttpRangeReader::open(self.config.http_client.clone(), url, self.config.retry_times).await?;
            Ok(AnyRangeReader::Http(reader))
        } else {
            let path = url.strip_prefix("file://").unwrap_or(url);
            let reader = LocalRangeReader::open(path).await?;
            Ok(AnyRangeReader::Local(reader))
        }
    }

    /// Soft-close a source: mark it closed without dropping its cache. A
    /// later `get_or_open` for the same URL resurrects it, warm cache and
    /// all.
    pub async fn soft_close(&self, url: &str) {
        let entries = self.entries.lock().await;
        if let Some(entry) = entries.get(url) {
            entry.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Whether the entry for `url` is currently soft-closed (for tests and
    /// diagnostics; not required for correctness of `get_or_open`).
    pub async fn is_closed(&self, url: &str) -> Option<bool> {
        let entries = self.entries.lock().await;
        entries.get(url).map(|e| e.closed.load(Ordering::SeqCst))
    }

    /// Hard-remove an entry, dropping its byte source and cache entirely.
    pub async fn release(&self, url: &str) {
        let mut entries = self.entries.lock().await;
        entries.remove(url);
    }

    /// Number of distinct URLs currently tracked (open or soft-closed).
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
