//! Streaming SHA-256 digest over byte ranges of a slide's backing file.
//!
//! Grounded in the teacher's [`crate::server::auth::SignedUrlAuth`] for the
//! "wrap a `sha2`/digest primitive behind a small, terminal-on-failure API"
//! shape, generalized here to stream arbitrary byte ranges from a
//! [`crate::io::RangeReader`] rather than hash a fixed signature payload.
//! This is the quickhash-1 collaborator: it has no opinion about which bytes
//! make a good slide identity — callers decide what to feed it.

use sha2::{Digest, Sha256};

use crate::io::RangeReader;

/// Hard ceiling on how many bytes `update_file_range` will stream from a
/// single range before erroring out, matching `KEY_FILE_HARD_MAX_SIZE`
/// (default 100 MiB) from the resource caps.
pub const KEY_FILE_HARD_MAX_SIZE: u64 = 100 * 1024 * 1024;

/// Chunk size for `update_file_range`'s streaming reads.
const STREAM_CHUNK_SIZE: usize = 4 * 1024;

/// Streaming SHA-256 digest. Once [`disable`](QuickHash::disable) is called,
/// the hash is permanently poisoned and [`finalize`](QuickHash::finalize)
/// returns `None` regardless of further input.
pub struct QuickHash {
    hasher: Option<Sha256>,
    max_range_bytes: u64,
}

impl QuickHash {
    pub fn new() -> Self {
        Self {
            hasher: Some(Sha256::new()),
            max_range_bytes: KEY_FILE_HARD_MAX_SIZE,
        }
    }

    /// Override the per-range byte ceiling (for tests; production code should
    /// use the default).
    pub fn with_max_range_bytes(max_range_bytes: u64) -> Self {
        Self {
            hasher: Some(Sha256::new()),
            max_range_bytes,
        }
    }

    /// Feed raw bytes into the digest. No-op once disabled.
    pub fn update(&mut self, data: &[u8]) {
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(data);
        }
    }

    /// Feed a string plus its trailing NUL into the digest, matching the
    /// vendor metadata convention of hashing `str` fields NUL-terminated.
    pub fn update_string(&mut self, s: &str) {
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(s.as_bytes());
            hasher.update([0u8]);
        }
    }

    /// Stream a byte range of `reader` through the digest in fixed-size
    /// chunks. `len = None` means "to end of file". No-op once disabled.
    ///
    /// Errors if the effective range exceeds `max_range_bytes`, or if the
    /// underlying reader fails — either poisons the hash the same way
    /// `disable` would, since a partial hash is worse than no hash.
    pub async fn update_file_range<R: RangeReader>(
        &mut self,
        reader: &R,
        offset: u64,
        len: Option<u64>,
    ) -> Result<(), QuickHashError> {
        if self.hasher.is_none() {
            return Ok(());
        }

        let size = reader.size();
        let end = match len {
            Some(len) => offset.saturating_add(len).min(size),
            None => size,
        };
        let total = end.saturating_sub(offset);

        if total > self.max_range_bytes {
            self.disable();
            return Err(QuickHashError::RangeTooLarge {
                requested: total,
                max: self.max_range_bytes,
            });
        }

        let mut cursor = offset;
        while cursor < end {
            let chunk_len = std::cmp::min(STREAM_CHUNK_SIZE as u64, end - cursor) as usize;
            match reader.read_exact_at(cursor, chunk_len).await {
                Ok(bytes) => {
                    if let Some(hasher) = self.hasher.as_mut() {
                        hasher.update(&bytes);
                    }
                }
                Err(e) => {
                    self.disable();
                    return Err(QuickHashError::Io(e));
                }
            }
            cursor += chunk_len as u64;
        }

        Ok(())
    }

    /// Permanently poison the digest: all further `update*` calls are no-ops
    /// and `finalize` returns `None`. Disabling is terminal — there is no way
    /// to re-enable a `QuickHash`.
    pub fn disable(&mut self) {
        self.hasher = None;
    }

    pub fn is_disabled(&self) -> bool {
        self.hasher.is_none()
    }

    /// Consume the hash, returning the lowercase hex digest, or `None` if it
    /// was disabled.
    pub fn finalize(self) -> Option<String> {
        self.hasher.map(|hasher| hex::encode(hasher.finalize()))
    }
}

impl Default for QuickHash {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QuickHashError {
    #[error("range too large for quickhash: requested {requested} bytes, max {max}")]
    RangeTooLarge { requested: u64, max: u64 },

    #[error("I/O error while hashing: {0}")]
    Io(#[from] crate::error::IoError),
}
