//! Local-file byte source.
//!
//! Grounded in the same shape as the remote backend ([`super::http`]) so both
//! satisfy [`RangeReader`] uniformly: the region compositor and TIFF parser
//! never know which one they're talking to. Reads are positional (`pread`-
//! style) so concurrent readers don't fight over a shared cursor; on Unix this
//! is `FileExt::read_exact_at`, offloaded to the blocking pool since
//! synchronous file I/O would otherwise stall the async runtime.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};

use crate::error::IoError;

use super::RangeReader;

/// Byte source backed by a local file, opened once at construction.
///
/// Rust's `std::fs::File` already opens with the close-on-exec flag set on
/// Unix, so no separate `fcntl` pass is needed to honor spec.md §6's
/// `FD_CLOEXEC` requirement for local fds.
pub struct LocalRangeReader {
    file: File,
    path: PathBuf,
    size: u64,
    identifier: String,
}

impl LocalRangeReader {
    /// Open a local file as a byte source.
    ///
    /// Reads the size once via `metadata()` per spec.md §3's "total size
    /// (known after open)" invariant.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref().to_path_buf();
        let identifier = format!("file://{}", path.display());

        let (file, size) = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || -> Result<(File, u64), io::Error> {
                let file = File::open(&path)?;
                let size = file.metadata()?.len();
                Ok((file, size))
            })
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?
            .map_err(|e| IoError::NotFound(format!("{}: {}", path.display(), e)))?
        };

        Ok(Self {
            file,
            path,
            size,
            identifier,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RangeReader for LocalRangeReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        if offset + len as u64 > self.size {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.size,
            });
        }
        if len == 0 {
            return Ok(Bytes::new());
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            let file = self.file.try_clone().map_err(|e| IoError::Connection(e.to_string()))?;
            let mut buf = BytesMut::zeroed(len);
            tokio::task::spawn_blocking(move || file.read_exact_at(&mut buf, offset).map(|_| buf))
                .await
                .map_err(|e| IoError::Connection(e.to_string()))?
                .map(BytesMut::freeze)
                .map_err(|e| IoError::Connection(e.to_string()))
        }
        #[cfg(not(unix))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = self.file.try_clone().map_err(|e| IoError::Connection(e.to_string()))?;
            tokio::task::spawn_blocking(move || -> Result<Bytes, io::Error> {
                file.seek(SeekFrom::Start(offset))?;
                let mut buf = vec![0u8; len];
                file.read_exact(&mut buf)?;
                Ok(Bytes::from(buf))
            })
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?
            .map_err(|e| IoError::Connection(e.to_string()))
        }
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
