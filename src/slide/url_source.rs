//! Local-filesystem and HTTP(S)-backed [`SlideSource`].
//!
//! Replaces a bucket-and-key storage model with the two backends this
//! crate's byte sources actually support (`io::local`, `io::http`): a local
//! storage root that slide IDs are joined onto, or an HTTP(S) base URL that
//! slide IDs are appended to. Both route through a shared
//! [`ByteSourceRegistry`] so two `create_reader` calls for the same slide ID
//! converge on one block-cached byte source instead of opening the file or
//! connection twice.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::IoError;
use crate::io::registry::AnyRangeReader;
use crate::io::{BlockCache, ByteSourceRegistry};

use super::registry::{SlideListResult, SlideSource};

/// File extensions treated as slide files when listing a local storage root.
const SLIDE_EXTENSIONS: &[&str] = &[".svs", ".tif", ".tiff"];

#[derive(Clone)]
enum Backend {
    Local(PathBuf),
    Http(String),
}

/// A [`SlideSource`] that resolves slide IDs against either a local storage
/// root or an HTTP(S) base URL, per [`crate::config::Config`]'s
/// `storage_root`/`base_url` (mutually exclusive).
#[derive(Clone)]
pub struct UrlSlideSource {
    backend: Backend,
    registry: Arc<ByteSourceRegistry>,
}

impl UrlSlideSource {
    /// Resolve slide IDs as paths relative to `root` on the local filesystem.
    pub fn local(root: impl Into<PathBuf>, registry: Arc<ByteSourceRegistry>) -> Self {
        Self {
            backend: Backend::Local(root.into()),
            registry,
        }
    }

    /// Resolve slide IDs as paths relative to `base_url`.
    pub fn http(base_url: impl Into<String>, registry: Arc<ByteSourceRegistry>) -> Self {
        Self {
            backend: Backend::Http(base_url.into()),
            registry,
        }
    }

    fn resolve(&self, slide_id: &str) -> String {
        match &self.backend {
            Backend::Local(root) => format!("file://{}", root.join(slide_id).display()),
            Backend::Http(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                slide_id.trim_start_matches('/')
            ),
        }
    }
}

#[async_trait]
impl SlideSource for UrlSlideSource {
    type Reader = Arc<BlockCache<AnyRangeReader>>;

    async fn create_reader(&self, slide_id: &str) -> Result<Self::Reader, IoError> {
        let url = self.resolve(slide_id);
        self.registry.get_or_open(&url).await
    }

    async fn list_slides(
        &self,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<SlideListResult, IoError> {
        match &self.backend {
            Backend::Local(root) => list_local_slides(root, limit, cursor).await,
            Backend::Http(_) => Ok(SlideListResult::default()),
        }
    }
}

async fn list_local_slides(
    root: &Path,
    limit: u32,
    cursor: Option<&str>,
) -> Result<SlideListResult, IoError> {
    let root = root.to_path_buf();
    let cursor = cursor.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || {
        let mut entries: Vec<String> = std::fs::read_dir(&root)
            .map_err(|e| IoError::NotFound(format!("{}: {e}", root.display())))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| {
                let lower = name.to_lowercase();
                SLIDE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
            })
            .collect();
        entries.sort();

        let start = match &cursor {
            Some(c) => entries
                .iter()
                .position(|e| e.as_str() > c.as_str())
                .unwrap_or(entries.len()),
            None => 0,
        };
        let end = (start + limit as usize).min(entries.len());
        let page = entries[start..end].to_vec();
        let next_cursor = if end < entries.len() {
            page.last().cloned()
        } else {
            None
        };

        Ok(SlideListResult {
            slides: page,
            next_cursor,
        })
    })
    .await
    .map_err(|e| IoError::Connection(format!("list_slides task panicked: {e}")))?
}
