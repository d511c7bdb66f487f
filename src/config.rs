//! Configuration management for WSI Streamer.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `WSI_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use wsi_streamer::config::Cli;
//! use clap::Parser;
//!
//! let cli = Cli::parse();
//! match cli.into_command() {
//!     wsi_streamer::config::Command::Serve(config) => {
//!         println!("Listening on {}", config.bind_address());
//!     }
//!     _ => {}
//! }
//! ```
//!
//! # Environment Variables
//!
//! All configuration options can be set via environment variables with the `WSI_` prefix:
//!
//! - `WSI_HOST` - Server bind address (default: 0.0.0.0)
//! - `WSI_PORT` - Server port (default: 3000)
//! - `WSI_STORAGE_ROOT` - Local directory root for `file://` slide IDs
//! - `WSI_BASE_URL` - Base URL prefix for `http(s)://` slide IDs
//! - `WSI_AUTH_SECRET` - HMAC secret for signed URLs
//! - `WSI_AUTH_ENABLED` - Enable authentication (default: true)
//! - `WSI_CACHE_SLIDES` - Max slides to cache (default: 100)
//! - `WSI_CACHE_BLOCKS` - Max blocks per slide (default: 100)
//! - `WSI_CACHE_TILES` - Max tiles to cache (default: 1000)
//! - `WSI_N_THREADS` - Prefetch workers per block cache miss (default: 4)
//! - `WSI_THREAD_CACHE_SIZE` - Per-worker sub-block size in bytes (default: 256KiB)
//! - `WSI_RETRY_TIMES` - Retries on an empty byte-source fill (default: 10)
//! - `WSI_HANDLE_CACHE_MAX` - Idle TIFF handles kept per slide pool (default: 32)
//! - `WSI_JPEG_QUALITY` - Default JPEG quality (default: 80)
//! - `WSI_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `OPENREMOTESLIDE_DEBUG` - comma-separated debug keywords (`detection`,
//!   `jpeg-markers`, `performance`, `tiles`); unknown keywords are logged as
//!   a warning and otherwise ignored

use clap::{Parser, Subcommand};

use crate::io::handle_pool::HANDLE_CACHE_MAX;
use crate::io::{DEFAULT_BLOCK_SIZE, DEFAULT_N_THREADS, DEFAULT_THREAD_CACHE_SIZE};
use crate::tile::{DEFAULT_JPEG_QUALITY, DEFAULT_TILE_CACHE_CAPACITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default number of slides to cache.
pub const DEFAULT_SLIDE_CACHE_CAPACITY: usize = 100;

/// Default number of blocks to cache per slide.
pub const DEFAULT_BLOCK_CACHE_CAPACITY: usize = 100;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

/// Default retries on an empty fill, matching `RETRY_TIMES`.
pub const DEFAULT_RETRY_TIMES: u32 = 10;

/// Default per-range ceiling for the quickhash collaborator (100 MiB),
/// matching `KEY_FILE_HARD_MAX_SIZE`.
pub const DEFAULT_KEY_FILE_HARD_MAX_SIZE: u64 = 100 * 1024 * 1024;

/// Recognized `OPENREMOTESLIDE_DEBUG` keywords; anything else logs a warning
/// and is otherwise ignored.
pub const DEBUG_KEYWORDS: &[&str] = &["detection", "jpeg-markers", "performance", "tiles"];

// =============================================================================
// CLI
// =============================================================================

/// WSI Streamer - A tile server for Whole Slide Images.
///
/// Serves tiles from whole-slide images stored on the local filesystem or
/// behind an HTTP(S) byte-range endpoint. Run with no subcommand to serve;
/// `sign` and `check` are standalone utilities.
#[derive(Parser, Debug)]
#[command(name = "wsi-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    subcommand: Option<Subcommands>,

    #[command(flatten)]
    serve: ServeConfig,
}

#[derive(Subcommand, Debug, Clone)]
enum Subcommands {
    /// Generate a signed URL (or bare signature) for a tile/slide path.
    Sign(SignConfig),
    /// Validate configuration and storage reachability without serving.
    Check(CheckConfig),
}

/// The resolved top-level action, after clap has parsed `argv`.
#[derive(Debug, Clone)]
pub enum Command {
    Serve(ServeConfig),
    Sign(SignConfig),
    Check(CheckConfig),
}

impl Cli {
    /// Resolve the parsed arguments into one of the three top-level actions.
    /// Serving is the default when no subcommand is given.
    pub fn into_command(self) -> Command {
        match self.subcommand {
            Some(Subcommands::Sign(config)) => Command::Sign(config),
            Some(Subcommands::Check(config)) => Command::Check(config),
            None => Command::Serve(self.serve),
        }
    }
}

// =============================================================================
// Serve Config
// =============================================================================

/// Configuration for the `serve` command (also the default with no subcommand).
#[derive(Parser, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "WSI_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "WSI_PORT")]
    pub port: u16,

    // =========================================================================
    // Storage backend: exactly one of these two
    // =========================================================================
    /// Local filesystem root that slide IDs are resolved against.
    ///
    /// Mutually exclusive with `--base-url`; exactly one is required.
    #[arg(long, env = "WSI_STORAGE_ROOT")]
    pub storage_root: Option<String>,

    /// HTTP(S) base URL that slide IDs are appended to, fetched via byte
    /// range requests.
    ///
    /// Mutually exclusive with `--storage-root`; exactly one is required.
    #[arg(long, env = "WSI_BASE_URL")]
    pub base_url: Option<String>,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Secret key for HMAC-SHA256 signed URL authentication.
    ///
    /// If not provided and auth is enabled, the server will fail to start.
    #[arg(long, env = "WSI_AUTH_SECRET")]
    pub auth_secret: Option<String>,

    /// Enable signed URL authentication.
    ///
    /// When disabled, all tile requests are allowed without authentication.
    /// WARNING: Only disable authentication in development/testing.
    #[arg(long, default_value_t = true, env = "WSI_AUTH_ENABLED")]
    pub auth_enabled: bool,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Maximum number of slides to keep in cache.
    #[arg(long, default_value_t = DEFAULT_SLIDE_CACHE_CAPACITY, env = "WSI_CACHE_SLIDES")]
    pub cache_slides: usize,

    /// Maximum number of blocks to cache per slide.
    #[arg(long, default_value_t = DEFAULT_BLOCK_CACHE_CAPACITY, env = "WSI_CACHE_BLOCKS")]
    pub cache_blocks: usize,

    /// Maximum number of encoded tiles to cache.
    #[arg(long, default_value_t = DEFAULT_TILE_CACHE_CAPACITY, env = "WSI_CACHE_TILES")]
    pub cache_tiles: usize,

    /// Block size in bytes for the byte-source block cache. Must equal
    /// `n_threads * thread_cache_size` (default 4 * 256KiB = 1MiB).
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE, env = "WSI_BLOCK_SIZE")]
    pub block_size: usize,

    // =========================================================================
    // Byte-source tunables (spec.md §5 resource caps)
    // =========================================================================
    /// Prefetch workers dispatched per block-cache miss.
    #[arg(long, default_value_t = DEFAULT_N_THREADS, env = "WSI_N_THREADS")]
    pub n_threads: usize,

    /// Each prefetch worker's sub-block size in bytes. `block_size` must
    /// equal `n_threads * thread_cache_size`; `validate()` rejects any
    /// combination where the two have drifted apart.
    #[arg(long, default_value_t = DEFAULT_THREAD_CACHE_SIZE, env = "WSI_THREAD_CACHE_SIZE")]
    pub thread_cache_size: usize,

    /// Retries on an empty fill from the remote backend.
    #[arg(long, default_value_t = DEFAULT_RETRY_TIMES, env = "WSI_RETRY_TIMES")]
    pub retry_times: u32,

    /// Idle TIFF reader handles kept resident per slide's handle pool.
    #[arg(long, default_value_t = HANDLE_CACHE_MAX, env = "WSI_HANDLE_CACHE_MAX")]
    pub handle_cache_max: usize,

    /// Upper bound, in bytes, on a single quickhash range scan.
    #[arg(long, default_value_t = DEFAULT_KEY_FILE_HARD_MAX_SIZE, env = "WSI_KEY_FILE_HARD_MAX_SIZE")]
    pub key_file_hard_max_size: u64,

    // =========================================================================
    // Tile Configuration
    // =========================================================================
    /// Default JPEG quality for tile encoding (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "WSI_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "WSI_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "WSI_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        match (&self.storage_root, &self.base_url) {
            (None, None) => {
                return Err(
                    "a storage backend is required: set --storage-root or --base-url".to_string(),
                )
            }
            (Some(_), Some(_)) => {
                return Err(
                    "--storage-root and --base-url are mutually exclusive; set exactly one"
                        .to_string(),
                )
            }
            _ => {}
        }

        if self.auth_enabled && self.auth_secret.is_none() {
            return Err(
                "Authentication is enabled but no secret provided. \
                 Set --auth-secret or WSI_AUTH_SECRET, or disable auth with --auth-enabled=false"
                    .to_string(),
            );
        }

        if self.cache_slides == 0 {
            return Err("cache_slides must be greater than 0".to_string());
        }
        if self.cache_blocks == 0 {
            return Err("cache_blocks must be greater than 0".to_string());
        }
        if self.cache_tiles == 0 {
            return Err("cache_tiles must be greater than 0".to_string());
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        if self.block_size < 1024 || self.block_size > 16 * 1024 * 1024 {
            return Err("block_size must be between 1KB and 16MB".to_string());
        }

        if self.n_threads == 0 {
            return Err("n_threads must be at least 1".to_string());
        }
        if self.retry_times == 0 {
            return Err("retry_times must be at least 1".to_string());
        }
        if self.handle_cache_max == 0 {
            return Err("handle_cache_max must be at least 1".to_string());
        }

        if self.thread_cache_size == 0 {
            return Err("thread_cache_size must be at least 1".to_string());
        }
        match self.n_threads.checked_mul(self.thread_cache_size) {
            Some(derived) if derived == self.block_size => {}
            Some(derived) => {
                return Err(format!(
                    "block_size ({}) must equal n_threads * thread_cache_size ({} * {} = {})",
                    self.block_size, self.n_threads, self.thread_cache_size, derived
                ))
            }
            None => {
                return Err(
                    "n_threads * thread_cache_size overflows usize".to_string(),
                )
            }
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the auth secret, or an empty string if not set (call `validate()` first).
    pub fn auth_secret_or_empty(&self) -> &str {
        self.auth_secret.as_deref().unwrap_or("")
    }

    /// A short human-readable description of the configured storage backend,
    /// for startup logging (`"local:/data/slides"` or `"remote:https://..."`).
    pub fn source_description(&self) -> String {
        match (&self.storage_root, &self.base_url) {
            (Some(root), _) => format!("local:{root}"),
            (_, Some(url)) => format!("remote:{url}"),
            (None, None) => "unconfigured".to_string(),
        }
    }
}

// =============================================================================
// Sign Config
// =============================================================================

/// Output format for the `sign` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SignOutputFormat {
    /// Just the hex signature.
    Signature,
    /// A JSON object with signature, expiry, path, ttl and (if `--base-url`
    /// is set) the full URL.
    Json,
    /// The path plus query string, or a full URL if `--base-url` is set.
    Url,
}

/// Configuration for the `sign` command: generate a signed tile/slide URL.
#[derive(Parser, Debug, Clone)]
pub struct SignConfig {
    /// The secret key to sign with (must match the server's `--auth-secret`).
    #[arg(long, env = "WSI_AUTH_SECRET")]
    pub secret: String,

    /// The URL path to sign, e.g. `/tiles/sample.svs/0/1/2.jpg`.
    #[arg(long)]
    pub path: String,

    /// Signature validity in seconds.
    #[arg(long, default_value_t = 3600)]
    pub ttl: u64,

    /// Extra query parameters to include in the signature, each as `key=value`.
    #[arg(long = "param", value_delimiter = ',')]
    pub params: Vec<String>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = SignOutputFormat::Url)]
    pub format: SignOutputFormat,

    /// Base URL to prepend when emitting a full URL.
    #[arg(long)]
    pub base_url: Option<String>,
}

impl SignConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.is_empty() {
            return Err("secret must not be empty".to_string());
        }
        if !self.path.starts_with('/') {
            return Err("path must start with '/'".to_string());
        }
        Ok(())
    }

    /// Parse `--param key=value` entries into `(key, value)` pairs.
    pub fn parse_params(&self) -> Result<Vec<(String, String)>, String> {
        self.params
            .iter()
            .map(|p| {
                p.split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| format!("invalid --param '{p}', expected key=value"))
            })
            .collect()
    }
}

// =============================================================================
// Check Config
// =============================================================================

/// Configuration for the `check` command: validate configuration and storage
/// reachability without starting the server.
#[derive(Parser, Debug, Clone)]
pub struct CheckConfig {
    /// Local filesystem root to check. Mutually exclusive with `--base-url`.
    #[arg(long, env = "WSI_STORAGE_ROOT")]
    pub storage_root: Option<String>,

    /// HTTP(S) base URL to check. Mutually exclusive with `--storage-root`.
    #[arg(long, env = "WSI_BASE_URL")]
    pub base_url: Option<String>,

    /// List slides found under the storage root (local backend only).
    #[arg(long, default_value_t = false)]
    pub list_slides: bool,

    /// Probe a specific slide id/path and report its size.
    #[arg(long)]
    pub test_slide: Option<String>,

    /// Enable verbose logging for this check.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CheckConfig {
    /// Resolve and validate which storage backend is configured, returning
    /// its description (`"local:<path>"` / `"remote:<url>"`).
    pub fn resolve_source(&self) -> Result<String, String> {
        match (&self.storage_root, &self.base_url) {
            (Some(root), None) => Ok(format!("local:{root}")),
            (None, Some(url)) => Ok(format!("remote:{url}")),
            (None, None) => {
                Err("no storage backend set: pass --storage-root or --base-url".to_string())
            }
            (Some(_), Some(_)) => {
                Err("--storage-root and --base-url are mutually exclusive".to_string())
            }
        }
    }
}

// =============================================================================
// Debug keyword parsing (OPENREMOTESLIDE_DEBUG, spec.md §6)
// =============================================================================

/// Parse a comma-separated `OPENREMOTESLIDE_DEBUG` value into the recognized
/// keyword subset, logging a warning for anything unrecognized (and
/// otherwise ignoring it) rather than failing.
pub fn parse_debug_keywords(raw: &str) -> Vec<String> {
    let mut recognized = Vec::new();
    for keyword in raw.split(',').map(str::trim).filter(|k| !k.is_empty()) {
        if DEBUG_KEYWORDS.contains(&keyword) {
            recognized.push(keyword.to_string());
        } else {
            tracing::warn!(
                "unknown OPENREMOTESLIDE_DEBUG keyword '{keyword}', ignoring. Recognized: {}",
                DEBUG_KEYWORDS.join(", ")
            );
        }
    }
    recognized
}

// =============================================================================
// Tests
// =============================================================================
