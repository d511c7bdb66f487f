//! WSI Streamer - A tile server for Whole Slide Images.
//!
//! This binary starts the HTTP server and configures all components.

use std::sync::Arc;

use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsi_streamer::{
    config::{parse_debug_keywords, CheckConfig, Cli, Command, ServeConfig, SignConfig, SignOutputFormat},
    io::{ByteSourceRegistry, HttpRangeReader, RangeReader, RegistryConfig},
    server::{auth::SignedUrlAuth, create_router, RouterConfig},
    slide::{SlideRegistry, SlideSource, UrlSlideSource},
    tile::TileService,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Ok(raw) = std::env::var("OPENREMOTESLIDE_DEBUG") {
        let _ = parse_debug_keywords(&raw);
    }

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Sign(config) => run_sign(config),
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    print_banner();

    info!("Configuration:");
    info!("  Storage: {}", config.source_description());

    if config.auth_enabled {
        info!("  Auth: enabled");
    } else {
        warn!("  Auth: DISABLED - all endpoints are publicly accessible");
        warn!("        Enable for production: --auth-enabled --auth-secret=<secret>");
    }

    info!(
        "  Cache: {} slides, {} blocks/slide, {} tiles",
        config.cache_slides, config.cache_blocks, config.cache_tiles
    );
    info!(
        "  Byte source: {} prefetch worker(s), {} byte blocks, {} retries",
        config.n_threads, config.block_size, config.retry_times
    );

    let byte_source_registry = Arc::new(ByteSourceRegistry::new(RegistryConfig {
        http_client: HttpRangeReader::shared_client(),
        retry_times: config.retry_times,
        block_size: config.block_size,
        block_cache_capacity: config.cache_blocks,
        n_threads: config.n_threads,
    }));

    let source = match (&config.storage_root, &config.base_url) {
        (Some(root), _) => UrlSlideSource::local(root, byte_source_registry),
        (_, Some(url)) => UrlSlideSource::http(url, byte_source_registry),
        (None, None) => unreachable!("validate() rejects a missing storage backend"),
    };

    info!("");
    info!("Probing storage...");
    match source.list_slides(1000, None).await {
        Ok(result) => {
            info!("  Found {} slide(s)", result.slides.len());
        }
        Err(e) => {
            // A remote backend may not support listing; that's not fatal.
            warn!("  Could not list slides: {} (continuing anyway)", e);
        }
    }

    let registry = SlideRegistry::with_capacity(
        source,
        config.cache_slides,
        config.block_size,
        config.cache_blocks,
    );

    let tile_service = TileService::with_cache_capacity(registry, config.cache_tiles);

    let router_config = build_router_config(&config);
    let router = create_router(tile_service, router_config);

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/slides", addr);
    info!("");
    info!("  View slides in your browser:");
    info!("    open http://{}/view/<slide_id>", addr);
    if !config.auth_enabled {
        info!("");
        info!("  Fetch a tile directly:");
        info!("    curl http://{}/tiles/<slide_id>/0/0/0.jpg", addr);
    }
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Print the startup banner.
fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("");
    info!("██╗    ██╗███████╗██╗                                               ");
    info!("██║    ██║██╔════╝██║                                               ");
    info!("██║ █╗ ██║███████╗██║                                               ");
    info!("██║███╗██║╚════██║██║                                               ");
    info!("╚███╔███╔╝███████║██║                                               ");
    info!(" ╚══╝╚══╝ ╚══════╝╚═╝                                               ");
    info!("");
    info!("███████╗████████╗██████╗ ███████╗ █████╗ ███╗   ███╗███████╗██████╗ ");
    info!("██╔════╝╚══██╔══╝██╔══██╗██╔════╝██╔══██╗████╗ ████║██╔════╝██╔══██╗");
    info!("███████╗   ██║   ██████╔╝█████╗  ███████║██╔████╔██║█████╗  ██████╔╝");
    info!("╚════██║   ██║   ██╔══██╗██╔══╝  ██╔══██║██║╚██╔╝██║██╔══╝  ██╔══██╗");
    info!("███████║   ██║   ██║  ██║███████╗██║  ██║██║ ╚═╝ ██║███████╗██║  ██║");
    info!("╚══════╝   ╚═╝   ╚═╝  ╚═╝╚══════╝╚═╝  ╚═╝╚═╝     ╚═╝╚══════╝╚═╝  ╚═╝");
    info!("");
    info!("                        v{}", version);
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "wsi_streamer=debug,tower_http=debug"
    } else {
        "wsi_streamer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = if config.auth_enabled {
        RouterConfig::new(config.auth_secret_or_empty())
    } else {
        RouterConfig::without_auth()
    };

    router_config = router_config.with_cache_max_age(config.cache_max_age);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config = router_config.with_tracing(!config.no_tracing);

    router_config
}

// =============================================================================
// Sign Command
// =============================================================================

fn run_sign(config: SignConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let params = match config.parse_params() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let auth = SignedUrlAuth::new(&config.secret);
    let ttl = Duration::from_secs(config.ttl);

    let params_ref: Vec<(&str, &str)> = params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let (signature, expiry) = auth.sign_with_params(&config.path, ttl, &params_ref);

    match config.format {
        SignOutputFormat::Signature => {
            println!("{}", signature);
        }
        SignOutputFormat::Json => {
            let url = config
                .base_url
                .as_ref()
                .map(|base_url| build_signed_url(base_url, &config.path, &params, expiry, &signature));

            let json = serde_json::json!({
                "signature": signature,
                "expiry": expiry,
                "path": config.path,
                "ttl": config.ttl,
                "url": url,
            });
            println!("{}", serde_json::to_string_pretty(&json).unwrap());
        }
        SignOutputFormat::Url => {
            if let Some(ref base_url) = config.base_url {
                let url = build_signed_url(base_url, &config.path, &params, expiry, &signature);
                println!("{}", url);
            } else {
                let query = build_query_string(&params, expiry, &signature);
                println!("{}?{}", config.path, query);
                eprintln!();
                eprintln!("Tip: Use --base-url to generate a complete URL");
            }
        }
    }

    ExitCode::SUCCESS
}

/// Build a complete signed URL.
fn build_signed_url(
    base_url: &str,
    path: &str,
    params: &[(String, String)],
    expiry: u64,
    signature: &str,
) -> String {
    let base_url = base_url.trim_end_matches('/');
    let query = build_query_string(params, expiry, signature);
    format!("{}{}?{}", base_url, path, query)
}

/// Build the query string with expiry and signature.
fn build_query_string(params: &[(String, String)], expiry: u64, signature: &str) -> String {
    let mut parts: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();

    parts.push(format!("exp={}", expiry));
    parts.push(format!("sig={}", signature));

    parts.join("&")
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("WSI Streamer Configuration Check");
    println!("═════════════════════════════════");
    println!();

    let source_desc = match config.resolve_source() {
        Ok(desc) => {
            println!("✓ Storage: {}", desc);
            desc
        }
        Err(e) => {
            println!("✗ Storage: {}", e);
            return ExitCode::FAILURE;
        }
    };
    println!();

    print!("Testing storage reachability... ");

    let registry = Arc::new(ByteSourceRegistry::new(RegistryConfig::default()));
    let source = match (&config.storage_root, &config.base_url) {
        (Some(root), _) => UrlSlideSource::local(root, registry),
        (_, Some(url)) => UrlSlideSource::http(url, registry),
        (None, None) => {
            println!("✗ failed");
            return ExitCode::FAILURE;
        }
    };

    let list_result = source.list_slides(1, None).await;
    match &list_result {
        Ok(_) => println!("✓ success"),
        Err(e) if source_desc.starts_with("remote:") => {
            // A bare HTTP base URL cannot always enumerate a directory;
            // that alone isn't fatal for the remote backend.
            println!("✓ reachable (listing unsupported: {e})");
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check:");
            println!("  - The path exists and is readable");
            return ExitCode::FAILURE;
        }
    }

    if config.list_slides {
        println!();
        println!("Slides found:");
        println!("─────────────────");

        match source.list_slides(1000, None).await {
            Ok(result) => {
                if result.slides.is_empty() {
                    println!("  (no slides found)");
                } else {
                    for slide in &result.slides {
                        println!("  {}", slide);
                    }
                    println!();
                    println!("Total: {} slide(s)", result.slides.len());
                }
            }
            Err(e) => {
                println!("  Error listing slides: {}", e);
            }
        }
    }

    if let Some(ref slide_id) = config.test_slide {
        println!();
        print!("Testing slide '{}'... ", slide_id);

        match source.create_reader(slide_id).await {
            Ok(reader) => {
                let size_mb = reader.size() as f64 / (1024.0 * 1024.0);
                println!("✓ found");
                println!("  Size: {:.2} MB", size_mb);
            }
            Err(_) => {
                println!("✗ not found");
                println!();
                println!("  The slide '{}' does not exist.", slide_id);
                return ExitCode::FAILURE;
            }
        }
    }

    println!();
    println!("═════════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}
