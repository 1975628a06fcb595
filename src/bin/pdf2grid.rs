//! CLI binary for edgequake-pdf2grid.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServerConfig`, sets up logging and runs the HTTP server.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2grid::{serve, spawn_sweeper, AppState, ServerConfig};
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve ./uploads on http://localhost:3000
  pdf2grid

  # Custom storage root and port
  pdf2grid --root /var/lib/pdf2grid --port 8080

  # Behind a reverse proxy
  pdf2grid --host 0.0.0.0 --public-url https://grid.example.com

  # Serve the browser front-end too
  pdf2grid --public-dir ./public

  # Keep everything forever
  pdf2grid --retention-hours 0

WORKFLOW:
  curl -F "pdfFile=@deck.pdf;type=application/pdf" http://localhost:3000/upload-pdf
  curl -X POST -H 'content-type: application/json' \
       -d '{"batchId":"<id from upload>"}' http://localhost:3000/generate-pdf
  curl -O <downloadLink>

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to an existing libpdfium
  RUST_LOG                Overrides --verbose / --quiet (e.g. RUST_LOG=edgequake_pdf2grid=debug)
"#;

/// Split uploaded PDFs into page images and assemble 2x2 grid PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2grid",
    version,
    about = "Split uploaded PDFs into page images and assemble 2x2 grid PDFs",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Upload root; images/ and output/ are created underneath.
    #[arg(long, env = "PDF2GRID_ROOT", default_value = "uploads")]
    root: PathBuf,

    /// Interface to listen on.
    #[arg(long, env = "PDF2GRID_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// TCP port.
    #[arg(short, long, env = "PDF2GRID_PORT", default_value_t = 3000)]
    port: u16,

    /// Base URL used in download links (default: http://localhost:<port>).
    #[arg(long, env = "PDF2GRID_PUBLIC_URL")]
    public_url: Option<String>,

    /// Directory with the browser front-end, served at /.
    #[arg(long, env = "PDF2GRID_PUBLIC_DIR")]
    public_dir: Option<PathBuf>,

    /// Filename prefix of page images.
    #[arg(long, env = "PDF2GRID_IMAGE_PREFIX", default_value = "page_")]
    image_prefix: String,

    /// Longest edge of a rendered page in pixels.
    #[arg(long, env = "PDF2GRID_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// Largest accepted upload in MiB.
    #[arg(long, env = "PDF2GRID_MAX_UPLOAD_MB", default_value_t = 50,
          value_parser = clap::value_parser!(u64).range(1..=4096))]
    max_upload_mb: u64,

    /// Keep uploaded PDFs after they have been split.
    #[arg(long, env = "PDF2GRID_KEEP_UPLOADS")]
    keep_uploads: bool,

    /// Purge generated PDFs and stale batches older than this many hours (0 = never).
    #[arg(long, env = "PDF2GRID_RETENTION_HOURS", default_value_t = 168)]
    retention_hours: u64,

    /// Minutes between retention sweeps.
    #[arg(long, env = "PDF2GRID_SWEEP_MINUTES", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    sweep_minutes: u64,

    /// Path to the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2GRID_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2GRID_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let state = AppState::new(config);

    // ── Ensure pdfium is loadable before accepting uploads ───────────────
    state
        .engine()
        .probe()
        .await
        .context("PDF engine unavailable")?;

    match state.config().retention {
        Some(max_age) => {
            info!(
                "Retention: purging files older than {}h every {}min",
                max_age.as_secs() / 3600,
                state.config().sweep_interval.as_secs() / 60
            );
            spawn_sweeper(state.clone(), max_age, state.config().sweep_interval);
        }
        None => warn!("Retention disabled: generated PDFs accumulate indefinitely"),
    }

    serve(state, shutdown_signal())
        .await
        .context("Server stopped with an error")?;

    info!("Shut down cleanly");
    Ok(())
}

/// Map CLI args to `ServerConfig`.
fn build_config(cli: &Cli) -> Result<ServerConfig> {
    let retention = match cli.retention_hours {
        0 => None,
        hours => Some(Duration::from_secs(hours * 60 * 60)),
    };
    let max_upload_bytes = usize::try_from(cli.max_upload_mb * 1024 * 1024)
        .context("Upload limit does not fit this platform")?;

    let mut builder = ServerConfig::builder()
        .root_dir(&cli.root)
        .host(cli.host)
        .port(cli.port)
        .image_prefix(&cli.image_prefix)
        .max_rendered_pixels(cli.max_pixels)
        .max_upload_bytes(max_upload_bytes)
        .keep_uploads(cli.keep_uploads)
        .retention(retention)
        .sweep_interval(Duration::from_secs(cli.sweep_minutes * 60));

    if let Some(ref url) = cli.public_url {
        builder = builder.public_url(url);
    }
    if let Some(ref dir) = cli.public_dir {
        builder = builder.public_dir(dir);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }

    builder.build().context("Invalid configuration")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
