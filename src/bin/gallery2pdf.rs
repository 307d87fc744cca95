//! CLI binary for gallery2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to `JobConfig`
//! and starts the HTTP server.

use anyhow::{Context, Result};
use clap::Parser;
use gallery2pdf::{serve, JobConfig, DEFAULT_CONTAINER_SELECTOR};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r##"EXAMPLES:
  # Serve on the default address (0.0.0.0:8000)
  gallery2pdf

  # Keep archives somewhere else
  gallery2pdf --archive-dir /srv/gallery/archives

  # Galleries whose images live under a different container
  gallery2pdf --container "#gallery" --source-extension .jpg

  # Local-only, verbose
  gallery2pdf --bind 127.0.0.1:8000 -v

ENVIRONMENT VARIABLES:
  GALLERY2PDF_BIND               Listen address (host:port)
  GALLERY2PDF_ARCHIVE_DIR        Directory receiving finished PDFs
  GALLERY2PDF_WORK_ROOT          Root for per-job working directories
  GALLERY2PDF_CONTAINER          CSS selector of the gallery container
  GALLERY2PDF_SOURCE_EXT         Extension given to downloaded images
  GALLERY2PDF_RENDER_WAIT        Seconds to wait for page readiness
  GALLERY2PDF_DOWNLOAD_TIMEOUT   Per-image download timeout in seconds
  GALLERY2PDF_DOWNLOAD_DELAY_MS  Pause between image downloads
  RUST_LOG                       Overrides -v/-q with a full tracing filter

SETUP:
  A Chromium or Chrome binary must be on PATH. Each submitted job launches
  a headless instance and closes it when the job ends; nothing persists
  between jobs except the finished PDFs in the archive directory.
"##;

/// Archive web galleries as PDFs over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "gallery2pdf",
    version,
    about = "Archive web galleries as PDFs over HTTP",
    long_about = "Serve a small web UI that accepts gallery URLs, renders each page in headless \
Chromium, downloads the gallery images in order, and bundles them into a PDF named after the \
page title.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "GALLERY2PDF_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Directory receiving finished PDFs.
    #[arg(long, env = "GALLERY2PDF_ARCHIVE_DIR", default_value = "archives")]
    archive_dir: PathBuf,

    /// Root under which per-job working directories are created.
    #[arg(long, env = "GALLERY2PDF_WORK_ROOT", default_value = "temporaries")]
    work_root: PathBuf,

    /// CSS selector of the gallery container element.
    #[arg(
        long,
        env = "GALLERY2PDF_CONTAINER",
        default_value = DEFAULT_CONTAINER_SELECTOR
    )]
    container: String,

    /// Extension (with leading dot) given to downloaded images.
    #[arg(long, env = "GALLERY2PDF_SOURCE_EXT", default_value = ".webp")]
    source_extension: String,

    /// Seconds to wait for page readiness before scraping markup.
    #[arg(long, env = "GALLERY2PDF_RENDER_WAIT", default_value_t = 3)]
    render_wait: u64,

    /// Per-image download timeout in seconds.
    #[arg(long, env = "GALLERY2PDF_DOWNLOAD_TIMEOUT", default_value_t = 15)]
    download_timeout: u64,

    /// Pause after each successful image download, in milliseconds.
    #[arg(long, env = "GALLERY2PDF_DOWNLOAD_DELAY_MS", default_value_t = 250)]
    download_delay_ms: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "GALLERY2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "GALLERY2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = JobConfig::builder()
        .container_selector(cli.container)
        .render_wait_secs(cli.render_wait)
        .download_timeout_secs(cli.download_timeout)
        .download_delay_ms(cli.download_delay_ms)
        .source_extension(cli.source_extension)
        .work_root(cli.work_root)
        .archive_dir(cli.archive_dir)
        .build()
        .context("Invalid configuration")?;

    serve(config, cli.bind)
        .await
        .context("Server exited with an error")
}
