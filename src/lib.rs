//! # gallery2pdf
//!
//! Archive JavaScript-rendered image galleries as PDFs over HTTP.
//!
//! ## Why this crate?
//!
//! Gallery pages assemble their image lists client-side, so `curl` and
//! feed readers see an empty shell, and the images themselves disappear
//! when the site does. This crate renders the page in a headless browser
//! and files the gallery's images, in their published order, as a single
//! PDF named after the page title: one request, one durable artifact.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Fetch     render the page in headless Chromium, extract
//!  │               title + image list (chromiumoxide + scraper)
//!  ├─ 2. Prepare   create the per-job working tree under `temporaries/`
//!  ├─ 3. Download  save each image sequentially, numbered 1..N (reqwest)
//!  ├─ 4. Convert   transcode downloads to PNG (image, spawn_blocking)
//!  ├─ 5. Bundle    one PDF page per image, natural order (printpdf)
//!  └─ 6. Cleanup   remove the working tree; the PDF stays in `archives/`
//! ```
//!
//! Stages never abort the job: each failure is logged, recorded in the
//! [`JobReport`], and the pipeline falls through to the next stage. The one
//! exception is a fetch that finds no images, which ends the job before any
//! directory is created.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gallery2pdf::{serve, JobConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = JobConfig::default();
//!     serve(config, "0.0.0.0:8000".parse()?).await?;
//!     Ok(())
//! }
//! ```
//!
//! Jobs can also be driven without the server:
//!
//! ```rust,no_run
//! use gallery2pdf::{run_job, JobConfig};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = JobConfig::default();
//! let report = run_job("https://example.com/gallery", &config).await;
//! println!("{} page(s) archived", report.pdf_pages);
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `gallery2pdf` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when embedding the library to avoid pulling in CLI-only deps:
//! ```toml
//! gallery2pdf = { version = "0.2", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod archive;
pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod report;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{JobConfig, JobConfigBuilder, DEFAULT_CONTAINER_SELECTOR, DEFAULT_USER_AGENT};
pub use error::{GalleryError, Stage, StageError};
pub use job::{run_job, JobToken};
pub use pipeline::fetch::{ChromiumFetcher, PageFetcher};
pub use report::{JobReport, JobStats};
pub use server::{build_app, serve, AppState};
