//! Background job orchestration.
//!
//! One job archives one gallery URL: fetch, prepare, download, convert,
//! bundle, clean up. The submitter was acknowledged before the job started,
//! so no stage failure can propagate anywhere useful; instead every failure
//! is logged and recorded in the [`JobReport`] and the remaining stages run
//! against whatever state is on disk. The single exception is a fetch that
//! yields no images: the job then ends immediately, before any directory
//! has been created.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::archive;
use crate::config::JobConfig;
use crate::error::StageError;
use crate::pipeline::bundle::bundle_directory;
use crate::pipeline::convert::convert_directory;
use crate::pipeline::download::download_images;
use crate::pipeline::extract::{extract_gallery, GalleryPage};
use crate::pipeline::fetch::{ChromiumFetcher, PageFetcher};
use crate::report::{JobReport, JobStats};

/// Millisecond timestamp of the most recently issued token.
static LAST_TOKEN_MS: AtomicU64 = AtomicU64::new(0);

/// Per-job namespace token, e.g. `temp1724222000123img`.
///
/// The embedded number is a unix-epoch millisecond timestamp, bumped past
/// the previous token when two jobs land on the same millisecond. Tokens are
/// therefore strictly increasing process-wide, which keeps concurrent jobs'
/// working directories and file stems disjoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobToken(String);

impl JobToken {
    /// Issue the next token.
    pub fn next() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let mut prev = LAST_TOKEN_MS.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match LAST_TOKEN_MS.compare_exchange_weak(
                prev,
                next,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Self(format!("temp{next}img")),
                Err(actual) => prev = actual,
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The per-job directory layout under the work root:
/// `{work_root}/{token}/downloaded` and `{work_root}/{token}/converted`.
///
/// Constructing the tree computes paths only; `create` and `remove` do the
/// I/O so the orchestrator can keep running later stages against the paths
/// even when an earlier filesystem step failed.
struct WorkingTree {
    root: PathBuf,
    downloaded: PathBuf,
    converted: PathBuf,
}

impl WorkingTree {
    fn new(work_root: &Path, token: &JobToken) -> Self {
        let root = work_root.join(token.as_str());
        Self {
            downloaded: root.join("downloaded"),
            converted: root.join("converted"),
            root,
        }
    }

    fn create(&self) -> Result<(), StageError> {
        for dir in [&self.downloaded, &self.converted] {
            std::fs::create_dir_all(dir).map_err(|e| StageError::PrepareFailed {
                path: dir.clone(),
                detail: e.to_string(),
            })?;
        }
        Ok(())
    }

    fn remove(&self) -> Result<(), StageError> {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            // Nothing on disk (e.g. prepare failed) leaves nothing to clean.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StageError::CleanupFailed {
                path: self.root.clone(),
                detail: e.to_string(),
            }),
        }
    }
}

fn resolve_fetcher(config: &JobConfig) -> Arc<dyn PageFetcher> {
    match &config.fetcher {
        Some(f) => Arc::clone(f),
        None => Arc::new(ChromiumFetcher::new()),
    }
}

/// Run one archiving job to completion and report what happened.
///
/// Never fails: every stage error ends up in [`JobReport::errors`] and the
/// job continues with the next stage. Call this from a spawned task; the
/// HTTP layer does not await it.
pub async fn run_job(url: &str, config: &JobConfig) -> JobReport {
    let token = JobToken::next();
    let total_start = Instant::now();
    info!("[{token}] Job started for {url}");

    let mut report = JobReport {
        token: token.to_string(),
        source_url: url.to_string(),
        title: String::new(),
        images_found: 0,
        images_downloaded: 0,
        images_converted: 0,
        pdf_pages: 0,
        pdf_path: None,
        errors: Vec::new(),
        stats: JobStats::default(),
    };

    // ── Stage 1/6: Fetch and extract ─────────────────────────────────────
    let fetch_start = Instant::now();
    let fetcher = resolve_fetcher(config);
    let wait = Duration::from_secs(config.render_wait_secs);
    let page = match fetcher.fetch_rendered(url, wait).await {
        Ok(html) => extract_gallery(&html, &config.container_selector),
        Err(e) => {
            warn!("[{token}] Fetch failed: {e}");
            report.errors.push(e);
            GalleryPage::default()
        }
    };
    report.stats.fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;
    report.images_found = page.image_urls.len();

    let title = page.title.unwrap_or_else(|| format!("gallery-{token}"));
    report.title = title.clone();

    if page.image_urls.is_empty() {
        info!("[{token}] No gallery images found, nothing to archive");
        report.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        return report;
    }
    info!(
        "[{token}] Found {} image(s) under title '{title}'",
        page.image_urls.len()
    );

    // ── Stage 2/6: Prepare working tree ──────────────────────────────────
    let tree = WorkingTree::new(&config.work_root, &token);
    if let Err(e) = tree.create() {
        warn!("[{token}] Prepare failed: {e}");
        report.errors.push(e);
    }

    // ── Stage 3/6: Download images ───────────────────────────────────────
    let download_start = Instant::now();
    let outcome =
        download_images(&page.image_urls, &tree.downloaded, token.as_str(), config).await;
    report.stats.download_duration_ms = download_start.elapsed().as_millis() as u64;
    report.images_downloaded = outcome.saved;
    if let Some(e) = outcome.error {
        warn!(
            "[{token}] Download stopped after {} image(s): {e}",
            outcome.saved
        );
        report.errors.push(e);
    }

    // ── Stage 4/6: Convert to PNG ────────────────────────────────────────
    let convert_start = Instant::now();
    match convert_directory(&tree.downloaded, &tree.converted, &config.source_extension).await {
        Ok(converted) => {
            report.images_converted = converted.converted;
            for e in &converted.skipped {
                warn!("[{token}] {e}");
            }
            report.errors.extend(converted.skipped);
        }
        Err(e) => {
            warn!("[{token}] Convert failed: {e}");
            report.errors.push(e);
        }
    }
    report.stats.convert_duration_ms = convert_start.elapsed().as_millis() as u64;

    // ── Stage 5/6: Bundle into PDF ───────────────────────────────────────
    let bundle_start = Instant::now();
    let base = archive::archive_base_name(&title, &format!("gallery-{token}"));
    match bundle_directory(&tree.converted, &config.archive_dir, &base).await {
        Ok(summary) => {
            report.pdf_pages = summary.page_count;
            report.pdf_path = Some(summary.path);
        }
        Err(e) => {
            warn!("[{token}] Bundle failed: {e}");
            report.errors.push(e);
        }
    }
    report.stats.bundle_duration_ms = bundle_start.elapsed().as_millis() as u64;

    // ── Stage 6/6: Clean up working tree ─────────────────────────────────
    if let Err(e) = tree.remove() {
        warn!("[{token}] Cleanup failed: {e}");
        report.errors.push(e);
    }

    report.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "[{token}] Job finished: {}/{} images archived, {} error(s), {}ms",
        report.pdf_pages,
        report.images_found,
        report.errors.len(),
        report.stats.total_duration_ms
    );
    report
}
