//! Configuration types for gallery archiving jobs.
//!
//! All pipeline behaviour is controlled through [`JobConfig`], built via its
//! [`JobConfigBuilder`]. The server holds one config and hands a clone to
//! every spawned job, so a whole deployment is described by a single struct.
//!
//! # Design choice: builder over constructor
//! Nine positional arguments would make every call site unreadable and break
//! each time a knob is added. With the builder, callers touch only the
//! settings they disagree with, and `build()` front-loads validation
//! (selector syntax, extension shape) so a bad value fails at startup rather
//! than midway through a background job.

use crate::error::GalleryError;
use crate::pipeline::fetch::PageFetcher;
use scraper::Selector;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Request header presented to image hosts. Some galleries refuse requests
/// that do not look like they come from a browser.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Element whose descendant `<img>` tags constitute the gallery.
pub const DEFAULT_CONTAINER_SELECTOR: &str = "#post-comic";

/// Configuration for gallery archiving jobs.
///
/// Built via [`JobConfig::builder()`] or using [`JobConfig::default()`].
///
/// # Example
/// ```rust
/// use gallery2pdf::JobConfig;
///
/// let config = JobConfig::builder()
///     .container_selector("#gallery")
///     .download_delay_ms(0)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct JobConfig {
    /// CSS selector of the gallery container. Default: `#post-comic`.
    ///
    /// Only the first matching element is consulted; its descendant `<img>`
    /// `src` values, in document order, become the job's image list.
    pub container_selector: String,

    /// Seconds to wait for page readiness before scraping markup. Default: 3.
    ///
    /// The fetcher waits up to this bound for the page load event, then reads
    /// whatever markup is present. A timeout here is not a failure: galleries
    /// render their image list early, long before slow third-party assets
    /// finish, so the partial document is usually complete enough.
    pub render_wait_secs: u64,

    /// Per-image download timeout in seconds. Default: 15.
    pub download_timeout_secs: u64,

    /// Pause after each successful image download, in milliseconds. Default: 250.
    ///
    /// Sequential downloads with a fixed gap keep the request rate low enough
    /// that image hosts do not throttle or ban the client. Set to 0 in tests.
    pub download_delay_ms: u64,

    /// Extension (with leading dot) given to downloaded files, and the only
    /// extension the converter will pick up. Default: `.webp`.
    pub source_extension: String,

    /// User-Agent header for image requests. Default: [`DEFAULT_USER_AGENT`].
    pub user_agent: String,

    /// Root under which per-job working trees are created. Default: `temporaries`.
    pub work_root: PathBuf,

    /// Permanent directory receiving finished PDFs. Default: `archives`.
    pub archive_dir: PathBuf,

    /// Pre-constructed page fetcher. If `None`, each job launches a headless
    /// Chromium session via [`crate::pipeline::fetch::ChromiumFetcher`].
    /// Injecting a fetcher here is the seam tests use to drive the pipeline
    /// without a browser.
    pub fetcher: Option<Arc<dyn PageFetcher>>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            container_selector: DEFAULT_CONTAINER_SELECTOR.to_string(),
            render_wait_secs: 3,
            download_timeout_secs: 15,
            download_delay_ms: 250,
            source_extension: ".webp".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            work_root: PathBuf::from("temporaries"),
            archive_dir: PathBuf::from("archives"),
            fetcher: None,
        }
    }
}

impl fmt::Debug for JobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobConfig")
            .field("container_selector", &self.container_selector)
            .field("render_wait_secs", &self.render_wait_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("download_delay_ms", &self.download_delay_ms)
            .field("source_extension", &self.source_extension)
            .field("work_root", &self.work_root)
            .field("archive_dir", &self.archive_dir)
            .field("fetcher", &self.fetcher.as_ref().map(|_| "<dyn PageFetcher>"))
            .finish()
    }
}

impl JobConfig {
    /// Create a new builder for `JobConfig`.
    pub fn builder() -> JobConfigBuilder {
        JobConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`JobConfig`].
#[derive(Debug)]
pub struct JobConfigBuilder {
    config: JobConfig,
}

impl JobConfigBuilder {
    pub fn container_selector(mut self, selector: impl Into<String>) -> Self {
        self.config.container_selector = selector.into();
        self
    }

    pub fn render_wait_secs(mut self, secs: u64) -> Self {
        self.config.render_wait_secs = secs.min(120);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn download_delay_ms(mut self, ms: u64) -> Self {
        self.config.download_delay_ms = ms;
        self
    }

    pub fn source_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.source_extension = ext.into();
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.work_root = root.into();
        self
    }

    pub fn archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.archive_dir = dir.into();
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.config.fetcher = Some(fetcher);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<JobConfig, GalleryError> {
        let c = &self.config;
        if c.container_selector.trim().is_empty() {
            return Err(GalleryError::InvalidConfig(
                "container selector must not be empty".into(),
            ));
        }
        if let Err(e) = Selector::parse(&c.container_selector) {
            return Err(GalleryError::InvalidConfig(format!(
                "container selector '{}' does not parse: {}",
                c.container_selector, e
            )));
        }
        if !c.source_extension.starts_with('.') || c.source_extension.len() < 2 {
            return Err(GalleryError::InvalidConfig(format!(
                "source extension must start with '.' and name a format, got '{}'",
                c.source_extension
            )));
        }
        if c.work_root.as_os_str().is_empty() || c.archive_dir.as_os_str().is_empty() {
            return Err(GalleryError::InvalidConfig(
                "work root and archive directory must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
