//! Job outcome types.
//!
//! A job never returns `Err`: every failure a stage can produce is recorded
//! here instead, so callers (and the logs) can inspect partial progress
//! rather than losing the whole picture to one bad stage. The submitter has
//! already been acknowledged by the time a job runs, so this report is the
//! only record of what actually happened.

use crate::error::StageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete record of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    /// The job's working-directory token, e.g. `temp1724222000123img`.
    pub token: String,

    /// The page URL the job was submitted for.
    pub source_url: String,

    /// Page title after the default-name fallback, before sanitising.
    pub title: String,

    /// Image sources found inside the gallery container.
    pub images_found: usize,

    /// Images written to the `downloaded` directory before the stage
    /// finished or stopped on its first error.
    pub images_downloaded: usize,

    /// Images transcoded into the `converted` directory.
    pub images_converted: usize,

    /// Pages in the produced PDF; 0 when bundling failed.
    pub pdf_pages: usize,

    /// Final archive path, if a PDF was written.
    pub pdf_path: Option<PathBuf>,

    /// Every stage failure the job accumulated, in occurrence order.
    pub errors: Vec<StageError>,

    /// Per-stage wall-clock timings.
    pub stats: JobStats,
}

impl JobReport {
    /// True when the job ended at its single short-circuit point:
    /// the fetch produced no gallery images, so no directories were created
    /// and no later stage ran.
    pub fn short_circuited(&self) -> bool {
        self.images_found == 0
    }

    /// True when a PDF reached the archive.
    pub fn produced_pdf(&self) -> bool {
        self.pdf_path.is_some()
    }
}

/// Wall-clock timings for the stages that move data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobStats {
    pub fetch_duration_ms: u64,
    pub download_duration_ms: u64,
    pub convert_duration_ms: u64,
    pub bundle_duration_ms: u64,
    pub total_duration_ms: u64,
}
