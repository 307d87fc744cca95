//! Error types for the gallery2pdf library.
//!
//! Failures here have two scopes, and each gets its own type:
//!
//! * [`GalleryError`] — **Fatal**: the process cannot start or serve at all
//!   (invalid configuration, directory setup failure, bind failure). Returned
//!   as `Err(GalleryError)` from configuration builders and server startup.
//!
//! * [`StageError`] — **Non-fatal**: one pipeline stage of one job failed.
//!   Stored inside [`crate::report::JobReport`] and logged with its stage
//!   identifier, never propagated across a stage boundary. A job always runs
//!   to its end (or its single short-circuit point) no matter how many of
//!   these it accumulates.
//!
//! The separation encodes the pipeline's isolation contract in the type
//! system: nothing a running job does can produce a `GalleryError`, so no
//! stage failure can ever escape a job.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the gallery2pdf library.
///
/// Per-stage failures use [`StageError`] and are stored in
/// [`crate::report::JobReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum GalleryError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Startup errors ────────────────────────────────────────────────────
    /// Could not create the archive directory or the working root.
    #[error("Failed to prepare directory '{path}': {source}")]
    DirectorySetup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not bind the listening socket.
    #[error("Failed to bind {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The accept loop itself failed.
    #[error("Server error: {0}")]
    Server(#[source] std::io::Error),
}

/// The six pipeline stages, in execution order.
///
/// Used to tag log lines and [`StageError`] values so a failure can always be
/// traced back to the stage that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Stage {
    Fetch,
    Prepare,
    Download,
    Convert,
    Bundle,
    Cleanup,
}

impl Stage {
    /// 1-based position in the pipeline, matching the numbered log lines.
    pub fn number(self) -> u8 {
        match self {
            Stage::Fetch => 1,
            Stage::Prepare => 2,
            Stage::Download => 3,
            Stage::Convert => 4,
            Stage::Bundle => 5,
            Stage::Cleanup => 6,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Prepare => "prepare",
            Stage::Download => "download",
            Stage::Convert => "convert",
            Stage::Bundle => "bundle",
            Stage::Cleanup => "cleanup",
        };
        write!(f, "{}", name)
    }
}

/// A non-fatal error from a single pipeline stage.
///
/// Stored in [`crate::report::JobReport::errors`] when a stage fails.
/// The job continues past every one of these; only an empty fetch result
/// short-circuits, and that is not an error at all.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum StageError {
    /// Rendering session or navigation failed; the job has no markup to work with.
    #[error("fetch: could not render '{url}': {detail}")]
    FetchFailed { url: String, detail: String },

    /// Working-directory creation failed.
    #[error("prepare: could not create '{path}': {detail}")]
    PrepareFailed { path: PathBuf, detail: String },

    /// An image fetch failed; all later images in the list were abandoned.
    #[error("download: image {index} from '{url}' failed: {detail}")]
    DownloadFailed {
        index: usize,
        url: String,
        detail: String,
    },

    /// An image fetch exceeded the per-request timeout; later images abandoned.
    #[error("download: image {index} from '{url}' timed out after {secs}s")]
    DownloadTimeout { index: usize, url: String, secs: u64 },

    /// One file could not be transcoded; the stage skipped it and went on.
    #[error("convert: skipped '{file}': {detail}")]
    ConvertSkipped { file: String, detail: String },

    /// A conversion directory was missing or unreadable.
    #[error("convert: directory '{path}' is not accessible: {detail}")]
    ConvertDirUnavailable { path: PathBuf, detail: String },

    /// The conversion stage itself fell over before finishing the directory.
    #[error("convert: {detail}")]
    ConvertFailed { detail: String },

    /// No eligible images were present, so no PDF was written.
    #[error("bundle: no eligible images in '{path}'")]
    NothingToBundle { path: PathBuf },

    /// PDF assembly or the final write failed; no PDF was produced.
    #[error("bundle: {detail}")]
    BundleFailed { detail: String },

    /// Working-tree removal failed; the directory may be left behind.
    #[error("cleanup: could not remove '{path}': {detail}")]
    CleanupFailed { path: PathBuf, detail: String },
}

impl StageError {
    /// The stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            StageError::FetchFailed { .. } => Stage::Fetch,
            StageError::PrepareFailed { .. } => Stage::Prepare,
            StageError::DownloadFailed { .. } | StageError::DownloadTimeout { .. } => {
                Stage::Download
            }
            StageError::ConvertSkipped { .. }
            | StageError::ConvertDirUnavailable { .. }
            | StageError::ConvertFailed { .. } => Stage::Convert,
            StageError::NothingToBundle { .. } | StageError::BundleFailed { .. } => Stage::Bundle,
            StageError::CleanupFailed { .. } => Stage::Cleanup,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_numbers_are_ordered() {
        let stages = [
            Stage::Fetch,
            Stage::Prepare,
            Stage::Download,
            Stage::Convert,
            Stage::Bundle,
            Stage::Cleanup,
        ];
        for (i, s) in stages.iter().enumerate() {
            assert_eq!(s.number() as usize, i + 1);
        }
    }

    #[test]
    fn download_failure_display() {
        let e = StageError::DownloadFailed {
            index: 4,
            url: "https://host/img4.webp".into(),
            detail: "HTTP 404 Not Found".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("image 4"), "got: {msg}");
        assert!(msg.contains("404"), "got: {msg}");
    }

    #[test]
    fn download_timeout_display() {
        let e = StageError::DownloadTimeout {
            index: 2,
            url: "https://host/img2.webp".into(),
            secs: 15,
        };
        assert!(e.to_string().contains("15s"));
    }

    #[test]
    fn stage_tagging_matches_variant() {
        let e = StageError::NothingToBundle {
            path: PathBuf::from("converted"),
        };
        assert_eq!(e.stage(), Stage::Bundle);

        let e = StageError::CleanupFailed {
            path: PathBuf::from("temp123img"),
            detail: "busy".into(),
        };
        assert_eq!(e.stage(), Stage::Cleanup);
    }

    #[test]
    fn invalid_config_display() {
        let e = GalleryError::InvalidConfig("extension must start with '.'".into());
        assert!(e.to_string().contains("extension"));
    }
}
