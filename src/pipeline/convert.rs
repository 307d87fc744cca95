//! Stage 4: transcode downloaded images to PNG.
//!
//! Runs inside `spawn_blocking` since image decoding is CPU-bound and would
//! stall the async worker threads. Files are handled independently: one
//! corrupt download costs one PDF page, not the whole gallery.

use std::ffi::OsStr;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::StageError;

/// Result of one conversion stage run.
#[derive(Debug)]
pub struct ConvertOutcome {
    /// PNG files written into the converted directory.
    pub converted: usize,
    /// One [`StageError::ConvertSkipped`] per file that failed to transcode.
    pub skipped: Vec<StageError>,
}

/// Convert every `extension` file in `src` to a PNG of the same stem in
/// `dest`.
///
/// Per-file decode or encode failures are skipped and reported in the
/// outcome; only a missing directory or a panicked worker fails the stage
/// as a whole.
pub async fn convert_directory(
    src: &Path,
    dest: &Path,
    extension: &str,
) -> Result<ConvertOutcome, StageError> {
    let src = src.to_path_buf();
    let dest = dest.to_path_buf();
    let extension = extension.to_string();

    tokio::task::spawn_blocking(move || convert_directory_blocking(&src, &dest, &extension))
        .await
        .map_err(|e| StageError::ConvertFailed {
            detail: format!("convert task panicked: {e}"),
        })?
}

/// Blocking implementation of directory conversion.
fn convert_directory_blocking(
    src: &Path,
    dest: &Path,
    extension: &str,
) -> Result<ConvertOutcome, StageError> {
    for dir in [src, dest] {
        if !dir.is_dir() {
            return Err(StageError::ConvertDirUnavailable {
                path: dir.to_path_buf(),
                detail: "not a directory".to_string(),
            });
        }
    }

    let entries = std::fs::read_dir(src).map_err(|e| StageError::ConvertDirUnavailable {
        path: src.to_path_buf(),
        detail: e.to_string(),
    })?;

    let want = extension.trim_start_matches('.');
    let mut converted = 0;
    let mut skipped = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(OsStr::to_str)
            .map(|e| e.eq_ignore_ascii_case(want))
            .unwrap_or(false);
        if !matches {
            continue;
        }
        let stem = match path.file_stem().and_then(OsStr::to_str) {
            Some(s) => s,
            None => continue,
        };

        let target = dest.join(format!("{stem}.png"));
        match convert_file(&path, &target) {
            Ok(()) => {
                converted += 1;
                debug!("Converted '{}' → '{}'", path.display(), target.display());
            }
            Err(detail) => {
                let file = entry.file_name().to_string_lossy().into_owned();
                warn!("Skipping '{file}': {detail}");
                skipped.push(StageError::ConvertSkipped { file, detail });
            }
        }
    }

    info!("Converted {converted} file(s) to PNG in '{}'", dest.display());
    Ok(ConvertOutcome { converted, skipped })
}

fn convert_file(src: &Path, target: &Path) -> Result<(), String> {
    let img = image::open(src).map_err(|e| format!("decode: {e}"))?;
    img.save(target).map_err(|e| format!("encode: {e}"))
}
