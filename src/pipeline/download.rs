//! Stage 3: sequential image download.
//!
//! Downloads every extracted image URL in list order into the job's
//! `downloaded/` directory under a numbered name. Ordering is load-bearing:
//! the on-disk index is what later puts PDF pages in gallery order, so the
//! stage is strictly sequential and stops at the first failure instead of
//! leaving gaps in the sequence.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::JobConfig;
use crate::error::StageError;

/// Result of one download stage run.
///
/// `saved` counts files fully written before the stage stopped; when `error`
/// is set the stage ended early and `saved` is the length of the unbroken
/// prefix on disk.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub saved: usize,
    pub error: Option<StageError>,
}

/// `{stem}{index}{extension}` with a 1-based index.
fn indexed_name(stem: &str, index: usize, extension: &str) -> String {
    format!("{stem}{index}{extension}")
}

/// Download `urls` one by one into `dest`, naming files `{stem}{n}{ext}`.
///
/// Never returns `Err`: a failure is folded into the outcome together with
/// the count of files already on disk, so the caller can carry on with a
/// truncated gallery.
pub async fn download_images(
    urls: &[String],
    dest: &Path,
    stem: &str,
    config: &JobConfig,
) -> DownloadOutcome {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(config.download_timeout_secs))
        .user_agent(config.user_agent.as_str())
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            return DownloadOutcome {
                saved: 0,
                error: Some(StageError::DownloadFailed {
                    index: 1,
                    url: urls.first().cloned().unwrap_or_default(),
                    detail: format!("http client: {e}"),
                }),
            }
        }
    };

    let mut saved = 0;
    for (i, url) in urls.iter().enumerate() {
        let index = i + 1;
        if let Err(e) = fetch_one(&client, url, index, dest, stem, config).await {
            return DownloadOutcome {
                saved,
                error: Some(e),
            };
        }
        saved += 1;
        debug!("Saved image {index}/{} from {url}", urls.len());

        // Pause between requests so bursts of gallery-sized fetches do not
        // hammer the image host.
        if config.download_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.download_delay_ms)).await;
        }
    }

    info!("Downloaded {saved} image(s) into '{}'", dest.display());
    DownloadOutcome { saved, error: None }
}

/// Fetch a single image and write it under its numbered name.
async fn fetch_one(
    client: &reqwest::Client,
    url: &str,
    index: usize,
    dest: &Path,
    stem: &str,
    config: &JobConfig,
) -> Result<(), StageError> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            StageError::DownloadTimeout {
                index,
                url: url.to_string(),
                secs: config.download_timeout_secs,
            }
        } else {
            StageError::DownloadFailed {
                index,
                url: url.to_string(),
                detail: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(StageError::DownloadFailed {
            index,
            url: url.to_string(),
            detail: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| StageError::DownloadFailed {
            index,
            url: url.to_string(),
            detail: e.to_string(),
        })?;

    let file_path = dest.join(indexed_name(stem, index, &config.source_extension));
    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| StageError::DownloadFailed {
            index,
            url: url.to_string(),
            detail: format!("write '{}': {e}", file_path.display()),
        })
}
