//! End-to-end pipeline tests for gallery2pdf.
//!
//! Jobs run against a canned page fetcher and an in-process image host on a
//! loopback port, so the whole pipeline — download, convert, bundle,
//! cleanup — executes for real without a browser or outside network access.
//!
//! Run with:
//!   cargo test --test pipeline

use std::io::Cursor;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Path as RoutePath;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use gallery2pdf::{run_job, JobConfig, PageFetcher, StageError};

// ── Test helpers ─────────────────────────────────────────────────────────

/// Page fetcher that returns fixed HTML instead of launching a browser.
struct FixtureFetcher(String);

#[async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch_rendered(&self, _url: &str, _wait: Duration) -> Result<String, StageError> {
        Ok(self.0.clone())
    }
}

/// A 4x4 WebP whose colour varies with `n`, so pages are distinguishable.
fn webp_bytes(n: usize) -> Vec<u8> {
    let shade = (n % 255) as u8;
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        4,
        4,
        image::Rgb([shade, 0, 0]),
    ));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::WebP).unwrap();
    buf.into_inner()
}

/// Serve `GET /img/{n}` on a loopback port; `fail_at` answers 500 instead.
async fn spawn_image_host(fail_at: Option<usize>) -> SocketAddr {
    let app = Router::new().route(
        "/img/:n",
        get(move |RoutePath(n): RoutePath<usize>| async move {
            if Some(n) == fail_at {
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
            ([(header::CONTENT_TYPE, "image/webp")], webp_bytes(n)).into_response()
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// A gallery page whose `#post-comic` container lists `count` image URLs.
fn gallery_html(addr: SocketAddr, count: usize, title: &str) -> String {
    let mut imgs = String::new();
    for n in 1..=count {
        imgs.push_str(&format!("<img src=\"http://{addr}/img/{n}\">\n"));
    }
    format!(
        "<html><head><title>{title}</title></head><body>\
         <div id=\"post-comic\">{imgs}</div></body></html>"
    )
}

fn test_config(base: &Path, html: String) -> JobConfig {
    JobConfig::builder()
        .work_root(base.join("temporaries"))
        .archive_dir(base.join("archives"))
        .download_delay_ms(0)
        .download_timeout_secs(5)
        .fetcher(Arc::new(FixtureFetcher(html)))
        .build()
        .unwrap()
}

fn assert_is_pdf(path: &Path) {
    let bytes = std::fs::read(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()));
    assert!(bytes.starts_with(b"%PDF"), "{} is not a PDF", path.display());
}

// ── Full pipeline runs ───────────────────────────────────────────────────

#[tokio::test]
async fn full_run_archives_one_page_per_image() {
    let base = tempfile::tempdir().unwrap();
    let host = spawn_image_host(None).await;
    let config = test_config(base.path(), gallery_html(host, 3, "Autumn Walk"));

    let report = run_job("https://example.com/autumn", &config).await;

    assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
    assert_eq!(report.images_found, 3);
    assert_eq!(report.images_downloaded, 3);
    assert_eq!(report.images_converted, 3);
    assert_eq!(report.pdf_pages, 3);
    assert_eq!(report.title, "Autumn Walk");

    let pdf = base.path().join("archives").join("Autumn Walk.pdf");
    assert_eq!(report.pdf_path.as_deref(), Some(pdf.as_path()));
    assert_is_pdf(&pdf);

    // Working tree is gone; only the archive remains.
    assert!(!base.path().join("temporaries").join(&report.token).exists());
}

#[tokio::test]
async fn ten_image_gallery_keeps_every_page() {
    let base = tempfile::tempdir().unwrap();
    let host = spawn_image_host(None).await;
    let config = test_config(base.path(), gallery_html(host, 10, "Long Gallery"));

    let report = run_job("https://example.com/long", &config).await;

    assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
    assert_eq!(report.images_downloaded, 10);
    assert_eq!(report.pdf_pages, 10);
    assert_is_pdf(&base.path().join("archives").join("Long Gallery.pdf"));
}

#[tokio::test]
async fn failed_download_truncates_the_gallery() {
    let base = tempfile::tempdir().unwrap();
    let host = spawn_image_host(Some(3)).await;
    let config = test_config(base.path(), gallery_html(host, 5, "Truncated"));

    let report = run_job("https://example.com/truncated", &config).await;

    assert_eq!(report.images_found, 5);
    assert_eq!(report.images_downloaded, 2);
    assert_eq!(report.images_converted, 2);
    assert_eq!(report.pdf_pages, 2);

    assert_eq!(report.errors.len(), 1);
    match &report.errors[0] {
        StageError::DownloadFailed { index, detail, .. } => {
            assert_eq!(*index, 3);
            assert!(detail.contains("500"), "detail: {detail}");
        }
        other => panic!("expected DownloadFailed, got {other:?}"),
    }

    // The unbroken prefix still becomes a PDF.
    assert_is_pdf(&base.path().join("archives").join("Truncated.pdf"));
    assert!(!base.path().join("temporaries").join(&report.token).exists());
}

#[tokio::test]
async fn concurrent_jobs_are_isolated() {
    let base = tempfile::tempdir().unwrap();
    let host = spawn_image_host(None).await;
    let config_a = test_config(base.path(), gallery_html(host, 2, "Gallery A"));
    let config_b = test_config(base.path(), gallery_html(host, 3, "Gallery B"));

    let (report_a, report_b) = tokio::join!(
        run_job("https://example.com/a", &config_a),
        run_job("https://example.com/b", &config_b),
    );

    assert_ne!(report_a.token, report_b.token);
    assert_eq!(report_a.pdf_pages, 2);
    assert_eq!(report_b.pdf_pages, 3);
    assert_is_pdf(&base.path().join("archives").join("Gallery A.pdf"));
    assert_is_pdf(&base.path().join("archives").join("Gallery B.pdf"));

    // Both working trees were cleaned up.
    let leftovers: Vec<_> = std::fs::read_dir(base.path().join("temporaries"))
        .unwrap()
        .collect();
    assert!(leftovers.is_empty(), "leftovers: {leftovers:?}");
}

// ── Archive naming ───────────────────────────────────────────────────────

#[tokio::test]
async fn title_is_sanitised_in_archive_name() {
    let base = tempfile::tempdir().unwrap();
    let host = spawn_image_host(None).await;
    let config = test_config(
        base.path(),
        gallery_html(host, 1, r#"Spring: "Best" Walk?"#),
    );

    let report = run_job("https://example.com/spring", &config).await;

    assert_eq!(report.pdf_pages, 1);
    assert_is_pdf(&base.path().join("archives").join("Spring Best Walk.pdf"));
}

#[tokio::test]
async fn hostile_title_cannot_escape_the_archive() {
    let base = tempfile::tempdir().unwrap();
    let host = spawn_image_host(None).await;
    let config = test_config(base.path(), gallery_html(host, 1, "../../etc/passwd"));

    let report = run_job("https://example.com/hostile", &config).await;

    assert_eq!(report.pdf_pages, 1);
    let pdf = report.pdf_path.expect("a PDF was archived");
    assert_eq!(pdf.parent(), Some(base.path().join("archives").as_path()));
    assert_eq!(pdf.file_name().unwrap(), "....etcpasswd.pdf");
    assert_is_pdf(&pdf);
}

#[tokio::test]
async fn untitled_page_gets_a_generated_name() {
    let base = tempfile::tempdir().unwrap();
    let host = spawn_image_host(None).await;
    let html = format!(
        "<html><body><div id=\"post-comic\">\
         <img src=\"http://{host}/img/1\"></div></body></html>"
    );
    let config = test_config(base.path(), html);

    let report = run_job("https://example.com/untitled", &config).await;

    assert_eq!(report.pdf_pages, 1);
    assert_eq!(report.title, format!("gallery-{}", report.token));
    assert_is_pdf(
        &base
            .path()
            .join("archives")
            .join(format!("gallery-{}.pdf", report.token)),
    );
}

#[tokio::test]
async fn resubmitted_title_overwrites_the_archive() {
    let base = tempfile::tempdir().unwrap();
    let host = spawn_image_host(None).await;

    let first = test_config(base.path(), gallery_html(host, 3, "Same Walk"));
    let report = run_job("https://example.com/v1", &first).await;
    assert_eq!(report.pdf_pages, 3);

    let second = test_config(base.path(), gallery_html(host, 2, "Same Walk"));
    let report = run_job("https://example.com/v2", &second).await;
    assert_eq!(report.pdf_pages, 2);

    // Still exactly one archive under that title.
    let pdfs: Vec<_> = std::fs::read_dir(base.path().join("archives"))
        .unwrap()
        .flatten()
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(pdfs, vec!["Same Walk.pdf"]);
}
