//! HTTP surface: submission form, job submission, archive browsing.
//!
//! Submission is fire-and-forget. `POST /submit-url/` answers `202 Accepted`
//! the moment the job is spawned; progress and failures are visible in the
//! logs and the archive listing, never in an HTTP response. The handlers
//! hold no job state, so restarting the server forgets nothing but any jobs
//! that were mid-flight.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::archive;
use crate::config::JobConfig;
use crate::error::GalleryError;
use crate::job;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: JobConfig,
}

impl AppState {
    pub fn new(config: JobConfig) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config }),
        }
    }

    pub fn config(&self) -> &JobConfig {
        &self.inner.config
    }
}

/// Form body for `POST /submit-url/`.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub url: String,
}

/// Immediate acknowledgement returned for a submitted URL.
#[derive(Debug, Serialize)]
pub struct SubmitAck {
    pub message: &'static str,
    pub submitted_url: String,
}

/// Build the application router.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/submit-url/", post(submit_url))
        .route("/archives/", get(archives_page))
        .route("/files/:name", get(serve_archive_file))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Create the output directories, bind, and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: JobConfig, addr: SocketAddr) -> Result<(), GalleryError> {
    for dir in [&config.work_root, &config.archive_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| GalleryError::DirectorySetup {
                path: dir.clone(),
                source: e,
            })?;
    }

    let app = build_app(AppState::new(config));

    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GalleryError::BindFailed {
                addr: addr.to_string(),
                source: e,
            })?;
    info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(GalleryError::Server)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>gallery2pdf</title></head>
<body>
  <h1>Archive a gallery</h1>
  <form action="/submit-url/" method="post">
    <input type="url" name="url" placeholder="https://example.com/gallery" size="60" required>
    <button type="submit">Archive</button>
  </form>
  <p><a href="/archives/">Browse the archive</a></p>
</body>
</html>
"#;

async fn index_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Spawn the archiving job and acknowledge immediately.
async fn submit_url(
    State(state): State<AppState>,
    Form(request): Form<SubmitRequest>,
) -> impl IntoResponse {
    info!("Accepted archive request for {}", request.url);

    let config = state.config().clone();
    let url = request.url.clone();
    tokio::spawn(async move {
        let report = job::run_job(&url, &config).await;
        if report.produced_pdf() {
            info!(
                "[{}] Archived '{}' ({} pages)",
                report.token, report.title, report.pdf_pages
            );
        } else {
            info!(
                "[{}] No PDF produced for {url} ({} error(s))",
                report.token,
                report.errors.len()
            );
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(SubmitAck {
            message: "Request accepted. Processing started in background.",
            submitted_url: request.url,
        }),
    )
}

/// List the archived PDFs as links.
///
/// A missing or unreadable archive directory renders as a message inside
/// the page; browsing the archive is never an HTTP error.
async fn archives_page(State(state): State<AppState>) -> Html<String> {
    let body = match archive::list_archives(&state.config().archive_dir) {
        Ok(names) if names.is_empty() => "  <p>No archives yet.</p>".to_string(),
        Ok(names) => {
            let mut items = String::new();
            for name in &names {
                let href = html_escape::encode_double_quoted_attribute(name);
                let label = html_escape::encode_text(name);
                items.push_str(&format!(
                    "    <li><a href=\"/files/{href}\">{label}</a></li>\n"
                ));
            }
            format!("  <ul>\n{items}  </ul>")
        }
        Err(e) => {
            error!("Could not read archive directory: {e}");
            format!(
                "  <p>Archive directory is not available: {}</p>",
                html_escape::encode_text(&e.to_string())
            )
        }
    };

    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Archived galleries</title></head>\n<body>\n  <h1>Archived galleries</h1>\n{body}\n  <p><a href=\"/\">Submit another URL</a></p>\n</body>\n</html>\n"
    ))
}

/// Serve one archived file by bare name.
async fn serve_archive_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    // Reject anything that is not a bare file name; the route parameter is
    // percent-decoded, so `..%2F` arrives here as a real separator.
    if !archive::is_plain_file_name(&name) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let path = state.config().archive_dir.join(&name);
    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return StatusCode::NOT_FOUND.into_response();
        }
        Err(e) => {
            error!("Could not read '{}': {e}", path.display());
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&name))
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{name}\""),
        )
        .body(Body::from(bytes))
    {
        Ok(response) => response,
        Err(e) => {
            error!("Could not build response for '{name}': {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn content_type_for(name: &str) -> &'static str {
    if name.to_ascii_lowercase().ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use crate::pipeline::fetch::PageFetcher;
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    struct EmptyPageFetcher;

    #[async_trait]
    impl PageFetcher for EmptyPageFetcher {
        async fn fetch_rendered(&self, _url: &str, _wait: Duration) -> Result<String, StageError> {
            Ok("<html><body></body></html>".to_string())
        }
    }

    fn test_state(archive_dir: &std::path::Path) -> AppState {
        let config = JobConfig::builder()
            .work_root(archive_dir.join("temporaries"))
            .archive_dir(archive_dir)
            .download_delay_ms(0)
            .fetcher(Arc::new(EmptyPageFetcher))
            .build()
            .unwrap();
        AppState::new(config)
    }

    #[tokio::test]
    async fn index_serves_the_submission_form() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(test_state(dir.path()));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("/submit-url/"));
        assert!(html.contains("name=\"url\""));
    }

    #[tokio::test]
    async fn submission_is_acknowledged_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(test_state(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/submit-url/")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("url=https%3A%2F%2Fexample.com%2Fgallery"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let ack: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            ack["message"],
            "Request accepted. Processing started in background."
        );
        assert_eq!(ack["submitted_url"], "https://example.com/gallery");
    }

    #[tokio::test]
    async fn archive_listing_links_every_pdf() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("First Gallery.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("second.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"x").unwrap();
        let app = build_app(test_state(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/archives/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("/files/First Gallery.pdf"));
        assert!(html.contains("second.pdf"));
        assert!(!html.contains("readme.txt"));
    }

    #[tokio::test]
    async fn missing_archive_directory_renders_in_page() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir.path().join("never-created"));
        let app = build_app(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/archives/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("not available"));
    }

    #[tokio::test]
    async fn file_handler_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("real.pdf"), b"%PDF").unwrap();
        let app = build_app(test_state(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/files/..%2Freal.pdf")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn file_handler_serves_pdfs_inline() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("real.pdf"), b"%PDF-1.4 data").unwrap();
        let app = build_app(test_state(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/files/real.pdf")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/pdf"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "inline; filename=\"real.pdf\""
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn unknown_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(test_state(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/files/nope.pdf")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
