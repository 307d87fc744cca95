//! Stage 1 (second half): title and image-list extraction.
//!
//! Operates on the rendered HTML string only; no I/O. The gallery container
//! is located by a configurable CSS selector and only the first match is
//! consulted, so duplicated markup further down the page cannot inflate the
//! image list.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::warn;

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

/// What the extractor recovered from one rendered gallery page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GalleryPage {
    /// Document title, whitespace-normalised. `None` when the page has no
    /// `<title>` element or it is empty.
    pub title: Option<String>,
    /// Image source URLs from the first container match, in document order.
    pub image_urls: Vec<String>,
}

/// Extract the page title and the ordered image URL list from `html`.
///
/// Images are taken from the first element matching `container_selector`
/// only. A page without such an element yields an empty list, not an error;
/// the caller decides whether that ends the job.
pub fn extract_gallery(html: &str, container_selector: &str) -> GalleryPage {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&TITLE)
        .next()
        .map(|el| normalize_text(&el.text().collect::<Vec<_>>().join(" ")))
        .filter(|t| !t.is_empty());

    let container = match Selector::parse(container_selector) {
        Ok(s) => s,
        Err(e) => {
            warn!("Container selector '{container_selector}' did not parse: {e:?}");
            return GalleryPage {
                title,
                image_urls: Vec::new(),
            };
        }
    };

    let image_urls = match doc.select(&container).next() {
        Some(gallery) => gallery
            .select(&IMG)
            .filter_map(|img| img.value().attr("src"))
            .map(str::to_string)
            .collect(),
        None => {
            warn!("No element matched container selector '{container_selector}'");
            Vec::new()
        }
    };

    GalleryPage { title, image_urls }
}

fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
