//! Pipeline stages for gallery-to-PDF archiving.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. stub out the browser in tests) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ extract ──▶ download ──▶ convert ──▶ bundle
//! (chromium) (scraper)   (reqwest)    (image)    (printpdf)
//! ```
//!
//! 1. [`fetch`]    — render the gallery page in a headless browser and
//!    capture the post-JavaScript HTML
//! 2. [`extract`]  — pull the page title and the ordered image URL list out
//!    of the configured container element
//! 3. [`download`] — save each image sequentially under a numbered name;
//!    the only stage with plain HTTP I/O
//! 4. [`convert`]  — transcode the downloaded files to PNG; runs in
//!    `spawn_blocking` because image decoding is CPU-bound
//! 5. [`bundle`]   — assemble the converted images into a single PDF, one
//!    page per image, in natural filename order

pub mod bundle;
pub mod convert;
pub mod download;
pub mod extract;
pub mod fetch;
