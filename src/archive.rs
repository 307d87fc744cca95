//! Archive naming and listing.
//!
//! The archive is a flat directory of PDFs named after sanitized page titles.
//! Sanitising strips the characters that are illegal or dangerous in file
//! names on either Windows or Unix, which also removes every path separator,
//! so a hostile page title cannot climb out of the archive directory.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static RE_ILLEGAL_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]"#).unwrap());

/// Strip characters that may not appear in an archive file name.
///
/// Removes `\ / : * ? " < > |` and trims surrounding whitespace. The result
/// can be empty (a title made only of illegal characters); callers fall back
/// to a generated name in that case.
pub fn sanitize_title(title: &str) -> String {
    RE_ILLEGAL_NAME_CHARS.replace_all(title, "").trim().to_string()
}

/// Base archive name (no extension) for a page with the given raw title.
///
/// `fallback` is used when the title sanitises to nothing. The bundler
/// appends `.pdf` when it writes the file.
pub fn archive_base_name(title: &str, fallback: &str) -> String {
    let base = sanitize_title(title);
    if base.is_empty() {
        sanitize_title(fallback)
    } else {
        base
    }
}

/// Names of the `.pdf` files in the archive directory, sorted.
///
/// Fails with the underlying I/O error when the directory is missing or
/// unreadable; the caller decides how to surface that (the listing page
/// renders it in-page rather than failing the request).
pub fn list_archives(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let is_pdf = Path::new(name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// True when `name` is a bare file name: no separators, no parent component,
/// not empty. The static file handler only serves names that pass this.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('/')
        && !name.contains('\\')
        && name != "."
        && name != ".."
}
