//! Stage 5: bundle converted images into the final PDF.
//!
//! One page per image, each page sized to its image at a fixed DPI so the
//! source aspect ratio is preserved. Pages follow the natural order of the
//! file names ("img2" before "img10"), which is the numbering the download
//! stage wrote. Runs inside `spawn_blocking` since decoding and PDF
//! serialisation are CPU-bound.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use printpdf::{
    ColorBits, ColorSpace, Image, ImageTransform, ImageXObject, Mm, PdfDocument,
    PdfLayerReference, Px,
};
use tracing::{debug, info};

use crate::error::StageError;

/// Image resolution assumed when sizing PDF pages.
const RENDER_DPI: f32 = 96.0;

/// File extensions the bundler will page into the PDF.
const PAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Where the finished PDF landed and how many pages it holds.
#[derive(Debug)]
pub struct BundleSummary {
    pub path: PathBuf,
    pub page_count: usize,
}

/// Assemble every eligible image in `src` into `{archive_dir}/{base_name}.pdf`.
///
/// `base_name` must already be a safe file name; the caller sanitises the
/// page title before it gets here. An existing PDF of the same name is
/// replaced. Unlike conversion, a single unreadable image fails the whole
/// stage: silently dropping a page would corrupt the gallery's order.
pub async fn bundle_directory(
    src: &Path,
    archive_dir: &Path,
    base_name: &str,
) -> Result<BundleSummary, StageError> {
    let src = src.to_path_buf();
    let archive_dir = archive_dir.to_path_buf();
    let base_name = base_name.to_string();

    tokio::task::spawn_blocking(move || bundle_directory_blocking(&src, &archive_dir, &base_name))
        .await
        .map_err(|e| StageError::BundleFailed {
            detail: format!("bundle task panicked: {e}"),
        })?
}

/// Blocking implementation of PDF assembly.
fn bundle_directory_blocking(
    src: &Path,
    archive_dir: &Path,
    base_name: &str,
) -> Result<BundleSummary, StageError> {
    let images = eligible_images(src).map_err(|e| StageError::BundleFailed {
        detail: format!("list '{}': {e}", src.display()),
    })?;
    if images.is_empty() {
        return Err(StageError::NothingToBundle {
            path: src.to_path_buf(),
        });
    }

    let (first_image, w, h) = load_page_image(&images[0])?;
    let (doc, page1, layer1) = PdfDocument::new(base_name, px_to_mm(w), px_to_mm(h), "Layer 1");
    place(first_image, doc.get_page(page1).get_layer(layer1));

    for path in &images[1..] {
        let (pdf_image, w, h) = load_page_image(path)?;
        let (page, layer) = doc.add_page(px_to_mm(w), px_to_mm(h), "Layer 1");
        place(pdf_image, doc.get_page(page).get_layer(layer));
    }

    std::fs::create_dir_all(archive_dir).map_err(|e| StageError::BundleFailed {
        detail: format!("create '{}': {e}", archive_dir.display()),
    })?;

    // Write to a sibling temp name and rename, so a crash mid-save cannot
    // leave a truncated PDF under the final name.
    let final_path = archive_dir.join(format!("{base_name}.pdf"));
    let tmp_path = archive_dir.join(format!("{base_name}.pdf.tmp"));

    let file = File::create(&tmp_path).map_err(|e| StageError::BundleFailed {
        detail: format!("create '{}': {e}", tmp_path.display()),
    })?;
    let mut writer = BufWriter::new(file);
    doc.save(&mut writer).map_err(|e| StageError::BundleFailed {
        detail: format!("serialise pdf: {e}"),
    })?;
    writer.flush().map_err(|e| StageError::BundleFailed {
        detail: format!("flush '{}': {e}", tmp_path.display()),
    })?;
    drop(writer);

    std::fs::rename(&tmp_path, &final_path).map_err(|e| StageError::BundleFailed {
        detail: format!("rename to '{}': {e}", final_path.display()),
    })?;

    info!(
        "Archived {} page(s) to '{}'",
        images.len(),
        final_path.display()
    );
    Ok(BundleSummary {
        path: final_path,
        page_count: images.len(),
    })
}

/// Eligible image files in `dir`, in natural filename order.
fn eligible_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let eligible = path
            .extension()
            .and_then(OsStr::to_str)
            .map(|e| PAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
            .unwrap_or(false);
        if eligible {
            files.push(path);
        }
    }

    let name_of = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    files.sort_by(|a, b| natord::compare(&name_of(a), &name_of(b)));
    Ok(files)
}

/// Decode one image into a PDF XObject plus its pixel dimensions.
fn load_page_image(path: &Path) -> Result<(Image, u32, u32), StageError> {
    let img = image::open(path).map_err(|e| StageError::BundleFailed {
        detail: format!("decode '{}': {e}", path.display()),
    })?;
    let rgb = img.to_rgb8();
    let (w, h) = rgb.dimensions();
    debug!("Paging '{}' at {w}x{h} px", path.display());

    let xobject = ImageXObject {
        width: Px(w as usize),
        height: Px(h as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: rgb.into_raw(),
        image_filter: None,
        clipping_bbox: None,
        smask: None,
    };
    Ok((Image::from(xobject), w, h))
}

/// Place an image at the page origin, filling the page at [`RENDER_DPI`].
fn place(image: Image, layer: PdfLayerReference) {
    let transform = ImageTransform {
        translate_x: Some(Mm(0.0)),
        translate_y: Some(Mm(0.0)),
        scale_x: Some(1.0),
        scale_y: Some(1.0),
        dpi: Some(RENDER_DPI),
        ..Default::default()
    };
    image.add_to_layer(layer, transform);
}

fn px_to_mm(px: u32) -> Mm {
    Mm(px as f32 / RENDER_DPI * 25.4)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(path: &Path) {
        image::DynamicImage::new_rgb8(2, 3).save(path).unwrap();
    }

    #[test]
    fn images_sort_naturally_not_lexically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["img10.png", "img1.png", "img2.png"] {
            write_png(&dir.path().join(name));
        }
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();

        let names: Vec<String> = eligible_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["img1.png", "img2.png", "img10.png"]);
    }

    #[tokio::test]
    async fn bundles_one_page_per_image() {
        let src = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        for name in ["g1.png", "g2.png", "g3.png"] {
            write_png(&src.path().join(name));
        }

        let summary = bundle_directory(src.path(), archive.path(), "Spring Sketches")
            .await
            .unwrap();

        assert_eq!(summary.page_count, 3);
        assert_eq!(summary.path, archive.path().join("Spring Sketches.pdf"));
        let bytes = std::fs::read(&summary.path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn empty_directory_produces_no_pdf() {
        let src = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();

        let err = bundle_directory(src.path(), archive.path(), "empty")
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::NothingToBundle { .. }));
        assert!(!archive.path().join("empty.pdf").exists());
    }

    #[tokio::test]
    async fn unreadable_image_fails_the_stage() {
        let src = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        write_png(&src.path().join("g1.png"));
        std::fs::write(src.path().join("g2.png"), b"not a png").unwrap();

        let err = bundle_directory(src.path(), archive.path(), "broken")
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::BundleFailed { .. }));
        assert!(!archive.path().join("broken.pdf").exists());
    }
}
