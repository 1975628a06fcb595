//! PDF rasterisation: render every page of an upload to `<prefix><n>.png`.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is CPU-bound and keeps
//! thread-local state. `tokio::task::spawn_blocking` moves the work onto the
//! blocking pool so request handlers on the async workers keep running while
//! a large document renders.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly. `max_rendered_pixels` caps the longest edge
//! regardless of physical size, keeping memory bounded.

use crate::engine::PdfEngine;
use crate::error::{ErrorKind, Pdf2GridError};
use crate::storage::page_file_name;
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where and how page images are written.
#[derive(Debug, Clone)]
pub struct RasterTarget {
    /// Directory receiving the PNGs; created if absent.
    pub out_dir: PathBuf,
    /// Filename prefix, e.g. `page_` → `page_1.png`.
    pub prefix: String,
    /// Longest edge of each rendered page in pixels.
    pub max_pixels: u32,
}

/// Rasterise every page of `pdf_path`.
///
/// # Returns
/// The written image paths in page order (first page first).
pub async fn rasterize_pdf(
    engine: &PdfEngine,
    pdf_path: &Path,
    target: &RasterTarget,
) -> Result<Vec<PathBuf>, Pdf2GridError> {
    let engine = engine.clone();
    let path = pdf_path.to_path_buf();
    let target = target.clone();

    tokio::task::spawn_blocking(move || rasterize_blocking(&engine, &path, &target))
        .await
        .map_err(|e| Pdf2GridError::Internal {
            stage: ErrorKind::Conversion,
            detail: format!("Render task panicked: {e}"),
        })?
}

/// Blocking implementation of page rendering.
fn rasterize_blocking(
    engine: &PdfEngine,
    pdf_path: &Path,
    target: &RasterTarget,
) -> Result<Vec<PathBuf>, Pdf2GridError> {
    let pdfium = engine.bind()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| Pdf2GridError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{e:?}"),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    std::fs::create_dir_all(&target.out_dir).map_err(|e| Pdf2GridError::ImageWriteFailed {
        path: target.out_dir.clone(),
        detail: e.to_string(),
    })?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(target.max_pixels as i32)
        .set_maximum_height(target.max_pixels as i32);

    let mut written = Vec::with_capacity(total_pages);

    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            Pdf2GridError::RasterisationFailed {
                page: page_num,
                detail: format!("{e:?}"),
            }
        })?;

        let image = bitmap.as_image();
        let out_path = target.out_dir.join(page_file_name(&target.prefix, page_num));
        image
            .save_with_format(&out_path, ImageFormat::Png)
            .map_err(|e| Pdf2GridError::ImageWriteFailed {
                path: out_path.clone(),
                detail: e.to_string(),
            })?;

        debug!(
            "Rendered page {} → {}x{} px at {}",
            page_num,
            image.width(),
            image.height(),
            out_path.display()
        );
        written.push(out_path);
    }

    Ok(written)
}
