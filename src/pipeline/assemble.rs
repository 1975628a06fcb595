//! Grid assembly: four page images → one A4 page PDF.
//!
//! The document is composed in memory by pdfium and only then written to
//! the output directory through a temp file + rename, so a failure at any
//! point leaves no half-written PDF behind and never touches the source
//! images. Deleting those is the caller's job, after this returns `Ok`.

use crate::engine::PdfEngine;
use crate::error::{ErrorKind, Pdf2GridError};
use crate::pipeline::layout::GridLayout;
use pdfium_render::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A grid PDF that was written successfully.
#[derive(Debug, Clone)]
pub struct AssembledPdf {
    pub path: PathBuf,
    pub bytes_written: usize,
}

impl AssembledPdf {
    /// File name component of [`Self::path`].
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Lay out `images` on one page according to `grid` and write it to `out_path`.
///
/// `images` must hold exactly [`GridLayout::CELLS`] paths; image `i` goes to
/// cell `(i % 2, i / 2)`.
pub async fn assemble_grid(
    engine: &PdfEngine,
    images: &[PathBuf],
    grid: &GridLayout,
    out_path: &Path,
) -> Result<AssembledPdf, Pdf2GridError> {
    if images.len() != GridLayout::CELLS {
        return Err(Pdf2GridError::GridImageCount {
            found: images.len(),
            expected: GridLayout::CELLS,
        });
    }

    let engine = engine.clone();
    let images = images.to_vec();
    let grid = grid.clone();
    let out_path = out_path.to_path_buf();

    tokio::task::spawn_blocking(move || assemble_blocking(&engine, &images, &grid, &out_path))
        .await
        .map_err(|e| Pdf2GridError::Internal {
            stage: ErrorKind::Generation,
            detail: format!("Assembly task panicked: {e}"),
        })?
}

fn assemble_blocking(
    engine: &PdfEngine,
    images: &[PathBuf],
    grid: &GridLayout,
    out_path: &Path,
) -> Result<AssembledPdf, Pdf2GridError> {
    // A binding failure here is reported as a generation failure, not a
    // conversion one.
    let pdfium = engine
        .bind()
        .map_err(|e| Pdf2GridError::ComposeFailed(e.to_string()))?;
    let compose_err = |e: PdfiumError| Pdf2GridError::ComposeFailed(format!("{e:?}"));

    let mut document = pdfium.create_new_pdf().map_err(compose_err)?;

    {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::Custom(
                PdfPoints::new(grid.page_width),
                PdfPoints::new(grid.page_height),
            ))
            .map_err(compose_err)?;

        for (index, path) in images.iter().enumerate() {
            let Some(cell) = grid.cell_rect(index) else {
                break;
            };

            let image = image::open(path).map_err(|e| Pdf2GridError::ImageLoadFailed {
                path: path.clone(),
                detail: e.to_string(),
            })?;

            // A fresh image object is one point square; scaling sets the
            // cell size, translating moves it into place.
            let mut object = PdfPageImageObject::new(&document, &image).map_err(compose_err)?;
            object.scale(cell.width, cell.height).map_err(compose_err)?;
            object
                .translate(PdfPoints::new(cell.left), PdfPoints::new(cell.bottom))
                .map_err(compose_err)?;

            page.objects_mut()
                .add_object(PdfPageObject::Image(object))
                .map_err(compose_err)?;

            debug!(
                "Placed {} in cell {:?} at ({}, {})",
                path.display(),
                GridLayout::cell_position(index),
                cell.left,
                cell.bottom
            );
        }
    }

    let bytes = document.save_to_bytes().map_err(compose_err)?;
    write_atomically(out_path, &bytes)?;

    info!("Wrote grid PDF {} ({} bytes)", out_path.display(), bytes.len());
    Ok(AssembledPdf {
        path: out_path.to_path_buf(),
        bytes_written: bytes.len(),
    })
}

/// Write `bytes` next to `path` in a temp file, then rename into place.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), Pdf2GridError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let write_err = |source: std::io::Error| Pdf2GridError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_leaves_only_the_target() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("converted-1.pdf");
        write_atomically(&target, b"%PDF-1.7 test").expect("write");

        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-1.7 test");
        let entries: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1, "temp file must be renamed away");
    }

    #[test]
    fn atomic_write_into_missing_dir_is_generation_error() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("missing/out.pdf");
        let err = write_atomically(&target, b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generation);
    }

    #[tokio::test]
    async fn wrong_image_count_is_rejected_before_pdfium() {
        let tmp = TempDir::new().unwrap();
        let images = vec![tmp.path().join("page_1.png")];
        let err = assemble_grid(
            &PdfEngine::new(Some(PathBuf::from("/no/pdfium"))),
            &images,
            &GridLayout::default(),
            &tmp.path().join("out.pdf"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Pdf2GridError::GridImageCount { found: 1, .. }));
        assert_eq!(
            err.public_parts().1,
            "There must be exactly 4 images to generate a 2x2 PDF."
        );
    }

    #[test]
    fn file_name_of_assembled_pdf() {
        let pdf = AssembledPdf {
            path: PathBuf::from("/srv/uploads/output/converted-42-abcd1234.pdf"),
            bytes_written: 10,
        };
        assert_eq!(pdf.file_name(), "converted-42-abcd1234.pdf");
    }
}
