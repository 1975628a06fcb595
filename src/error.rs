//! Error types for the edgequake-pdf2grid library.
//!
//! Every failure is a [`Pdf2GridError`]. The HTTP layer never inspects
//! variants directly; it asks [`Pdf2GridError::kind`] which of the four
//! families an error belongs to and maps that onto a status code and a
//! short client-facing message:
//!
//! | Kind | Status | Typical cause |
//! |------|--------|---------------|
//! | [`ErrorKind::Validation`] | 400 | wrong content type, image count ≠ 4 |
//! | [`ErrorKind::Conversion`] | 500 | pdfium could not rasterise the upload |
//! | [`ErrorKind::Generation`] | 500 | the grid PDF could not be built or written |
//! | [`ErrorKind::Startup`]    | 500 | bad configuration, storage not creatable |
//!
//! The full `Display` text (paths, page numbers, pdfium detail) is only ever
//! logged server-side.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`Pdf2GridError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input shape; the caller can fix the request.
    Validation,
    /// Rasterising an uploaded PDF failed.
    Conversion,
    /// Building or writing the grid PDF failed.
    Generation,
    /// Configuration or storage problems detected outside a request.
    Startup,
}

/// All errors returned by the edgequake-pdf2grid library.
#[derive(Debug, Error)]
pub enum Pdf2GridError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The multipart request carried no `pdfFile` field.
    #[error("No file received under form field '{field}'")]
    MissingUpload { field: String },

    /// The uploaded file declared a content type other than `application/pdf`.
    #[error("Upload '{file_name}' has content type '{content_type}', expected application/pdf")]
    NotAPdf {
        file_name: String,
        content_type: String,
    },

    /// The multipart body could not be read.
    #[error("Malformed multipart upload: {0}")]
    MalformedUpload(String),

    /// A batch holds a number of page images other than the grid size.
    #[error("Batch '{batch}' holds {found} page images, exactly {expected} are required")]
    ImageCount {
        batch: String,
        found: usize,
        expected: usize,
    },

    /// The assembler was handed a number of images other than the grid size.
    #[error("A grid needs exactly {expected} images, got {found}")]
    GridImageCount { found: usize, expected: usize },

    /// A client-supplied batch identifier is not one we could have issued.
    #[error("Invalid batch id '{0}'")]
    InvalidBatchId(String),

    /// Another request is already assembling this batch.
    #[error("Batch '{0}' is already being assembled")]
    BatchBusy(String),

    // ── Conversion errors ─────────────────────────────────────────────────
    /// pdfium could not open the uploaded document.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// A rendered page could not be written as PNG.
    #[error("Failed to write page image '{path}': {detail}")]
    ImageWriteFailed { path: PathBuf, detail: String },

    /// The uploaded bytes could not be persisted before rasterisation.
    #[error("Failed to store upload at '{path}': {source}")]
    UploadWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, pass --pdfium-lib, or place the\n\
platform library next to the executable.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Generation errors ─────────────────────────────────────────────────
    /// A page image of the batch could not be decoded.
    #[error("Failed to load page image '{path}': {detail}")]
    ImageLoadFailed { path: PathBuf, detail: String },

    /// pdfium failed while composing the grid document.
    #[error("Failed to compose grid PDF: {0}")]
    ComposeFailed(String),

    /// Could not write the generated PDF into the output directory.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Startup errors ────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A storage directory could not be created or inspected.
    #[error("Storage error at '{path}': {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server stopped with an I/O error.
    #[error("HTTP server error: {0}")]
    Server(#[source] std::io::Error),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// A blocking task panicked or was cancelled. `stage` tells which family
    /// the work belonged to.
    #[error("Internal error: {detail}")]
    Internal { stage: ErrorKind, detail: String },
}

impl Pdf2GridError {
    /// Classify the error for status-code and message mapping.
    pub fn kind(&self) -> ErrorKind {
        use Pdf2GridError::*;
        match self {
            MissingUpload { .. }
            | NotAPdf { .. }
            | MalformedUpload(_)
            | ImageCount { .. }
            | GridImageCount { .. }
            | InvalidBatchId(_)
            | BatchBusy(_) => ErrorKind::Validation,
            CorruptPdf { .. }
            | RasterisationFailed { .. }
            | ImageWriteFailed { .. }
            | UploadWriteFailed { .. }
            | PdfiumBindingFailed(_) => ErrorKind::Conversion,
            ImageLoadFailed { .. } | ComposeFailed(_) | OutputWriteFailed { .. } => {
                ErrorKind::Generation
            }
            InvalidConfig(_) | Storage { .. } | Bind { .. } | Server(_) => ErrorKind::Startup,
            Internal { stage, .. } => *stage,
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Pdf2GridError::Storage {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_count_display() {
        let e = Pdf2GridError::ImageCount {
            batch: "b1".into(),
            found: 3,
            expected: 4,
        };
        let msg = e.to_string();
        assert!(msg.contains("holds 3"), "got: {msg}");
        assert!(msg.contains("exactly 4"), "got: {msg}");
        assert_eq!(e.kind(), ErrorKind::Validation);
    }

    #[test]
    fn grid_image_count_names_no_batch() {
        let e = Pdf2GridError::GridImageCount {
            found: 1,
            expected: 4,
        };
        assert_eq!(e.to_string(), "A grid needs exactly 4 images, got 1");
        assert_eq!(e.kind(), ErrorKind::Validation);
    }

    #[test]
    fn not_a_pdf_is_validation() {
        let e = Pdf2GridError::NotAPdf {
            file_name: "notes.txt".into(),
            content_type: "text/plain".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Validation);
        assert!(e.to_string().contains("text/plain"));
    }

    #[test]
    fn pdfium_failures_are_conversion_errors() {
        assert_eq!(
            Pdf2GridError::PdfiumBindingFailed("missing".into()).kind(),
            ErrorKind::Conversion
        );
        assert_eq!(
            Pdf2GridError::RasterisationFailed {
                page: 2,
                detail: "boom".into()
            }
            .kind(),
            ErrorKind::Conversion
        );
    }

    #[test]
    fn output_write_is_generation_error() {
        let e = Pdf2GridError::OutputWriteFailed {
            path: "/tmp/out.pdf".into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(e.kind(), ErrorKind::Generation);
        assert!(e.to_string().contains("disk full"));
    }

    #[test]
    fn internal_error_keeps_its_stage() {
        let e = Pdf2GridError::Internal {
            stage: ErrorKind::Generation,
            detail: "task panicked".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Generation);
    }
}
