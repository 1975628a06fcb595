//! HTTP surface: upload, generate, and static download routes.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | POST | `/upload-pdf`   | [`upload_pdf`] — multipart `pdfFile`, rasterise all pages |
//! | POST | `/generate-pdf` | [`generate_pdf`] — optional `{"batchId"}`, assemble 2x2 grid |
//! | GET  | `/uploads/...`  | static files under the upload root |
//! | GET  | `/...`          | static front-end from `public_dir`, when configured |
//!
//! Handlers return `Result<Json<_>, Pdf2GridError>`; the single
//! [`IntoResponse`] impl at the bottom turns an error into a status code and
//! a short `{"error"}` body and logs the full detail. One return value per
//! handler means one response per request.

use crate::batch::{BatchId, BatchRegistry};
use crate::config::{ServerConfig, UPLOAD_FIELD};
use crate::engine::PdfEngine;
use crate::error::{ErrorKind, Pdf2GridError};
use crate::pipeline::assemble::assemble_grid;
use crate::pipeline::layout::GridLayout;
use crate::pipeline::rasterize::{rasterize_pdf, RasterTarget};
use crate::storage::StorageLayout;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Media type an upload must declare.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

// ── State ────────────────────────────────────────────────────────────────

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppInner>,
}

struct AppInner {
    config: ServerConfig,
    storage: StorageLayout,
    engine: PdfEngine,
    batches: BatchRegistry,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let storage = StorageLayout::new(&config.root_dir);
        let engine = PdfEngine::new(config.pdfium_lib_path.clone());
        Self {
            inner: Arc::new(AppInner {
                config,
                storage,
                engine,
                batches: BatchRegistry::new(),
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn storage(&self) -> &StorageLayout {
        &self.inner.storage
    }

    pub fn engine(&self) -> &PdfEngine {
        &self.inner.engine
    }

    pub fn batches(&self) -> &BatchRegistry {
        &self.inner.batches
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

/// Body of a successful upload.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub status: String,
    /// Pass back to `/generate-pdf` to assemble exactly this upload's pages.
    pub batch_id: String,
}

/// Optional body of `/generate-pdf`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub batch_id: Option<String>,
}

/// Body of a successful generation.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub download_link: String,
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ── Router ───────────────────────────────────────────────────────────────

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let config = state.config();

    let mut app = Router::new()
        .route("/upload-pdf", post(upload_pdf))
        .route("/generate-pdf", post(generate_pdf))
        .nest_service("/uploads", ServeDir::new(state.storage().root()));

    if let Some(ref public_dir) = config.public_dir {
        app = app.fallback_service(ServeDir::new(public_dir));
    }

    app.layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `state` on `listener` until `shutdown` resolves.
pub async fn run(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Pdf2GridError> {
    if let Ok(addr) = listener.local_addr() {
        info!("Server running at http://{addr}");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(Pdf2GridError::Server)
}

/// Prepare storage, bind the configured address and serve until `shutdown`.
pub async fn serve(
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Pdf2GridError> {
    state.storage().prepare().await?;
    let addr = state.config().bind_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| Pdf2GridError::Bind { addr, source })?;
    run(listener, state, shutdown).await
}

// ── Handlers ─────────────────────────────────────────────────────────────

/// `POST /upload-pdf`: store the PDF, rasterise every page into a new batch.
pub async fn upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, Pdf2GridError> {
    let upload = read_pdf_field(&mut multipart).await?;
    let started = Instant::now();

    let batch = BatchId::new();
    let storage = state.storage();
    let pdf_path = storage.upload_path(&batch, upload.file_name.as_deref());
    tokio::fs::write(&pdf_path, &upload.bytes)
        .await
        .map_err(|source| Pdf2GridError::UploadWriteFailed {
            path: pdf_path.clone(),
            source,
        })?;
    info!(
        "Stored upload {:?} ({} bytes) as {}",
        upload.file_name.as_deref().unwrap_or("<unnamed>"),
        upload.bytes.len(),
        pdf_path.display()
    );

    let target = RasterTarget {
        out_dir: storage.batch_dir(&batch),
        prefix: state.config().image_prefix.clone(),
        max_pixels: state.config().max_rendered_pixels,
    };
    // On failure the stored PDF and any pages already written stay on disk.
    let pages = rasterize_pdf(state.engine(), &pdf_path, &target).await?;

    if !state.config().keep_uploads {
        if let Err(e) = tokio::fs::remove_file(&pdf_path).await {
            warn!("Failed to delete upload {}: {}", pdf_path.display(), e);
        }
    }
    state.batches().record_upload(&batch);
    info!(
        "Batch {} ready: {} pages in {}ms",
        batch,
        pages.len(),
        started.elapsed().as_millis()
    );

    Ok(Json(UploadResponse {
        message: "PDF uploaded and split into images.".to_string(),
        status: "success".to_string(),
        batch_id: batch.to_string(),
    }))
}

/// `POST /generate-pdf`: assemble a batch's four pages into a grid PDF.
///
/// Without a body (or without `batchId`) the most recent upload is used. A
/// body that is present but not a valid request is rejected, never ignored.
pub async fn generate_pdf(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<GenerateResponse>, Pdf2GridError> {
    let batch = match requested_batch(&body)? {
        Some(raw) => BatchId::parse(&raw)?,
        None => state
            .batches()
            .latest()
            .ok_or_else(|| Pdf2GridError::ImageCount {
                batch: "<none>".to_string(),
                found: 0,
                expected: GridLayout::CELLS,
            })?,
    };

    let _claim = state.batches().begin_assembly(&batch)?;
    let storage = state.storage();

    let images = storage
        .batch_images(&batch, &state.config().image_prefix)
        .await?;
    if images.len() != GridLayout::CELLS {
        return Err(Pdf2GridError::ImageCount {
            batch: batch.to_string(),
            found: images.len(),
            expected: GridLayout::CELLS,
        });
    }

    let out_path = storage.output_path(&batch);
    let assembled = assemble_grid(state.engine(), &images, &state.config().grid, &out_path).await?;

    // Only a completely written grid consumes its images.
    storage.remove_images(&batch, &images).await;
    state.batches().consume(&batch);

    let download_link = format!(
        "{}/uploads/output/{}",
        state.config().public_url(),
        assembled.file_name()
    );
    info!(
        "Batch {} assembled into {} ({} bytes)",
        batch,
        assembled.path.display(),
        assembled.bytes_written
    );

    Ok(Json(GenerateResponse { download_link }))
}

/// `batchId` named by a `/generate-pdf` body, `None` for an empty body.
///
/// The body is read as JSON whatever its declared content type.
fn requested_batch(body: &[u8]) -> Result<Option<String>, Pdf2GridError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let request: GenerateRequest = serde_json::from_slice(body)
        .map_err(|e| Pdf2GridError::InvalidBatchId(format!("unreadable request body: {e}")))?;
    Ok(request.batch_id)
}

struct PdfUpload {
    file_name: Option<String>,
    bytes: Vec<u8>,
}

/// Pull the `pdfFile` field out of the form, rejecting non-PDF content types.
async fn read_pdf_field(multipart: &mut Multipart) -> Result<PdfUpload, Pdf2GridError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Pdf2GridError::MalformedUpload(e.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().unwrap_or_default().to_string();
        if content_type != PDF_MEDIA_TYPE {
            return Err(Pdf2GridError::NotAPdf {
                file_name: file_name.unwrap_or_default(),
                content_type,
            });
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| Pdf2GridError::MalformedUpload(e.to_string()))?;
        return Ok(PdfUpload {
            file_name,
            bytes: bytes.to_vec(),
        });
    }

    Err(Pdf2GridError::MissingUpload {
        field: UPLOAD_FIELD.to_string(),
    })
}

// ── Error responses ──────────────────────────────────────────────────────

impl Pdf2GridError {
    /// Status code and client-facing message for this error.
    pub fn public_parts(&self) -> (StatusCode, &'static str) {
        match self.kind() {
            ErrorKind::Validation => (StatusCode::BAD_REQUEST, self.validation_message()),
            ErrorKind::Conversion => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to split PDF into images.",
            ),
            ErrorKind::Generation => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error generating the PDF.",
            ),
            ErrorKind::Startup => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error."),
        }
    }

    fn validation_message(&self) -> &'static str {
        match self {
            Pdf2GridError::ImageCount { .. } | Pdf2GridError::GridImageCount { .. } => {
                "There must be exactly 4 images to generate a 2x2 PDF."
            }
            Pdf2GridError::InvalidBatchId(_) => "Unknown batch id.",
            Pdf2GridError::BatchBusy(_) => "This batch is already being converted.",
            _ => "Please upload a valid PDF file.",
        }
    }
}

impl IntoResponse for Pdf2GridError {
    fn into_response(self) -> Response {
        let (status, message) = self.public_parts();
        if status.is_server_error() {
            error!("{}: {}", message, self);
        } else {
            warn!("Rejected request: {}", self);
        }
        (
            status,
            Json(ErrorResponse {
                error: message.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_400() {
        let (status, msg) = Pdf2GridError::NotAPdf {
            file_name: "a.txt".into(),
            content_type: "text/plain".into(),
        }
        .public_parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(msg, "Please upload a valid PDF file.");

        let (status, msg) = Pdf2GridError::ImageCount {
            batch: "b".into(),
            found: 2,
            expected: 4,
        }
        .public_parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(msg, "There must be exactly 4 images to generate a 2x2 PDF.");
    }

    #[test]
    fn conversion_and_generation_map_to_500() {
        let (status, msg) = Pdf2GridError::CorruptPdf {
            path: "x.pdf".into(),
            detail: "bad xref".into(),
        }
        .public_parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(msg, "Failed to split PDF into images.");

        let (status, msg) = Pdf2GridError::ComposeFailed("nope".into()).public_parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(msg, "Error generating the PDF.");
    }

    #[test]
    fn client_message_hides_detail() {
        let (_, msg) = Pdf2GridError::CorruptPdf {
            path: "/srv/secret/path.pdf".into(),
            detail: "xref".into(),
        }
        .public_parts();
        assert!(!msg.contains("/srv/secret"));
    }

    #[test]
    fn wire_names_are_camel_case() {
        let json = serde_json::to_value(UploadResponse {
            message: "m".into(),
            status: "success".into(),
            batch_id: "id".into(),
        })
        .unwrap();
        assert_eq!(json["batchId"], "id");

        let json = serde_json::to_value(GenerateResponse {
            download_link: "http://x".into(),
        })
        .unwrap();
        assert_eq!(json["downloadLink"], "http://x");

        let req: GenerateRequest = serde_json::from_str(r#"{"batchId":"abc"}"#).unwrap();
        assert_eq!(req.batch_id.as_deref(), Some("abc"));
        let req: GenerateRequest = serde_json::from_str("{}").unwrap();
        assert!(req.batch_id.is_none());
    }

    #[test]
    fn empty_generate_body_means_latest_batch() {
        assert_eq!(requested_batch(b"").unwrap(), None);
        assert_eq!(requested_batch(b" \n").unwrap(), None);
        assert_eq!(requested_batch(b"{}").unwrap(), None);
        assert_eq!(
            requested_batch(br#"{"batchId":"abc"}"#).unwrap().as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn malformed_generate_body_is_rejected() {
        let bodies: [&[u8]; 3] = [br#"{"batchId": 42}"#, b"batchId=x", b"{\"batchId\":"];
        for body in bodies {
            let err = requested_batch(body).unwrap_err();
            assert!(matches!(err, Pdf2GridError::InvalidBatchId(_)));
            assert_eq!(err.public_parts().0, StatusCode::BAD_REQUEST);
        }
    }
}
