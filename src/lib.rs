//! # edgequake-pdf2grid
//!
//! Split an uploaded PDF into page images, then reassemble four of them into
//! a single A4 page laid out as a 2x2 grid.
//!
//! ## Pipeline Overview
//!
//! ```text
//! POST /upload-pdf   (multipart pdfFile)
//!  │
//!  ├─ 1. Store    <root>/<batch-id>.pdf
//!  ├─ 2. Render   every page → <root>/images/<batch-id>/page_<n>.png  (pdfium, spawn_blocking)
//!  └─ 3. Reply    {message, status, batchId}
//!
//! POST /generate-pdf  ({"batchId"} or most recent batch)
//!  │
//!  ├─ 1. Check    exactly 4 page images in the batch
//!  ├─ 2. Compose  2x2 grid on A4, written atomically to <root>/output/
//!  ├─ 3. Cleanup  delete the 4 consumed images
//!  └─ 4. Reply    {downloadLink}  →  GET /uploads/output/<file>
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2grid::{serve, AppState, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder()
//!         .root_dir("./uploads")
//!         .port(3000)
//!         .build()?;
//!     serve(AppState::new(config), async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2grid` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod retention;
pub mod server;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{BatchId, BatchRegistry};
pub use config::{ServerConfig, ServerConfigBuilder, UPLOAD_FIELD};
pub use engine::PdfEngine;
pub use error::{ErrorKind, Pdf2GridError};
pub use pipeline::assemble::{assemble_grid, AssembledPdf};
pub use pipeline::layout::{CellRect, GridLayout};
pub use pipeline::rasterize::{rasterize_pdf, RasterTarget};
pub use retention::{purge_expired, spawn_sweeper, PurgeReport};
pub use server::{router, run, serve, AppState};
pub use storage::StorageLayout;
