//! pdfium library resolution and binding.
//!
//! `pdfium-render` loads pdfium dynamically, so the server needs to know
//! where the shared library lives. Resolution order, first hit wins:
//!
//! 1. explicit path from [`crate::ServerConfig::pdfium_lib_path`]
//! 2. `PDFIUM_LIB_PATH` environment variable
//! 3. platform library next to the executable
//! 4. platform library in the working directory
//! 5. the system library search path
//!
//! A fresh [`Pdfium`] is bound inside every blocking task rather than shared
//! across threads; binding is cheap compared to rendering a page.

use crate::error::Pdf2GridError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Locates and binds the pdfium shared library.
#[derive(Debug, Clone, Default)]
pub struct PdfEngine {
    lib_path: Option<PathBuf>,
}

impl PdfEngine {
    /// Engine bound to an explicit library path, or to the usual search
    /// order when `lib_path` is `None`.
    pub fn new(lib_path: Option<PathBuf>) -> Self {
        let lib_path = lib_path.or_else(|| {
            std::env::var_os("PDFIUM_LIB_PATH")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        });
        Self { lib_path }
    }

    /// Library path in effect, if one was configured.
    pub fn lib_path(&self) -> Option<&Path> {
        self.lib_path.as_deref()
    }

    /// Bind to pdfium. Call from blocking context only.
    pub fn bind(&self) -> Result<Pdfium, Pdf2GridError> {
        if let Some(ref path) = self.lib_path {
            debug!("Binding pdfium from {}", path.display());
            return Pdfium::bind_to_library(path)
                .map(Pdfium::new)
                .map_err(|e| {
                    Pdf2GridError::PdfiumBindingFailed(format!("{}: {e}", path.display()))
                });
        }

        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));

        if let Some(dir) = exe_dir {
            match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir)) {
                Ok(bindings) => return Ok(Pdfium::new(bindings)),
                Err(e) => debug!("No pdfium next to executable: {e}"),
            }
        }

        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map(Pdfium::new)
            .map_err(|e| Pdf2GridError::PdfiumBindingFailed(e.to_string()))
    }

    /// Bind once to confirm the library can be loaded.
    ///
    /// Runs on the blocking pool; used at startup so a missing library is
    /// reported before the first upload.
    pub async fn probe(&self) -> Result<(), Pdf2GridError> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.bind().map(|_| ()))
            .await
            .map_err(|e| Pdf2GridError::Internal {
                stage: crate::error::ErrorKind::Startup,
                detail: format!("pdfium probe task panicked: {e}"),
            })?
    }
}
