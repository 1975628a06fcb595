//! Configuration types for the grid server.
//!
//! Every knob lives in [`ServerConfig`], built via its
//! [`ServerConfigBuilder`]. The original utility hard-coded an absolute
//! upload path and port; here they are injected and checked once at startup
//! so a typo surfaces before the first request rather than during it.

use crate::error::Pdf2GridError;
use crate::pipeline::layout::GridLayout;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Multipart field the upload endpoint reads the PDF from.
pub const UPLOAD_FIELD: &str = "pdfFile";

/// Configuration for the grid server.
///
/// Built via [`ServerConfig::builder()`] or using
/// [`ServerConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2grid::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .root_dir("/tmp/pdf2grid")
///     .port(3000)
///     .build()
///     .unwrap();
/// assert_eq!(config.public_url(), "http://localhost:3000");
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Upload root. `images/` and `output/` live underneath. Default: `./uploads`.
    pub root_dir: PathBuf,

    /// Interface to bind. Default: `127.0.0.1`.
    pub host: IpAddr,

    /// TCP port. Default: 3000. Port 0 asks the OS for a free port.
    pub port: u16,

    /// Base URL used to build download links. Default: `http://localhost:<port>`.
    ///
    /// Set this when the server sits behind a proxy or listens on a
    /// non-loopback address clients reach under another name.
    pub public_url: Option<String>,

    /// Directory served at `/` (the browser front-end). Default: none.
    pub public_dir: Option<PathBuf>,

    /// Filename prefix of rasterised pages. Default: `page_`.
    pub image_prefix: String,

    /// Longest edge of a rasterised page in pixels. Default: 2000.
    ///
    /// Caps memory independently of physical page size; an A0 poster would
    /// otherwise render to a five-figure pixel width.
    pub max_rendered_pixels: u32,

    /// Largest accepted request body in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// Keep the uploaded source PDF after a successful rasterisation. Default: false.
    pub keep_uploads: bool,

    /// Age after which generated PDFs, stored uploads and abandoned batches
    /// are purged. `None` keeps everything forever. Default: 7 days.
    pub retention: Option<Duration>,

    /// How often the retention sweeper runs. Default: 1 hour.
    pub sweep_interval: Duration,

    /// Explicit pdfium library path. Falls back to `PDFIUM_LIB_PATH`, then
    /// the executable directory, then the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Geometry of the assembled page. Default: A4, 280×200 pt cells.
    pub grid: GridLayout,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("uploads"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            public_url: None,
            public_dir: None,
            image_prefix: "page_".to_string(),
            max_rendered_pixels: 2000,
            max_upload_bytes: 50 * 1024 * 1024,
            keep_uploads: false,
            retention: Some(Duration::from_secs(7 * 24 * 60 * 60)),
            sweep_interval: Duration::from_secs(60 * 60),
            pdfium_lib_path: None,
            grid: GridLayout::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Socket address the server binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Base URL for download links, without a trailing slash.
    pub fn public_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn root_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.root_dir = dir.into();
        self
    }

    pub fn host(mut self, host: IpAddr) -> Self {
        self.config.host = host;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn public_url(mut self, url: impl Into<String>) -> Self {
        self.config.public_url = Some(url.into());
        self
    }

    pub fn public_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.public_dir = Some(dir.into());
        self
    }

    pub fn image_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.image_prefix = prefix.into();
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn keep_uploads(mut self, v: bool) -> Self {
        self.config.keep_uploads = v;
        self
    }

    /// `None` disables the retention sweeper.
    pub fn retention(mut self, max_age: Option<Duration>) -> Self {
        self.config.retention = max_age;
        self
    }

    pub fn sweep_interval(mut self, every: Duration) -> Self {
        self.config.sweep_interval = every;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn grid(mut self, grid: GridLayout) -> Self {
        self.config.grid = grid;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, Pdf2GridError> {
        let c = &self.config;
        if c.root_dir.as_os_str().is_empty() {
            return Err(Pdf2GridError::InvalidConfig(
                "root directory must not be empty".into(),
            ));
        }
        if c.image_prefix.is_empty()
            || c.image_prefix.contains(['/', '\\'])
            || c.image_prefix.contains("..")
        {
            return Err(Pdf2GridError::InvalidConfig(format!(
                "image prefix '{}' must be a non-empty plain file name prefix",
                c.image_prefix
            )));
        }
        if c.max_upload_bytes == 0 {
            return Err(Pdf2GridError::InvalidConfig(
                "max upload size must be ≥ 1 byte".into(),
            ));
        }
        if let Some(ref url) = c.public_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Pdf2GridError::InvalidConfig(format!(
                    "public URL '{url}' must start with http:// or https://"
                )));
            }
        }
        if c.sweep_interval.is_zero() {
            return Err(Pdf2GridError::InvalidConfig(
                "sweep interval must be non-zero".into(),
            ));
        }
        c.grid
            .validate()
            .map_err(|e| Pdf2GridError::InvalidConfig(format!("grid layout: {e}")))?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let config = ServerConfig::builder().build().expect("defaults are valid");
        assert_eq!(config.port, 3000);
        assert_eq!(config.image_prefix, "page_");
        assert_eq!(config.public_url(), "http://localhost:3000");
        assert!(!config.keep_uploads);
    }

    #[test]
    fn public_url_trailing_slash_is_trimmed() {
        let config = ServerConfig::builder()
            .public_url("https://grid.example.com/")
            .build()
            .unwrap();
        assert_eq!(config.public_url(), "https://grid.example.com");
    }

    #[test]
    fn rejects_non_http_public_url() {
        let err = ServerConfig::builder()
            .public_url("ftp://example.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ftp://example.com"));
    }

    #[test]
    fn rejects_prefix_with_path_separator() {
        assert!(ServerConfig::builder().image_prefix("../page_").build().is_err());
        assert!(ServerConfig::builder().image_prefix("a/b").build().is_err());
        assert!(ServerConfig::builder().image_prefix("").build().is_err());
    }

    #[test]
    fn max_rendered_pixels_has_floor() {
        let config = ServerConfig::builder().max_rendered_pixels(5).build().unwrap();
        assert_eq!(config.max_rendered_pixels, 100);
    }

    #[test]
    fn rejects_grid_that_overflows_page() {
        let grid = GridLayout {
            row_offsets: [0.0, 700.0],
            ..GridLayout::default()
        };
        let err = ServerConfig::builder().grid(grid).build().unwrap_err();
        assert!(err.to_string().contains("row 2"), "got: {err}");
    }
}
