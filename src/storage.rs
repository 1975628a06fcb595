//! On-disk layout: upload root, per-batch image directories, output folder.
//!
//! ```text
//! <root>/
//!  ├─ <batch-id>.pdf          uploaded source (transient)
//!  ├─ images/
//!  │   └─ <batch-id>/
//!  │       ├─ page_1.png      one PNG per page (transient)
//!  │       └─ page_2.png
//!  └─ output/
//!      └─ converted-<ms>-<suffix>.pdf   generated grids (served for download)
//! ```

use crate::batch::BatchId;
use crate::error::Pdf2GridError;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extension the assembler accepts as a page image.
pub const IMAGE_EXTENSION: &str = "png";

/// File name prefix of generated grid PDFs.
pub const OUTPUT_PREFIX: &str = "converted-";

/// Resolved storage directories.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
    images: PathBuf,
    output: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            images: root.join("images"),
            output: root.join("output"),
            root,
        }
    }

    /// Create the three directories if absent.
    pub async fn prepare(&self) -> Result<(), Pdf2GridError> {
        for dir in [&self.root, &self.images, &self.output] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Pdf2GridError::storage(dir, e))?;
        }
        info!("Storage ready at {}", self.root.display());
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> &Path {
        &self.images
    }

    pub fn output_dir(&self) -> &Path {
        &self.output
    }

    /// Directory holding the page images of `batch`.
    pub fn batch_dir(&self, batch: &BatchId) -> PathBuf {
        self.images.join(batch.to_string())
    }

    /// Where the uploaded PDF of `batch` is stored.
    ///
    /// Keeps the client's extension when it is a short alphanumeric one,
    /// `.pdf` otherwise.
    pub fn upload_path(&self, batch: &BatchId, original_name: Option<&str>) -> PathBuf {
        let ext = original_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.len() <= 8)
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("pdf");
        self.root.join(format!("{batch}.{ext}"))
    }

    /// Fresh time-based output path for a grid assembled from `batch`.
    pub fn output_path(&self, batch: &BatchId) -> PathBuf {
        let millis = chrono::Utc::now().timestamp_millis();
        self.output
            .join(format!("{OUTPUT_PREFIX}{millis}-{}.pdf", batch.short()))
    }

    /// Page images of `batch`, ordered by page number.
    ///
    /// Only `<prefix><n>.png` files count. A missing batch directory yields an
    /// empty list.
    pub async fn batch_images(
        &self,
        batch: &BatchId,
        prefix: &str,
    ) -> Result<Vec<PathBuf>, Pdf2GridError> {
        let dir = self.batch_dir(batch);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Batch directory {} does not exist", dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(Pdf2GridError::storage(&dir, e)),
        };

        let mut pages = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Pdf2GridError::storage(&dir, e))?
        {
            let path = entry.path();
            if let Some(page) = page_number(&path, prefix) {
                pages.push((page, path));
            }
        }
        pages.sort_by_key(|(page, _)| *page);
        Ok(pages.into_iter().map(|(_, path)| path).collect())
    }

    /// Delete consumed page images, then the batch directory if it is empty.
    ///
    /// Failures are logged, not returned: the grid already exists by the time
    /// this runs.
    pub async fn remove_images(&self, batch: &BatchId, images: &[PathBuf]) {
        for image in images {
            if let Err(e) = tokio::fs::remove_file(image).await {
                warn!("Failed to delete page image {}: {}", image.display(), e);
            }
        }
        let dir = self.batch_dir(batch);
        if let Err(e) = tokio::fs::remove_dir(&dir).await {
            debug!("Batch directory {} kept: {}", dir.display(), e);
        }
    }
}

/// Page number encoded in `<prefix><n>.png`, if `path` has that shape.
pub fn page_number(path: &Path, prefix: &str) -> Option<usize> {
    if path.extension().and_then(|e| e.to_str()) != Some(IMAGE_EXTENSION) {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(prefix)?
        .parse()
        .ok()
}

/// File name of page `page` (1-based).
pub fn page_file_name(prefix: &str, page: usize) -> String {
    format!("{prefix}{page}.{IMAGE_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn page_numbers_parse_from_names() {
        assert_eq!(page_number(Path::new("/x/page_1.png"), "page_"), Some(1));
        assert_eq!(page_number(Path::new("page_12.png"), "page_"), Some(12));
        assert_eq!(page_number(Path::new("page_1.jpg"), "page_"), None);
        assert_eq!(page_number(Path::new("other_1.png"), "page_"), None);
        assert_eq!(page_number(Path::new("page_x.png"), "page_"), None);
    }

    #[test]
    fn upload_path_keeps_extension() {
        let layout = StorageLayout::new("/srv/uploads");
        let batch = BatchId::new();

        let p = layout.upload_path(&batch, Some("report.PDF"));
        assert_eq!(p.extension().unwrap(), "PDF");
        assert!(p.starts_with("/srv/uploads"));

        let p = layout.upload_path(&batch, None);
        assert_eq!(p.extension().unwrap(), "pdf");

        let p = layout.upload_path(&batch, Some("weird.p/df"));
        assert_eq!(p.extension().unwrap(), "pdf");
    }

    #[test]
    fn output_path_lives_in_output_dir() {
        let layout = StorageLayout::new("/srv/uploads");
        let p = layout.output_path(&BatchId::new());
        assert!(p.starts_with("/srv/uploads/output"));
        let name = p.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("converted-") && name.ends_with(".pdf"), "{name}");
    }

    #[tokio::test]
    async fn prepare_creates_all_directories() {
        let tmp = TempDir::new().unwrap();
        let layout = StorageLayout::new(tmp.path().join("nested/root"));
        layout.prepare().await.expect("prepare");
        assert!(layout.root().is_dir());
        assert!(layout.images_dir().is_dir());
        assert!(layout.output_dir().is_dir());
        // Idempotent.
        layout.prepare().await.expect("second prepare");
    }

    #[tokio::test]
    async fn batch_images_sort_numerically_and_skip_strangers() {
        let tmp = TempDir::new().unwrap();
        let layout = StorageLayout::new(tmp.path());
        layout.prepare().await.unwrap();
        let batch = BatchId::new();
        let dir = layout.batch_dir(&batch);
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["page_10.png", "page_2.png", "page_1.png", "notes.txt", "page_3.jpg"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }

        let images = layout.batch_images(&batch, "page_").await.unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["page_1.png", "page_2.png", "page_10.png"]);
    }

    #[tokio::test]
    async fn missing_batch_has_no_images() {
        let tmp = TempDir::new().unwrap();
        let layout = StorageLayout::new(tmp.path());
        let images = layout.batch_images(&BatchId::new(), "page_").await.unwrap();
        assert!(images.is_empty());
    }

    #[tokio::test]
    async fn remove_images_drops_empty_batch_dir() {
        let tmp = TempDir::new().unwrap();
        let layout = StorageLayout::new(tmp.path());
        let batch = BatchId::new();
        let dir = layout.batch_dir(&batch);
        std::fs::create_dir_all(&dir).unwrap();
        let images: Vec<_> = (1..=4)
            .map(|n| {
                let p = dir.join(page_file_name("page_", n));
                std::fs::write(&p, b"x").unwrap();
                p
            })
            .collect();

        layout.remove_images(&batch, &images).await;
        assert!(!dir.exists());
    }
}
