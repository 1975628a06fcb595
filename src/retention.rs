//! Retention: purge generated grids, stored uploads and abandoned batches.
//!
//! Nothing in the request path deletes generated PDFs, and a batch that is
//! uploaded but never assembled keeps its images forever. The sweeper removes
//! anything whose modification time is older than the configured maximum age.
//!
//! Only entries this service names are touched: `converted-*.pdf` in
//! `output/`, `<batch-id>.<ext>` uploads in the root and `<batch-id>`
//! directories in `images/`. Anything else under the root is left alone.

use crate::batch::{BatchId, BatchRegistry};
use crate::error::Pdf2GridError;
use crate::server::AppState;
use crate::storage::{StorageLayout, OUTPUT_PREFIX};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What one sweep removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub outputs: usize,
    pub uploads: usize,
    pub batches: usize,
}

impl PurgeReport {
    pub fn total(&self) -> usize {
        self.outputs + self.uploads + self.batches
    }
}

/// Remove expired entries older than `max_age`.
///
/// * `<root>/output/converted-*.pdf` — generated grids
/// * `<root>/<batch-id>.<ext>` — stored uploads
/// * `<root>/images/<batch-id>/` — batches, removed with their images
///
/// A batch currently claimed for assembly in `batches` is skipped; the sweep
/// holds its own claim while the directory is removed.
pub async fn purge_expired(
    layout: &StorageLayout,
    batches: &BatchRegistry,
    max_age: Duration,
) -> Result<PurgeReport, Pdf2GridError> {
    let now = SystemTime::now();
    let sweep = Sweep {
        batches,
        now,
        max_age,
    };
    Ok(PurgeReport {
        outputs: sweep.purge_dir(layout.output_dir(), Entry::Output).await?,
        uploads: sweep.purge_dir(layout.root(), Entry::Upload).await?,
        batches: sweep.purge_dir(layout.images_dir(), Entry::Batch).await?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Output,
    Upload,
    Batch,
}

impl Entry {
    fn is_dir(self) -> bool {
        self == Entry::Batch
    }

    /// Whether `path` is named the way this service names this kind of entry.
    fn owns(self, path: &Path) -> bool {
        match self {
            Entry::Output => {
                let is_pdf = path.extension().and_then(|e| e.to_str()) == Some("pdf");
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                is_pdf && name.starts_with(OUTPUT_PREFIX)
            }
            Entry::Upload => {
                path.extension().is_some() && batch_of(path.file_stem()).is_some()
            }
            Entry::Batch => batch_of(path.file_name()).is_some(),
        }
    }
}

fn batch_of(name: Option<&std::ffi::OsStr>) -> Option<BatchId> {
    BatchId::parse(name?.to_str()?).ok()
}

struct Sweep<'a> {
    batches: &'a BatchRegistry,
    now: SystemTime,
    max_age: Duration,
}

impl Sweep<'_> {
    async fn purge_dir(&self, dir: &Path, kind: Entry) -> Result<usize, Pdf2GridError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Pdf2GridError::storage(dir, e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Pdf2GridError::storage(dir, e))?
        {
            let path = entry.path();
            if !kind.owns(&path) {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                Err(e) => {
                    warn!("Cannot stat {}: {}", path.display(), e);
                    continue;
                }
            };
            let matches_kind = if kind.is_dir() {
                meta.is_dir()
            } else {
                meta.is_file()
            };
            if !matches_kind {
                continue;
            }

            // An mtime in the future counts as fresh.
            let age = meta
                .modified()
                .ok()
                .and_then(|modified| self.now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < self.max_age {
                continue;
            }

            let result = match batch_of(path.file_name()).filter(|_| kind.is_dir()) {
                Some(batch) => {
                    let Ok(_claim) = self.batches.begin_assembly(&batch) else {
                        debug!("Batch {} is being assembled, not purged", batch);
                        continue;
                    };
                    let result = tokio::fs::remove_dir_all(&path).await;
                    if result.is_ok() {
                        self.batches.consume(&batch);
                    }
                    result
                }
                None => tokio::fs::remove_file(&path).await,
            };
            match result {
                Ok(()) => {
                    debug!("Purged {} (age {}s)", path.display(), age.as_secs());
                    removed += 1;
                }
                Err(e) => warn!("Failed to purge {}: {}", path.display(), e),
            }
        }
        Ok(removed)
    }
}

/// Run [`purge_expired`] over `state`'s storage every `every` until the
/// runtime shuts down.
pub fn spawn_sweeper(state: AppState, max_age: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match purge_expired(state.storage(), state.batches(), max_age).await {
                Ok(report) if report.total() > 0 => info!(
                    "Retention sweep removed {} outputs, {} uploads, {} batches",
                    report.outputs, report.uploads, report.batches
                ),
                Ok(_) => debug!("Retention sweep: nothing expired"),
                Err(e) => warn!("Retention sweep failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn seeded_layout(tmp: &TempDir) -> StorageLayout {
        let layout = StorageLayout::new(tmp.path());
        layout.prepare().await.unwrap();
        let batch = BatchId::new();
        std::fs::write(layout.upload_path(&batch, Some("a.pdf")), b"%PDF").unwrap();
        std::fs::write(layout.output_path(&batch), b"%PDF").unwrap();
        let dir = layout.batch_dir(&batch);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("page_1.png"), b"png").unwrap();
        layout
    }

    #[tokio::test]
    async fn zero_max_age_purges_everything() {
        let tmp = TempDir::new().unwrap();
        let layout = seeded_layout(&tmp).await;

        let report = purge_expired(&layout, &BatchRegistry::new(), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(
            report,
            PurgeReport {
                outputs: 1,
                uploads: 1,
                batches: 1
            }
        );
        // The layout directories themselves survive.
        assert!(layout.images_dir().is_dir());
        assert!(layout.output_dir().is_dir());
        assert_eq!(std::fs::read_dir(layout.images_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn fresh_files_are_kept() {
        let tmp = TempDir::new().unwrap();
        let layout = seeded_layout(&tmp).await;

        let report = purge_expired(&layout, &BatchRegistry::new(), Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(report.total(), 0);
        assert_eq!(std::fs::read_dir(layout.output_dir()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn missing_root_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let layout = StorageLayout::new(tmp.path().join("never-created"));
        let report = purge_expired(&layout, &BatchRegistry::new(), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(report.total(), 0);
    }

    #[tokio::test]
    async fn foreign_entries_survive_a_full_sweep() {
        let tmp = TempDir::new().unwrap();
        let layout = seeded_layout(&tmp).await;
        let cargo = layout.root().join("Cargo.toml");
        let notes = layout.images_dir().join("my-notes");
        let stray_output = layout.output_dir().join("report.pdf");
        std::fs::write(&cargo, b"[package]").unwrap();
        std::fs::create_dir_all(&notes).unwrap();
        std::fs::write(notes.join("todo.txt"), b"keep").unwrap();
        std::fs::write(&stray_output, b"%PDF").unwrap();

        let report = purge_expired(&layout, &BatchRegistry::new(), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(
            report,
            PurgeReport {
                outputs: 1,
                uploads: 1,
                batches: 1
            }
        );
        assert!(cargo.is_file());
        assert!(notes.join("todo.txt").is_file());
        assert!(stray_output.is_file());
    }

    #[tokio::test]
    async fn batch_claimed_for_assembly_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let layout = StorageLayout::new(tmp.path());
        layout.prepare().await.unwrap();
        let batch = BatchId::new();
        let dir = layout.batch_dir(&batch);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("page_1.png"), b"png").unwrap();

        let registry = BatchRegistry::new();
        let claim = registry.begin_assembly(&batch).unwrap();
        let report = purge_expired(&layout, &registry, Duration::ZERO).await.unwrap();
        assert_eq!(report.batches, 0);
        assert!(dir.join("page_1.png").is_file());

        drop(claim);
        let report = purge_expired(&layout, &registry, Duration::ZERO).await.unwrap();
        assert_eq!(report.batches, 1);
        assert!(!dir.exists());
    }
}
